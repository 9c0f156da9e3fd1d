use crate::{
    error::ApiError,
    models::{Node, NodeAccessibility},
    predictor::AccessibilityPredictor,
    repository::Repository,
};

/// create_comment
///
/// Stores the comment, then re-predicts the node's accessibility from all of its
/// comments and upserts the verdict. A prediction or database failure after the
/// insert is returned to the caller; the stored comment is not rolled back.
pub async fn create_comment(
    repo: &dyn Repository,
    predictor: &dyn AccessibilityPredictor,
    osm_id: &str,
    user_id: i32,
    text: &str,
) -> Result<i32, ApiError> {
    let comment_id = repo.create_comment(osm_id, user_id, text).await?;
    tracing::info!(comment_id, osm_id, user_id, "comment created");

    refresh_node_accessibility(repo, predictor, osm_id).await?;

    Ok(comment_id)
}

/// refresh_node_accessibility
///
/// Feeds every comment of the node (newest first, one per line) to the predictor
/// and stores the result. Returns the new verdict, or `None` when the node has no
/// comments to predict from.
pub async fn refresh_node_accessibility(
    repo: &dyn Repository,
    predictor: &dyn AccessibilityPredictor,
    osm_id: &str,
) -> Result<Option<NodeAccessibility>, ApiError> {
    let Some(node) = repo.get_node(osm_id).await? else {
        return Ok(None);
    };
    if node.comments.is_empty() {
        return Ok(None);
    }

    let description = node
        .comments
        .iter()
        .map(|comment| comment.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let accessibility = predictor.predict(&description).await?;
    repo.upsert_node(osm_id, accessibility).await?;
    tracing::info!(osm_id, accessibility = accessibility.as_str(), "node accessibility updated");

    Ok(Some(accessibility))
}

/// delete_comment
///
/// Owner-scoped. Deleting someone else's (or a missing) comment is a silent no-op.
pub async fn delete_comment(
    repo: &dyn Repository,
    user_id: i32,
    comment_id: i32,
) -> Result<(), ApiError> {
    let affected = repo.delete_comment(comment_id, user_id).await?;
    if affected == 0 {
        tracing::debug!(comment_id, user_id, "delete_comment matched no row");
    }
    Ok(())
}

pub async fn update_node(
    repo: &dyn Repository,
    osm_id: &str,
    accessibility: NodeAccessibility,
) -> Result<(), ApiError> {
    repo.upsert_node(osm_id, accessibility).await?;
    tracing::info!(osm_id, accessibility = accessibility.as_str(), "node accessibility set");
    Ok(())
}

pub async fn list_nodes(repo: &dyn Repository) -> Result<Vec<Node>, ApiError> {
    Ok(repo.list_nodes().await?)
}

pub async fn get_node(repo: &dyn Repository, osm_id: &str) -> Result<Node, ApiError> {
    repo.get_node(osm_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No node matches given osm_id".to_string()))
}

pub async fn create_accessibility_proposition(
    repo: &dyn Repository,
    osm_id: &str,
    user_id: i32,
    text: &str,
    accessibility: NodeAccessibility,
) -> Result<i32, ApiError> {
    let id = repo
        .create_proposition(osm_id, user_id, text, accessibility)
        .await?;
    tracing::info!(proposition_id = id, osm_id, user_id, "accessibility proposition created");
    Ok(id)
}

/// delete_accessibility_proposition
///
/// Same ownership rule as `delete_comment`.
pub async fn delete_accessibility_proposition(
    repo: &dyn Repository,
    user_id: i32,
    proposition_id: i32,
) -> Result<(), ApiError> {
    let affected = repo.delete_proposition(proposition_id, user_id).await?;
    if affected == 0 {
        tracing::debug!(proposition_id, user_id, "delete_proposition matched no row");
    }
    Ok(())
}

pub async fn predict_accessibility(
    predictor: &dyn AccessibilityPredictor,
    text: &str,
) -> Result<NodeAccessibility, ApiError> {
    Ok(predictor.predict(text).await?)
}
