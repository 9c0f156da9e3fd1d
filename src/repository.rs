use crate::models::{
    Node, NodeAccessibility, NodeAccessibilityProposition, NodeComment, User, UserCredentials,
    UserDisability,
};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, types::Json};
use std::sync::Arc;
use thiserror::Error;

/// RepositoryError
///
/// `Conflict` is raised for unique-constraint violations so callers can turn a
/// duplicate email into a client error; everything else is an opaque database failure.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation());

        if unique_violation {
            RepositoryError::Conflict
        } else {
            RepositoryError::Database(err)
        }
    }
}

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers and services only see
/// this trait, so tests can swap in an in-memory implementation.
///
/// Deletes are owner-scoped in the WHERE clause and report the number of affected
/// rows; a foreign id simply affects zero rows.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn create_user(
        &self,
        email: &str,
        pwd_hash: &str,
        disabilities: &[UserDisability],
    ) -> Result<i32, RepositoryError>;
    async fn get_user(&self, id: i32) -> Result<Option<User>, RepositoryError>;
    async fn get_user_credentials(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    // --- Comments ---
    async fn create_comment(
        &self,
        osm_id: &str,
        user_id: i32,
        text: &str,
    ) -> Result<i32, RepositoryError>;
    async fn delete_comment(&self, id: i32, user_id: i32) -> Result<u64, RepositoryError>;

    // --- Nodes ---
    /// Insert-or-update: overwrites the accessibility of an existing node.
    async fn upsert_node(
        &self,
        osm_id: &str,
        accessibility: NodeAccessibility,
    ) -> Result<(), RepositoryError>;
    async fn list_nodes(&self) -> Result<Vec<Node>, RepositoryError>;
    async fn get_node(&self, osm_id: &str) -> Result<Option<Node>, RepositoryError>;

    // --- Accessibility propositions ---
    async fn create_proposition(
        &self,
        osm_id: &str,
        user_id: i32,
        text: &str,
        accessibility: NodeAccessibility,
    ) -> Result<i32, RepositoryError>;
    async fn delete_proposition(&self, id: i32, user_id: i32) -> Result<u64, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Aggregated node listing.
///
/// Comments and propositions are each grouped per `osm_id` into JSON arrays
/// (newest first, author embedded), then full-outer-joined with `nodes`, so a node
/// shows up if it has a row in any of the three tables. `$1` narrows every source to
/// one node when set; `NULL` lists everything.
const NODES_QUERY: &str = r#"
    WITH comments AS (
        SELECT c.osm_id,
               json_agg(
                   json_build_object(
                       'id', c.id,
                       'user', json_build_object(
                           'id', u.id,
                           'email', u.email,
                           'disabilities', u.disabilities
                       ),
                       'text', c.text,
                       'created_at', c.created_at
                   )
                   ORDER BY c.created_at DESC, c.id DESC
               ) AS comments
        FROM node_comments c
        JOIN users u ON u.id = c.user_id
        WHERE $1::text IS NULL OR c.osm_id = $1
        GROUP BY c.osm_id
    ),
    propositions AS (
        SELECT p.osm_id,
               json_agg(
                   json_build_object(
                       'id', p.id,
                       'user', json_build_object(
                           'id', u.id,
                           'email', u.email,
                           'disabilities', u.disabilities
                       ),
                       'accessibility', p.accessibility,
                       'text', p.text,
                       'created_at', p.created_at
                   )
                   ORDER BY p.created_at DESC, p.id DESC
               ) AS propositions
        FROM node_accessibility_propositions p
        JOIN users u ON u.id = p.user_id
        WHERE $1::text IS NULL OR p.osm_id = $1
        GROUP BY p.osm_id
    ),
    selected_nodes AS (
        SELECT osm_id, accessibility
        FROM nodes
        WHERE $1::text IS NULL OR osm_id = $1
    )
    SELECT COALESCE(n.osm_id, c.osm_id, p.osm_id) AS osm_id,
           n.accessibility AS accessibility,
           COALESCE(c.comments, '[]'::json) AS comments,
           COALESCE(p.propositions, '[]'::json) AS accessibility_propositions
    FROM selected_nodes n
    FULL OUTER JOIN comments c ON c.osm_id = n.osm_id
    FULL OUTER JOIN propositions p ON p.osm_id = COALESCE(n.osm_id, c.osm_id)
    ORDER BY 1
"#;

/// Raw row of `NODES_QUERY`; the JSON columns decode straight into the models.
#[derive(FromRow)]
struct NodeRow {
    osm_id: String,
    accessibility: Option<NodeAccessibility>,
    comments: Json<Vec<NodeComment>>,
    accessibility_propositions: Json<Vec<NodeAccessibilityProposition>>,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        Node {
            osm_id: row.osm_id,
            accessibility: row.accessibility,
            comments: row.comments.0,
            accessibility_propositions: row.accessibility_propositions.0,
        }
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_nodes(&self, osm_id: Option<&str>) -> Result<Vec<Node>, RepositoryError> {
        let rows = sqlx::query_as::<_, NodeRow>(NODES_QUERY)
            .bind(osm_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Node::from).collect())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Role is left to the column default (`user`). A duplicate email trips
    /// `users_email_key` and surfaces as `RepositoryError::Conflict`.
    async fn create_user(
        &self,
        email: &str,
        pwd_hash: &str,
        disabilities: &[UserDisability],
    ) -> Result<i32, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO users (email, pwd_hash, disabilities) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(email)
        .bind(pwd_hash)
        .bind(disabilities)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, role, disabilities FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_credentials(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, pwd_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credentials)
    }

    async fn create_comment(
        &self,
        osm_id: &str,
        user_id: i32,
        text: &str,
    ) -> Result<i32, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO node_comments (osm_id, user_id, text) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(osm_id)
        .bind(user_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// delete_comment
    ///
    /// **Owner-Only**: matches on both id and author.
    async fn delete_comment(&self, id: i32, user_id: i32) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM node_comments WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_node(
        &self,
        osm_id: &str,
        accessibility: NodeAccessibility,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO nodes (osm_id, accessibility) VALUES ($1, $2)
            ON CONFLICT (osm_id) DO UPDATE SET accessibility = EXCLUDED.accessibility
            "#,
        )
        .bind(osm_id)
        .bind(accessibility)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, RepositoryError> {
        self.fetch_nodes(None).await
    }

    async fn get_node(&self, osm_id: &str) -> Result<Option<Node>, RepositoryError> {
        Ok(self.fetch_nodes(Some(osm_id)).await?.into_iter().next())
    }

    async fn create_proposition(
        &self,
        osm_id: &str,
        user_id: i32,
        text: &str,
        accessibility: NodeAccessibility,
    ) -> Result<i32, RepositoryError> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO node_accessibility_propositions (osm_id, user_id, text, accessibility)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(osm_id)
        .bind(user_id)
        .bind(text)
        .bind(accessibility)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn delete_proposition(&self, id: i32, user_id: i32) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM node_accessibility_propositions WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
