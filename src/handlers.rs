use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    extract::{AppJson, AppPath},
    models::{
        CreateCommentRequest, CreatePropositionRequest, CreatedResponse, LoginRequest, Node,
        NodeAccessibility, PredictAccessibilityRequest, RegisterRequest, RegisterResponse,
        TokenResponse, UpdateNodeRequest, User, UserDisability,
    },
    services,
};
use axum::{Json, extract::State, http::StatusCode};

// --- Auth ---

/// register
///
/// [Public Route] Creates an account with the default `user` role.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "User already exists or invalid payload")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.validate()?;
    let user_id = services::auth::register(
        state.repo.as_ref(),
        &state.config,
        &payload.email,
        &payload.password,
        &payload.disabilities,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

/// login
///
/// [Public Route] Exchanges credentials for a bearer token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Incorrect email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    // Malformed credentials are reported like wrong ones.
    payload
        .validate()
        .map_err(|_| ApiError::InvalidCredentials)?;
    let token = services::auth::login(
        state.repo.as_ref(),
        &state.config,
        &payload.email,
        &payload.password,
    )
    .await?;

    Ok(Json(TokenResponse { token }))
}

/// me
///
/// [Authenticated Route] Profile of the caller, re-read from the database.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "Invalid or expired token")
    ),
    security(("bearer" = []))
)]
pub async fn me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    let user = services::auth::get_user(state.repo.as_ref(), id).await?;
    Ok(Json(user))
}

/// get_disabilities
///
/// [Public Route] Every disability tag a user may declare.
#[utoipa::path(
    get,
    path = "/api/disabilities",
    responses((status = 200, description = "Disability tags", body = [UserDisability]))
)]
pub async fn get_disabilities() -> Json<Vec<UserDisability>> {
    Json(UserDisability::ALL.to_vec())
}

// --- Comments ---

/// create_comment
///
/// [Authenticated Route] Posts a comment on a node and re-predicts the node's
/// accessibility from all of its comments.
#[utoipa::path(
    post,
    path = "/api/comments",
    request_body = CreateCommentRequest,
    responses((status = 201, description = "Comment created", body = CreatedResponse)),
    security(("bearer" = []))
)]
pub async fn create_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    payload.validate()?;
    let id = services::nodes::create_comment(
        state.repo.as_ref(),
        state.predictor.as_ref(),
        &payload.osm_id,
        user_id,
        &payload.text,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// delete_comment
///
/// [Authenticated Route] Deletes one of the caller's comments.
///
/// *Ownership*: enforced in the WHERE clause. A comment owned by someone else is left
/// untouched and the response is still 204.
#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    params(("id" = i32, Path, description = "Comment ID")),
    responses((status = 204, description = "Deleted (or nothing to delete)")),
    security(("bearer" = []))
)]
pub async fn delete_comment(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, ApiError> {
    services::nodes::delete_comment(state.repo.as_ref(), user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Nodes ---

/// list_nodes
///
/// [Public Route] Every node known from a verdict, a comment or a proposition.
#[utoipa::path(
    get,
    path = "/api/nodes",
    responses((status = 200, description = "Nodes", body = [Node]))
)]
pub async fn list_nodes(State(state): State<AppState>) -> Result<Json<Vec<Node>>, ApiError> {
    let nodes = services::nodes::list_nodes(state.repo.as_ref()).await?;
    Ok(Json(nodes))
}

/// get_node
///
/// [Public Route] One node with its comments and propositions.
#[utoipa::path(
    get,
    path = "/api/nodes/{osm_id}",
    params(("osm_id" = String, Path, description = "OpenStreetMap id")),
    responses(
        (status = 200, description = "Node", body = Node),
        (status = 404, description = "Unknown node")
    )
)]
pub async fn get_node(
    State(state): State<AppState>,
    AppPath(osm_id): AppPath<String>,
) -> Result<Json<Node>, ApiError> {
    let node = services::nodes::get_node(state.repo.as_ref(), &osm_id).await?;
    Ok(Json(node))
}

/// update_node
///
/// [Admin Route] Sets a node's accessibility directly.
///
/// *RBAC*: the role resolved by `AuthUser` must be `admin`; otherwise 403 and no write.
#[utoipa::path(
    patch,
    path = "/api/nodes/{osm_id}",
    params(("osm_id" = String, Path, description = "OpenStreetMap id")),
    request_body = UpdateNodeRequest,
    responses(
        (status = 204, description = "Updated"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer" = []))
)]
pub async fn update_node(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppPath(osm_id): AppPath<String>,
    AppJson(payload): AppJson<UpdateNodeRequest>,
) -> Result<StatusCode, ApiError> {
    if !auth_user.is_admin() {
        tracing::warn!(user_id = auth_user.id, osm_id = %osm_id, "non-admin tried to set node accessibility");
        return Err(ApiError::Forbidden);
    }
    services::nodes::update_node(state.repo.as_ref(), &osm_id, payload.accessibility).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Accessibility propositions ---

/// create_accessibility_proposition
///
/// [Authenticated Route] Suggests an accessibility rating for a node. Does not change
/// the node's own verdict.
#[utoipa::path(
    post,
    path = "/api/accessibility_propositions",
    request_body = CreatePropositionRequest,
    responses((status = 201, description = "Proposition created", body = CreatedResponse)),
    security(("bearer" = []))
)]
pub async fn create_accessibility_proposition(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreatePropositionRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    payload.validate()?;
    let id = services::nodes::create_accessibility_proposition(
        state.repo.as_ref(),
        &payload.osm_id,
        user_id,
        &payload.text,
        payload.accessibility,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// delete_accessibility_proposition
///
/// [Authenticated Route] Same ownership semantics as `delete_comment`.
#[utoipa::path(
    delete,
    path = "/api/accessibility_propositions/{id}",
    params(("id" = i32, Path, description = "Proposition ID")),
    responses((status = 204, description = "Deleted (or nothing to delete)")),
    security(("bearer" = []))
)]
pub async fn delete_accessibility_proposition(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<StatusCode, ApiError> {
    services::nodes::delete_accessibility_proposition(state.repo.as_ref(), user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Prediction ---

/// predict_accessibility
///
/// [Public Route] Classifies an arbitrary description without storing anything.
#[utoipa::path(
    post,
    path = "/api/predict_accessibility",
    request_body = PredictAccessibilityRequest,
    responses(
        (status = 200, description = "Predicted accessibility", body = NodeAccessibility),
        (status = 500, description = "Prediction service failed")
    )
)]
pub async fn predict_accessibility(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PredictAccessibilityRequest>,
) -> Result<Json<NodeAccessibility>, ApiError> {
    payload.validate()?;
    let accessibility =
        services::nodes::predict_accessibility(state.predictor.as_ref(), &payload.text).await?;
    Ok(Json(accessibility))
}
