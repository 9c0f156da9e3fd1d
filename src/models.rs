use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ApiError;

// --- Enumerations (mapped to Postgres enum types) ---

/// UserRole
///
/// The RBAC field stored in `users.role`. Only `Admin` may set a node's accessibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

/// UserDisability
///
/// Accessibility need declared by a user at registration. Stored as a
/// `user_disability[]` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_disability", rename_all = "lowercase")]
pub enum UserDisability {
    Wheelchair,
    Blind,
    Deaf,
}

impl UserDisability {
    pub const ALL: [UserDisability; 3] = [
        UserDisability::Wheelchair,
        UserDisability::Blind,
        UserDisability::Deaf,
    ];
}

/// NodeAccessibility
///
/// Three-valued verdict on how accessible a mapped location is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "node_accessibility", rename_all = "lowercase")]
pub enum NodeAccessibility {
    Full,
    Partial,
    None,
}

impl NodeAccessibility {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeAccessibility::Full => "full",
            NodeAccessibility::Partial => "partial",
            NodeAccessibility::None => "none",
        }
    }
}

// --- Core Application Schemas ---

/// User
///
/// Public view of a row in `users`. The password hash never leaves the repository
/// except through `UserCredentials`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub role: UserRole,
    pub disabilities: Vec<UserDisability>,
}

/// UserCredentials
///
/// Internal row used by login to check a password.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i32,
    pub email: String,
    pub pwd_hash: String,
}

/// CommentAuthor
///
/// The author snippet embedded in every comment and proposition of a node listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentAuthor {
    pub id: i32,
    pub email: String,
    pub disabilities: Vec<UserDisability>,
}

/// NodeComment
///
/// One free-text comment on a node, as aggregated by the node listing query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NodeComment {
    pub id: i32,
    pub user: CommentAuthor,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NodeAccessibilityProposition
///
/// A user's suggested rating for a node. Never changes the node's own verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NodeAccessibilityProposition {
    pub id: i32,
    pub user: CommentAuthor,
    pub accessibility: NodeAccessibility,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Node
///
/// A mapped location together with everything users said about it. Comments and
/// propositions are ordered newest first. `accessibility` is `null` until a verdict
/// has been predicted or set by an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Node {
    pub osm_id: String,
    pub accessibility: Option<NodeAccessibility>,
    pub comments: Vec<NodeComment>,
    pub accessibility_propositions: Vec<NodeAccessibilityProposition>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /api/auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub disabilities: Vec<UserDisability>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_email(&self.email)?;
        validate_not_empty("password", &self.password)
    }
}

/// LoginRequest
///
/// Input payload for `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_email(&self.email)?;
        validate_not_empty("password", &self.password)
    }
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCommentRequest {
    #[schema(example = "node/123456789")]
    pub osm_id: String,
    pub text: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_not_empty("osm_id", &self.osm_id)?;
        validate_not_empty("text", &self.text)
    }
}

/// UpdateNodeRequest
///
/// Admin override of a node's accessibility (`PATCH /api/nodes/{osm_id}`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateNodeRequest {
    pub accessibility: NodeAccessibility,
}

/// CreatePropositionRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatePropositionRequest {
    pub osm_id: String,
    pub text: String,
    pub accessibility: NodeAccessibility,
}

impl CreatePropositionRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_not_empty("osm_id", &self.osm_id)
    }
}

/// PredictAccessibilityRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PredictAccessibilityRequest {
    pub text: String,
}

impl PredictAccessibilityRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_not_empty("text", &self.text)
    }
}

// --- Response Payloads (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub user_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// CreatedResponse
///
/// Id of a freshly inserted comment or proposition.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedResponse {
    pub id: i32,
}

// --- Validation helpers ---

fn validate_not_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Structural check only: one `@`, non-empty local part, dotted domain, no spaces.
fn validate_email(email: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::Validation("Invalid email address".to_string());

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');

    if local.is_empty() || !domain_ok {
        return Err(invalid());
    }
    Ok(())
}
