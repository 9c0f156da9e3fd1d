use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, error::ApiError, models::UserRole, repository::RepositoryState};

/// Claims
///
/// Payload of every access token issued by `login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Primary key of the user in `users`.
    pub user_id: i32,
    pub email: String,
    /// Expiration time (seconds since the epoch).
    pub exp: u64,
}

/// AuthUser
///
/// Resolved identity of an authenticated request. The role is read from the
/// database on every request, so a promotion or demotion applies immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i32,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// issue_token
///
/// Signs a token for the user that expires `access_token_expire_minutes` from now.
pub fn issue_token(config: &AppConfig, user_id: i32, email: &str) -> Result<String, ApiError> {
    let expires_at = Utc::now() + Duration::minutes(config.access_token_expire_minutes);
    let claims = Claims {
        user_id,
        email: email.to_string(),
        exp: expires_at.timestamp().max(0) as u64,
    };

    encode(
        &Header::new(config.jwt_algorithm),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
}

/// decode_token
///
/// Validates signature, algorithm and expiry. An expired token is reported
/// separately so clients can tell "log in again" from "garbage".
pub fn decode_token(config: &AppConfig, token: &str) -> Result<Claims, ApiError> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => Err(ApiError::TokenExpired),
            _ => {
                tracing::debug!("rejected token: {e}");
                Err(ApiError::InvalidToken)
            }
        },
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::InvalidToken)
}

/// AuthUser Extractor Implementation
///
/// 1. Reuse the identity already attached by the auth middleware, if any.
/// 2. Otherwise extract the bearer token and decode it.
/// 3. Load the user from the database to get the current role.
///
/// Rejection: 401 with `Invalid token` or `Token expired`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = bearer_token(&parts.headers)?;
        let claims = decode_token(&config, token)?;

        // A valid token for a deleted account is treated as invalid.
        let user = repo
            .get_user(claims.user_id)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}
