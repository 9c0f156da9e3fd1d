use tokio::task;

use crate::{
    auth::issue_token,
    config::AppConfig,
    error::ApiError,
    models::{User, UserDisability},
    repository::{Repository, RepositoryError},
};

/// register
///
/// Hashes the password and stores a new user with the default role. Returns the new
/// user id. A duplicate email becomes `ApiError::UserAlreadyExists`.
pub async fn register(
    repo: &dyn Repository,
    config: &AppConfig,
    email: &str,
    password: &str,
    disabilities: &[UserDisability],
) -> Result<i32, ApiError> {
    let pwd_hash = hash_password(password, config.password_hash_cost).await?;

    let mut unique = Vec::with_capacity(disabilities.len());
    for disability in disabilities {
        if !unique.contains(disability) {
            unique.push(*disability);
        }
    }

    match repo.create_user(email, &pwd_hash, &unique).await {
        Ok(user_id) => {
            tracing::info!(user_id, "user registered");
            Ok(user_id)
        }
        Err(RepositoryError::Conflict) => {
            tracing::info!("registration rejected: email already in use");
            Err(ApiError::UserAlreadyExists)
        }
        Err(e) => Err(e.into()),
    }
}

/// login
///
/// Checks the credentials and issues a signed access token. Unknown email and wrong
/// password are logged differently but return the same error to the caller.
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    email: &str,
    password: &str,
) -> Result<String, ApiError> {
    let Some(credentials) = repo.get_user_credentials(email).await? else {
        tracing::info!("login failed: incorrect email");
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(password, &credentials.pwd_hash).await? {
        tracing::info!(user_id = credentials.id, "login failed: incorrect password");
        return Err(ApiError::InvalidCredentials);
    }

    issue_token(config, credentials.id, &credentials.email)
}

/// get_user
///
/// Profile lookup for `/auth/me`.
pub async fn get_user(repo: &dyn Repository, user_id: i32) -> Result<User, ApiError> {
    repo.get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))
}

/// Salted bcrypt hash, hex-encoded for storage. Runs on the blocking pool since
/// bcrypt is deliberately slow.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    let password = password.to_string();
    let hashed = task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {e}")))?;

    Ok(hex::encode(hashed))
}

pub async fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let hash_bytes = hex::decode(stored_hash)
        .map_err(|e| ApiError::Internal(format!("stored password hash is not hex: {e}")))?;
    let hash = String::from_utf8(hash_bytes)
        .map_err(|e| ApiError::Internal(format!("stored password hash is not utf-8: {e}")))?;

    let password = password.to_string();
    task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("failed to verify password: {e}")))
}
