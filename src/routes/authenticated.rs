use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Authenticated Router Module
///
/// Every handler here receives an `AuthUser` attached by the auth middleware layered
/// over this router in `create_router`. Deletes are owner-scoped by that user's id.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::me))
        // POST /comments
        // Stores the comment, then re-predicts the node's accessibility.
        .route("/comments", post(handlers::create_comment))
        // DELETE /comments/{id}
        .route("/comments/{id}", delete(handlers::delete_comment))
        // POST /accessibility_propositions
        .route(
            "/accessibility_propositions",
            post(handlers::create_accessibility_proposition),
        )
        // DELETE /accessibility_propositions/{id}
        .route(
            "/accessibility_propositions/{id}",
            delete(handlers::delete_accessibility_proposition),
        )
}
