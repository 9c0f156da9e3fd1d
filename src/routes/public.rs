use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: account creation and login, read-only node
/// data, and the stateless prediction endpoint.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/register
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Returns a signed token carrying user_id, email and exp.
        .route("/auth/login", post(handlers::login))
        // GET /disabilities
        .route("/disabilities", get(handlers::get_disabilities))
        // GET /nodes
        // Nodes with nested comments and propositions, newest first.
        .route("/nodes", get(handlers::list_nodes))
        // GET /nodes/{osm_id}
        .route("/nodes/{osm_id}", get(handlers::get_node))
        // POST /predict_accessibility
        // Calls the external LLM synchronously; nothing is persisted.
        .route(
            "/predict_accessibility",
            post(handlers::predict_accessibility),
        )
}
