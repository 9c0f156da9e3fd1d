use crate::{AppState, handlers};
use axum::{Router, routing::patch};

/// Admin Router Module
///
/// Routes restricted to the `admin` role. The router is wrapped in the same auth
/// layer as the authenticated routes; the role itself is checked by each handler,
/// which answers 403 before touching the database.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PATCH /nodes/{osm_id}
        // Overrides the predicted accessibility of a node.
        .route("/nodes/{osm_id}", patch(handlers::update_node))
}
