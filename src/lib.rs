use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod predictor;
pub mod repository;
pub mod services;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

// State types wired together by main.rs and by the integration tests.

pub use config::AppConfig;
pub use error::ApiError;
pub use predictor::{MockPredictor, OpenAiPredictor, PredictorState};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and `ToSchema`
/// models. Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login, handlers::me, handlers::get_disabilities,
        handlers::create_comment, handlers::delete_comment, handlers::list_nodes,
        handlers::get_node, handlers::update_node, handlers::create_accessibility_proposition,
        handlers::delete_accessibility_proposition, handlers::predict_accessibility
    ),
    components(
        schemas(
            models::User, models::UserRole, models::UserDisability, models::NodeAccessibility,
            models::Node, models::NodeComment, models::NodeAccessibilityProposition,
            models::CommentAuthor, models::RegisterRequest, models::RegisterResponse,
            models::LoginRequest, models::TokenResponse, models::CreateCommentRequest,
            models::CreatePropositionRequest, models::UpdateNodeRequest,
            models::PredictAccessibilityRequest, models::CreatedResponse,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "accessmap", description = "Accessibility map API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the authenticated paths.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// AppState
///
/// Single container for everything a request may need. Cheap to clone: the
/// services are behind `Arc`s and the config is small.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Accessibility predictor (LLM client in production, mock in tests).
    pub predictor: PredictorState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors (e.g. `AuthUser`) pull a single component out of `AppState`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for PredictorState {
    fn from_ref(app_state: &AppState) -> PredictorState {
        app_state.predictor.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Route layer for the authenticated and admin routers. Resolving `AuthUser` does the
/// token check and the role lookup; a failure rejects the request with 401 before the
/// handler runs. On success the identity is stored in the request extensions, where
/// the handler's own `AuthUser` extractor picks it up without a second lookup.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree under `/api`, applies the auth layer to the protected
/// groups, and wraps everything in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Router Assembly (mounted under /api)
    let api = Router::new()
        // Public Routes: no middleware.
        .merge(public::public_routes())
        // Authenticated Routes: `auth_middleware` rejects missing/invalid tokens with 401.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin Routes: same auth layer; the role check happens inside the handler (403).
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        );

    // 3. Base Router: docs, health check, the API, then the shared state.
    let base_router = Router::new()
        // Documentation: Swagger UI plus the raw OpenAPI JSON.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Health check, outside /api.
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(state);

    // 4. Observability and Correlation Layers (outermost first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a UUID per incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with the `x-request-id` set by the outer layer
/// so every log line of the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
