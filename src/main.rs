use accessmap::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    predictor::{OpenAiPredictor, PredictorState},
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database (pool + migrations), the
/// prediction client, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    // Loads .env file settings before configuration can be read.
    dotenv::dotenv().ok();
    // Missing production secrets or unparsable values abort startup here.
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise verbose defaults for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "accessmap=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: pretty, multi-line output.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    // Pool size comes from DATABASE_MAX_CONNECTIONS.
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    // Embedded migrations from ./migrations, unless RUN_MIGRATIONS=false.
    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("FATAL: Failed to apply database migrations.");
        tracing::info!("Database migrations applied.");
    }

    // Instantiate the Repository behind an Arc for sharing across requests.
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 5. Prediction Client (OpenAI-compatible chat completions)
    // Locally the key may be empty; the server still boots, predictions fail with 500.
    if config.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; predictions will fail.");
    }
    let predictor = Arc::new(
        OpenAiPredictor::new(&config).expect("FATAL: Failed to build the prediction HTTP client."),
    ) as PredictorState;

    // 6. Router Assembly and Server Startup
    let bind_address = config.bind_address.clone();
    let app_state = AppState {
        repo,
        predictor,
        config,
    };
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_address)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {bind_address}");
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await.expect("FATAL: HTTP server error");
}
