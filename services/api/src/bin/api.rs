//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DisabledMailer, OpenAiCompletionAdapter, SmtpMailer, SqliteHistoryStore},
    analysis::{RetryingAnalysisClient, RetryPolicy},
    config::Config,
    error::ApiError,
    web::{self, ApiDoc, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use solaudit_core::ports::MailTransport;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the History Database & Run Migrations ---
    info!("Opening history database at {}...", config.database_url);
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true);
    // A single writer connection: SQLite serializes appends for us, so
    // concurrent sessions queue instead of interleaving.
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await?;
    let history = Arc::new(SqliteHistoryStore::new(db_pool));
    info!("Running database migrations...");
    history.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let completion_adapter = Arc::new(OpenAiCompletionAdapter::new(
        openai_client,
        config.audit_model.clone(),
    ));
    let analysis = Arc::new(RetryingAnalysisClient::new(
        completion_adapter,
        RetryPolicy {
            max_attempts: config.analysis_max_attempts,
            request_timeout: config.analysis_timeout,
            backoff_base: config.analysis_backoff,
        },
    ));

    let mailer: Arc<dyn MailTransport> = match &config.smtp {
        Some(smtp) => {
            info!("SMTP notifier configured for {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            warn!("SMTP settings missing; email export is disabled");
            Arc::new(DisabledMailer)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        history,
        analysis,
        mailer,
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = web::router(app_state).layer(cors);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
