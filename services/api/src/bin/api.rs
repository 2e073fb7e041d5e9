//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, DisabledPush, FcmAdapter, OpenAiDescriptionAdapter, PlantNetAdapter},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, AppState, Ports, ServiceSettings},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use garden_core::ports::{PushService, SystemClock};
use garden_core::services::RetryPolicy;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let description_adapter = Arc::new(OpenAiDescriptionAdapter::new(
        Client::with_config(openai_config),
        config.description_model.clone(),
    ));

    let http_client = reqwest::Client::builder().build()?;
    let plantnet_key = config
        .plantnet_api_key
        .clone()
        .ok_or_else(|| ApiError::Internal("PLANTNET_API_KEY is required".to_string()))?;
    let plantnet_adapter = Arc::new(PlantNetAdapter::new(
        http_client.clone(),
        &config.plantnet_url,
        plantnet_key,
    ));

    let push: Arc<dyn PushService> = match (&config.fcm_project_id, &config.fcm_access_token) {
        (Some(project_id), Some(access_token)) => Arc::new(FcmAdapter::new(
            http_client,
            &config.fcm_url,
            project_id,
            access_token.clone(),
        )),
        _ => {
            warn!("FCM_PROJECT_ID or FCM_ACCESS_TOKEN missing, push notifications are disabled");
            Arc::new(DisabledPush)
        }
    };

    // --- 4. Build the Shared AppState ---
    let ports = Ports {
        accounts: db_adapter.clone(),
        profiles: db_adapter.clone(),
        plants: db_adapter.clone(),
        friends: db_adapter.clone(),
        achievements: db_adapter.clone(),
        activities: db_adapter,
        identification: plantnet_adapter,
        description: description_adapter,
        push,
        clock: Arc::new(SystemClock),
    };
    let settings = ServiceSettings {
        identification_min_score: config.identification_min_score,
        push_retry: RetryPolicy::default(),
    };
    let app_state = Arc::new(AppState::new(ports, settings));

    // --- 5. Start the Plant Health Refresh Job ---
    let health_job = app_state.health_job.clone();
    let interval = config.health_job_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match health_job.run_once().await {
                Ok(report) => info!(
                    "Health refresh: {} plants scanned, {} updated, {} notifications sent",
                    report.plants_scanned, report.plants_updated, report.notifications_sent
                ),
                Err(e) => error!("Health refresh failed: {}", e),
            }
        }
    });

    // --- 6. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
