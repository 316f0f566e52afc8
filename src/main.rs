use std::sync::Arc;

use axum::{http::StatusCode, response::Json, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mealscan_backend::cache::TtlCache;
use mealscan_backend::config::Config;
use mealscan_backend::gateway::ChatGateway;
use mealscan_backend::handlers::{tasks, uploads};
use mealscan_backend::moderation::ModerationGate;
use mealscan_backend::object_store::HttpObjectStore;
use mealscan_backend::processors::{InferenceSettings, ProcessorContext};
use mealscan_backend::store::PgTaskStore;
use mealscan_backend::worker::spawn_workers;
use mealscan_backend::{database, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mealscan_backend=info,sqlx=warn,info")),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let pool = database::create_pool(&config.database_url).await?;

    let skip_migrations = std::env::var("SKIP_MIGRATIONS")
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false);
    if skip_migrations {
        warn!("Skipping migrations due to SKIP_MIGRATIONS");
    } else {
        match sqlx::migrate!("./migrations").run(&pool).await {
            Ok(_) => info!("Migrations completed"),
            Err(sqlx::migrate::MigrateError::VersionMismatch(version)) => {
                warn!("Migration version mismatch: {}", version);
                warn!("Database has a different migration state than expected");
            }
            Err(e) => {
                warn!("Failed to run migrations: {}", e);
                warn!("Continuing without migrations (set SKIP_MIGRATIONS=true to suppress)");
            }
        }
    }

    let store = Arc::new(PgTaskStore::new(pool));
    let gateway = Arc::new(ChatGateway::new(
        config.inference_base_url.clone(),
        config.inference_api_key.clone(),
    ));
    let object_store = Arc::new(HttpObjectStore::new(
        reqwest::Client::new(),
        &config.storage_base_url,
        &config.storage_api_key,
        &config.storage_bucket,
    ));

    let ctx = Arc::new(ProcessorContext {
        store: store.clone(),
        gateway: gateway.clone(),
        moderation: ModerationGate::new(
            gateway.clone(),
            config.vision_model.clone(),
            config.text_model.clone(),
            config.moderation_timeout,
        ),
        profiles: TtlCache::new(config.profile_cache_ttl),
        settings: InferenceSettings {
            vision_model: config.vision_model.clone(),
            text_model: config.text_model.clone(),
            analysis_timeout: config.gateway_timeout,
        },
    });

    let workers = spawn_workers(ctx, config.worker_counts, config.poll_interval);
    info!("Spawned {} workers", workers.len());

    let state = AppState {
        store,
        object_store,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    let app = Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/tasks", tasks::router())
        .nest("/api/uploads", uploads::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Server starting on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": "mealscan-backend",
        "timestamp": chrono::Utc::now(),
        "endpoints": {
            "tasks": "/api/tasks",
            "uploads": "/api/uploads",
            "health": "/api/health"
        }
    })))
}
