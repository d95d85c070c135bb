use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use sentinel_backend::{
    config::Config,
    database,
    jobs::{JobScheduler, LockCoordinator, LockStore, RedisLockStore},
    notifications::{PgNotificationStore, PgRoleDirectory, PushChannel, RoleDirectory},
    sla::PgDocumentStore,
    websocket::{self, WsManager},
    AppState,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db_pool = database::create_pool(&config.database_url).await?;

    let lock_store: Option<Arc<dyn LockStore>> = match &config.redis_url {
        Some(url) => match RedisLockStore::connect(url).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                // Same fail-open stance as a lock call that errors.
                tracing::warn!("Redis unavailable, running without job locks: {}", e);
                None
            }
        },
        None => {
            tracing::info!("REDIS_URL not set, running without job locks");
            None
        }
    };

    let directory: Arc<dyn RoleDirectory> = Arc::new(PgRoleDirectory::new(db_pool.clone()));
    let ws_manager = Arc::new(WsManager::new());

    let scheduler = JobScheduler::new(
        config.jobs.clone(),
        LockCoordinator::new(lock_store, config.instance_id.clone()),
        Arc::new(PgDocumentStore::new(db_pool.clone())),
        Arc::new(PgNotificationStore::new(db_pool.clone())),
        directory.clone(),
    );
    let push: Arc<dyn PushChannel> = ws_manager.clone();
    scheduler.start(Some(push))?;

    let app_state = Arc::new(AppState {
        db_pool,
        ws_manager,
        directory,
    });

    let app = Router::new()
        .route("/", get(|| async { "SLA Sentinel v0.1.0" }))
        .route("/health", get(health_check))
        .route("/ws", get(websocket::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    scheduler.shutdown().await;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let database = database::health_check(&state.db_pool).await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database { "healthy" } else { "degraded" },
            "service": "sla-sentinel",
            "push_connections": state.ws_manager.connection_count().await,
        })),
    )
}
