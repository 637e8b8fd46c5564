//! Architex API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use architex_common::config::AppConfig;
use architex_common::db::create_pool;
use architex_notifier::channel::{DatabaseChannel, MailChannel};
use architex_notifier::delivery::DeliveryService;
use architex_notifier::dispatcher::Dispatcher;
use architex_notifier::retry::RetryPolicy;

use architex_api::routes::create_router;
use architex_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "architex_api=debug,architex_engine=debug,architex_notifier=debug,tower_http=debug",
            )
        }))
        .init();

    tracing::info!("Starting Architex API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    // Build the delivery pipeline. The database channel is always on;
    // mail requires provider credentials.
    let mut delivery = DeliveryService::new(
        pool.clone(),
        RetryPolicy::from_config(&config),
        config.app_base_url.clone(),
    )
    .with_channel(Arc::new(DatabaseChannel::new(pool.clone())));

    match (&config.resend_api_key, &config.mail_from) {
        (Some(api_key), Some(from)) => {
            delivery =
                delivery.with_channel(Arc::new(MailChannel::new(api_key.clone(), from.clone())));
            tracing::info!("Mail channel enabled");
        }
        _ => {
            tracing::warn!("RESEND_API_KEY / MAIL_FROM not set, mail channel disabled");
        }
    }

    let dispatcher = Dispatcher::new(
        pool.clone(),
        Arc::new(delivery),
        config.app_base_url.clone(),
    );

    // Build application state
    let state = AppState::new(pool, config, dispatcher);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
