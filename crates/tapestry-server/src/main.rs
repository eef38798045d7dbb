//! Tapestry Server - Main entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::info;

use tapestry_common::logging::{init_logging, LogConfig};
use tapestry_ingest::config::IngestConfig;
use tapestry_ingest::orchestrator::Orchestrator;
use tapestry_ingest::proxy::ProxyRotator;
use tapestry_ingest::source;
use tapestry_ingest::store::PgItemStore;
use tapestry_server::{aws, config::Config, create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut log_config = LogConfig::for_binary("tapestry-server");
    if log_config.filter_directives.is_none() {
        log_config.filter_directives =
            Some("tower_http=debug,sqlx=info".to_string());
    }
    init_logging(&log_config)?;

    info!("Starting Tapestry server");

    // Load configuration
    let config = Config::load()?;
    let ingest_config = IngestConfig::from_env()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // AWS region/credentials for cloud-hosted storage consumers
    let _aws_config = aws::init_aws_config().await;

    // Initialize database connection pool
    let pool = ingest_config.database.create_pool().await?;

    // Run migrations
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    // Assemble the per-request ingestion surface. The server owns the
    // pool; the orchestrator only borrows it, so it is built poolless.
    let rotator = ProxyRotator::from_config(ingest_config.proxy_list.as_deref())
        .map_err(|e| anyhow::anyhow!("invalid proxy configuration: {}", e))?;
    let rotator = (!rotator.is_empty()).then(|| Arc::new(rotator));

    let orchestrator = Orchestrator::with_parts(
        Arc::new(PgItemStore::new(pool.clone())),
        source::registry(&ingest_config),
        ingest_config.request_timeout(),
        ingest_config.request_delay(),
        None,
    )
    .with_rotator(rotator);

    let state = AppState {
        db: pool.clone(),
        orchestrator: Arc::new(orchestrator),
    };

    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
    .await?;

    pool.close().await;
    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give in-flight requests a moment to finish.
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
