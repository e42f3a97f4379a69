use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zrep_core::MetricsSink;
use zrep_db::{MemoryStorage, PostgresStorage, Storage};
use zrep_events::WebhookDispatcher;
use zrep_processor::{HttpProver, JobProcessor, ProcessorConfig};

use zrep_api::config::ServerConfig;
use zrep_api::registry::JobRegistry;
use zrep_api::state::AppState;
use zrep_api::{background, router};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zrep_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    let storage: Arc<dyn Storage> = match &config.database_url {
        Some(database_url) => {
            let pool = zrep_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            zrep_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            zrep_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PostgresStorage::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage (state is lost on restart)");
            Arc::new(MemoryStorage::new())
        }
    };

    // --- Metrics and webhooks ---
    let metrics = Arc::new(MetricsSink::new());
    let dispatcher = WebhookDispatcher::new(config.webhook_max_concurrency, Arc::clone(&metrics));

    // --- Job processor ---
    let cancel = CancellationToken::new();
    let prover = Arc::new(HttpProver::new(
        config.prover_url.clone(),
        Duration::from_secs(config.prover_timeout_secs),
    ));
    let processor = JobProcessor::new(
        Arc::clone(&storage),
        prover,
        dispatcher.clone(),
        Arc::clone(&metrics),
        ProcessorConfig {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            batch_size: config.poll_batch_size,
            prover_timeout: Duration::from_secs(config.prover_timeout_secs),
        },
    );
    let processor_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { processor.run(cancel).await }
    });

    // --- Job retention ---
    let retention_handle = tokio::spawn(background::run_job_retention(
        Arc::clone(&storage),
        config.job_retention_hours,
        cancel.clone(),
    ));

    // --- App state and router ---
    let registry = JobRegistry::new(Arc::clone(&storage), Arc::clone(&metrics));
    let state = AppState {
        storage,
        registry,
        dispatcher,
        metrics,
        config: Arc::new(config.clone()),
    };
    let app = router::build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), processor_handle).await;
    tracing::info!("Job processor stopped");

    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Job retention task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
