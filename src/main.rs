use alert_poller::config::{init_state_store, Config};
use alert_poller::services::metrics::{MetricsRegistry, PollingMetricsCollector};
use alert_poller::services::polling::{PollOutcome, PollingController, PollingOptions};
use alert_poller::services::search::{HttpSearchClient, QueryBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alert_poller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load environment configuration");

    let metrics = MetricsRegistry::new().expect("Failed to initialize metrics registry");
    let store = init_state_store(&config.redis_url).await;
    let source = Arc::new(
        HttpSearchClient::new(
            config.search_api_url.clone(),
            Duration::from_secs(config.search_timeout_secs),
        )
        .expect("Failed to build search client"),
    );

    let controller = PollingController::new(
        source,
        QueryBuilder::default(),
        store,
        PollingOptions {
            state_key: config.polling_state_key.clone(),
            default_interval: config.default_interval_secs,
            result_buffer: config.result_buffer,
            metrics: Some(PollingMetricsCollector::new(metrics.clone())),
        },
    )
    .await;

    let mut results = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match results.recv().await {
                Ok(event) => match &event.outcome {
                    PollOutcome::Result(response) => tracing::info!(
                        "Alerts refreshed: {} total, {} returned ({}ms)",
                        response.total,
                        response.results.len(),
                        event.elapsed_ms
                    ),
                    PollOutcome::Failure(error) => {
                        tracing::warn!("Alert refresh failed: {}", error)
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Result consumer lagged, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = alert_poller::create_app(controller.clone(), metrics);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind address");
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Leave the persisted state alone so the next launch resumes it
    controller.on_destroy().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
