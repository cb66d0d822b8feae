pub mod config;
pub mod modules;
pub mod services;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use modules::metrics::metrics_routes;
use modules::polling::polling_routes;
use services::metrics::{metrics_middleware, MetricsRegistry};
use services::polling::PollingController;

pub struct AppState {
    pub controller: PollingController,
    pub metrics: Arc<MetricsRegistry>,
}

pub fn create_app(controller: PollingController, metrics: Arc<MetricsRegistry>) -> Router {
    let state = Arc::new(AppState {
        controller,
        metrics: metrics.clone(),
    });

    Router::new()
        .route("/", get(root))
        .merge(polling_routes())
        .with_state(state)
        .merge(metrics_routes(metrics.clone()))
        .layer(middleware::from_fn_with_state(metrics, metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn root() -> &'static str {
    "Alert Auto-Polling Service"
}
