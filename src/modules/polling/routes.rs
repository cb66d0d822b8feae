use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::AppState;
use super::controller;

pub fn polling_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/polling", get(controller::get_status))
        .route("/polling/start", post(controller::start))
        .route("/polling/stop", post(controller::stop))
        .route("/polling/interval", put(controller::set_interval))
        .route("/polling/suppression", put(controller::set_suppression))
        .route("/polling/drop-next", post(controller::drop_next))
        .route("/polling/query", put(controller::set_query))
}
