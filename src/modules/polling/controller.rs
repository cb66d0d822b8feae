use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::modules::polling::schema::{
    ErrorResponse, SetIntervalRequest, SetSuppressionRequest, StopParams,
};
use crate::services::polling::PollingStatus;
use crate::services::search::SearchRequest;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<PollingStatus> {
    Json(state.controller.status())
}

pub async fn start(State(state): State<Arc<AppState>>) -> Json<PollingStatus> {
    state.controller.start().await;
    Json(state.controller.status())
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StopParams>,
) -> Json<PollingStatus> {
    state.controller.stop(params.persist).await;
    Json(state.controller.status())
}

pub async fn set_interval(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetIntervalRequest>,
) -> Result<Json<PollingStatus>, ApiError> {
    if let Err(e) = req.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_message("Invalid interval", e.to_string())),
        ));
    }

    state
        .controller
        .set_interval(req.seconds)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string()))))?;

    Ok(Json(state.controller.status()))
}

pub async fn set_suppression(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetSuppressionRequest>,
) -> Json<PollingStatus> {
    state.controller.set_suppression(req.suppressed);
    Json(state.controller.status())
}

pub async fn drop_next(State(state): State<Arc<AppState>>) -> Json<PollingStatus> {
    state.controller.drop_next_and_continue();
    Json(state.controller.status())
}

/// Replace the descriptor the next query will use
pub async fn set_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> StatusCode {
    state.controller.query_builder().set_search_request(req);
    StatusCode::NO_CONTENT
}
