use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use crate::engine::queue::{enqueue_dispatch, DispatchRequest};
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::id::RecordId;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dispatch/assign", post(assign_driver))
        .route("/dispatch/enqueue", post(enqueue))
        .route("/dispatch/confirm-pickup", patch(confirm_pickup))
        .route("/dispatch/confirm-delivery", patch(confirm_delivery))
        .route("/dispatch/cancel", patch(cancel_order))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_id: Option<RecordId>,
}

impl OrderRequest {
    fn order_id(&self) -> Result<&RecordId, AppError> {
        self.order_id
            .as_ref()
            .ok_or_else(|| AppError::Validation("orderId is required".to_string()))
    }
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OrderRequest>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = state.engine.assign(payload.order_id()?).await?;
    Ok(Json(assignment))
}

async fn enqueue(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OrderRequest>,
) -> Result<(StatusCode, Json<DispatchRequest>), AppError> {
    let request = DispatchRequest::new(payload.order_id()?.clone());
    enqueue_dispatch(&state, request.clone()).await?;
    Ok((StatusCode::ACCEPTED, Json(request)))
}

async fn confirm_pickup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OrderRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.confirm_pickup(payload.order_id()?).await?))
}

async fn confirm_delivery(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OrderRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.confirm_delivery(payload.order_id()?).await?))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OrderRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.cancel(payload.order_id()?).await?))
}
