use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use crate::clients::CollaboratorError;
use crate::models::id::RecordId;
use crate::models::order::OrderStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order {0} not found")]
    OrderNotFound(RecordId),

    #[error("restaurant {0} not found")]
    RestaurantNotFound(RecordId),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no driver available for order {0}")]
    NoDriverAvailable(RecordId),

    #[error("order {order_id} is {from}, cannot move to {to}")]
    InvalidTransition {
        order_id: RecordId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("transition failed: {0}")]
    TransitionFailed(String),

    #[error("dispatch timed out: {0}")]
    DispatchTimedOut(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the whole operation may be retried as-is later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NoDriverAvailable(_)
                | AppError::TransitionFailed(_)
                | AppError::DispatchTimedOut(_)
        )
    }

    /// Maps a failed order-store read onto the dispatch taxonomy.
    pub fn from_order_fetch(order_id: &RecordId, err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::NotFound(_) => AppError::OrderNotFound(order_id.clone()),
            CollaboratorError::Timeout(what) => AppError::DispatchTimedOut(what),
            CollaboratorError::Unavailable(msg) => AppError::TransitionFailed(msg),
        }
    }

    /// Maps a failed order-status write onto the dispatch taxonomy.
    pub fn from_order_write(order_id: &RecordId, err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::NotFound(_) => AppError::OrderNotFound(order_id.clone()),
            other => AppError::TransitionFailed(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::OrderNotFound(_)
            | AppError::RestaurantNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NoDriverAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Conflict(_) | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::TransitionFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::DispatchTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
