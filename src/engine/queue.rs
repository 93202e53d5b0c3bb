use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use crate::error::AppError;
use crate::models::id::RecordId;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub order_id: RecordId,
    pub attempt: u32,
}

impl DispatchRequest {
    pub fn new(order_id: RecordId) -> Self {
        Self {
            order_id,
            attempt: 1,
        }
    }
}

/// Counts the request as queued before handing it over, so the worker's
/// decrement can never run first.
pub async fn enqueue_dispatch(state: &AppState, request: DispatchRequest) -> Result<(), AppError> {
    state.metrics.dispatch_queue_depth.inc();

    if let Err(err) = state.dispatch_tx.send(request).await {
        state.metrics.dispatch_queue_depth.dec();
        return Err(AppError::Internal(format!(
            "dispatch queue send failed: {err}"
        )));
    }

    Ok(())
}

/// Drains the dispatch queue. Retryable failures are put back after the
/// configured delay until the attempt budget runs out.
pub async fn run_dispatch_worker(state: Arc<AppState>, mut dispatch_rx: mpsc::Receiver<DispatchRequest>) {
    info!("dispatch worker started");

    while let Some(request) = dispatch_rx.recv().await {
        state.metrics.dispatch_queue_depth.dec();

        match state.engine.assign(&request.order_id).await {
            Ok(assignment) => {
                info!(
                    order_id = %assignment.order_id,
                    driver_id = %assignment.driver_id,
                    attempt = request.attempt,
                    "queued dispatch completed"
                );
            }
            Err(err) if err.is_retryable() => {
                let max_attempts = state.engine.settings().max_attempts;
                if request.attempt >= max_attempts {
                    error!(order_id = %request.order_id, attempts = request.attempt, error = %err, "dispatch abandoned, order stays unassigned");
                    continue;
                }

                warn!(order_id = %request.order_id, attempt = request.attempt, error = %err, "dispatch failed, retrying");
                schedule_retry(state.clone(), request);
            }
            Err(err) => {
                error!(order_id = %request.order_id, error = %err, "dispatch failed");
            }
        }
    }

    warn!("dispatch worker stopped: queue channel closed");
}

fn schedule_retry(state: Arc<AppState>, request: DispatchRequest) {
    let delay = state.engine.settings().retry_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let retry = DispatchRequest {
            order_id: request.order_id.clone(),
            attempt: request.attempt + 1,
        };
        if let Err(err) = enqueue_dispatch(&state, retry).await {
            error!(order_id = %request.order_id, error = %err, "failed to re-queue dispatch");
        }
    });
}
