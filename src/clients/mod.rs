//! Narrow interfaces onto the services the dispatch core does not own.
//!
//! Every call may suspend on the network; [`bounded`] puts a deadline on it so
//! a slow collaborator surfaces as [`CollaboratorError::Timeout`] instead of a
//! hung request.

pub mod http;
pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::id::RecordId;
use crate::models::order::{Order, OrderStatus};
use crate::models::party::{Person, Restaurant};

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, id: &RecordId) -> Result<Order, CollaboratorError>;

    async fn set_order_status(
        &self,
        id: &RecordId,
        status: OrderStatus,
        driver_id: Option<Uuid>,
    ) -> Result<Order, CollaboratorError>;
}

#[async_trait]
pub trait RestaurantStore: Send + Sync {
    async fn get_restaurant(&self, id: &RecordId) -> Result<Restaurant, CollaboratorError>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_person(&self, id: &RecordId) -> Result<Person, CollaboratorError>;
}

/// Fire-and-forget email/SMS dispatch.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        kind: &str,
        payload: Value,
    ) -> Result<(), CollaboratorError>;

    async fn send_sms(
        &self,
        to: &str,
        message: &str,
        kind: &str,
        payload: Value,
    ) -> Result<(), CollaboratorError>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderStore>,
    pub restaurants: Arc<dyn RestaurantStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub notifications: Arc<dyn NotificationGateway>,
}

pub async fn bounded<T, F>(limit: Duration, what: &str, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout(what.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{bounded, CollaboratorError};

    #[tokio::test]
    async fn slow_call_becomes_timeout() {
        let result: Result<(), _> = bounded(Duration::from_millis(10), "order lookup", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(CollaboratorError::Timeout(what)) if what == "order lookup"));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let result = bounded(Duration::from_secs(1), "lookup", async { Ok::<_, CollaboratorError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
