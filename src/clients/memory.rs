//! In-process stand-ins for the collaborator services, used by tests and by
//! local runs without the rest of the marketplace.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::clients::{
    CollaboratorError, Collaborators, IdentityStore, NotificationGateway, OrderStore,
    RestaurantStore,
};
use crate::models::id::RecordId;
use crate::models::order::{Order, OrderStatus};
use crate::models::party::{Person, Restaurant};

#[derive(Default)]
pub struct InMemoryOrders {
    orders: DashMap<RecordId, Order>,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
}

impl InMemoryOrders {
    pub fn insert(&self, order: Order) {
        self.orders.insert(order.id.clone(), order);
    }

    pub fn get(&self, id: &RecordId) -> Option<Order> {
        self.orders.get(id).map(|entry| entry.value().clone())
    }

    /// Makes every subsequent status write fail with `Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn delay_reads(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrders {
    async fn get_order(&self, id: &RecordId) -> Result<Order, CollaboratorError> {
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.get(id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("order {id}")))
    }

    async fn set_order_status(
        &self,
        id: &RecordId,
        status: OrderStatus,
        driver_id: Option<Uuid>,
    ) -> Result<Order, CollaboratorError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable(format!(
                "order {id} write rejected"
            )));
        }

        let mut order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("order {id}")))?;

        order.status = status;
        if let Some(driver_id) = driver_id {
            order.driver_id = Some(RecordId::from(driver_id));
        }

        Ok(order.clone())
    }
}

#[derive(Default)]
pub struct InMemoryRestaurants {
    restaurants: DashMap<RecordId, Restaurant>,
}

impl InMemoryRestaurants {
    pub fn insert(&self, restaurant: Restaurant) {
        self.restaurants.insert(restaurant.id.clone(), restaurant);
    }
}

#[async_trait]
impl RestaurantStore for InMemoryRestaurants {
    async fn get_restaurant(&self, id: &RecordId) -> Result<Restaurant, CollaboratorError> {
        self.restaurants
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CollaboratorError::NotFound(format!("restaurant {id}")))
    }
}

#[derive(Default)]
pub struct InMemoryIdentities {
    people: DashMap<RecordId, Person>,
}

impl InMemoryIdentities {
    pub fn insert(&self, person: Person) {
        self.people.insert(person.id.clone(), person);
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentities {
    async fn get_person(&self, id: &RecordId) -> Result<Person, CollaboratorError> {
        self.people
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CollaboratorError::NotFound(format!("person {id}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub channel: Channel,
    pub to: String,
    pub kind: String,
    pub text: String,
    pub payload: Value,
}

/// Records what would have been sent. Can be switched to fail every send.
#[derive(Default)]
pub struct RecordingNotifications {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifications {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn sent_of_kind(&self, kind: &str) -> Vec<SentNotification> {
        self.sent()
            .into_iter()
            .filter(|notification| notification.kind == kind)
            .collect()
    }

    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, notification: SentNotification) -> Result<(), CollaboratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable(
                "notification gateway down".to_string(),
            ));
        }

        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification);
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for RecordingNotifications {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
        kind: &str,
        payload: Value,
    ) -> Result<(), CollaboratorError> {
        self.record(SentNotification {
            channel: Channel::Email,
            to: to.to_string(),
            kind: kind.to_string(),
            text: subject.to_string(),
            payload,
        })
    }

    async fn send_sms(
        &self,
        to: &str,
        message: &str,
        kind: &str,
        payload: Value,
    ) -> Result<(), CollaboratorError> {
        self.record(SentNotification {
            channel: Channel::Sms,
            to: to.to_string(),
            kind: kind.to_string(),
            text: message.to_string(),
            payload,
        })
    }
}

/// Handles onto every in-memory collaborator, plus the trait-object bundle
/// the engine consumes.
#[derive(Clone, Default)]
pub struct InMemoryCollaborators {
    pub orders: Arc<InMemoryOrders>,
    pub restaurants: Arc<InMemoryRestaurants>,
    pub identities: Arc<InMemoryIdentities>,
    pub notifications: Arc<RecordingNotifications>,
}

impl InMemoryCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            orders: self.orders.clone(),
            restaurants: self.restaurants.clone(),
            identities: self.identities.clone(),
            notifications: self.notifications.clone(),
        }
    }
}
