pub mod dispatch;
pub mod lifecycle;
pub mod locks;
pub mod notify;
pub mod queue;
pub mod selection;
pub mod tracking;

use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::clients::{bounded, CollaboratorError, Collaborators};
use crate::config::DispatchSettings;
use crate::engine::locks::KeyedLocks;
use crate::engine::notify::Notifier;
use crate::events::EventBus;
use crate::models::id::RecordId;
use crate::observability::metrics::Metrics;
use crate::registry::DriverRegistry;

/// Driver dispatch and the delivery state machine around it.
///
/// Orders are serialized per order id (dispatch, pickup, delivery, cancel)
/// and location updates per driver id. Driver state itself is guarded by the
/// registry's entry locks.
pub struct DispatchEngine {
    registry: Arc<DriverRegistry>,
    collaborators: Collaborators,
    events: EventBus,
    notifier: Notifier,
    settings: DispatchSettings,
    metrics: Metrics,
    order_locks: KeyedLocks<RecordId>,
    driver_locks: KeyedLocks<Uuid>,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<DriverRegistry>,
        collaborators: Collaborators,
        events: EventBus,
        settings: DispatchSettings,
        metrics: Metrics,
    ) -> Self {
        let notifier = Notifier::new(
            collaborators.notifications.clone(),
            collaborators.identities.clone(),
            settings.collaborator_timeout,
            metrics.clone(),
        );

        Self {
            registry,
            collaborators,
            events,
            notifier,
            settings,
            metrics,
            order_locks: KeyedLocks::new(),
            driver_locks: KeyedLocks::new(),
        }
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    async fn call<T, F>(&self, what: &str, call: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        bounded(self.settings.collaborator_timeout, what, call).await
    }
}
