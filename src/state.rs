use std::sync::Arc;

use tokio::sync::mpsc;

use crate::clients::Collaborators;
use crate::config::DispatchSettings;
use crate::engine::queue::DispatchRequest;
use crate::engine::DispatchEngine;
use crate::events::EventBus;
use crate::observability::metrics::Metrics;
use crate::registry::DriverRegistry;

pub struct AppState {
    pub engine: DispatchEngine,
    pub dispatch_tx: mpsc::Sender<DispatchRequest>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        collaborators: Collaborators,
        settings: DispatchSettings,
        dispatch_queue_size: usize,
        event_buffer_size: usize,
    ) -> (Self, mpsc::Receiver<DispatchRequest>) {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(dispatch_queue_size.max(1));
        let metrics = Metrics::new();
        let engine = DispatchEngine::new(
            Arc::new(DriverRegistry::new()),
            collaborators,
            EventBus::new(event_buffer_size),
            settings,
            metrics.clone(),
        );

        (
            Self {
                engine,
                dispatch_tx,
                metrics,
            },
            dispatch_rx,
        )
    }

    pub fn registry(&self) -> &DriverRegistry {
        self.engine.registry()
    }

    pub fn events(&self) -> &EventBus {
        self.engine.events()
    }
}
