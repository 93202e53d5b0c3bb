use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;
use crate::models::id::RecordId;

/// Events broadcast on the live channel, serialized as
/// `{"event": "driverAssigned", "payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum DispatchEvent {
    #[serde(rename_all = "camelCase")]
    DriverAssigned {
        order_id: RecordId,
        driver_id: Uuid,
        current_location: GeoPoint,
    },

    /// `order_id` is null while the driver has no active order.
    #[serde(rename_all = "camelCase")]
    DriverLocationUpdate {
        order_id: Option<RecordId>,
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
    },

    #[serde(rename_all = "camelCase")]
    OrderPickedUp {
        order_id: RecordId,
        driver_id: Option<Uuid>,
    },

    #[serde(rename_all = "camelCase")]
    OrderDelivered {
        order_id: RecordId,
        driver_id: Option<Uuid>,
    },

    #[serde(rename_all = "camelCase")]
    OrderCancelled {
        order_id: RecordId,
        driver_id: Option<Uuid>,
    },
}

impl DispatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchEvent::DriverAssigned { .. } => "driverAssigned",
            DispatchEvent::DriverLocationUpdate { .. } => "driverLocationUpdate",
            DispatchEvent::OrderPickedUp { .. } => "orderPickedUp",
            DispatchEvent::OrderDelivered { .. } => "orderDelivered",
            DispatchEvent::OrderCancelled { .. } => "orderCancelled",
        }
    }

    pub fn order_id(&self) -> Option<&RecordId> {
        match self {
            DispatchEvent::DriverAssigned { order_id, .. }
            | DispatchEvent::OrderPickedUp { order_id, .. }
            | DispatchEvent::OrderDelivered { order_id, .. }
            | DispatchEvent::OrderCancelled { order_id, .. } => Some(order_id),
            DispatchEvent::DriverLocationUpdate { order_id, .. } => order_id.as_ref(),
        }
    }

    pub fn driver_id(&self) -> Option<Uuid> {
        match self {
            DispatchEvent::DriverAssigned { driver_id, .. }
            | DispatchEvent::DriverLocationUpdate { driver_id, .. } => Some(*driver_id),
            DispatchEvent::OrderPickedUp { driver_id, .. }
            | DispatchEvent::OrderDelivered { driver_id, .. }
            | DispatchEvent::OrderCancelled { driver_id, .. } => *driver_id,
        }
    }
}
