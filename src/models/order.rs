use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::driver::GeoPoint;
use crate::models::id::RecordId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Ready,
    DriverAssigned,
    PickedUp,
    Delivered,
    Rejected,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Ready => "ready",
            OrderStatus::DriverAssigned => "driver_assigned",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Rejected | OrderStatus::Cancelled
        )
    }

    /// Edges of the fulfillment lifecycle. `ready` may be reached before or
    /// after a driver is assigned since the restaurant sets it independently.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        match (self, next) {
            (Pending, Accepted) | (Pending, Rejected) | (Pending, Cancelled) => true,
            (Accepted, Ready) | (Accepted, DriverAssigned) | (Accepted, Cancelled) => true,
            (Ready, DriverAssigned) | (Ready, PickedUp) | (Ready, Cancelled) => true,
            (DriverAssigned, Ready) | (DriverAssigned, PickedUp) | (DriverAssigned, Cancelled) => {
                true
            }
            (PickedUp, Delivered) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryAddress {
    #[serde(default)]
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl DeliveryAddress {
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }
}

/// Order as seen through the order service. Owned elsewhere; only status and
/// driver are ever written from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: RecordId,
    pub user_id: RecordId,
    pub restaurant_id: RecordId,
    pub delivery_address: DeliveryAddress,
    pub status: OrderStatus,
    /// Whatever the order service holds; only UUIDs refer to drivers known
    /// to this registry.
    #[serde(default)]
    pub driver_id: Option<RecordId>,
}
