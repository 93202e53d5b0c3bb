use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::notify::{Channels, Notice};
use crate::engine::DispatchEngine;
use crate::error::AppError;
use crate::geo::{haversine_km, within_km};
use crate::models::driver::{Driver, GeoPoint};
use crate::models::event::DispatchEvent;
use crate::models::id::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityOutcome {
    NoActiveOrder,
    OutOfRange,
    Alerted,
    AlreadyAlerted,
    Unchecked,
}

impl DispatchEngine {
    /// Records a new position, broadcasts it, and raises the one-off
    /// "driver nearby" alert when the active order's address is in range.
    ///
    /// Updates for one driver are applied and broadcast in arrival order.
    /// The proximity check never fails the update.
    pub async fn update_location(
        &self,
        driver_id: Uuid,
        location: GeoPoint,
    ) -> Result<(Driver, ProximityOutcome), AppError> {
        let driver = {
            let _driver_guard = self.driver_locks.lock(&driver_id).await;
            let driver = self.registry.update_location(driver_id, location)?;

            self.events.publish(DispatchEvent::DriverLocationUpdate {
                order_id: driver.active_order_id.clone(),
                driver_id,
                latitude: location.latitude,
                longitude: location.longitude,
            });
            driver
        };

        let outcome = match &driver.active_order_id {
            Some(order_id) => self.check_proximity(&driver, order_id).await,
            None => ProximityOutcome::NoActiveOrder,
        };

        Ok((driver, outcome))
    }

    async fn check_proximity(&self, driver: &Driver, order_id: &RecordId) -> ProximityOutcome {
        if driver.near_alert_sent {
            return ProximityOutcome::AlreadyAlerted;
        }

        let order = match self
            .call("order lookup", self.collaborators.orders.get_order(order_id))
            .await
        {
            Ok(order) => order,
            Err(err) => {
                warn!(driver_id = %driver.id, order_id = %order_id, error = %err, "proximity check skipped");
                return ProximityOutcome::Unchecked;
            }
        };

        if order.status.is_terminal() {
            return ProximityOutcome::Unchecked;
        }

        let Some(destination) = order.delivery_address.point() else {
            debug!(order_id = %order_id, "delivery address has no coordinates");
            return ProximityOutcome::Unchecked;
        };

        if !within_km(
            &driver.current_location,
            &destination,
            self.settings.proximity_alert_km,
        ) {
            return ProximityOutcome::OutOfRange;
        }

        // Claimed before sending so two racing updates cannot both alert.
        if !self.registry.claim_near_alert(driver.id, order_id) {
            return ProximityOutcome::AlreadyAlerted;
        }

        self.metrics.proximity_alerts_total.inc();
        self.notifier.spawn(vec![Notice {
            recipient: order.user_id.clone(),
            subject: "Your driver is nearby".to_string(),
            body: format!(
                "Your driver is less than {} km away with order {}.",
                self.settings.proximity_alert_km, order_id
            ),
            kind: "driver_nearby",
            payload: json!({ "orderId": order_id, "driverId": driver.id }),
            channels: Channels::SmsOnly,
        }]);

        let distance_km = haversine_km(&driver.current_location, &destination);
        info!(driver_id = %driver.id, order_id = %order_id, distance_km, "proximity alert raised");
        ProximityOutcome::Alerted
    }
}
