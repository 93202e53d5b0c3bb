use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::notify::{Channels, Notice};
use crate::engine::DispatchEngine;
use crate::error::AppError;
use crate::models::event::DispatchEvent;
use crate::models::id::RecordId;
use crate::models::order::{Order, OrderStatus};

impl DispatchEngine {
    /// Driver has collected the order from the restaurant.
    pub async fn confirm_pickup(&self, order_id: &RecordId) -> Result<Order, AppError> {
        let _order_guard = self.order_locks.lock(order_id).await;
        let (before, order) = self.transition(order_id, OrderStatus::PickedUp).await?;

        let driver_id = assigned_driver(&order, &before);
        self.events.publish(DispatchEvent::OrderPickedUp {
            order_id: order_id.clone(),
            driver_id,
        });

        self.notifier.spawn(vec![Notice {
            recipient: order.user_id.clone(),
            subject: format!("Order {order_id} picked up"),
            body: format!("Your order {order_id} has been picked up and is on its way."),
            kind: "order_picked_up",
            payload: json!({ "orderId": order_id }),
            channels: Channels::EmailAndSms,
        }]);

        info!(order_id = %order_id, driver_id = ?driver_id, "order picked up");
        Ok(order)
    }

    /// Order handed to the customer; the driver goes back into the pool.
    pub async fn confirm_delivery(&self, order_id: &RecordId) -> Result<Order, AppError> {
        let _order_guard = self.order_locks.lock(order_id).await;
        let (before, order) = self.transition(order_id, OrderStatus::Delivered).await?;

        let driver_id = assigned_driver(&order, &before);
        let driver_person = driver_id.and_then(|driver_id| self.release_driver(driver_id, order_id));

        self.events.publish(DispatchEvent::OrderDelivered {
            order_id: order_id.clone(),
            driver_id,
        });

        let payload = json!({ "orderId": order_id });
        let mut notices = vec![Notice {
            recipient: order.user_id.clone(),
            subject: format!("Order {order_id} delivered"),
            body: format!("Your order {order_id} has been delivered. Enjoy your meal!"),
            kind: "order_delivered",
            payload: payload.clone(),
            channels: Channels::EmailAndSms,
        }];
        if let Some(person_id) = driver_person {
            notices.push(Notice {
                recipient: person_id,
                subject: format!("Delivery of order {order_id} completed"),
                body: format!("Thanks! Order {order_id} is marked delivered."),
                kind: "delivery_completed",
                payload,
                channels: Channels::EmailAndSms,
            });
        }
        self.notifier.spawn(notices);

        info!(order_id = %order_id, driver_id = ?driver_id, "order delivered");
        Ok(order)
    }

    /// Cancels the order and releases its driver under the same rule as
    /// delivery.
    pub async fn cancel(&self, order_id: &RecordId) -> Result<Order, AppError> {
        let _order_guard = self.order_locks.lock(order_id).await;
        let (before, order) = self.transition(order_id, OrderStatus::Cancelled).await?;

        let driver_id = assigned_driver(&order, &before);
        if let Some(driver_id) = driver_id {
            self.release_driver(driver_id, order_id);
        }

        self.events.publish(DispatchEvent::OrderCancelled {
            order_id: order_id.clone(),
            driver_id,
        });

        let payload = json!({ "orderId": order_id });
        let mut notices = vec![Notice {
            recipient: order.user_id.clone(),
            subject: format!("Your order {order_id} was cancelled"),
            body: format!("Your order {order_id} was cancelled."),
            kind: "order_cancelled",
            payload: payload.clone(),
            channels: Channels::EmailAndSms,
        }];

        match self
            .call(
                "restaurant lookup",
                self.collaborators.restaurants.get_restaurant(&order.restaurant_id),
            )
            .await
        {
            Ok(restaurant) => notices.push(Notice {
                recipient: restaurant.owner_id,
                subject: format!("Order {order_id} cancelled by customer"),
                body: format!("Order {order_id} at {} was cancelled.", restaurant.name),
                kind: "order_cancelled",
                payload,
                channels: Channels::EmailAndSms,
            }),
            Err(err) => {
                warn!(order_id = %order_id, error = %err, "restaurant owner not notified of cancellation");
            }
        }
        self.notifier.spawn(notices);

        info!(order_id = %order_id, driver_id = ?driver_id, "order cancelled");
        Ok(order)
    }

    /// Reads the order, checks the edge is legal, writes the new status.
    /// Returns the order before and after. Callers hold the order lock.
    async fn transition(&self, order_id: &RecordId, to: OrderStatus) -> Result<(Order, Order), AppError> {
        let before = self
            .call("order lookup", self.collaborators.orders.get_order(order_id))
            .await
            .map_err(|err| AppError::from_order_write(order_id, err))?;

        if !before.status.can_transition_to(to) {
            return Err(AppError::InvalidTransition {
                order_id: order_id.clone(),
                from: before.status,
                to,
            });
        }

        let after = self
            .call(
                "order status write",
                self.collaborators.orders.set_order_status(order_id, to, None),
            )
            .await
            .map_err(|err| AppError::from_order_write(order_id, err))?;

        self.metrics
            .order_transitions_total
            .with_label_values(&[to.as_str()])
            .inc();

        Ok((before, after))
    }

    /// Returns the driver's person id when the driver is known, whether or
    /// not it was still attached to this order.
    fn release_driver(&self, driver_id: Uuid, order_id: &RecordId) -> Option<RecordId> {
        match self.registry.release(driver_id, order_id) {
            Ok(Some(driver)) => {
                info!(driver_id = %driver_id, order_id = %order_id, "driver released");
                Some(driver.person_id)
            }
            Ok(None) => {
                warn!(driver_id = %driver_id, order_id = %order_id, "driver no longer on this order, left as is");
                self.registry
                    .get_by_id(driver_id)
                    .ok()
                    .map(|driver| driver.person_id)
            }
            Err(err) => {
                warn!(driver_id = %driver_id, order_id = %order_id, error = %err, "driver release skipped");
                None
            }
        }
    }
}

/// The driver on the order, if the order service knows one this registry
/// minted. Falls back to the pre-transition copy when the write response
/// omits it.
fn assigned_driver(after: &Order, before: &Order) -> Option<Uuid> {
    let recorded = after.driver_id.as_ref().or(before.driver_id.as_ref())?;
    let driver_id = recorded.as_uuid();
    if driver_id.is_none() {
        warn!(order_id = %after.id, driver_id = %recorded, "order references a driver unknown to this registry");
    }
    driver_id
}
