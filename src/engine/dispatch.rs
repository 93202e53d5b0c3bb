use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use crate::clients::CollaboratorError;
use crate::engine::notify::{Channels, Notice};
use crate::engine::selection::rank_candidates;
use crate::engine::DispatchEngine;
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::event::DispatchEvent;
use crate::models::id::RecordId;
use crate::models::order::{Order, OrderStatus};
use crate::models::party::Restaurant;
use crate::registry::Reservation;

impl DispatchEngine {
    /// Picks and reserves a driver for an accepted order.
    ///
    /// The driver is reserved first and the order written second; if the
    /// order write fails the reservation is reverted. On any error the order
    /// is left without a driver and the call can be repeated.
    pub async fn assign(&self, order_id: &RecordId) -> Result<Assignment, AppError> {
        let start = Instant::now();
        let result = self.try_assign(order_id).await;

        let outcome = match &result {
            Ok(assignment) if assignment.fallback => "fallback",
            Ok(_) => "success",
            Err(AppError::NoDriverAvailable(_)) => "no_driver",
            Err(AppError::DispatchTimedOut(_)) => "timeout",
            Err(_) => "error",
        };
        self.metrics
            .dispatch_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .dispatch_total
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn try_assign(&self, order_id: &RecordId) -> Result<Assignment, AppError> {
        let _order_guard = self.order_locks.lock(order_id).await;

        let order = self
            .call("order lookup", self.collaborators.orders.get_order(order_id))
            .await
            .map_err(|err| AppError::from_order_fetch(order_id, err))?;

        if !order.status.can_transition_to(OrderStatus::DriverAssigned) {
            return Err(AppError::InvalidTransition {
                order_id: order_id.clone(),
                from: order.status,
                to: OrderStatus::DriverAssigned,
            });
        }
        if let Some(driver_id) = &order.driver_id {
            return Err(AppError::Conflict(format!(
                "order {order_id} already has driver {driver_id}"
            )));
        }

        let restaurant = self
            .call(
                "restaurant lookup",
                self.collaborators.restaurants.get_restaurant(&order.restaurant_id),
            )
            .await
            .map_err(|err| match err {
                CollaboratorError::NotFound(_) => {
                    AppError::RestaurantNotFound(order.restaurant_id.clone())
                }
                CollaboratorError::Timeout(what) => AppError::DispatchTimedOut(what),
                CollaboratorError::Unavailable(msg) => AppError::TransitionFailed(msg),
            })?;

        let ranking = rank_candidates(
            &self.registry.list_available(),
            &restaurant.location,
            self.settings.radius_km,
        );

        // A candidate can be taken by a concurrent dispatch between ranking
        // and reservation; move on to the next one.
        let reserved = ranking.candidates.iter().find_map(|candidate| {
            self.registry
                .try_reserve(candidate.driver_id, order_id)
                .map(|reservation| (reservation, candidate.distance_km))
        });

        let Some((reservation, distance_km)) = reserved else {
            warn!(order_id = %order_id, restaurant_id = %restaurant.id, "no available driver");
            return Err(AppError::NoDriverAvailable(order_id.clone()));
        };

        self.commit_order(&order, &reservation).await?;

        let driver = reservation.driver;
        let assignment = Assignment {
            order_id: order_id.clone(),
            driver_id: driver.id,
            driver_location: driver.current_location,
            distance_km,
            fallback: ranking.fallback,
            assigned_at: Utc::now(),
        };

        self.events.publish(DispatchEvent::DriverAssigned {
            order_id: order_id.clone(),
            driver_id: driver.id,
            current_location: driver.current_location,
        });

        self.notifier
            .spawn(assignment_notices(&order, &restaurant, &driver.person_id));

        info!(
            order_id = %order_id,
            driver_id = %driver.id,
            distance_km,
            fallback = ranking.fallback,
            "driver assigned"
        );

        Ok(assignment)
    }

    async fn commit_order(&self, order: &Order, reservation: &Reservation) -> Result<(), AppError> {
        let written = self
            .call(
                "order status write",
                self.collaborators.orders.set_order_status(
                    &order.id,
                    OrderStatus::DriverAssigned,
                    Some(reservation.driver.id),
                ),
            )
            .await;

        match written {
            Ok(_) => {
                self.metrics
                    .order_transitions_total
                    .with_label_values(&[OrderStatus::DriverAssigned.as_str()])
                    .inc();
                Ok(())
            }
            Err(err) => {
                let reverted = self.registry.revert_reservation(reservation);
                if !reverted {
                    error!(order_id = %order.id, driver_id = %reservation.driver.id, "driver reservation could not be reverted; driver and order state diverged");
                } else if matches!(err, CollaboratorError::Timeout(_)) {
                    // The remote write may still land after we gave up on it.
                    error!(order_id = %order.id, driver_id = %reservation.driver.id, "order write timed out after driver was released; order may reference a free driver");
                } else {
                    warn!(order_id = %order.id, driver_id = %reservation.driver.id, error = %err, "order write failed, driver reservation reverted");
                }

                Err(AppError::from_order_write(&order.id, err))
            }
        }
    }
}

fn assignment_notices(order: &Order, restaurant: &Restaurant, driver_person_id: &RecordId) -> Vec<Notice> {
    let payload = json!({ "orderId": order.id });

    vec![
        Notice {
            recipient: order.user_id.clone(),
            subject: format!("Driver assigned to order {}", order.id),
            body: format!(
                "A driver is on the way to {} to collect your order {}.",
                restaurant.name, order.id
            ),
            kind: "driver_assigned",
            payload: payload.clone(),
            channels: Channels::EmailAndSms,
        },
        Notice {
            recipient: driver_person_id.clone(),
            subject: format!("New delivery: order {}", order.id),
            body: format!(
                "Pick up order {} at {}, {}.",
                order.id, restaurant.name, restaurant.address
            ),
            kind: "delivery_assigned",
            payload: payload.clone(),
            channels: Channels::EmailAndSms,
        },
        Notice {
            recipient: restaurant.owner_id.clone(),
            subject: format!("Driver assigned to order {}", order.id),
            body: format!("A driver has been assigned to collect order {}.", order.id),
            kind: "driver_assigned",
            payload,
            channels: Channels::EmailAndSms,
        },
    ]
}
