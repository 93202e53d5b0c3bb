use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Availability, Driver, GeoPoint};
use crate::models::id::RecordId;

/// State a driver had before a reservation, kept so a failed assignment can
/// put it back.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub driver: Driver,
    pub order_id: RecordId,
    prior_availability: Availability,
    prior_near_alert_sent: bool,
}

/// Every mutation goes through `DashMap::get_mut`, which holds the entry's
/// shard write lock for the duration of the change.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: DashMap<Uuid, Driver>,
    by_person: DashMap<RecordId, Uuid>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        person_id: RecordId,
        location: Option<GeoPoint>,
        availability: Option<Availability>,
    ) -> Result<Driver, AppError> {
        let location = location
            .ok_or_else(|| AppError::Validation("currentLocation is required".to_string()))?;
        if !location.is_valid() {
            return Err(AppError::Validation(format!(
                "invalid coordinates ({}, {})",
                location.latitude, location.longitude
            )));
        }

        let availability = availability.unwrap_or(Availability::Available);
        if availability == Availability::Busy {
            return Err(AppError::Validation(
                "a new driver cannot start busy".to_string(),
            ));
        }

        let now = Utc::now();
        let driver = Driver {
            id: Uuid::new_v4(),
            person_id: person_id.clone(),
            current_location: location,
            availability,
            active_order_id: None,
            near_alert_sent: false,
            deliveries_count: 0,
            created_at: now,
            updated_at: now,
        };

        match self.by_person.entry(person_id) {
            Entry::Occupied(existing) => {
                return Err(AppError::Conflict(format!(
                    "person {} is already driver {}",
                    existing.key(),
                    existing.get()
                )));
            }
            Entry::Vacant(slot) => {
                self.drivers.insert(driver.id, driver.clone());
                slot.insert(driver.id);
            }
        }

        Ok(driver)
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| driver_not_found(id))
    }

    pub fn get_by_person_id(&self, person_id: &RecordId) -> Result<Driver, AppError> {
        let driver_id = self
            .by_person
            .get(person_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound(format!("no driver for person {person_id}")))?;

        self.get_by_id(driver_id)
    }

    pub fn list(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn list_available(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .filter(|entry| entry.value().is_dispatchable())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn count_by_availability(&self, availability: Availability) -> usize {
        self.drivers
            .iter()
            .filter(|entry| entry.value().availability == availability)
            .count()
    }

    /// Overwrites the last known position. The proximity check lives with
    /// the engine since it needs the order store.
    pub fn update_location(&self, id: Uuid, location: GeoPoint) -> Result<Driver, AppError> {
        if !location.is_valid() {
            return Err(AppError::Validation(format!(
                "invalid coordinates ({}, {})",
                location.latitude, location.longitude
            )));
        }

        let mut driver = self.drivers.get_mut(&id).ok_or_else(|| driver_not_found(id))?;
        driver.current_location = location;
        driver.updated_at = Utc::now();

        Ok(driver.clone())
    }

    /// Direct setter for `available` / `offline`. `busy` is only ever set by
    /// a reservation so it always comes with an order, and a driver on an
    /// order is only freed by that order's delivery or cancellation.
    pub fn set_availability(&self, id: Uuid, availability: Availability) -> Result<Driver, AppError> {
        if availability == Availability::Busy {
            return Err(AppError::Validation(
                "busy is set by dispatch, not directly".to_string(),
            ));
        }

        let mut driver = self.drivers.get_mut(&id).ok_or_else(|| driver_not_found(id))?;
        if let Some(order_id) = &driver.active_order_id {
            warn!(driver_id = %id, order_id = %order_id, %availability, "availability change refused, driver is on an order");
            return Err(AppError::Conflict(format!(
                "driver {id} is serving order {order_id}"
            )));
        }

        driver.availability = availability;
        driver.near_alert_sent = false;
        driver.updated_at = Utc::now();

        Ok(driver.clone())
    }

    /// Marks the driver busy on `order_id` if, and only if, it is still
    /// available. `None` means a concurrent dispatch got there first.
    pub fn try_reserve(&self, id: Uuid, order_id: &RecordId) -> Option<Reservation> {
        let mut driver = self.drivers.get_mut(&id)?;
        if driver.availability != Availability::Available {
            return None;
        }

        let prior_availability = driver.availability;
        let prior_near_alert_sent = driver.near_alert_sent;

        driver.availability = Availability::Busy;
        driver.active_order_id = Some(order_id.clone());
        driver.near_alert_sent = false;
        driver.deliveries_count += 1;
        driver.updated_at = Utc::now();

        Some(Reservation {
            driver: driver.clone(),
            order_id: order_id.clone(),
            prior_availability,
            prior_near_alert_sent,
        })
    }

    /// Undoes `try_reserve`. Returns false when the driver has since moved on
    /// and nothing was reverted.
    pub fn revert_reservation(&self, reservation: &Reservation) -> bool {
        let Some(mut driver) = self.drivers.get_mut(&reservation.driver.id) else {
            return false;
        };

        if driver.active_order_id.as_ref() != Some(&reservation.order_id) {
            return false;
        }

        driver.availability = reservation.prior_availability;
        driver.active_order_id = None;
        driver.near_alert_sent = reservation.prior_near_alert_sent;
        driver.deliveries_count = driver.deliveries_count.saturating_sub(1);
        driver.updated_at = Utc::now();
        true
    }

    /// Puts the driver back in the pool once `order_id` is finished. A driver
    /// already serving a different order is left alone.
    pub fn release(&self, id: Uuid, order_id: &RecordId) -> Result<Option<Driver>, AppError> {
        let mut driver = self.drivers.get_mut(&id).ok_or_else(|| driver_not_found(id))?;

        let serving_this_order = driver.active_order_id.as_ref() == Some(order_id);
        let dangling_busy =
            driver.availability == Availability::Busy && driver.active_order_id.is_none();
        if !serving_this_order && !dangling_busy {
            return Ok(None);
        }

        driver.availability = Availability::Available;
        driver.active_order_id = None;
        driver.near_alert_sent = false;
        driver.updated_at = Utc::now();

        Ok(Some(driver.clone()))
    }

    /// Sets `near_alert_sent` for the driver's current order. True only for
    /// the single caller that flipped it.
    pub fn claim_near_alert(&self, id: Uuid, order_id: &RecordId) -> bool {
        let Some(mut driver) = self.drivers.get_mut(&id) else {
            return false;
        };

        if driver.active_order_id.as_ref() != Some(order_id) || driver.near_alert_sent {
            return false;
        }

        driver.near_alert_sent = true;
        driver.updated_at = Utc::now();
        true
    }
}

fn driver_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("driver {id} not found"))
}
