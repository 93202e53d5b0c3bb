#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use delivery_dispatch::clients::memory::InMemoryCollaborators;
use delivery_dispatch::config::DispatchSettings;
use delivery_dispatch::engine::queue::DispatchRequest;
use delivery_dispatch::models::driver::{Driver, GeoPoint};
use delivery_dispatch::models::id::RecordId;
use delivery_dispatch::models::order::{DeliveryAddress, Order, OrderStatus};
use delivery_dispatch::models::party::{Person, Restaurant};
use delivery_dispatch::state::AppState;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const KM_PER_DEG_LAT: f64 = 111.194_926_644_558_73;

pub const COLOMBO: GeoPoint = GeoPoint {
    latitude: 6.9271,
    longitude: 79.8612,
};

pub struct Harness {
    pub state: Arc<AppState>,
    pub mem: InMemoryCollaborators,
    pub dispatch_rx: Option<mpsc::Receiver<DispatchRequest>>,
}

pub fn harness() -> Harness {
    harness_with(DispatchSettings {
        collaborator_timeout: Duration::from_millis(500),
        retry_delay: Duration::from_millis(20),
        ..DispatchSettings::default()
    })
}

pub fn harness_with(settings: DispatchSettings) -> Harness {
    let mem = InMemoryCollaborators::new();
    let (state, rx) = AppState::new(mem.collaborators(), settings, 64, 256);
    Harness {
        state: Arc::new(state),
        mem,
        dispatch_rx: Some(rx),
    }
}

/// A fresh id shaped like the marketplace's Mongo ObjectIds.
pub fn object_id() -> RecordId {
    format!("{:024x}", Uuid::new_v4().as_u128() >> 32)
        .parse()
        .unwrap()
}

pub fn north_of(origin: GeoPoint, km: f64) -> GeoPoint {
    GeoPoint::new(origin.latitude + km / KM_PER_DEG_LAT, origin.longitude)
}

impl Harness {
    pub fn person(&self, name: &str, phone: Option<&str>) -> RecordId {
        let id = object_id();
        self.mem.identities.insert(Person {
            id: id.clone(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            phone_number: phone.map(str::to_string),
        });
        id
    }

    pub fn restaurant_at(&self, location: GeoPoint) -> Restaurant {
        let owner = self.person("owner", Some("+94770000001"));
        let restaurant = Restaurant {
            id: object_id(),
            name: "Ministry of Crab".to_string(),
            address: "Old Dutch Hospital, Colombo".to_string(),
            location,
            owner_id: owner,
        };
        self.mem.restaurants.insert(restaurant.clone());
        restaurant
    }

    pub fn order_with_status(&self, restaurant: &Restaurant, destination: GeoPoint, status: OrderStatus) -> Order {
        let customer = self.person("customer", Some("+94770000002"));
        let order = Order {
            id: object_id(),
            user_id: customer,
            restaurant_id: restaurant.id.clone(),
            delivery_address: DeliveryAddress {
                address: "Galle Face Green".to_string(),
                latitude: Some(destination.latitude),
                longitude: Some(destination.longitude),
            },
            status,
            driver_id: None,
        };
        self.mem.orders.insert(order.clone());
        order
    }

    pub fn accepted_order(&self, restaurant: &Restaurant, destination: GeoPoint) -> Order {
        self.order_with_status(restaurant, destination, OrderStatus::Accepted)
    }

    /// Registers a driver and runs it through `deliveries` reserve/release
    /// cycles so its lifetime counter matches.
    pub fn driver_at(&self, location: GeoPoint, deliveries: u64) -> Driver {
        let person = self.person("driver", Some("+94770000003"));
        let registry = self.state.registry();
        let driver = registry.register(person, Some(location), None).unwrap();

        for _ in 0..deliveries {
            let order_id = object_id();
            registry.try_reserve(driver.id, &order_id).unwrap();
            registry.release(driver.id, &order_id).unwrap();
        }

        registry.get_by_id(driver.id).unwrap()
    }

    pub fn order(&self, id: &RecordId) -> Order {
        self.mem.orders.get(id).unwrap()
    }

    pub fn driver(&self, id: Uuid) -> Driver {
        self.state.registry().get_by_id(id).unwrap()
    }
}

/// Polls until `check` holds or a second has passed.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
