mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{eventually, harness, harness_with, north_of, object_id, COLOMBO};
use delivery_dispatch::clients::memory::Channel;
use delivery_dispatch::config::DispatchSettings;
use delivery_dispatch::error::AppError;
use delivery_dispatch::models::driver::{Availability, GeoPoint};
use delivery_dispatch::models::event::DispatchEvent;
use delivery_dispatch::models::id::RecordId;
use delivery_dispatch::models::order::OrderStatus;

#[tokio::test]
async fn closer_driver_wins_over_fewer_deliveries() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 3.0));
    let d1 = h.driver_at(north_of(COLOMBO, 0.5), 0);
    let d2 = h.driver_at(north_of(COLOMBO, 0.3), 10);
    let mut events = h.state.events().subscribe();

    let assignment = h.state.engine.assign(&order.id).await.unwrap();

    assert_eq!(assignment.driver_id, d2.id);
    assert!(!assignment.fallback);

    let d2 = h.driver(d2.id);
    assert_eq!(d2.availability, Availability::Busy);
    assert_eq!(d2.active_order_id, Some(order.id.clone()));
    assert_eq!(d2.deliveries_count, 11);
    assert_eq!(h.driver(d1.id).availability, Availability::Available);

    let stored = h.order(&order.id);
    assert_eq!(stored.status, OrderStatus::DriverAssigned);
    assert_eq!(stored.driver_id, Some(RecordId::from(d2.id)));

    assert_eq!(
        events.recv().await.unwrap(),
        DispatchEvent::DriverAssigned {
            order_id: order.id.clone(),
            driver_id: d2.id,
            current_location: d2.current_location,
        }
    );
}

#[tokio::test]
async fn nearest_of_two_eight_and_fifteen_km() {
    let h = harness();
    let origin = GeoPoint::new(0.0, 0.0);
    let restaurant = h.restaurant_at(origin);
    let order = h.accepted_order(&restaurant, north_of(origin, 1.0));
    let _eight = h.driver_at(north_of(origin, 8.0), 0);
    let two = h.driver_at(north_of(origin, 2.0), 0);
    let _fifteen = h.driver_at(north_of(origin, 15.0), 0);

    let assignment = h.state.engine.assign(&order.id).await.unwrap();

    assert_eq!(assignment.driver_id, two.id);
    assert!((assignment.distance_km - 2.0).abs() < 0.01);
}

#[tokio::test]
async fn falls_back_to_nearest_when_nobody_is_in_range() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 1.0));
    let _far = h.driver_at(north_of(COLOMBO, 60.0), 0);
    let nearest = h.driver_at(north_of(COLOMBO, 25.0), 0);

    let assignment = h.state.engine.assign(&order.id).await.unwrap();

    assert!(assignment.fallback);
    assert_eq!(assignment.driver_id, nearest.id);
}

#[tokio::test]
async fn equal_distance_goes_to_fewer_deliveries() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 1.0));
    let spot = north_of(COLOMBO, 1.5);
    let _five = h.driver_at(spot, 5);
    let three = h.driver_at(spot, 3);

    let assignment = h.state.engine.assign(&order.id).await.unwrap();
    assert_eq!(assignment.driver_id, three.id);
}

#[tokio::test]
async fn no_driver_leaves_order_accepted() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 1.0));
    let offline = h.driver_at(COLOMBO, 0);
    h.state
        .registry()
        .set_availability(offline.id, Availability::Offline)
        .unwrap();

    let result = h.state.engine.assign(&order.id).await;

    assert!(matches!(result, Err(AppError::NoDriverAvailable(id)) if id == order.id));
    let stored = h.order(&order.id);
    assert_eq!(stored.status, OrderStatus::Accepted);
    assert!(stored.driver_id.is_none());
}

#[tokio::test]
async fn missing_order_or_restaurant_is_not_found() {
    let h = harness();
    let unknown = object_id();
    assert!(matches!(
        h.state.engine.assign(&unknown).await,
        Err(AppError::OrderNotFound(id)) if id == unknown
    ));

    let restaurant = h.restaurant_at(COLOMBO);
    let mut order = h.accepted_order(&restaurant, COLOMBO);
    order.restaurant_id = object_id();
    h.mem.orders.insert(order.clone());
    h.driver_at(COLOMBO, 0);

    assert!(matches!(
        h.state.engine.assign(&order.id).await,
        Err(AppError::RestaurantNotFound(_))
    ));
    assert_eq!(h.state.registry().list_available().len(), 1);
}

#[tokio::test]
async fn order_not_yet_accepted_is_rejected() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.order_with_status(&restaurant, COLOMBO, OrderStatus::Pending);
    h.driver_at(COLOMBO, 0);

    let result = h.state.engine.assign(&order.id).await;

    assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    assert_eq!(h.state.registry().list_available().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatch_never_double_books() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let drivers: Vec<_> = (0..5)
        .map(|i| h.driver_at(north_of(COLOMBO, 0.2 * i as f64), 0))
        .collect();
    let orders: Vec<_> = (0..20)
        .map(|_| h.accepted_order(&restaurant, north_of(COLOMBO, 2.0)))
        .collect();

    let handles: Vec<_> = orders
        .iter()
        .map(|order| {
            let state = h.state.clone();
            let order_id = order.id.clone();
            tokio::spawn(async move { state.engine.assign(&order_id).await })
        })
        .collect();

    let mut assigned_drivers = HashSet::new();
    let mut no_driver = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(assignment) => assert!(assigned_drivers.insert(assignment.driver_id)),
            Err(AppError::NoDriverAvailable(_)) => no_driver += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(assigned_drivers.len(), drivers.len());
    assert_eq!(no_driver, orders.len() - drivers.len());

    let mut active_orders = HashSet::new();
    for driver in &drivers {
        let driver = h.driver(driver.id);
        assert_eq!(driver.availability, Availability::Busy);
        let order_id = driver.active_order_id.clone().unwrap();
        assert_eq!(h.order(&order_id).driver_id, Some(RecordId::from(driver.id)));
        assert!(active_orders.insert(order_id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_order_dispatched_concurrently_gets_one_driver() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 2.0));
    for i in 0..4 {
        h.driver_at(north_of(COLOMBO, 0.5 * i as f64), 0);
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let state = h.state.clone();
            let order_id = order.id.clone();
            tokio::spawn(async move { state.engine.assign(&order_id).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::Conflict(_)) | Err(AppError::InvalidTransition { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(h.state.registry().count_by_availability(Availability::Busy), 1);
}

#[tokio::test]
async fn failed_order_write_reverts_driver() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 2.0));
    let driver = h.driver_at(north_of(COLOMBO, 1.0), 2);
    h.mem.orders.fail_writes(true);

    let result = h.state.engine.assign(&order.id).await;

    assert!(matches!(result, Err(AppError::TransitionFailed(_))));
    let driver = h.driver(driver.id);
    assert_eq!(driver.availability, Availability::Available);
    assert_eq!(driver.deliveries_count, 2);
    assert!(driver.active_order_id.is_none());
    assert_eq!(h.order(&order.id).status, OrderStatus::Accepted);
}

#[tokio::test]
async fn slow_order_store_times_out_without_reserving() {
    let h = harness_with(DispatchSettings {
        collaborator_timeout: Duration::from_millis(50),
        ..DispatchSettings::default()
    });
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 2.0));
    let driver = h.driver_at(COLOMBO, 0);
    h.mem.orders.delay_reads(Duration::from_millis(300));

    let result = h.state.engine.assign(&order.id).await;

    assert!(matches!(result, Err(AppError::DispatchTimedOut(_))));
    assert_eq!(h.driver(driver.id).availability, Availability::Available);
    assert_eq!(h.order(&order.id).status, OrderStatus::Accepted);
}

#[tokio::test]
async fn assignment_notifies_customer_driver_and_owner() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 2.0));
    h.driver_at(COLOMBO, 0);

    h.state.engine.assign(&order.id).await.unwrap();

    let notifications = h.mem.notifications.clone();
    assert!(
        eventually(|| {
            notifications.sent_of_kind("driver_assigned").len() == 4
                && notifications.sent_of_kind("delivery_assigned").len() == 2
        })
        .await
    );
    let emails: HashSet<String> = notifications
        .sent()
        .into_iter()
        .filter(|n| n.channel == Channel::Email)
        .map(|n| n.to)
        .collect();
    assert_eq!(emails.len(), 3);
}

#[tokio::test]
async fn notification_outage_does_not_fail_assignment() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let order = h.accepted_order(&restaurant, north_of(COLOMBO, 2.0));
    let driver = h.driver_at(COLOMBO, 0);
    h.mem.notifications.fail_all(true);

    let assignment = h.state.engine.assign(&order.id).await.unwrap();

    assert_eq!(assignment.driver_id, driver.id);
    assert_eq!(h.order(&order.id).status, OrderStatus::DriverAssigned);
}

#[tokio::test]
async fn busy_driver_cannot_be_freed_for_a_second_order() {
    let h = harness();
    let restaurant = h.restaurant_at(COLOMBO);
    let first = h.accepted_order(&restaurant, north_of(COLOMBO, 2.0));
    let second = h.accepted_order(&restaurant, north_of(COLOMBO, 2.0));
    let driver = h.driver_at(COLOMBO, 0);
    h.state.engine.assign(&first.id).await.unwrap();

    let manual = h
        .state
        .registry()
        .set_availability(driver.id, Availability::Available);
    assert!(matches!(manual, Err(AppError::Conflict(_))));

    let result = h.state.engine.assign(&second.id).await;

    assert!(matches!(result, Err(AppError::NoDriverAvailable(_))));
    assert_eq!(h.order(&first.id).driver_id, Some(RecordId::from(driver.id)));
    assert!(h.order(&second.id).driver_id.is_none());
    assert_eq!(h.driver(driver.id).active_order_id, Some(first.id.clone()));
}
