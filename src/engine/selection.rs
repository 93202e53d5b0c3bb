use std::cmp::Ordering;

use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::driver::{Driver, GeoPoint};

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub driver_id: Uuid,
    pub distance_km: f64,
    pub deliveries_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub candidates: Vec<Candidate>,
    /// Nobody was inside the radius so the whole pool was ranked instead.
    pub fallback: bool,
}

/// Orders dispatchable drivers by distance to `origin`, nearest first, fewer
/// lifetime deliveries breaking ties. Drivers inside `radius_km` are preferred;
/// if there are none every available driver is ranked.
pub fn rank_candidates(drivers: &[Driver], origin: &GeoPoint, radius_km: f64) -> Ranking {
    let scored: Vec<Candidate> = drivers
        .iter()
        .filter(|driver| driver.is_dispatchable())
        .map(|driver| Candidate {
            driver_id: driver.id,
            distance_km: haversine_km(&driver.current_location, origin),
            deliveries_count: driver.deliveries_count,
        })
        .collect();

    let (mut candidates, fallback) = {
        let within: Vec<Candidate> = scored
            .iter()
            .filter(|candidate| candidate.distance_km <= radius_km)
            .cloned()
            .collect();

        if within.is_empty() {
            (scored, true)
        } else {
            (within, false)
        }
    };

    candidates.sort_by(compare_candidates);

    Ranking {
        fallback: fallback && !candidates.is_empty(),
        candidates,
    }
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| a.deliveries_count.cmp(&b.deliveries_count))
}
