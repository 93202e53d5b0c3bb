use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;
use crate::models::id::RecordId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub order_id: RecordId,
    pub driver_id: Uuid,
    pub driver_location: GeoPoint,
    pub distance_km: f64,
    /// True when nobody was inside the dispatch radius and the nearest
    /// driver overall was taken.
    pub fallback: bool,
    pub assigned_at: DateTime<Utc>,
}
