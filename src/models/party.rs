use serde::{Deserialize, Serialize};

use crate::models::driver::GeoPoint;
use crate::models::id::RecordId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    #[serde(alias = "_id")]
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub location: GeoPoint,
    #[serde(alias = "ownerId")]
    pub owner_id: RecordId,
}

/// Contact details of a customer, owner or driver from the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(alias = "_id")]
    pub id: RecordId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Person, Restaurant};

    #[test]
    fn decodes_restaurant_and_user_documents() {
        let restaurant: Restaurant = serde_json::from_value(json!({
            "_id": "661f2a9c8b3e4a0012ab0002",
            "name": "Ministry of Crab",
            "address": "Old Dutch Hospital, Colombo",
            "contact": "0112342722",
            "owner_id": "661f2a9c8b3e4a0012ab0003",
            "isAvailable": true,
            "location": { "latitude": 6.9337, "longitude": 79.8430 }
        }))
        .unwrap();
        assert_eq!(restaurant.owner_id.as_str(), "661f2a9c8b3e4a0012ab0003");

        let person: Person = serde_json::from_value(json!({
            "_id": "661f2a9c8b3e4a0012ab0003",
            "username": "owner",
            "email": "owner@example.com",
            "role": "owner",
            "phoneNumber": "+94770000001"
        }))
        .unwrap();
        assert_eq!(person.id, restaurant.owner_id);
        assert_eq!(person.phone_number.as_deref(), Some("+94770000001"));
    }
}
