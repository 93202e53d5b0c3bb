use crate::models::driver::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn within_km(a: &GeoPoint, b: &GeoPoint, radius_km: f64) -> bool {
    haversine_km(a, b) <= radius_km
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, within_km};
    use crate::models::driver::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        for p in [
            GeoPoint::new(6.9271, 79.8612),
            GeoPoint::new(-33.8688, 151.2093),
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(89.9, -179.9),
        ] {
            assert!(haversine_km(&p, &p) < 1e-9);
        }
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let distance = haversine_km(&a, &b);
        assert!((distance - 111.19).abs() / 111.19 < 0.005);
    }

    #[test]
    fn distance_is_symmetric() {
        let colombo = GeoPoint::new(6.9271, 79.8612);
        let kandy = GeoPoint::new(7.2906, 80.6337);
        let there = haversine_km(&colombo, &kandy);
        let back = haversine_km(&kandy, &colombo);
        assert!((there - back).abs() < 1e-9);
        assert!((there - 94.0).abs() < 5.0);
    }

    #[test]
    fn radius_check_is_inclusive_of_nearby_points() {
        let centre = GeoPoint::new(6.9271, 79.8612);
        let nearby = GeoPoint::new(6.9290, 79.8612);
        assert!(within_km(&centre, &nearby, 0.5));
        assert!(!within_km(&centre, &GeoPoint::new(7.0, 79.8612), 0.5));
    }
}
