//! Geospatial query engine.
//!
//! Distances are geodesic (WGS84 ellipsoid, Karney's algorithm via the `geo`
//! crate), never planar. Radius searches return matches ascending by
//! distance; equal distances are ordered by entity ID so results are stable
//! across calls and backends.

use std::cmp::Ordering;

use geo::{Distance, Geodesic, Point};
use serde::Serialize;

use fleetwatch_types::{Alert, AlertId, GeoPoint, Vehicle, VehicleId};

use crate::error::CoreError;

/// Geodesic distance between two points in meters.
pub fn geodesic_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    Geodesic::distance(
        Point::new(a.longitude, a.latitude),
        Point::new(b.longitude, b.latitude),
    )
}

/// Reject a negative or non-finite search radius.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for a radius that is negative, NaN or
/// infinite.
pub fn validate_radius(radius_m: f64) -> Result<f64, CoreError> {
    if radius_m.is_finite() && radius_m >= 0.0 {
        Ok(radius_m)
    } else {
        Err(CoreError::Validation(format!(
            "radius must be a finite, non-negative number of meters (got {radius_m})"
        )))
    }
}

/// Reject a point outside the geodetic range.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] when the point is not valid.
pub fn validate_point(point: GeoPoint) -> Result<GeoPoint, CoreError> {
    if point.is_valid() {
        Ok(point)
    } else {
        Err(CoreError::Validation(format!(
            "coordinates out of range: latitude {}, longitude {}",
            point.latitude, point.longitude
        )))
    }
}

/// An entity paired with its distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    /// The matched entity.
    #[serde(flatten)]
    pub item: T,
    /// Geodesic distance from the query point in meters.
    pub distance_m: f64,
}

/// Something with an optional position and a stable tiebreak key.
pub trait Located {
    /// Tiebreak key for equal distances.
    type Key: Ord;

    /// Current position, if known.
    fn position(&self) -> Option<GeoPoint>;

    /// Stable secondary ordering key.
    fn key(&self) -> Self::Key;
}

impl Located for Vehicle {
    type Key = VehicleId;

    fn position(&self) -> Option<GeoPoint> {
        self.position
    }

    fn key(&self) -> VehicleId {
        self.id
    }
}

impl Located for Alert {
    type Key = AlertId;

    fn position(&self) -> Option<GeoPoint> {
        Some(self.position)
    }

    fn key(&self) -> AlertId {
        self.id
    }
}

/// Order ranked matches ascending by distance, then by key.
pub fn sort_ranked<T: Located>(ranked: &mut [Ranked<T>]) {
    ranked.sort_by(|a, b| compare_ranked(a, b));
}

fn compare_ranked<T: Located>(a: &Ranked<T>, b: &Ranked<T>) -> Ordering {
    a.distance_m
        .total_cmp(&b.distance_m)
        .then_with(|| a.item.key().cmp(&b.item.key()))
}

/// Entities whose position lies within `radius_m` of `center`.
///
/// Entities without a position never match. The result is sorted with
/// [`sort_ranked`].
pub fn within_radius<T, I>(items: I, center: GeoPoint, radius_m: f64) -> Vec<Ranked<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    let mut ranked: Vec<Ranked<T>> = items
        .into_iter()
        .filter_map(|item| {
            let distance_m = geodesic_distance_m(center, item.position()?);
            (distance_m <= radius_m).then_some(Ranked { item, distance_m })
        })
        .collect();
    sort_ranked(&mut ranked);
    ranked
}

/// Alerts whose own radius covers `point`.
pub fn covering<I>(alerts: I, point: GeoPoint) -> Vec<Ranked<Alert>>
where
    I: IntoIterator<Item = Alert>,
{
    let mut ranked: Vec<Ranked<Alert>> = alerts
        .into_iter()
        .filter_map(|alert| {
            let distance_m = geodesic_distance_m(point, alert.position);
            (distance_m <= alert.radius_m).then_some(Ranked {
                item: alert,
                distance_m,
            })
        })
        .collect();
    sort_ranked(&mut ranked);
    ranked
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fleetwatch_types::VehicleStatus;

    use super::*;

    fn vehicle_at(position: Option<GeoPoint>) -> Vehicle {
        Vehicle {
            id: VehicleId::new(),
            registration_number: String::from("KA-01-XY-0001"),
            make: None,
            model: None,
            year: None,
            color: None,
            driver_id: None,
            status: VehicleStatus::Active,
            position,
            speed_kmh: 0.0,
            heading: 0.0,
            last_location_time: None,
        }
    }

    #[test]
    fn one_degree_of_latitude_at_the_equator() {
        let d = geodesic_distance_m(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        // WGS84 meridian arc for the first degree is ~110.574 km.
        assert!((d - 110_574.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn geodesic_differs_from_a_sphere() {
        // A spherical model with R = 6371 km gives ~111.195 km here.
        let d = geodesic_distance_m(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() > 500.0);
    }

    #[test]
    fn radius_validation() {
        assert!(validate_radius(0.0).is_ok());
        assert!(validate_radius(-1.0).is_err());
        assert!(validate_radius(f64::NAN).is_err());
        assert!(validate_radius(f64::INFINITY).is_err());
    }

    #[test]
    fn within_radius_filters_and_orders() {
        let center = GeoPoint::new(12.9716, 77.5946);
        let near = vehicle_at(Some(GeoPoint::new(12.9720, 77.5946)));
        let mid = vehicle_at(Some(GeoPoint::new(12.9760, 77.5946)));
        let far = vehicle_at(Some(GeoPoint::new(13.0500, 77.5946)));
        let nowhere = vehicle_at(None);
        let (near_id, mid_id) = (near.id, mid.id);

        let ranked = within_radius(vec![far, mid, nowhere, near], center, 1000.0);
        let ids: Vec<VehicleId> = ranked.iter().map(|r| r.item.id).collect();
        assert_eq!(ids, vec![near_id, mid_id]);
        assert!(ranked.iter().all(|r| r.distance_m <= 1000.0));
    }

    #[test]
    fn equal_distances_break_ties_by_id() {
        let point = GeoPoint::new(12.90, 77.60);
        let a = vehicle_at(Some(point));
        let b = vehicle_at(Some(point));
        let mut expected = vec![a.id, b.id];
        expected.sort();

        let ranked = within_radius(vec![b, a], point, 10.0);
        let ids: Vec<VehicleId> = ranked.iter().map(|r| r.item.id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn nothing_matches_returns_empty() {
        let ranked = within_radius(
            vec![vehicle_at(Some(GeoPoint::new(40.0, -74.0)))],
            GeoPoint::new(12.9, 77.6),
            5000.0,
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn ranked_serializes_flat() {
        let ranked = Ranked {
            item: vehicle_at(None),
            distance_m: 12.5,
        };
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["distance_m"], 12.5);
        assert!(json.get("registration_number").is_some());
    }
}
