//! Flat-earth distance approximation for short radii.
//!
//! # Responsibility
//! - Convert a meter radius into a degree-space search window.
//! - Decide inclusion with a squared planar distance test.
//!
//! # Invariants
//! - One degree of latitude is treated as `METERS_PER_DEGREE` everywhere.
//! - One degree of longitude is `METERS_PER_DEGREE * cos(latitude)` at the center.
//! - Inclusion compares squared meters; no square root on this path.
//! - A point exactly at the radius is inside.
//!
//! Accuracy degrades beyond a few kilometers and near the poles, where the
//! longitude span grows without bound. Antimeridian crossings are not folded.

use crate::model::memo::GeoPoint;

/// Meters spanned by one degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Precomputed projection around one search center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarWindow {
    pub center: GeoPoint,
    pub radius_meters: f64,
    /// Cosine of the center latitude.
    pub lat_cos: f64,
    /// Latitude half-span of the bounding box in degrees.
    pub deg_per_lat: f64,
    /// Longitude half-span of the bounding box in degrees.
    pub deg_per_lon: f64,
}

impl PlanarWindow {
    pub fn new(center: GeoPoint, radius_meters: f64) -> Self {
        let lat_cos = center.latitude.to_radians().cos();
        Self {
            center,
            radius_meters,
            lat_cos,
            deg_per_lat: radius_meters / METERS_PER_DEGREE,
            deg_per_lon: radius_meters / (METERS_PER_DEGREE * lat_cos),
        }
    }

    pub fn min_latitude(&self) -> f64 {
        self.center.latitude - self.deg_per_lat
    }

    pub fn max_latitude(&self) -> f64 {
        self.center.latitude + self.deg_per_lat
    }

    pub fn min_longitude(&self) -> f64 {
        self.center.longitude - self.deg_per_lon
    }

    pub fn max_longitude(&self) -> f64 {
        self.center.longitude + self.deg_per_lon
    }

    /// Fast reject. May admit corners slightly outside the true radius.
    pub fn in_bounding_box(&self, point: GeoPoint) -> bool {
        (self.min_latitude()..=self.max_latitude()).contains(&point.latitude)
            && (self.min_longitude()..=self.max_longitude()).contains(&point.longitude)
    }

    /// Squared planar distance from the center in square meters.
    pub fn distance_squared(&self, point: GeoPoint) -> f64 {
        let dy = (point.latitude - self.center.latitude) * METERS_PER_DEGREE;
        let dx = (point.longitude - self.center.longitude) * METERS_PER_DEGREE * self.lat_cos;
        dx * dx + dy * dy
    }

    /// Final inclusion test, inclusive at the boundary.
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.distance_squared(point) <= self.radius_meters * self.radius_meters
    }
}

/// Planar distance in meters between two points.
///
/// Takes a square root, so keep it off the per-memo inclusion path.
pub fn planar_distance_meters(from: GeoPoint, to: GeoPoint) -> f64 {
    PlanarWindow::new(from, 0.0).distance_squared(to).sqrt()
}
