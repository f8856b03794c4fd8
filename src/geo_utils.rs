//! Geographic utilities: great-circle distance and fence membership.
//!
//! Distances use a spherical earth. For fences up to city scale the error
//! against an ellipsoid is well below GPS noise.

use crate::{Fence, GpsPoint};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two points.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let phi1 = p1.latitude.to_radians();
    let phi2 = p2.latitude.to_radians();
    let d_phi = (p2.latitude - p1.latitude).to_radians();
    let d_lambda = (p2.longitude - p1.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Whether `point` lies inside the fence. A point exactly on the boundary is inside.
pub fn is_inside(fence: &Fence, point: &GpsPoint) -> bool {
    haversine_distance(&fence.center, point) <= fence.radius_m
}
