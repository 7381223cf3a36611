//! Best-effort planar geometry backend.
//!
//! Treats polygons as flat [lng, lat] rings and runs an even-odd
//! crossing test, plus an equirectangular centroid-distance estimate.
//! Good enough for dashboard-scale fences; a real deployment would
//! delegate to a geospatial engine instead.

use anyhow::Context;
use fleetfraud_core::{
    error::DetectResult,
    geofence_detector::{GeoPoint, GeofenceCheck, GeometryPredicate},
    store::Geofence,
};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub struct PlanarGeometry;

fn parse_polygon(raw: &str) -> anyhow::Result<Vec<(f64, f64)>> {
    let vertices: Vec<[f64; 2]> =
        serde_json::from_str(raw).context("polygon is not a JSON array of [lng, lat]")?;
    anyhow::ensure!(vertices.len() >= 3, "polygon needs at least 3 vertices");
    Ok(vertices.into_iter().map(|v| (v[0], v[1])).collect())
}

/// Even-odd ray casting on the lng/lat plane.
fn contains(polygon: &[(f64, f64)], lng: f64, lat: f64) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        let crosses = (yi > lat) != (yj > lat)
            && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Meters from the point to the polygon centroid, equirectangular.
fn centroid_distance_m(polygon: &[(f64, f64)], lng: f64, lat: f64) -> f64 {
    let n = polygon.len() as f64;
    let (cx, cy) = polygon
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let (cx, cy) = (cx / n, cy / n);
    let mean_lat = ((lat + cy) / 2.0).to_radians();
    let dx = (cx - lng).to_radians() * mean_lat.cos();
    let dy = (cy - lat).to_radians();
    (dx * dx + dy * dy).sqrt() * EARTH_RADIUS_M
}

impl GeometryPredicate for PlanarGeometry {
    fn check(&self, point: GeoPoint, fence: &Geofence) -> DetectResult<GeofenceCheck> {
        let polygon = parse_polygon(&fence.polygon)?;
        let inside = contains(&polygon, point.longitude, point.latitude);
        let is_violation = match fence.fence_type.as_str() {
            "exclusion" => inside,
            // Inclusion fences flag positions outside.
            _ => !inside,
        };
        let distance = centroid_distance_m(&polygon, point.longitude, point.latitude);
        Ok(GeofenceCheck {
            is_violation,
            distance_meters: Some(distance),
        })
    }
}
