//! Geofence violation detection.
//!
//! Core does not implement point-in-polygon math. The containment test is
//! an injected GeometryPredicate; without one the detector degrades to
//! zero detections. Inclusion fences flag positions outside, exclusion
//! fences flag positions inside.

use crate::{
    config::GeofenceConfig,
    detector::{DetectionContext, Detector},
    error::DetectResult,
    indicator::Indicator,
    store::{Geofence, GpsPosition},
    types::Severity,
};
use chrono::Duration;
use std::sync::Arc;

/// A lat/lng point handed to the geometry backend.
#[derive(Debug, Clone, Copy)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Result of one containment test.
#[derive(Debug, Clone, Copy)]
pub struct GeofenceCheck {
    pub is_violation: bool,
    /// Approximate distance from the fence boundary in meters, when the
    /// backend can produce one.
    pub distance_meters: Option<f64>,
}

/// External geometry capability. Implementations interpret the fence's
/// polygon JSON and its inclusion/exclusion mode.
pub trait GeometryPredicate: Send + Sync {
    fn check(&self, point: GeoPoint, fence: &Geofence) -> DetectResult<GeofenceCheck>;
}

/// Stand-in used when no geometry backend is wired: never reports a
/// violation, so geofence detection degrades to empty.
pub struct NoopGeometry;

impl GeometryPredicate for NoopGeometry {
    fn check(&self, _point: GeoPoint, _fence: &Geofence) -> DetectResult<GeofenceCheck> {
        Ok(GeofenceCheck {
            is_violation: false,
            distance_meters: None,
        })
    }
}

pub struct GeofenceDetector {
    cfg: GeofenceConfig,
    geometry: Arc<dyn GeometryPredicate>,
}

impl GeofenceDetector {
    pub fn new(cfg: GeofenceConfig, geometry: Arc<dyn GeometryPredicate>) -> Self {
        Self { cfg, geometry }
    }
}

fn severity_for(fence: &Geofence) -> Severity {
    if fence.fence_type == "exclusion" {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn violation_indicator(position: &GpsPosition, fence: &Geofence, check: GeofenceCheck) -> Indicator {
    let direction = if fence.fence_type == "exclusion" {
        "inside restricted"
    } else {
        "outside permitted"
    };
    Indicator {
        kind: "geofence_violation".into(),
        severity: severity_for(fence),
        vehicle_id: Some(position.vehicle_id.clone()),
        driver_id: None,
        trip_id: position.trip_id.clone(),
        fuel_transaction_id: None,
        title: "Geofence violation".into(),
        reason: format!("Vehicle recorded {direction} zone '{}'", fence.name),
        details: serde_json::json!({
            "geofence_id": fence.geofence_id,
            "fence_type": fence.fence_type,
            "latitude": position.latitude,
            "longitude": position.longitude,
            "distance_meters": check.distance_meters,
        }),
        evidence_time: position.timestamp,
    }
}

impl Detector for GeofenceDetector {
    fn name(&self) -> &'static str {
        "geofence_violation"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectResult<Vec<Indicator>> {
        let fences = ctx.store.get_active_geofences(ctx.company_id)?;
        if fences.is_empty() {
            return Ok(Vec::new());
        }

        let since = ctx.now - Duration::hours(self.cfg.lookback_hours);
        let positions = ctx.store.get_positions_since(ctx.company_id, since)?;

        let mut indicators = Vec::new();
        for fence in &fences {
            for position in &positions {
                let point = GeoPoint {
                    latitude: position.latitude,
                    longitude: position.longitude,
                };
                let check = match self.geometry.check(point, fence) {
                    Ok(c) => c,
                    Err(e) => {
                        // Best-effort capability: a geometry failure skips
                        // the pair, it does not abort the scan.
                        log::warn!(
                            "geometry check failed for fence {}: {e}",
                            fence.geofence_id
                        );
                        continue;
                    }
                };
                if check.is_violation {
                    indicators.push(violation_indicator(position, fence, check));
                }
            }
        }
        Ok(indicators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence(kind: &str) -> Geofence {
        Geofence {
            geofence_id: "gf-1".into(),
            company_id: "c1".into(),
            name: "depot".into(),
            fence_type: kind.into(),
            polygon: "[]".into(),
            is_active: true,
        }
    }

    #[test]
    fn exclusion_outranks_inclusion() {
        assert_eq!(severity_for(&fence("exclusion")), Severity::High);
        assert_eq!(severity_for(&fence("inclusion")), Severity::Medium);
    }
}
