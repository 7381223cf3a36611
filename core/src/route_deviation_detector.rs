//! Route deviation detection.
//!
//! Compares a trip's actual distance against its planned route's
//! expected distance. Trips without a planned route are skipped.

use crate::{
    config::RouteDeviationConfig,
    detector::{DetectionContext, Detector},
    error::DetectResult,
    indicator::Indicator,
    types::Severity,
};
use chrono::Duration;

pub struct RouteDeviationDetector {
    cfg: RouteDeviationConfig,
}

impl RouteDeviationDetector {
    pub fn new(cfg: RouteDeviationConfig) -> Self {
        Self { cfg }
    }
}

/// Deviation ratio => severity, or None when within tolerance.
fn classify_deviation(deviation: f64, cfg: &RouteDeviationConfig) -> Option<Severity> {
    if deviation <= cfg.flag_ratio {
        None
    } else if deviation > cfg.high_ratio {
        Some(Severity::High)
    } else {
        Some(Severity::Medium)
    }
}

impl Detector for RouteDeviationDetector {
    fn name(&self) -> &'static str {
        "route_deviation"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectResult<Vec<Indicator>> {
        let since = ctx.now - Duration::days(self.cfg.lookback_days);
        let trips = ctx
            .store
            .get_trips_started_in_window(ctx.company_id, since, ctx.now)?;

        let mut indicators = Vec::new();
        for trip in trips {
            if trip.status != "in_progress" && trip.status != "completed" {
                continue;
            }
            let route_id = match &trip.route_id {
                Some(id) => id,
                None => continue,
            };
            let route = match ctx.store.get_route(ctx.company_id, route_id)? {
                Some(r) if r.expected_distance_km > 0.0 => r,
                _ => continue,
            };

            let expected = route.expected_distance_km;
            let deviation = (trip.distance_traveled - expected).abs() / expected;
            let severity = match classify_deviation(deviation, &self.cfg) {
                Some(s) => s,
                None => continue,
            };

            log::warn!(
                "company={} trip={} deviated {:.0}% from route {}",
                ctx.company_id,
                trip.trip_id,
                deviation * 100.0,
                route.route_id
            );

            indicators.push(Indicator {
                kind: "route_deviation".into(),
                severity,
                vehicle_id: Some(trip.vehicle_id.clone()),
                driver_id: Some(trip.driver_id.clone()),
                trip_id: Some(trip.trip_id.clone()),
                fuel_transaction_id: None,
                title: "Route deviation".into(),
                reason: format!(
                    "Trip covered {:.1} km against {:.1} km planned ({:.0}% off)",
                    trip.distance_traveled,
                    expected,
                    deviation * 100.0
                ),
                details: serde_json::json!({
                    "actual_distance_km": trip.distance_traveled,
                    "expected_distance_km": expected,
                    "deviation_ratio": deviation,
                    "route_id": route.route_id,
                }),
                evidence_time: trip.end_time.unwrap_or(trip.start_time),
            });
        }
        Ok(indicators)
    }
}
