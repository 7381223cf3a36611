//! Odometer tampering detection.
//!
//! Three independent checks over completed trips per vehicle, ordered by
//! end time: rollback between consecutive trips (high), an inter-trip
//! odometer jump no road speed could produce (medium), and a within-trip
//! mismatch between odometer delta and recorded distance (medium).

use crate::{
    config::OdometerConfig,
    detector::{DetectionContext, Detector},
    error::DetectResult,
    indicator::Indicator,
    store::Trip,
    types::Severity,
};
use chrono::Duration;

pub struct OdometerDetector {
    cfg: OdometerConfig,
}

impl OdometerDetector {
    pub fn new(cfg: OdometerConfig) -> Self {
        Self { cfg }
    }

    fn check_pair(&self, prev: &Trip, next: &Trip) -> Vec<Indicator> {
        let mut indicators = Vec::new();

        // 1. Rollback: the next trip starts below where the last ended.
        if next.start_odometer < prev.end_odometer {
            let difference = prev.end_odometer - next.start_odometer;
            log::warn!(
                "vehicle={} odometer rollback of {difference:.1} km between trips {} and {}",
                next.vehicle_id,
                prev.trip_id,
                next.trip_id
            );
            indicators.push(Indicator {
                kind: "odometer_rollback".into(),
                severity: Severity::High,
                vehicle_id: Some(next.vehicle_id.clone()),
                driver_id: Some(next.driver_id.clone()),
                trip_id: Some(next.trip_id.clone()),
                fuel_transaction_id: None,
                title: "Odometer rollback".into(),
                reason: format!(
                    "Trip started at {:.0} km, below the previous trip's end of {:.0} km",
                    next.start_odometer, prev.end_odometer
                ),
                details: serde_json::json!({
                    "previous_trip_id": prev.trip_id,
                    "previous_end_odometer": prev.end_odometer,
                    "start_odometer": next.start_odometer,
                    "difference": difference,
                }),
                evidence_time: next.start_time,
            });
        }

        // 2. Impossible increase: more kilometers between trips than the
        // elapsed time allows at max road speed.
        if let Some(prev_end) = prev.end_time {
            let time_diff_hours =
                (next.start_time - prev_end).num_seconds() as f64 / 3600.0;
            let max_possible = time_diff_hours * self.cfg.max_speed_kmh;
            let actual_increase = next.start_odometer - prev.end_odometer;
            if max_possible > 0.0 && actual_increase > max_possible {
                indicators.push(Indicator {
                    kind: "impossible_odometer_increase".into(),
                    severity: Severity::Medium,
                    vehicle_id: Some(next.vehicle_id.clone()),
                    driver_id: Some(next.driver_id.clone()),
                    trip_id: Some(next.trip_id.clone()),
                    fuel_transaction_id: None,
                    title: "Impossible odometer increase".into(),
                    reason: format!(
                        "Odometer rose {actual_increase:.0} km in {time_diff_hours:.1} h \
                         (max plausible {max_possible:.0} km)"
                    ),
                    details: serde_json::json!({
                        "previous_trip_id": prev.trip_id,
                        "actual_increase_km": actual_increase,
                        "max_possible_km": max_possible,
                        "time_diff_hours": time_diff_hours,
                    }),
                    evidence_time: next.start_time,
                });
            }
        }

        indicators
    }

    /// Within-trip check: the odometer delta should match the recorded
    /// trip distance. Short trips are skipped — odometer granularity
    /// drowns the signal.
    fn check_trip_distance(&self, trip: &Trip) -> Option<Indicator> {
        if trip.distance_traveled <= self.cfg.min_trip_distance_km {
            return None;
        }
        let odometer_increase = trip.end_odometer - trip.start_odometer;
        let mismatch = (odometer_increase - trip.distance_traveled).abs();
        if mismatch <= self.cfg.mismatch_ratio * trip.distance_traveled {
            return None;
        }
        Some(Indicator {
            kind: "odometer_distance_mismatch".into(),
            severity: Severity::Medium,
            vehicle_id: Some(trip.vehicle_id.clone()),
            driver_id: Some(trip.driver_id.clone()),
            trip_id: Some(trip.trip_id.clone()),
            fuel_transaction_id: None,
            title: "Odometer / distance mismatch".into(),
            reason: format!(
                "Odometer moved {odometer_increase:.1} km on a {:.1} km trip",
                trip.distance_traveled
            ),
            details: serde_json::json!({
                "odometer_increase_km": odometer_increase,
                "distance_traveled_km": trip.distance_traveled,
                "mismatch_km": mismatch,
            }),
            evidence_time: trip.end_time.unwrap_or(trip.start_time),
        })
    }
}

impl Detector for OdometerDetector {
    fn name(&self) -> &'static str {
        "odometer_tampering"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectResult<Vec<Indicator>> {
        let since = ctx.now - Duration::days(self.cfg.lookback_days);
        // Ordered by vehicle then end time, so consecutive rows of one
        // vehicle are consecutive trips.
        let trips = ctx.store.get_completed_trips_since(ctx.company_id, since)?;

        let mut indicators = Vec::new();
        for pair in trips.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.vehicle_id != next.vehicle_id {
                continue;
            }
            indicators.extend(self.check_pair(prev, next));
        }
        for trip in &trips {
            indicators.extend(self.check_trip_distance(trip));
        }
        Ok(indicators)
    }
}
