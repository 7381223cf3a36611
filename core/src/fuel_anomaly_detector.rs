//! Fuel anomaly detection: overfilling and suspicious efficiency.
//!
//! Efficiency is judged two ways: against an absolute km/L band, and
//! against the mean efficiency of the vehicle's fuel type within the
//! window. The relative check catches tampering that still looks sane in
//! absolute terms; a fuel type with no trips falls back to a default
//! baseline. One indicator per trip at most — the relative
//! classification wins when both would fire.

use crate::{
    config::FuelAnomalyConfig,
    detector::{DetectionContext, Detector},
    error::DetectResult,
    indicator::Indicator,
    store::{Trip, Vehicle},
    types::Severity,
};
use chrono::Duration;
use std::collections::HashMap;

pub struct FuelAnomalyDetector {
    cfg: FuelAnomalyConfig,
}

impl FuelAnomalyDetector {
    pub fn new(cfg: FuelAnomalyConfig) -> Self {
        Self { cfg }
    }
}

/// Mean trip efficiency (km/L) grouped by vehicle fuel type.
fn efficiency_baselines(
    trips: &[Trip],
    vehicles: &HashMap<String, Vehicle>,
) -> HashMap<String, f64> {
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for trip in trips {
        if trip.fuel_consumed <= 0.0 {
            continue;
        }
        let fuel_type = match vehicles.get(&trip.vehicle_id) {
            Some(v) => v.fuel_type.clone(),
            None => continue,
        };
        let eff = trip.distance_traveled / trip.fuel_consumed;
        let entry = sums.entry(fuel_type).or_insert((0.0, 0));
        entry.0 += eff;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(k, (total, n))| (k, total / n as f64))
        .collect()
}

/// Classify a trip's efficiency. Returns the indicator kind and severity,
/// or None when the trip looks normal.
fn classify_efficiency(
    efficiency: f64,
    baseline: f64,
    cfg: &FuelAnomalyConfig,
) -> Option<(&'static str, Severity)> {
    if baseline > 0.0 {
        let ratio = efficiency / baseline;
        if ratio > cfg.high_efficiency_ratio {
            return Some(("unusually_high_efficiency", Severity::High));
        }
        if ratio < cfg.low_efficiency_ratio {
            return Some(("unusually_low_efficiency", Severity::Medium));
        }
    }
    if efficiency > cfg.max_efficiency_kmpl {
        return Some(("suspicious_efficiency", Severity::High));
    }
    if efficiency < cfg.min_efficiency_kmpl {
        return Some(("suspicious_efficiency", Severity::Medium));
    }
    None
}

impl Detector for FuelAnomalyDetector {
    fn name(&self) -> &'static str {
        "fuel_anomaly"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectResult<Vec<Indicator>> {
        let since = ctx.now - Duration::days(self.cfg.lookback_days);
        let vehicles: HashMap<String, Vehicle> = ctx
            .store
            .get_vehicles(ctx.company_id)?
            .into_iter()
            .map(|v| (v.vehicle_id.clone(), v))
            .collect();

        let mut indicators = Vec::new();

        // 1. Overfilling: transaction volume above tank capacity.
        let transactions = ctx
            .store
            .get_fuel_transactions_since(ctx.company_id, since)?;
        for txn in &transactions {
            let capacity = match vehicles.get(&txn.vehicle_id) {
                Some(v) if v.fuel_capacity > 0.0 => v.fuel_capacity,
                _ => continue,
            };
            let limit = capacity * self.cfg.overfill_capacity_ratio;
            if txn.fuel_amount <= limit {
                continue;
            }
            log::warn!(
                "company={} txn={} overfill: {:.1} L into a {:.0} L tank",
                ctx.company_id,
                txn.transaction_id,
                txn.fuel_amount,
                capacity
            );
            indicators.push(Indicator {
                kind: "overfilling".into(),
                severity: Severity::High,
                vehicle_id: Some(txn.vehicle_id.clone()),
                driver_id: Some(txn.driver_id.clone()),
                trip_id: txn.trip_id.clone(),
                fuel_transaction_id: Some(txn.transaction_id.clone()),
                title: "Fuel overfill".into(),
                reason: format!(
                    "Purchased {:.1} L against a capacity of {:.1} L",
                    txn.fuel_amount, capacity
                ),
                details: serde_json::json!({
                    "fuel_amount_l": txn.fuel_amount,
                    "fuel_capacity_l": capacity,
                    "capacity_ratio": self.cfg.overfill_capacity_ratio,
                }),
                evidence_time: txn.transaction_date,
            });
        }

        // 2. Suspicious efficiency per completed trip.
        let trips: Vec<Trip> = ctx
            .store
            .get_completed_trips_since(ctx.company_id, since)?;
        let baselines = efficiency_baselines(&trips, &vehicles);

        for trip in &trips {
            if trip.fuel_consumed <= 0.0 {
                continue;
            }
            let efficiency = trip.distance_traveled / trip.fuel_consumed;
            let baseline = vehicles
                .get(&trip.vehicle_id)
                .and_then(|v| baselines.get(&v.fuel_type).copied())
                .unwrap_or(self.cfg.default_baseline_kmpl);

            let (kind, severity) = match classify_efficiency(efficiency, baseline, &self.cfg) {
                Some(hit) => hit,
                None => continue,
            };

            indicators.push(Indicator {
                kind: kind.into(),
                severity,
                vehicle_id: Some(trip.vehicle_id.clone()),
                driver_id: Some(trip.driver_id.clone()),
                trip_id: Some(trip.trip_id.clone()),
                fuel_transaction_id: None,
                title: "Suspicious fuel efficiency".into(),
                reason: format!(
                    "Trip efficiency {:.1} km/L against a baseline of {:.1} km/L",
                    efficiency, baseline
                ),
                details: serde_json::json!({
                    "efficiency_kmpl": efficiency,
                    "baseline_kmpl": baseline,
                    "distance_km": trip.distance_traveled,
                    "fuel_consumed_l": trip.fuel_consumed,
                }),
                evidence_time: trip.end_time.unwrap_or(trip.start_time),
            });
        }

        Ok(indicators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_classification_is_symmetric() {
        let cfg = FuelAnomalyConfig::default();
        // 2x the baseline: too efficient, possible tampering.
        assert_eq!(
            classify_efficiency(16.2, 8.0, &cfg),
            Some(("unusually_high_efficiency", Severity::High))
        );
        // 0.4x the baseline: too inefficient.
        assert_eq!(
            classify_efficiency(3.2, 8.0, &cfg),
            Some(("unusually_low_efficiency", Severity::Medium))
        );
    }

    #[test]
    fn normal_efficiency_is_clean() {
        let cfg = FuelAnomalyConfig::default();
        assert_eq!(classify_efficiency(8.3, 8.0, &cfg), None);
    }

    #[test]
    fn absolute_band_applies_without_baseline() {
        let cfg = FuelAnomalyConfig::default();
        assert_eq!(
            classify_efficiency(16.0, 0.0, &cfg),
            Some(("suspicious_efficiency", Severity::High))
        );
        assert_eq!(
            classify_efficiency(2.0, 0.0, &cfg),
            Some(("suspicious_efficiency", Severity::Medium))
        );
        assert_eq!(classify_efficiency(8.0, 0.0, &cfg), None);
    }

    #[test]
    fn baselines_are_grouped_by_fuel_type() {
        use chrono::Utc;
        let vehicle = |id: &str, fuel: &str| Vehicle {
            vehicle_id: id.into(),
            company_id: "c1".into(),
            plate: String::new(),
            fuel_type: fuel.into(),
            fuel_capacity: 80.0,
            risk_score: 0.0,
            status: "active".into(),
        };
        let trip = |vehicle_id: &str, distance: f64, fuel: f64| Trip {
            trip_id: format!("t-{vehicle_id}-{distance}"),
            company_id: "c1".into(),
            vehicle_id: vehicle_id.into(),
            driver_id: "d1".into(),
            route_id: None,
            start_time: Utc::now(),
            end_time: Some(Utc::now()),
            start_odometer: 0.0,
            end_odometer: distance,
            distance_traveled: distance,
            fuel_consumed: fuel,
            status: "completed".into(),
        };

        let vehicles: HashMap<String, Vehicle> = [
            ("v1".to_string(), vehicle("v1", "diesel")),
            ("v2".to_string(), vehicle("v2", "petrol")),
        ]
        .into();
        let trips = vec![trip("v1", 80.0, 10.0), trip("v1", 120.0, 10.0), trip("v2", 60.0, 10.0)];

        let baselines = efficiency_baselines(&trips, &vehicles);
        assert_eq!(baselines["diesel"], 10.0); // mean of 8 and 12
        assert_eq!(baselines["petrol"], 6.0);
    }
}
