//! Fuel card misuse detection.
//!
//! Driver-grouped checks (short window): excessive daily transactions,
//! location diversity, odd-hour timing. Vehicle-grouped checks (long
//! window): too many distinct drivers, rapid consecutive fills, combined
//! fills over tank capacity. Plus a per-transaction check for fueling
//! with no trip anywhere near it.
//!
//! Grouping uses BTreeMap so indicator order is stable across runs.

use crate::{
    config::FuelCardConfig,
    detector::{DetectionContext, Detector},
    error::DetectResult,
    indicator::Indicator,
    store::{FuelTransaction, Vehicle},
    types::Severity,
};
use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub struct FuelCardDetector {
    cfg: FuelCardConfig,
}

impl FuelCardDetector {
    pub fn new(cfg: FuelCardConfig) -> Self {
        Self { cfg }
    }

    // ── Driver-grouped checks ──────────────────────────────────────

    fn check_daily_volume(&self, driver_id: &str, txns: &[&FuelTransaction]) -> Vec<Indicator> {
        let mut by_day: BTreeMap<String, Vec<&FuelTransaction>> = BTreeMap::new();
        for txn in txns {
            by_day
                .entry(txn.transaction_date.format("%Y-%m-%d").to_string())
                .or_default()
                .push(txn);
        }

        let mut indicators = Vec::new();
        for (day, day_txns) in by_day {
            if day_txns.len() <= self.cfg.max_daily_transactions {
                continue;
            }
            log::warn!(
                "driver={driver_id} made {} fuel transactions on {day}",
                day_txns.len()
            );
            indicators.push(Indicator {
                kind: "excessive_daily_transactions".into(),
                severity: Severity::High,
                vehicle_id: None,
                driver_id: Some(driver_id.to_string()),
                trip_id: None,
                fuel_transaction_id: None,
                title: "Excessive daily fuel transactions".into(),
                reason: format!("{} transactions on {day}", day_txns.len()),
                details: serde_json::json!({
                    "date": day,
                    "transaction_count": day_txns.len(),
                    "max_daily_transactions": self.cfg.max_daily_transactions,
                }),
                evidence_time: day_txns[0].transaction_date,
            });
        }
        indicators
    }

    fn check_location_diversity(
        &self,
        driver_id: &str,
        txns: &[&FuelTransaction],
    ) -> Option<Indicator> {
        let locations: BTreeSet<&str> = txns
            .iter()
            .filter_map(|t| t.location.as_deref())
            .collect();
        if locations.len() <= self.cfg.max_distinct_locations {
            return None;
        }
        Some(Indicator {
            kind: "location_diversity".into(),
            severity: Severity::Medium,
            vehicle_id: None,
            driver_id: Some(driver_id.to_string()),
            trip_id: None,
            fuel_transaction_id: None,
            title: "Unusual fueling location spread".into(),
            reason: format!("{} distinct fueling locations", locations.len()),
            details: serde_json::json!({
                "distinct_locations": locations.len(),
                "max_distinct_locations": self.cfg.max_distinct_locations,
            }),
            evidence_time: txns.last().map(|t| t.transaction_date).unwrap_or_default(),
        })
    }

    fn check_timing(&self, driver_id: &str, txns: &[&FuelTransaction]) -> Option<Indicator> {
        if txns.is_empty() {
            return None;
        }
        let odd: Vec<&&FuelTransaction> = txns
            .iter()
            .filter(|t| {
                let hour = t.transaction_date.hour();
                hour < self.cfg.early_hour || hour > self.cfg.late_hour
            })
            .collect();
        let share = odd.len() as f64 / txns.len() as f64;
        if odd.is_empty() || share <= self.cfg.odd_hour_share {
            return None;
        }
        Some(Indicator {
            kind: "unusual_transaction_timing".into(),
            severity: Severity::Medium,
            vehicle_id: None,
            driver_id: Some(driver_id.to_string()),
            trip_id: None,
            fuel_transaction_id: None,
            title: "Unusual fueling hours".into(),
            reason: format!(
                "{:.0}% of transactions before {:02}:00",
                share * 100.0,
                self.cfg.early_hour
            ),
            details: serde_json::json!({
                "odd_hour_count": odd.len(),
                "total_count": txns.len(),
                "odd_hour_share": share,
            }),
            evidence_time: odd[0].transaction_date,
        })
    }

    // ── Vehicle-grouped checks ─────────────────────────────────────

    fn check_driver_spread(&self, vehicle_id: &str, txns: &[&FuelTransaction]) -> Option<Indicator> {
        let drivers: BTreeSet<&str> = txns.iter().map(|t| t.driver_id.as_str()).collect();
        if drivers.len() <= self.cfg.max_drivers_per_vehicle {
            return None;
        }
        Some(Indicator {
            kind: "multiple_drivers_single_vehicle".into(),
            severity: Severity::Medium,
            vehicle_id: Some(vehicle_id.to_string()),
            driver_id: None,
            trip_id: None,
            fuel_transaction_id: None,
            title: "Many drivers fueling one vehicle".into(),
            reason: format!("{} distinct drivers fueled this vehicle", drivers.len()),
            details: serde_json::json!({
                "distinct_drivers": drivers.len(),
                "max_drivers_per_vehicle": self.cfg.max_drivers_per_vehicle,
            }),
            evidence_time: txns.last().map(|t| t.transaction_date).unwrap_or_default(),
        })
    }

    fn check_rapid_fills(
        &self,
        vehicle_id: &str,
        capacity: Option<f64>,
        txns: &[&FuelTransaction],
    ) -> Vec<Indicator> {
        let mut indicators = Vec::new();
        for pair in txns.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let gap_minutes =
                (b.transaction_date - a.transaction_date).num_seconds() as f64 / 60.0;

            // Rapid back-to-back fills. A zero gap is a duplicate entry,
            // not a refill, and is left to reconciliation.
            if gap_minutes > 0.0 && gap_minutes < self.cfg.rapid_minutes as f64 {
                indicators.push(Indicator {
                    kind: "rapid_consecutive_transactions".into(),
                    severity: Severity::High,
                    vehicle_id: Some(vehicle_id.to_string()),
                    driver_id: Some(b.driver_id.clone()),
                    trip_id: None,
                    fuel_transaction_id: Some(b.transaction_id.clone()),
                    title: "Rapid consecutive fueling".into(),
                    reason: format!("Two fills {gap_minutes:.0} minutes apart"),
                    details: serde_json::json!({
                        "first_transaction_id": a.transaction_id,
                        "time_difference_minutes": gap_minutes,
                        "rapid_minutes": self.cfg.rapid_minutes,
                    }),
                    evidence_time: b.transaction_date,
                });
            }

            // Two fills within the window whose combined volume exceeds
            // what the tank can hold.
            if let Some(capacity) = capacity {
                let combined = a.fuel_amount + b.fuel_amount;
                let limit = capacity * self.cfg.multi_fill_capacity_ratio;
                if gap_minutes < (self.cfg.multi_fill_window_hours * 60) as f64
                    && combined > limit
                {
                    indicators.push(Indicator {
                        kind: "rapid_fueling_over_capacity".into(),
                        severity: Severity::High,
                        vehicle_id: Some(vehicle_id.to_string()),
                        driver_id: Some(b.driver_id.clone()),
                        trip_id: None,
                        fuel_transaction_id: Some(b.transaction_id.clone()),
                        title: "Combined fills exceed tank capacity".into(),
                        reason: format!(
                            "{combined:.1} L purchased within {} h into a {capacity:.0} L tank",
                            self.cfg.multi_fill_window_hours
                        ),
                        details: serde_json::json!({
                            "first_transaction_id": a.transaction_id,
                            "combined_fuel_l": combined,
                            "fuel_capacity_l": capacity,
                            "time_difference_minutes": gap_minutes,
                        }),
                        evidence_time: b.transaction_date,
                    });
                }
            }
        }
        indicators
    }

    // ── Per-transaction check ──────────────────────────────────────

    fn check_missing_trip(
        &self,
        ctx: &DetectionContext<'_>,
        txn: &FuelTransaction,
    ) -> DetectResult<Option<Indicator>> {
        if txn.trip_id.is_some() {
            return Ok(None);
        }
        let margin_secs = self.cfg.missing_trip_margin_hours * 3600;
        let has_trip = ctx.store.vehicle_has_trip_near(
            ctx.company_id,
            &txn.vehicle_id,
            txn.transaction_date,
            margin_secs,
        )?;
        if has_trip {
            return Ok(None);
        }
        Ok(Some(Indicator {
            kind: "fueling_without_trip".into(),
            severity: Severity::Medium,
            vehicle_id: Some(txn.vehicle_id.clone()),
            driver_id: Some(txn.driver_id.clone()),
            trip_id: None,
            fuel_transaction_id: Some(txn.transaction_id.clone()),
            title: "Fueling with no nearby trip".into(),
            reason: format!(
                "No trip for this vehicle within {} h of the transaction",
                self.cfg.missing_trip_margin_hours
            ),
            details: serde_json::json!({
                "fuel_amount_l": txn.fuel_amount,
                "margin_hours": self.cfg.missing_trip_margin_hours,
            }),
            evidence_time: txn.transaction_date,
        }))
    }
}

fn group_by<'a, F>(txns: &'a [FuelTransaction], key: F) -> BTreeMap<String, Vec<&'a FuelTransaction>>
where
    F: Fn(&FuelTransaction) -> &str,
{
    let mut groups: BTreeMap<String, Vec<&FuelTransaction>> = BTreeMap::new();
    for txn in txns {
        groups.entry(key(txn).to_string()).or_default().push(txn);
    }
    groups
}

impl Detector for FuelCardDetector {
    fn name(&self) -> &'static str {
        "fuel_card_misuse"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectResult<Vec<Indicator>> {
        let driver_since = ctx.now - Duration::days(self.cfg.driver_lookback_days);
        let vehicle_since = ctx.now - Duration::days(self.cfg.vehicle_lookback_days);
        let earliest: DateTime<Utc> = driver_since.min(vehicle_since);

        // One fetch covering both windows; split in memory.
        let all = ctx
            .store
            .get_fuel_transactions_since(ctx.company_id, earliest)?;
        if all.is_empty() {
            return Ok(Vec::new());
        }
        let driver_window: Vec<FuelTransaction> = all
            .iter()
            .filter(|t| t.transaction_date >= driver_since)
            .cloned()
            .collect();
        let vehicle_window: Vec<FuelTransaction> = all
            .iter()
            .filter(|t| t.transaction_date >= vehicle_since)
            .cloned()
            .collect();

        let capacities: HashMap<String, f64> = ctx
            .store
            .get_vehicles(ctx.company_id)?
            .into_iter()
            .filter(|v| v.fuel_capacity > 0.0)
            .map(|v: Vehicle| (v.vehicle_id, v.fuel_capacity))
            .collect();

        let mut indicators = Vec::new();

        for (driver_id, txns) in group_by(&driver_window, |t| t.driver_id.as_str()) {
            indicators.extend(self.check_daily_volume(&driver_id, &txns));
            indicators.extend(self.check_location_diversity(&driver_id, &txns));
            indicators.extend(self.check_timing(&driver_id, &txns));
        }

        for (vehicle_id, txns) in group_by(&vehicle_window, |t| t.vehicle_id.as_str()) {
            // Store rows arrive date-ordered; grouping preserves that.
            indicators.extend(self.check_driver_spread(&vehicle_id, &txns));
            indicators.extend(self.check_rapid_fills(
                &vehicle_id,
                capacities.get(&vehicle_id).copied(),
                &txns,
            ));
        }

        for txn in &driver_window {
            indicators.extend(self.check_missing_trip(ctx, txn)?);
        }

        Ok(indicators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn txn(id: &str, driver: &str, vehicle: &str, at: DateTime<Utc>, amount: f64) -> FuelTransaction {
        FuelTransaction {
            transaction_id: id.into(),
            company_id: "c1".into(),
            vehicle_id: vehicle.into(),
            driver_id: driver.into(),
            transaction_date: at,
            fuel_amount: amount,
            fuel_cost: amount * 1.5,
            odometer_reading: None,
            trip_id: None,
            location: None,
        }
    }

    fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, min, 0).unwrap()
    }

    #[test]
    fn four_fills_in_a_day_is_excessive() {
        let det = FuelCardDetector::new(FuelCardConfig::default());
        let txns: Vec<FuelTransaction> = (0..4)
            .map(|i| txn(&format!("t{i}"), "d1", "v1", at(3, 8 + i, 0), 30.0))
            .collect();
        let refs: Vec<&FuelTransaction> = txns.iter().collect();
        let found = det.check_daily_volume("d1", &refs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "excessive_daily_transactions");
        assert_eq!(found[0].severity, Severity::High);
    }

    #[test]
    fn rapid_pair_carries_gap_minutes() {
        let det = FuelCardDetector::new(FuelCardConfig::default());
        let a = txn("t1", "d1", "v1", at(3, 10, 0), 30.0);
        let b = txn("t2", "d1", "v1", at(3, 10, 20), 25.0);
        let refs = vec![&a, &b];
        let found = det.check_rapid_fills("v1", Some(80.0), &refs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "rapid_consecutive_transactions");
        assert_eq!(found[0].details["time_difference_minutes"], 20.0);
    }

    #[test]
    fn simultaneous_duplicates_are_not_rapid() {
        let det = FuelCardDetector::new(FuelCardConfig::default());
        let a = txn("t1", "d1", "v1", at(3, 10, 0), 30.0);
        let b = txn("t2", "d1", "v1", at(3, 10, 0), 30.0);
        let refs = vec![&a, &b];
        assert!(det.check_rapid_fills("v1", None, &refs).is_empty());
    }

    #[test]
    fn combined_fills_over_capacity() {
        let det = FuelCardDetector::new(FuelCardConfig::default());
        // 90 minutes apart — not rapid, but 70 + 60 = 130 > 80 * 1.2.
        let a = txn("t1", "d1", "v1", at(3, 10, 0), 70.0);
        let b = txn("t2", "d2", "v1", at(3, 11, 30), 60.0);
        let refs = vec![&a, &b];
        let found = det.check_rapid_fills("v1", Some(80.0), &refs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "rapid_fueling_over_capacity");
    }

    #[test]
    fn odd_hours_above_share_flagged() {
        let det = FuelCardDetector::new(FuelCardConfig::default());
        let txns = vec![
            txn("t1", "d1", "v1", at(3, 2, 0), 30.0),
            txn("t2", "d1", "v1", at(3, 3, 0), 30.0),
            txn("t3", "d1", "v1", at(4, 10, 0), 30.0),
        ];
        let refs: Vec<&FuelTransaction> = txns.iter().collect();
        let found = det.check_timing("d1", &refs).unwrap();
        assert_eq!(found.kind, "unusual_transaction_timing");
        assert_eq!(found.details["odd_hour_count"], 2);
    }

    #[test]
    fn six_drivers_one_vehicle_flagged() {
        let det = FuelCardDetector::new(FuelCardConfig::default());
        let txns: Vec<FuelTransaction> = (0..6)
            .map(|i| txn(&format!("t{i}"), &format!("d{i}"), "v1", at(3 + i, 9, 0), 30.0))
            .collect();
        let refs: Vec<&FuelTransaction> = txns.iter().collect();
        let found = det.check_driver_spread("v1", &refs).unwrap();
        assert_eq!(found.kind, "multiple_drivers_single_vehicle");
    }
}
