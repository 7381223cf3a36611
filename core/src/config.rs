//! Detection thresholds and weights.
//!
//! RULE: No detector carries a numeric literal for a policy decision.
//! Every threshold, multiplier, and weight lives here so rules are data.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub speed: SpeedConfig,
    pub route_deviation: RouteDeviationConfig,
    pub fuel_anomaly: FuelAnomalyConfig,
    pub after_hours: AfterHoursConfig,
    pub geofence: GeofenceConfig,
    pub odometer: OdometerConfig,
    pub fuel_card: FuelCardConfig,
    pub risk: RiskConfig,
    pub analytics: AnalyticsConfig,
    pub materialization: MaterializationConfig,
}

impl DetectionConfig {
    /// Load from a JSON file. Missing sections and fields fall back to
    /// the canonical defaults, so a config file only needs overrides.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    /// Positions above this speed (km/h) are violations.
    pub threshold_kmh: f64,
    /// Batch detector: speed above threshold * this => critical.
    /// The original system used 1.5 here and 1.2 in the real-time check;
    /// both are kept as separate knobs rather than silently unified.
    pub batch_critical_multiplier: f64,
    /// Real-time single-position check: critical multiplier.
    pub realtime_critical_multiplier: f64,
    pub lookback_hours: i64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            threshold_kmh: 120.0,
            batch_critical_multiplier: 1.5,
            realtime_critical_multiplier: 1.2,
            lookback_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteDeviationConfig {
    /// |actual - expected| / expected above this is flagged.
    pub flag_ratio: f64,
    /// Deviation above this is high severity instead of medium.
    pub high_ratio: f64,
    pub lookback_days: i64,
}

impl Default for RouteDeviationConfig {
    fn default() -> Self {
        Self {
            flag_ratio: 0.2,
            high_ratio: 0.5,
            lookback_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelAnomalyConfig {
    /// A transaction above capacity * this ratio is an overfill.
    pub overfill_capacity_ratio: f64,
    /// Absolute efficiency band (km/L); outside it is suspicious.
    pub min_efficiency_kmpl: f64,
    pub max_efficiency_kmpl: f64,
    /// Ratio-to-baseline band. Above the high ratio suggests tampering.
    pub high_efficiency_ratio: f64,
    pub low_efficiency_ratio: f64,
    /// Baseline used when a fuel type has no trips in the window.
    pub default_baseline_kmpl: f64,
    pub lookback_days: i64,
}

impl Default for FuelAnomalyConfig {
    fn default() -> Self {
        Self {
            overfill_capacity_ratio: 1.1,
            min_efficiency_kmpl: 3.0,
            max_efficiency_kmpl: 15.0,
            high_efficiency_ratio: 2.0,
            low_efficiency_ratio: 0.5,
            default_baseline_kmpl: 8.0,
            lookback_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AfterHoursConfig {
    /// A trip starting at hour >= start_hour OR <= end_hour is flagged.
    /// An OR of two one-sided conditions, so the window spans midnight.
    pub start_hour: u32,
    pub end_hour: u32,
    pub lookback_days: i64,
}

impl Default for AfterHoursConfig {
    fn default() -> Self {
        Self {
            start_hour: 22,
            end_hour: 6,
            lookback_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    pub lookback_hours: i64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self { lookback_hours: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometerConfig {
    /// Max plausible road speed for the impossible-increase check.
    pub max_speed_kmh: f64,
    /// Distance-mismatch check only applies to trips longer than this.
    pub min_trip_distance_km: f64,
    /// |odometer increase - trip distance| above this share of the trip
    /// distance is a mismatch.
    pub mismatch_ratio: f64,
    pub lookback_days: i64,
}

impl Default for OdometerConfig {
    fn default() -> Self {
        Self {
            max_speed_kmh: 120.0,
            min_trip_distance_km: 10.0,
            mismatch_ratio: 0.3,
            lookback_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelCardConfig {
    /// Driver-grouped checks use the short window.
    pub driver_lookback_days: i64,
    /// Vehicle-grouped checks use the long window.
    pub vehicle_lookback_days: i64,
    /// More than this many transactions by one driver in one day.
    pub max_daily_transactions: usize,
    /// More than this many distinct locations for one driver.
    pub max_distinct_locations: usize,
    /// More than this many distinct drivers fueling one vehicle.
    pub max_drivers_per_vehicle: usize,
    /// Transactions at hour < early_hour or > late_hour are odd-hour.
    pub early_hour: u32,
    pub late_hour: u32,
    /// Share of odd-hour transactions above which a driver is flagged.
    pub odd_hour_share: f64,
    /// Two fills for one vehicle closer than this are rapid.
    pub rapid_minutes: i64,
    /// Window for the combined-volume-over-capacity check.
    pub multi_fill_window_hours: i64,
    pub multi_fill_capacity_ratio: f64,
    /// An unlinked transaction with no trip starting within this margin
    /// either side is fueling without a trip.
    pub missing_trip_margin_hours: i64,
}

impl Default for FuelCardConfig {
    fn default() -> Self {
        Self {
            driver_lookback_days: 7,
            vehicle_lookback_days: 14,
            max_daily_transactions: 3,
            max_distinct_locations: 10,
            max_drivers_per_vehicle: 5,
            early_hour: 5,
            late_hour: 23,
            odd_hour_share: 0.3,
            rapid_minutes: 30,
            multi_fill_window_hours: 2,
            multi_fill_capacity_ratio: 1.2,
            missing_trip_margin_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub window_days: i64,
    pub alert_frequency_weight: f64,
    pub high_severity_weight: f64,
    /// Prior-score weight differs per entity kind in the source system.
    pub driver_prior_weight: f64,
    pub vehicle_prior_weight: f64,
    /// Flat bonus added when the alert count exceeds the volume threshold.
    pub volume_bonus: f64,
    pub driver_volume_threshold: i64,
    pub vehicle_volume_threshold: i64,
    /// Tier cutoffs: score > high_cutoff => high, > medium_cutoff => medium.
    pub high_cutoff: f64,
    pub medium_cutoff: f64,
    /// Cached scores are rewritten only when they move more than this.
    pub write_back_epsilon: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            alert_frequency_weight: 0.4,
            high_severity_weight: 0.1,
            driver_prior_weight: 0.3,
            vehicle_prior_weight: 0.5,
            volume_bonus: 0.2,
            driver_volume_threshold: 5,
            vehicle_volume_threshold: 10,
            high_cutoff: 0.7,
            medium_cutoff: 0.4,
            write_back_epsilon: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Two alerts within this window count as a correlated pair.
    pub correlation_window_minutes: i64,
    /// Top-N entities reported as hot spots.
    pub top_entities: usize,
    /// Top-N peak hours / days reported.
    pub top_buckets: usize,
    /// Hours counted as off-hours activity.
    pub off_hours: Vec<u32>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            correlation_window_minutes: 60,
            top_entities: 5,
            top_buckets: 3,
            off_hours: vec![22, 23, 0, 1],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializationConfig {
    /// When set, an alert with the same fingerprint suppresses the insert.
    /// Off reproduces the source system's duplicate accumulation.
    pub dedupe: bool,
    /// Bucket width for the fingerprint's time component.
    pub fingerprint_bucket_hours: i64,
}

impl Default for MaterializationConfig {
    fn default() -> Self {
        Self {
            dedupe: true,
            fingerprint_bucket_hours: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_canonical_thresholds() {
        let cfg = DetectionConfig::default();
        assert_eq!(cfg.speed.threshold_kmh, 120.0);
        assert_eq!(cfg.speed.batch_critical_multiplier, 1.5);
        assert_eq!(cfg.speed.realtime_critical_multiplier, 1.2);
        assert_eq!(cfg.fuel_anomaly.overfill_capacity_ratio, 1.1);
        assert_eq!(cfg.risk.driver_prior_weight, 0.3);
        assert_eq!(cfg.risk.vehicle_prior_weight, 0.5);
        assert!(cfg.materialization.dedupe);
    }

    #[test]
    fn partial_json_overlays_defaults() {
        let cfg: DetectionConfig =
            serde_json::from_str(r#"{"speed": {"threshold_kmh": 100.0}}"#).unwrap();
        assert_eq!(cfg.speed.threshold_kmh, 100.0);
        assert_eq!(cfg.speed.batch_critical_multiplier, 1.5);
        assert_eq!(cfg.odometer.mismatch_ratio, 0.3);
    }
}
