//! Pattern aggregation over materialized alerts.
//!
//! Temporal buckets, per-entity hot lists, and pairwise correlation
//! within a sliding window. The correlation pass is O(n²) in the alert
//! count — fine for dashboard-scale windows (hundreds of alerts), not
//! for high-volume feeds.

use crate::{
    config::AnalyticsConfig,
    error::DetectResult,
    store::{FleetStore, FraudAlert},
    types::Severity,
};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalPatterns {
    /// (hour, count) for the busiest hours, descending.
    pub peak_hours: Vec<(u32, i64)>,
    /// (weekday name, count) for the busiest days, descending.
    pub peak_days: Vec<(String, i64)>,
    pub off_hours_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityAlertCount {
    pub entity_id: String,
    pub alert_count: i64,
    pub worst_severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub pair: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSummary {
    pub by_type: BTreeMap<String, i64>,
    pub by_severity: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternReport {
    pub total_alerts: usize,
    pub temporal: TemporalPatterns,
    pub top_vehicles: Vec<EntityAlertCount>,
    pub top_drivers: Vec<EntityAlertCount>,
    pub correlations: Vec<CorrelatedPair>,
    pub summary: AlertSummary,
}

/// Top-N entries of a counter map, count descending, key ascending on
/// ties so output is stable.
fn top_n<K: Ord + Clone>(counts: &BTreeMap<K, i64>, n: usize) -> Vec<(K, i64)> {
    let mut entries: Vec<(K, i64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

fn temporal_patterns(alerts: &[FraudAlert], cfg: &AnalyticsConfig) -> TemporalPatterns {
    let mut by_hour: BTreeMap<u32, i64> = BTreeMap::new();
    let mut by_day: BTreeMap<String, i64> = BTreeMap::new();
    let mut day_order: BTreeMap<String, u32> = BTreeMap::new();
    let mut off_hours = 0i64;

    for alert in alerts {
        let hour = alert.created_at.hour();
        *by_hour.entry(hour).or_default() += 1;
        let weekday = alert.created_at.weekday();
        *by_day.entry(weekday.to_string()).or_default() += 1;
        day_order.insert(weekday.to_string(), weekday.num_days_from_monday());
        if cfg.off_hours.contains(&hour) {
            off_hours += 1;
        }
    }

    let mut peak_days: Vec<(String, i64)> = by_day.into_iter().collect();
    peak_days.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then(day_order.get(&a.0).cmp(&day_order.get(&b.0)))
    });
    peak_days.truncate(cfg.top_buckets);

    TemporalPatterns {
        peak_hours: top_n(&by_hour, cfg.top_buckets),
        peak_days,
        off_hours_count: off_hours,
    }
}

fn entity_hotlist<F>(alerts: &[FraudAlert], n: usize, key: F) -> Vec<EntityAlertCount>
where
    F: Fn(&FraudAlert) -> Option<&str>,
{
    let mut counts: BTreeMap<String, (i64, Severity)> = BTreeMap::new();
    for alert in alerts {
        if let Some(id) = key(alert) {
            let entry = counts.entry(id.to_string()).or_insert((0, alert.severity));
            entry.0 += 1;
            entry.1 = entry.1.max(alert.severity);
        }
    }
    let mut entries: Vec<EntityAlertCount> = counts
        .into_iter()
        .map(|(entity_id, (alert_count, worst_severity))| EntityAlertCount {
            entity_id,
            alert_count,
            worst_severity,
        })
        .collect();
    entries.sort_by(|a, b| b.alert_count.cmp(&a.alert_count).then(a.entity_id.cmp(&b.entity_id)));
    entries.truncate(n);
    entries
}

/// Ordered pairs (i, j) with j no later than the correlation window
/// after i, keyed "{i.type} + {j.type}". Quadratic over the window.
fn correlations(alerts: &[FraudAlert], cfg: &AnalyticsConfig) -> Vec<CorrelatedPair> {
    let window = Duration::minutes(cfg.correlation_window_minutes);
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for (i, a) in alerts.iter().enumerate() {
        for b in alerts.iter().skip(i + 1) {
            if b.created_at < a.created_at {
                continue;
            }
            if b.created_at > a.created_at + window {
                continue;
            }
            let key = format!("{} + {}", a.alert_type, b.alert_type);
            *counts.entry(key).or_default() += 1;
        }
    }
    top_n(&counts, cfg.top_entities)
        .into_iter()
        .map(|(pair, count)| CorrelatedPair { pair, count })
        .collect()
}

fn summary(alerts: &[FraudAlert]) -> AlertSummary {
    let mut by_type = BTreeMap::new();
    let mut by_severity = BTreeMap::new();
    let mut by_status: BTreeMap<String, i64> = BTreeMap::new();
    for alert in alerts {
        *by_type.entry(alert.alert_type.clone()).or_default() += 1;
        *by_severity
            .entry(alert.severity.as_str().to_string())
            .or_default() += 1;
        *by_status
            .entry(alert.status.as_str().to_string())
            .or_default() += 1;
    }
    AlertSummary {
        by_type,
        by_severity,
        by_status,
    }
}

/// Aggregate an already-fetched alert window.
pub fn analyze(alerts: &[FraudAlert], cfg: &AnalyticsConfig) -> PatternReport {
    PatternReport {
        total_alerts: alerts.len(),
        temporal: temporal_patterns(alerts, cfg),
        top_vehicles: entity_hotlist(alerts, cfg.top_entities, |a| a.vehicle_id.as_deref()),
        top_drivers: entity_hotlist(alerts, cfg.top_entities, |a| a.driver_id.as_deref()),
        correlations: correlations(alerts, cfg),
        summary: summary(alerts),
    }
}

/// Fetch a company's alert window and aggregate it.
pub fn analyze_company(
    store: &FleetStore,
    cfg: &AnalyticsConfig,
    company_id: &str,
    window_days: i64,
    now: DateTime<Utc>,
) -> DetectResult<PatternReport> {
    let alerts = store.get_alerts_since(company_id, now - Duration::days(window_days))?;
    Ok(analyze(&alerts, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertStatus;
    use chrono::TimeZone;

    fn alert(kind: &str, at: DateTime<Utc>, vehicle: Option<&str>) -> FraudAlert {
        FraudAlert {
            alert_id: format!("a-{kind}-{}", at.timestamp()),
            company_id: "c1".into(),
            alert_type: kind.into(),
            severity: Severity::High,
            status: AlertStatus::Open,
            vehicle_id: vehicle.map(Into::into),
            driver_id: None,
            trip_id: None,
            fuel_transaction_id: None,
            title: kind.into(),
            description: String::new(),
            details: serde_json::Value::Null,
            fingerprint: String::new(),
            created_at: at,
            resolved_at: None,
            resolution_notes: None,
        }
    }

    #[test]
    fn single_pair_within_the_hour() {
        let cfg = AnalyticsConfig::default();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let alerts = vec![
            alert("speed_violation", t0, None),
            alert("fuel_anomaly", t0 + Duration::minutes(30), None),
        ];
        let pairs = correlations(&alerts, &cfg);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].pair, "speed_violation + fuel_anomaly");
        assert_eq!(pairs[0].count, 1);
    }

    #[test]
    fn pairs_outside_window_do_not_count() {
        let cfg = AnalyticsConfig::default();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let alerts = vec![
            alert("speed_violation", t0, None),
            alert("fuel_anomaly", t0 + Duration::minutes(90), None),
        ];
        assert!(correlations(&alerts, &cfg).is_empty());
    }

    #[test]
    fn off_hours_count_uses_configured_hours() {
        let cfg = AnalyticsConfig::default();
        let alerts = vec![
            alert("x", Utc.with_ymd_and_hms(2024, 6, 3, 23, 0, 0).unwrap(), None),
            alert("x", Utc.with_ymd_and_hms(2024, 6, 4, 1, 0, 0).unwrap(), None),
            alert("x", Utc.with_ymd_and_hms(2024, 6, 4, 12, 0, 0).unwrap(), None),
        ];
        let t = temporal_patterns(&alerts, &cfg);
        assert_eq!(t.off_hours_count, 2);
    }

    #[test]
    fn hot_vehicles_ranked_by_count() {
        let cfg = AnalyticsConfig::default();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let alerts = vec![
            alert("a", t0, Some("v1")),
            alert("b", t0, Some("v2")),
            alert("c", t0, Some("v2")),
        ];
        let report = analyze(&alerts, &cfg);
        assert_eq!(report.top_vehicles[0].entity_id, "v2");
        assert_eq!(report.top_vehicles[0].alert_count, 2);
    }
}
