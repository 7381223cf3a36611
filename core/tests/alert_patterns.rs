//! Pattern aggregation and the operator-facing alert lifecycle.

mod common;

use chrono::Duration;
use common::*;
use fleetfraud_core::{
    analytics::analyze_company,
    config::AnalyticsConfig,
    store::Webhook,
    types::{AlertStatus, Severity},
};

/// A speed alert followed 30 minutes later by a fuel anomaly yields
/// exactly one correlated pair with count 1.
#[test]
fn correlation_counts_single_pair() {
    let store = store();
    let t0 = now() - Duration::days(1);
    store
        .insert_fraud_alert(&alert("a1", "speed_violation", Severity::High, t0, None, None))
        .unwrap();
    store
        .insert_fraud_alert(&alert(
            "a2",
            "fuel_anomaly",
            Severity::Medium,
            t0 + Duration::minutes(30),
            None,
            None,
        ))
        .unwrap();

    let report = analyze_company(&store, &AnalyticsConfig::default(), COMPANY, 30, now()).unwrap();
    assert_eq!(report.correlations.len(), 1);
    assert_eq!(report.correlations[0].pair, "speed_violation + fuel_anomaly");
    assert_eq!(report.correlations[0].count, 1);
}

#[test]
fn temporal_and_entity_aggregation() {
    let store = store();
    let day = now() - Duration::days(2);
    let at_hour =
        |h: i64| day.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc() + Duration::hours(h);

    // Three alerts at 23:00, one at 09:00; veh-2 is the hot vehicle.
    for (i, (hour, vehicle)) in [(23, "veh-2"), (23, "veh-2"), (23, "veh-1"), (9, "veh-2")]
        .into_iter()
        .enumerate()
    {
        store
            .insert_fraud_alert(&alert(
                &format!("a{i}"),
                "after_hours_usage",
                Severity::Medium,
                at_hour(hour),
                Some(vehicle),
                Some("drv-1"),
            ))
            .unwrap();
    }

    let report = analyze_company(&store, &AnalyticsConfig::default(), COMPANY, 30, now()).unwrap();
    assert_eq!(report.total_alerts, 4);
    assert_eq!(report.temporal.peak_hours[0], (23, 3));
    assert_eq!(report.temporal.off_hours_count, 3);
    assert_eq!(report.top_vehicles[0].entity_id, "veh-2");
    assert_eq!(report.top_vehicles[0].alert_count, 3);
    assert_eq!(report.top_drivers[0].alert_count, 4);
    assert_eq!(report.summary.by_severity["medium"], 4);
}

/// Status moves freely between the four values; terminal statuses stamp
/// resolved_at and reopening clears it.
#[test]
fn alert_lifecycle_round_trip() {
    let store = store();
    store
        .insert_fraud_alert(&alert(
            "a1",
            "overfilling",
            Severity::High,
            now() - Duration::days(1),
            Some("veh-1"),
            None,
        ))
        .unwrap();

    let updated = store
        .update_alert_status(COMPANY, "a1", AlertStatus::Resolved, Some("refund issued"), now())
        .unwrap();
    assert!(updated);
    let resolved = store.get_alert(COMPANY, "a1").unwrap().unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);
    assert!(resolved.resolved_at.is_some());
    assert_eq!(resolved.resolution_notes.as_deref(), Some("refund issued"));

    // No transition graph: resolved -> open is allowed and un-stamps.
    store
        .update_alert_status(COMPANY, "a1", AlertStatus::Open, None, now())
        .unwrap();
    let reopened = store.get_alert(COMPANY, "a1").unwrap().unwrap();
    assert_eq!(reopened.status, AlertStatus::Open);
    assert!(reopened.resolved_at.is_none());

    // Operators may also re-grade severity.
    store.update_alert_severity(COMPANY, "a1", Severity::Critical).unwrap();
    let regraded = store.get_alert(COMPANY, "a1").unwrap().unwrap();
    assert_eq!(regraded.severity, Severity::Critical);

    assert!(!store
        .update_alert_status(COMPANY, "missing", AlertStatus::Open, None, now())
        .unwrap());
}

#[test]
fn only_active_webhooks_are_returned() {
    let store = store();
    store
        .insert_webhook(&Webhook {
            webhook_id: "wh-1".into(),
            company_id: COMPANY.into(),
            url: "https://ops.example/hooks/fraud".into(),
            secret: "s3cret".into(),
            is_active: true,
        })
        .unwrap();
    store
        .insert_webhook(&Webhook {
            webhook_id: "wh-2".into(),
            company_id: COMPANY.into(),
            url: "https://old.example/hook".into(),
            secret: "retired".into(),
            is_active: false,
        })
        .unwrap();

    let active = store.get_active_webhooks(COMPANY).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].webhook_id, "wh-1");
}
