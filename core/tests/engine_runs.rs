//! Engine-level run semantics: dedupe, audit trail, sinks, dry runs.

mod common;

use chrono::Duration;
use common::*;
use fleetfraud_core::{
    config::DetectionConfig,
    engine::DetectionEngine,
    error::DetectError,
    notify::AlertSink,
    store::{FleetStore, FraudAlert},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn seed_rollback(store: &FleetStore) {
    store.insert_vehicle(&vehicle("veh-1", 80.0)).unwrap();
    store.insert_driver(&driver("drv-1")).unwrap();
    store
        .insert_trip(&trip("t1", "veh-1", "drv-1", now() - Duration::days(3), 49_900.0, 100.0, 12.0))
        .unwrap();
    store
        .insert_trip(&trip("t2", "veh-1", "drv-1", now() - Duration::days(2), 49_800.0, 100.0, 12.0))
        .unwrap();
}

/// With dedupe on, re-running over an overlapping window does not
/// accumulate duplicate alerts.
#[test]
fn second_run_is_suppressed_by_fingerprints() {
    let store = store();
    seed_rollback(&store);
    let engine = engine(store);

    let first = engine.run_all(COMPANY, now(), false).unwrap();
    assert!(first.alerts_created > 0);
    let created = engine.store.count_alerts(COMPANY).unwrap();

    let second = engine.run_all(COMPANY, now(), false).unwrap();
    assert_eq!(second.alerts_created, 0);
    assert!(second.detectors.iter().any(|d| d.duplicates_suppressed > 0));
    assert_eq!(engine.store.count_alerts(COMPANY).unwrap(), created);
}

/// With dedupe off, the engine reproduces the source system's duplicate
/// accumulation: every run inserts the same alerts again.
#[test]
fn dedupe_off_accumulates_duplicates() {
    let store = store();
    seed_rollback(&store);
    let mut cfg = DetectionConfig::default();
    cfg.materialization.dedupe = false;
    let engine = DetectionEngine::build_default(store, cfg);

    let first = engine.run_all(COMPANY, now(), false).unwrap();
    let second = engine.run_all(COMPANY, now(), false).unwrap();
    assert_eq!(first.alerts_created, second.alerts_created);
    assert_eq!(
        engine.store.count_alerts(COMPANY).unwrap(),
        (first.alerts_created + second.alerts_created) as i64
    );
}

#[test]
fn unknown_detector_name_is_an_error() {
    let engine = engine(store());
    let err = engine.run_one("nonexistent", COMPANY, now(), true).unwrap_err();
    assert!(matches!(err, DetectError::DetectorNotFound { .. }));
}

/// A wet run leaves a complete audit trail and a run record whose
/// counters match the report.
#[test]
fn audit_trail_matches_report() {
    let store = store();
    seed_rollback(&store);
    let engine = engine(store);

    let report = engine.run_all(COMPANY, now(), false).unwrap();
    let audit = engine.store.audit_for_run(&report.run_id).unwrap();
    assert_eq!(audit.first().unwrap().event_type, "run_started");
    assert_eq!(audit.last().unwrap().event_type, "run_completed");
    let created_events = audit.iter().filter(|e| e.event_type == "alert_created").count();
    assert_eq!(created_events, report.alerts_created);

    let run = engine.store.get_detection_run(&report.run_id).unwrap().unwrap();
    assert_eq!(run.alerts_created as usize, report.alerts_created);
    assert_eq!(run.indicators_found as usize, report.indicators_found);
    assert_eq!(run.detectors_run as usize, report.detectors.len());
}

/// Dry runs over unchanged data produce identical indicator lists.
#[test]
fn dry_runs_are_idempotent() {
    let store = store();
    fleetfraud_core::synthetic::seed_demo_fleet(&store, COMPANY, 42, now()).unwrap();
    let engine = engine(store);

    let first = engine.run_all(COMPANY, now(), true).unwrap();
    let second = engine.run_all(COMPANY, now(), true).unwrap();

    let indicators = |report: &fleetfraud_core::engine::DetectionRunReport| {
        let lists: Vec<_> = report.detectors.iter().map(|d| &d.indicators).collect();
        serde_json::to_string(&lists).unwrap()
    };
    assert_eq!(indicators(&first), indicators(&second));
}

struct CountingSink(Arc<AtomicUsize>);

impl AlertSink for CountingSink {
    fn name(&self) -> &str {
        "counting"
    }
    fn deliver(&self, _alert: &FraudAlert) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingSink;

impl AlertSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }
    fn deliver(&self, _alert: &FraudAlert) -> anyhow::Result<()> {
        anyhow::bail!("endpoint unreachable")
    }
}

/// Sink failures are logged and swallowed; healthy sinks still see
/// every created alert.
#[test]
fn sink_failures_never_fail_the_run() {
    let store = store();
    seed_rollback(&store);
    let mut engine = engine(store);
    let delivered = Arc::new(AtomicUsize::new(0));
    engine.add_sink(Box::new(FailingSink));
    engine.add_sink(Box::new(CountingSink(delivered.clone())));

    let report = engine.run_all(COMPANY, now(), false).unwrap();
    assert!(report.alerts_created > 0);
    assert_eq!(delivered.load(Ordering::SeqCst), report.alerts_created);
}
