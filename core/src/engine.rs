//! The detection engine — on-demand anomaly scans over one company.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Speed violation
//!   2. Route deviation
//!   3. Fuel anomaly
//!   4. After-hours usage
//!   5. Geofence violation
//!   6. Odometer tampering
//!   7. Fuel card misuse
//!
//! RULES:
//!   - Detectors only read; materialization owns alert creation.
//!   - A store failure inside one detector degrades it to zero
//!     indicators with a warning; the other detectors still run.
//!   - Alert inserts are independent, never a batch transaction.
//!   - Dry runs write nothing: no alerts, no audit rows.
//!   - No scheduler lives here. Callers decide when to run.

use crate::{
    after_hours_detector::AfterHoursDetector,
    config::DetectionConfig,
    detector::{DetectionContext, Detector},
    error::{DetectError, DetectResult},
    event::{AuditEvent, AuditLogEntry},
    fuel_anomaly_detector::FuelAnomalyDetector,
    fuel_card_detector::FuelCardDetector,
    geofence_detector::{GeofenceDetector, GeometryPredicate, NoopGeometry},
    indicator::Indicator,
    materialize::{MaterializeOutcome, Materializer},
    notify::{AlertSink, fan_out},
    odometer_detector::OdometerDetector,
    route_deviation_detector::RouteDeviationDetector,
    speed_detector::SpeedDetector,
    store::{DetectionRunRow, FleetStore},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Per-detector slice of a run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorOutcome {
    pub detector: String,
    pub detected: usize,
    pub alerts_created: usize,
    pub duplicates_suppressed: usize,
    /// True when the detector hit a store failure and reported nothing.
    /// Distinguishes "no anomalies" from "couldn't check".
    pub degraded: bool,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRunReport {
    pub run_id: String,
    pub company_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub detectors: Vec<DetectorOutcome>,
    pub indicators_found: usize,
    pub alerts_created: usize,
    pub detectors_failed: usize,
}

pub struct DetectionEngine {
    pub store: FleetStore,
    config: DetectionConfig,
    detectors: Vec<Box<dyn Detector>>,
    sinks: Vec<Box<dyn AlertSink>>,
    materializer: Materializer,
}

impl DetectionEngine {
    /// Build a fully wired engine with all detectors registered in the
    /// documented execution order.
    pub fn build(
        store: FleetStore,
        config: DetectionConfig,
        geometry: Arc<dyn GeometryPredicate>,
    ) -> Self {
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(SpeedDetector::new(config.speed.clone())),
            Box::new(RouteDeviationDetector::new(config.route_deviation.clone())),
            Box::new(FuelAnomalyDetector::new(config.fuel_anomaly.clone())),
            Box::new(AfterHoursDetector::new(config.after_hours.clone())),
            Box::new(GeofenceDetector::new(config.geofence.clone(), geometry)),
            Box::new(OdometerDetector::new(config.odometer.clone())),
            Box::new(FuelCardDetector::new(config.fuel_card.clone())),
        ];
        let materializer = Materializer::new(config.materialization.clone());
        Self {
            store,
            config,
            detectors,
            sinks: Vec::new(),
            materializer,
        }
    }

    /// Engine without a geometry backend: geofence detection degrades
    /// to zero detections. Used by tests and geometry-less deployments.
    pub fn build_default(store: FleetStore, config: DetectionConfig) -> Self {
        Self::build(store, config, Arc::new(NoopGeometry))
    }

    /// Register a best-effort alert sink.
    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every detector for one company.
    pub fn run_all(
        &self,
        company_id: &str,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> DetectResult<DetectionRunReport> {
        self.run_filtered(None, company_id, now, dry_run)
    }

    /// Run a single detector by its stable name.
    pub fn run_one(
        &self,
        name: &str,
        company_id: &str,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> DetectResult<DetectionRunReport> {
        if !self.detectors.iter().any(|d| d.name() == name) {
            return Err(DetectError::DetectorNotFound {
                name: name.to_string(),
            });
        }
        self.run_filtered(Some(name), company_id, now, dry_run)
    }

    fn run_filtered(
        &self,
        only: Option<&str>,
        company_id: &str,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> DetectResult<DetectionRunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = now;
        let ctx = DetectionContext {
            store: &self.store,
            company_id,
            now,
        };

        if !dry_run {
            self.audit(
                &run_id,
                company_id,
                now,
                &AuditEvent::RunStarted {
                    run_id: run_id.clone(),
                    company_id: company_id.to_string(),
                    dry_run,
                },
            )?;
        }

        let mut outcomes = Vec::new();
        let mut detectors_failed = 0usize;

        for detector in &self.detectors {
            if let Some(name) = only {
                if detector.name() != name {
                    continue;
                }
            }

            let mut outcome = DetectorOutcome {
                detector: detector.name().to_string(),
                detected: 0,
                alerts_created: 0,
                duplicates_suppressed: 0,
                degraded: false,
                indicators: Vec::new(),
            };

            match detector.detect(&ctx) {
                Ok(indicators) => {
                    outcome.detected = indicators.len();
                    if !dry_run {
                        self.audit(
                            &run_id,
                            company_id,
                            now,
                            &AuditEvent::DetectorCompleted {
                                run_id: run_id.clone(),
                                detector: detector.name().to_string(),
                                detected: indicators.len(),
                            },
                        )?;
                        for indicator in &indicators {
                            self.materialize_one(
                                &run_id,
                                company_id,
                                now,
                                indicator,
                                &mut outcome,
                            )?;
                        }
                    }
                    outcome.indicators = indicators;
                }
                Err(e) if e.is_store_failure() => {
                    // Degrade to no detections rather than failing the
                    // whole run; the report still shows which rules
                    // could not check.
                    log::warn!(
                        "detector '{}' degraded for company {company_id}: {e}",
                        detector.name()
                    );
                    outcome.degraded = true;
                    detectors_failed += 1;
                    if !dry_run {
                        self.audit(
                            &run_id,
                            company_id,
                            now,
                            &AuditEvent::DetectorFailed {
                                run_id: run_id.clone(),
                                detector: detector.name().to_string(),
                                error: e.to_string(),
                            },
                        )?;
                    }
                }
                Err(e) => return Err(e),
            }

            outcomes.push(outcome);
        }

        let indicators_found: usize = outcomes.iter().map(|o| o.detected).sum();
        let alerts_created: usize = outcomes.iter().map(|o| o.alerts_created).sum();
        let finished_at = Utc::now();

        if !dry_run {
            self.audit(
                &run_id,
                company_id,
                now,
                &AuditEvent::RunCompleted {
                    run_id: run_id.clone(),
                    indicators_found,
                    alerts_created,
                },
            )?;
            self.store.insert_detection_run(&DetectionRunRow {
                run_id: run_id.clone(),
                company_id: company_id.to_string(),
                started_at,
                finished_at,
                dry_run,
                detectors_run: outcomes.len() as i64,
                detectors_failed: detectors_failed as i64,
                indicators_found: indicators_found as i64,
                alerts_created: alerts_created as i64,
            })?;
        }

        Ok(DetectionRunReport {
            run_id,
            company_id: company_id.to_string(),
            started_at,
            finished_at,
            dry_run,
            detectors: outcomes,
            indicators_found,
            alerts_created,
            detectors_failed,
        })
    }

    fn materialize_one(
        &self,
        run_id: &str,
        company_id: &str,
        now: DateTime<Utc>,
        indicator: &Indicator,
        outcome: &mut DetectorOutcome,
    ) -> DetectResult<()> {
        match self
            .materializer
            .materialize(&self.store, company_id, indicator, now)
        {
            MaterializeOutcome::Created(alert) => {
                outcome.alerts_created += 1;
                self.audit(
                    run_id,
                    company_id,
                    now,
                    &AuditEvent::AlertCreated {
                        run_id: run_id.to_string(),
                        alert_id: alert.alert_id.clone(),
                        alert_type: alert.alert_type.clone(),
                        severity: alert.severity.as_str().to_string(),
                    },
                )?;
                fan_out(&self.sinks, &alert);
            }
            MaterializeOutcome::Duplicate(fingerprint) => {
                outcome.duplicates_suppressed += 1;
                self.audit(
                    run_id,
                    company_id,
                    now,
                    &AuditEvent::DuplicateSuppressed {
                        run_id: run_id.to_string(),
                        alert_type: indicator.kind.clone(),
                        fingerprint,
                    },
                )?;
            }
            MaterializeOutcome::Failed(error) => {
                // The alert is dropped; alerts_created stays below
                // detected and the caller sees the gap in the report.
                self.audit(
                    run_id,
                    company_id,
                    now,
                    &AuditEvent::AlertDropped {
                        run_id: run_id.to_string(),
                        alert_type: indicator.kind.clone(),
                        error,
                    },
                )?;
            }
        }
        Ok(())
    }

    fn audit(
        &self,
        run_id: &str,
        company_id: &str,
        now: DateTime<Utc>,
        event: &AuditEvent,
    ) -> DetectResult<()> {
        self.store.append_audit(&AuditLogEntry {
            id: None,
            run_id: run_id.to_string(),
            company_id: company_id.to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
            created_at: now,
        })
    }
}
