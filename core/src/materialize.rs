//! Alert materialization.
//!
//! RULE: This is the only path that creates fraud_alert rows.
//! One indicator, one insert. Inserts are independent — a failure drops
//! that single alert and the run continues. With dedupe on, an existing
//! alert with the same fingerprint suppresses the insert; switching it
//! off reproduces the duplicate accumulation of the source system.

use crate::{
    config::MaterializationConfig,
    indicator::Indicator,
    store::{FleetStore, FraudAlert},
    types::AlertStatus,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct Materializer {
    cfg: MaterializationConfig,
}

#[derive(Debug)]
pub enum MaterializeOutcome {
    Created(FraudAlert),
    /// Suppressed by an existing alert with this fingerprint.
    Duplicate(String),
    /// Insert or lookup failed; the alert is dropped, not the run.
    Failed(String),
}

impl Materializer {
    pub fn new(cfg: MaterializationConfig) -> Self {
        Self { cfg }
    }

    /// Build the alert row an indicator would produce, without touching
    /// the store. Dry-run reporting uses this too.
    pub fn draft(&self, company_id: &str, indicator: &Indicator, now: DateTime<Utc>) -> FraudAlert {
        FraudAlert {
            alert_id: Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            alert_type: indicator.kind.clone(),
            severity: indicator.severity,
            status: AlertStatus::Open,
            vehicle_id: indicator.vehicle_id.clone(),
            driver_id: indicator.driver_id.clone(),
            trip_id: indicator.trip_id.clone(),
            fuel_transaction_id: indicator.fuel_transaction_id.clone(),
            title: indicator.title.clone(),
            description: indicator.reason.clone(),
            details: indicator.details.clone(),
            fingerprint: indicator.fingerprint(self.cfg.fingerprint_bucket_hours),
            created_at: now,
            resolved_at: None,
            resolution_notes: None,
        }
    }

    pub fn materialize(
        &self,
        store: &FleetStore,
        company_id: &str,
        indicator: &Indicator,
        now: DateTime<Utc>,
    ) -> MaterializeOutcome {
        let fingerprint = indicator.fingerprint(self.cfg.fingerprint_bucket_hours);

        if self.cfg.dedupe {
            match store.alert_fingerprint_exists(company_id, &fingerprint) {
                Ok(true) => return MaterializeOutcome::Duplicate(fingerprint),
                Ok(false) => {}
                Err(e) => {
                    log::warn!("fingerprint lookup failed for {fingerprint}: {e}");
                    return MaterializeOutcome::Failed(e.to_string());
                }
            }
        }

        let alert = self.draft(company_id, indicator, now);
        match store.insert_fraud_alert(&alert) {
            Ok(()) => {
                log::info!(
                    "company={company_id} alert created: {} [{}] {}",
                    alert.alert_type,
                    alert.severity.as_str(),
                    alert.title
                );
                MaterializeOutcome::Created(alert)
            }
            Err(e) => {
                log::warn!("alert insert failed for {}: {e}", indicator.kind);
                MaterializeOutcome::Failed(e.to_string())
            }
        }
    }
}
