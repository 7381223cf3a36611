//! Ephemeral detection findings.
//!
//! An Indicator is what a detector emits: a suspected anomaly with a
//! severity, the entities involved, and a structured evidence payload.
//! It lives in memory only — materialization turns it into a persisted
//! fraud alert.

use crate::types::{EntityId, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    /// Stable rule identifier, e.g. "odometer_rollback".
    pub kind: String,
    pub severity: Severity,
    pub vehicle_id: Option<EntityId>,
    pub driver_id: Option<EntityId>,
    pub trip_id: Option<EntityId>,
    pub fuel_transaction_id: Option<EntityId>,
    /// Short operator-facing headline.
    pub title: String,
    /// Human-readable reason the rule fired.
    pub reason: String,
    /// Structured evidence (measured values, thresholds).
    pub details: serde_json::Value,
    /// When the suspicious activity happened (not when it was detected).
    pub evidence_time: DateTime<Utc>,
}

impl Indicator {
    /// Stable identity for dedupe: rule + subjects + a time bucket wide
    /// enough that re-running detection over an overlapping window maps
    /// the same real-world occurrence to the same fingerprint.
    pub fn fingerprint(&self, bucket_hours: i64) -> String {
        let bucket_secs = (bucket_hours.max(1)) * 3600;
        let bucket = self.evidence_time.timestamp().div_euclid(bucket_secs);
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.kind,
            self.vehicle_id.as_deref().unwrap_or("-"),
            self.driver_id.as_deref().unwrap_or("-"),
            self.trip_id.as_deref().unwrap_or("-"),
            self.fuel_transaction_id.as_deref().unwrap_or("-"),
            bucket,
        )
    }
}
