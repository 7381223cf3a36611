//! The detection audit trail.
//!
//! RULE: Every engine action that touches the store is recorded here.
//! The audit log is append-only; tooling and tests replay it to see
//! exactly what a run did.

use crate::types::{CompanyId, EntityId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every event emitted during a detection run.
/// Variants are added over time — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    RunStarted {
        run_id: EntityId,
        company_id: CompanyId,
        dry_run: bool,
    },
    DetectorCompleted {
        run_id: EntityId,
        detector: String,
        detected: usize,
    },
    DetectorFailed {
        run_id: EntityId,
        detector: String,
        error: String,
    },
    AlertCreated {
        run_id: EntityId,
        alert_id: EntityId,
        alert_type: String,
        severity: String,
    },
    DuplicateSuppressed {
        run_id: EntityId,
        alert_type: String,
        fingerprint: String,
    },
    AlertDropped {
        run_id: EntityId,
        alert_type: String,
        error: String,
    },
    RunCompleted {
        run_id: EntityId,
        indicators_found: usize,
        alerts_created: usize,
    },
}

impl AuditEvent {
    /// Stable string name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::DetectorCompleted { .. } => "detector_completed",
            Self::DetectorFailed { .. } => "detector_failed",
            Self::AlertCreated { .. } => "alert_created",
            Self::DuplicateSuppressed { .. } => "duplicate_suppressed",
            Self::AlertDropped { .. } => "alert_dropped",
            Self::RunCompleted { .. } => "run_completed",
        }
    }
}

/// One persisted row of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Option<i64>,
    pub run_id: EntityId,
    pub company_id: CompanyId,
    pub event_type: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}
