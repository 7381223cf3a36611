//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Detectors and scoring call store methods — they never execute SQL.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{
    error::DetectResult,
    event::AuditLogEntry,
    types::{AlertStatus, CompanyId, EntityId, Severity},
};

mod alerts;
mod fleet;
mod fuel;
mod tracking;

pub struct FleetStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for a file
}

impl FleetStore {
    pub fn open(path: &str) -> DetectResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> DetectResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this returns a fresh, isolated database.
    pub fn reopen(&self) -> DetectResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> DetectResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_alerts.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_webhooks.sql"))?;
        Ok(())
    }
}

// ── Time mapping ───────────────────────────────────────────────────
// Columns hold unix seconds; the API surface is chrono.

pub(crate) fn to_secs(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

pub(crate) fn from_secs(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

pub(crate) fn opt_secs(dt: Option<DateTime<Utc>>) -> Option<i64> {
    dt.map(to_secs)
}

// ── Rows ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: EntityId,
    pub company_id: CompanyId,
    pub plate: String,
    pub fuel_type: String,
    /// Tank size in liters. 0 means unknown; capacity checks skip it.
    pub fuel_capacity: f64,
    pub risk_score: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub driver_id: EntityId,
    pub company_id: CompanyId,
    pub name: String,
    pub license_number: String,
    pub risk_score: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_id: EntityId,
    pub company_id: CompanyId,
    pub name: String,
    pub expected_distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: EntityId,
    pub company_id: CompanyId,
    pub vehicle_id: EntityId,
    pub driver_id: EntityId,
    pub route_id: Option<EntityId>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_odometer: f64,
    pub end_odometer: f64,
    pub distance_traveled: f64,
    pub fuel_consumed: f64,
    /// "planned" | "in_progress" | "completed"
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelTransaction {
    pub transaction_id: EntityId,
    pub company_id: CompanyId,
    pub vehicle_id: EntityId,
    pub driver_id: EntityId,
    pub transaction_date: DateTime<Utc>,
    pub fuel_amount: f64,
    pub fuel_cost: f64,
    pub odometer_reading: Option<f64>,
    pub trip_id: Option<EntityId>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsPosition {
    pub id: Option<i64>,
    pub company_id: CompanyId,
    pub trip_id: Option<EntityId>,
    pub vehicle_id: EntityId,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub heading: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    pub geofence_id: EntityId,
    pub company_id: CompanyId,
    pub name: String,
    /// "inclusion" flags positions outside; "exclusion" flags inside.
    pub fence_type: String,
    /// JSON array of [lng, lat] vertices. Interpreted by the injected
    /// geometry predicate, never by core.
    pub polygon: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    pub alert_id: EntityId,
    pub company_id: CompanyId,
    pub alert_type: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub vehicle_id: Option<EntityId>,
    pub driver_id: Option<EntityId>,
    pub trip_id: Option<EntityId>,
    pub fuel_transaction_id: Option<EntityId>,
    pub title: String,
    pub description: String,
    pub details: serde_json::Value,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub webhook_id: EntityId,
    pub company_id: CompanyId,
    pub url: String,
    pub secret: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRunRow {
    pub run_id: EntityId,
    pub company_id: CompanyId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub detectors_run: i64,
    pub detectors_failed: i64,
    pub indicators_found: i64,
    pub alerts_created: i64,
}

// ── Audit log ──────────────────────────────────────────────────────

impl FleetStore {
    pub fn append_audit(&self, entry: &AuditLogEntry) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO audit_log (run_id, company_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.company_id,
                entry.event_type,
                entry.payload,
                to_secs(entry.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn audit_for_run(&self, run_id: &str) -> DetectResult<Vec<AuditLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, company_id, event_type, payload, created_at
             FROM audit_log WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(AuditLogEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    company_id: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                    created_at: from_secs(row.get(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn insert_detection_run(&self, run: &DetectionRunRow) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO detection_runs
             (run_id, company_id, started_at, finished_at, dry_run,
              detectors_run, detectors_failed, indicators_found, alerts_created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.run_id,
                run.company_id,
                to_secs(run.started_at),
                to_secs(run.finished_at),
                run.dry_run as i64,
                run.detectors_run,
                run.detectors_failed,
                run.indicators_found,
                run.alerts_created,
            ],
        )?;
        Ok(())
    }

    pub fn get_detection_run(&self, run_id: &str) -> DetectResult<Option<DetectionRunRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT run_id, company_id, started_at, finished_at, dry_run,
                        detectors_run, detectors_failed, indicators_found, alerts_created
                 FROM detection_runs WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok(DetectionRunRow {
                        run_id: row.get(0)?,
                        company_id: row.get(1)?,
                        started_at: from_secs(row.get(2)?),
                        finished_at: from_secs(row.get(3)?),
                        dry_run: row.get::<_, i64>(4)? != 0,
                        detectors_run: row.get(5)?,
                        detectors_failed: row.get(6)?,
                        indicators_found: row.get(7)?,
                        alerts_created: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
