//! Fraud alert and webhook queries.
//!
//! Alert rows are never hard-deleted; operators move them through the
//! four-value status field instead.

use super::{FleetStore, FraudAlert, Webhook, from_secs, opt_secs, to_secs};
use crate::{
    error::DetectResult,
    types::{AlertStatus, Severity},
};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<FraudAlert> {
    let details: String = row.get(12)?;
    Ok(FraudAlert {
        alert_id: row.get(0)?,
        company_id: row.get(1)?,
        alert_type: row.get(2)?,
        severity: row.get(3)?,
        status: row.get(4)?,
        vehicle_id: row.get(5)?,
        driver_id: row.get(6)?,
        trip_id: row.get(7)?,
        fuel_transaction_id: row.get(8)?,
        title: row.get(9)?,
        description: row.get(10)?,
        fingerprint: row.get(11)?,
        details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
        created_at: from_secs(row.get(13)?),
        resolved_at: row.get::<_, Option<i64>>(14)?.map(from_secs),
        resolution_notes: row.get(15)?,
    })
}

const ALERT_COLS: &str = "alert_id, company_id, alert_type, severity, status,
    vehicle_id, driver_id, trip_id, fuel_transaction_id,
    title, description, fingerprint, details, created_at, resolved_at, resolution_notes";

impl FleetStore {
    pub fn insert_fraud_alert(&self, a: &FraudAlert) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO fraud_alerts
             (alert_id, company_id, alert_type, severity, status,
              vehicle_id, driver_id, trip_id, fuel_transaction_id,
              title, description, details, fingerprint, created_at,
              resolved_at, resolution_notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                a.alert_id,
                a.company_id,
                a.alert_type,
                a.severity,
                a.status,
                a.vehicle_id,
                a.driver_id,
                a.trip_id,
                a.fuel_transaction_id,
                a.title,
                a.description,
                serde_json::to_string(&a.details)?,
                a.fingerprint,
                to_secs(a.created_at),
                opt_secs(a.resolved_at),
                a.resolution_notes,
            ],
        )?;
        Ok(())
    }

    pub fn get_alert(&self, company_id: &str, alert_id: &str) -> DetectResult<Option<FraudAlert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLS} FROM fraud_alerts
             WHERE company_id = ?1 AND alert_id = ?2",
        ))?;
        let row = stmt
            .query_row(params![company_id, alert_id], alert_from_row)
            .optional()?;
        Ok(row)
    }

    /// Alerts created on or after `since`, oldest first.
    pub fn get_alerts_since(
        &self,
        company_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<Vec<FraudAlert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLS} FROM fraud_alerts
             WHERE company_id = ?1 AND created_at >= ?2
             ORDER BY created_at ASC",
        ))?;
        let rows = stmt.query_map(params![company_id, to_secs(since)], alert_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_alerts_by_status(
        &self,
        company_id: &str,
        status: AlertStatus,
    ) -> DetectResult<Vec<FraudAlert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLS} FROM fraud_alerts
             WHERE company_id = ?1 AND status = ?2
             ORDER BY created_at ASC",
        ))?;
        let rows = stmt.query_map(params![company_id, status], alert_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_alerts(&self, company_id: &str) -> DetectResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM fraud_alerts WHERE company_id = ?1",
            params![company_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn alert_fingerprint_exists(
        &self,
        company_id: &str,
        fingerprint: &str,
    ) -> DetectResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fraud_alerts
             WHERE company_id = ?1 AND fingerprint = ?2",
            params![company_id, fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ── Risk scoring inputs ────────────────────────────────────────

    pub fn count_alerts_for_driver_since(
        &self,
        company_id: &str,
        driver_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM fraud_alerts
             WHERE company_id = ?1 AND driver_id = ?2 AND created_at >= ?3",
            params![company_id, driver_id, to_secs(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_high_severity_alerts_for_driver_since(
        &self,
        company_id: &str,
        driver_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM fraud_alerts
             WHERE company_id = ?1 AND driver_id = ?2 AND created_at >= ?3
               AND severity IN ('high', 'critical')",
            params![company_id, driver_id, to_secs(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_alerts_for_vehicle_since(
        &self,
        company_id: &str,
        vehicle_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM fraud_alerts
             WHERE company_id = ?1 AND vehicle_id = ?2 AND created_at >= ?3",
            params![company_id, vehicle_id, to_secs(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_high_severity_alerts_for_vehicle_since(
        &self,
        company_id: &str,
        vehicle_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM fraud_alerts
             WHERE company_id = ?1 AND vehicle_id = ?2 AND created_at >= ?3
               AND severity IN ('high', 'critical')",
            params![company_id, vehicle_id, to_secs(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Operator actions ───────────────────────────────────────────

    /// Move an alert to a new status. Terminal statuses stamp
    /// `resolved_at`; reopening clears it. Returns false when the alert
    /// does not exist.
    pub fn update_alert_status(
        &self,
        company_id: &str,
        alert_id: &str,
        status: AlertStatus,
        resolution_notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> DetectResult<bool> {
        let resolved_at = if status.is_terminal() {
            Some(to_secs(now))
        } else {
            None
        };
        let updated = self.conn.execute(
            "UPDATE fraud_alerts
             SET status = ?3, resolution_notes = ?4, resolved_at = ?5
             WHERE company_id = ?1 AND alert_id = ?2",
            params![company_id, alert_id, status, resolution_notes, resolved_at],
        )?;
        Ok(updated > 0)
    }

    pub fn update_alert_severity(
        &self,
        company_id: &str,
        alert_id: &str,
        severity: Severity,
    ) -> DetectResult<bool> {
        let updated = self.conn.execute(
            "UPDATE fraud_alerts SET severity = ?3
             WHERE company_id = ?1 AND alert_id = ?2",
            params![company_id, alert_id, severity],
        )?;
        Ok(updated > 0)
    }

    // ── Webhooks ───────────────────────────────────────────────────

    pub fn insert_webhook(&self, w: &Webhook) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO webhooks (webhook_id, company_id, url, secret, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![w.webhook_id, w.company_id, w.url, w.secret, w.is_active as i64],
        )?;
        Ok(())
    }

    pub fn get_active_webhooks(&self, company_id: &str) -> DetectResult<Vec<Webhook>> {
        let mut stmt = self.conn.prepare(
            "SELECT webhook_id, company_id, url, secret, is_active
             FROM webhooks WHERE company_id = ?1 AND is_active = 1
             ORDER BY webhook_id",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok(Webhook {
                webhook_id: row.get(0)?,
                company_id: row.get(1)?,
                url: row.get(2)?,
                secret: row.get(3)?,
                is_active: row.get::<_, i64>(4)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
