//! GPS position and geofence queries.

use super::{FleetStore, Geofence, GpsPosition, from_secs, to_secs};
use crate::error::DetectResult;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

fn position_from_row(row: &Row<'_>) -> rusqlite::Result<GpsPosition> {
    Ok(GpsPosition {
        id: Some(row.get(0)?),
        company_id: row.get(1)?,
        trip_id: row.get(2)?,
        vehicle_id: row.get(3)?,
        timestamp: from_secs(row.get(4)?),
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        speed: row.get(7)?,
        heading: row.get(8)?,
    })
}

const POSITION_COLS: &str =
    "id, company_id, trip_id, vehicle_id, timestamp, latitude, longitude, speed, heading";

impl FleetStore {
    pub fn insert_gps_position(&self, p: &GpsPosition) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO gps_tracking
             (company_id, trip_id, vehicle_id, timestamp, latitude, longitude, speed, heading)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                p.company_id,
                p.trip_id,
                p.vehicle_id,
                to_secs(p.timestamp),
                p.latitude,
                p.longitude,
                p.speed,
                p.heading,
            ],
        )?;
        Ok(())
    }

    /// Positions on or after `since` whose speed exceeds `threshold`.
    pub fn get_positions_over_speed(
        &self,
        company_id: &str,
        since: DateTime<Utc>,
        threshold: f64,
    ) -> DetectResult<Vec<GpsPosition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {POSITION_COLS} FROM gps_tracking
             WHERE company_id = ?1 AND timestamp >= ?2 AND speed > ?3
             ORDER BY timestamp ASC",
        ))?;
        let rows = stmt.query_map(
            params![company_id, to_secs(since), threshold],
            position_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_positions_since(
        &self,
        company_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<Vec<GpsPosition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {POSITION_COLS} FROM gps_tracking
             WHERE company_id = ?1 AND timestamp >= ?2
             ORDER BY timestamp ASC",
        ))?;
        let rows = stmt.query_map(params![company_id, to_secs(since)], position_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn insert_geofence(&self, g: &Geofence) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO geofences
             (geofence_id, company_id, name, fence_type, polygon, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                g.geofence_id,
                g.company_id,
                g.name,
                g.fence_type,
                g.polygon,
                g.is_active as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_active_geofences(&self, company_id: &str) -> DetectResult<Vec<Geofence>> {
        let mut stmt = self.conn.prepare(
            "SELECT geofence_id, company_id, name, fence_type, polygon, is_active
             FROM geofences WHERE company_id = ?1 AND is_active = 1
             ORDER BY geofence_id",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok(Geofence {
                geofence_id: row.get(0)?,
                company_id: row.get(1)?,
                name: row.get(2)?,
                fence_type: row.get(3)?,
                polygon: row.get(4)?,
                is_active: row.get::<_, i64>(5)? != 0,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
