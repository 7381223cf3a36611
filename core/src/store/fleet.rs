//! Vehicle, driver, route, and trip queries.

use super::{FleetStore, Driver, Route, Trip, Vehicle, from_secs, opt_secs, to_secs};
use crate::error::DetectResult;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

fn trip_from_row(row: &Row<'_>) -> rusqlite::Result<Trip> {
    Ok(Trip {
        trip_id: row.get(0)?,
        company_id: row.get(1)?,
        vehicle_id: row.get(2)?,
        driver_id: row.get(3)?,
        route_id: row.get(4)?,
        start_time: from_secs(row.get(5)?),
        end_time: row.get::<_, Option<i64>>(6)?.map(from_secs),
        start_odometer: row.get(7)?,
        end_odometer: row.get(8)?,
        distance_traveled: row.get(9)?,
        fuel_consumed: row.get(10)?,
        status: row.get(11)?,
    })
}

const TRIP_COLS: &str = "trip_id, company_id, vehicle_id, driver_id, route_id,
    start_time, end_time, start_odometer, end_odometer,
    distance_traveled, fuel_consumed, status";

impl FleetStore {
    // ── Vehicles ───────────────────────────────────────────────────

    pub fn insert_vehicle(&self, v: &Vehicle) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO vehicles
             (vehicle_id, company_id, plate, fuel_type, fuel_capacity, risk_score, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                v.vehicle_id,
                v.company_id,
                v.plate,
                v.fuel_type,
                v.fuel_capacity,
                v.risk_score,
                v.status,
            ],
        )?;
        Ok(())
    }

    pub fn get_vehicle(&self, company_id: &str, vehicle_id: &str) -> DetectResult<Option<Vehicle>> {
        let row = self
            .conn
            .query_row(
                "SELECT vehicle_id, company_id, plate, fuel_type, fuel_capacity, risk_score, status
                 FROM vehicles WHERE company_id = ?1 AND vehicle_id = ?2",
                params![company_id, vehicle_id],
                |row| {
                    Ok(Vehicle {
                        vehicle_id: row.get(0)?,
                        company_id: row.get(1)?,
                        plate: row.get(2)?,
                        fuel_type: row.get(3)?,
                        fuel_capacity: row.get(4)?,
                        risk_score: row.get(5)?,
                        status: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_vehicles(&self, company_id: &str) -> DetectResult<Vec<Vehicle>> {
        let mut stmt = self.conn.prepare(
            "SELECT vehicle_id, company_id, plate, fuel_type, fuel_capacity, risk_score, status
             FROM vehicles WHERE company_id = ?1 ORDER BY vehicle_id",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok(Vehicle {
                vehicle_id: row.get(0)?,
                company_id: row.get(1)?,
                plate: row.get(2)?,
                fuel_type: row.get(3)?,
                fuel_capacity: row.get(4)?,
                risk_score: row.get(5)?,
                status: row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_vehicle_risk_score(
        &self,
        company_id: &str,
        vehicle_id: &str,
        score: f64,
    ) -> DetectResult<()> {
        self.conn.execute(
            "UPDATE vehicles SET risk_score = ?3 WHERE company_id = ?1 AND vehicle_id = ?2",
            params![company_id, vehicle_id, score],
        )?;
        Ok(())
    }

    // ── Drivers ────────────────────────────────────────────────────

    pub fn insert_driver(&self, d: &Driver) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO drivers
             (driver_id, company_id, name, license_number, risk_score, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                d.driver_id,
                d.company_id,
                d.name,
                d.license_number,
                d.risk_score,
                d.status,
            ],
        )?;
        Ok(())
    }

    pub fn get_driver(&self, company_id: &str, driver_id: &str) -> DetectResult<Option<Driver>> {
        let row = self
            .conn
            .query_row(
                "SELECT driver_id, company_id, name, license_number, risk_score, status
                 FROM drivers WHERE company_id = ?1 AND driver_id = ?2",
                params![company_id, driver_id],
                |row| {
                    Ok(Driver {
                        driver_id: row.get(0)?,
                        company_id: row.get(1)?,
                        name: row.get(2)?,
                        license_number: row.get(3)?,
                        risk_score: row.get(4)?,
                        status: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_drivers(&self, company_id: &str) -> DetectResult<Vec<Driver>> {
        let mut stmt = self.conn.prepare(
            "SELECT driver_id, company_id, name, license_number, risk_score, status
             FROM drivers WHERE company_id = ?1 ORDER BY driver_id",
        )?;
        let rows = stmt.query_map(params![company_id], |row| {
            Ok(Driver {
                driver_id: row.get(0)?,
                company_id: row.get(1)?,
                name: row.get(2)?,
                license_number: row.get(3)?,
                risk_score: row.get(4)?,
                status: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_driver_risk_score(
        &self,
        company_id: &str,
        driver_id: &str,
        score: f64,
    ) -> DetectResult<()> {
        self.conn.execute(
            "UPDATE drivers SET risk_score = ?3 WHERE company_id = ?1 AND driver_id = ?2",
            params![company_id, driver_id, score],
        )?;
        Ok(())
    }

    // ── Routes ─────────────────────────────────────────────────────

    pub fn insert_route(&self, r: &Route) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO routes (route_id, company_id, name, expected_distance_km)
             VALUES (?1, ?2, ?3, ?4)",
            params![r.route_id, r.company_id, r.name, r.expected_distance_km],
        )?;
        Ok(())
    }

    pub fn get_route(&self, company_id: &str, route_id: &str) -> DetectResult<Option<Route>> {
        let row = self
            .conn
            .query_row(
                "SELECT route_id, company_id, name, expected_distance_km
                 FROM routes WHERE company_id = ?1 AND route_id = ?2",
                params![company_id, route_id],
                |row| {
                    Ok(Route {
                        route_id: row.get(0)?,
                        company_id: row.get(1)?,
                        name: row.get(2)?,
                        expected_distance_km: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ── Trips ──────────────────────────────────────────────────────

    pub fn insert_trip(&self, t: &Trip) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO trips
             (trip_id, company_id, vehicle_id, driver_id, route_id, start_time, end_time,
              start_odometer, end_odometer, distance_traveled, fuel_consumed, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                t.trip_id,
                t.company_id,
                t.vehicle_id,
                t.driver_id,
                t.route_id,
                to_secs(t.start_time),
                opt_secs(t.end_time),
                t.start_odometer,
                t.end_odometer,
                t.distance_traveled,
                t.fuel_consumed,
                t.status,
            ],
        )?;
        Ok(())
    }

    /// Trips that started inside [start, end], any status, oldest first.
    pub fn get_trips_started_in_window(
        &self,
        company_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DetectResult<Vec<Trip>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRIP_COLS} FROM trips
             WHERE company_id = ?1 AND start_time >= ?2 AND start_time <= ?3
             ORDER BY start_time ASC",
        ))?;
        let rows = stmt.query_map(
            params![company_id, to_secs(start), to_secs(end)],
            trip_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Completed trips ending on or after `since`, ordered per vehicle by
    /// end time so callers can walk consecutive pairs.
    pub fn get_completed_trips_since(
        &self,
        company_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<Vec<Trip>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRIP_COLS} FROM trips
             WHERE company_id = ?1 AND status = 'completed'
               AND end_time IS NOT NULL AND end_time >= ?2
             ORDER BY vehicle_id ASC, end_time ASC",
        ))?;
        let rows = stmt.query_map(params![company_id, to_secs(since)], trip_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_trips_for_driver_since(
        &self,
        company_id: &str,
        driver_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM trips
             WHERE company_id = ?1 AND driver_id = ?2 AND start_time >= ?3",
            params![company_id, driver_id, to_secs(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_trips_for_vehicle_since(
        &self,
        company_id: &str,
        vehicle_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM trips
             WHERE company_id = ?1 AND vehicle_id = ?2 AND start_time >= ?3",
            params![company_id, vehicle_id, to_secs(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// True when the vehicle has any trip starting within `margin_secs`
    /// either side of `center`. Used by the fueling-without-trip check.
    pub fn vehicle_has_trip_near(
        &self,
        company_id: &str,
        vehicle_id: &str,
        center: DateTime<Utc>,
        margin_secs: i64,
    ) -> DetectResult<bool> {
        let lo = to_secs(center) - margin_secs;
        let hi = to_secs(center) + margin_secs;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM trips
             WHERE company_id = ?1 AND vehicle_id = ?2
               AND start_time >= ?3 AND start_time <= ?4",
            params![company_id, vehicle_id, lo, hi],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
