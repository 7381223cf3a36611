//! Fuel transaction queries.

use super::{FleetStore, FuelTransaction, from_secs, to_secs};
use crate::error::DetectResult;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

fn txn_from_row(row: &Row<'_>) -> rusqlite::Result<FuelTransaction> {
    Ok(FuelTransaction {
        transaction_id: row.get(0)?,
        company_id: row.get(1)?,
        vehicle_id: row.get(2)?,
        driver_id: row.get(3)?,
        transaction_date: from_secs(row.get(4)?),
        fuel_amount: row.get(5)?,
        fuel_cost: row.get(6)?,
        odometer_reading: row.get(7)?,
        trip_id: row.get(8)?,
        location: row.get(9)?,
    })
}

const TXN_COLS: &str = "transaction_id, company_id, vehicle_id, driver_id,
    transaction_date, fuel_amount, fuel_cost, odometer_reading, trip_id, location";

impl FleetStore {
    pub fn insert_fuel_transaction(&self, t: &FuelTransaction) -> DetectResult<()> {
        self.conn.execute(
            "INSERT INTO fuel_transactions
             (transaction_id, company_id, vehicle_id, driver_id, transaction_date,
              fuel_amount, fuel_cost, odometer_reading, trip_id, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                t.transaction_id,
                t.company_id,
                t.vehicle_id,
                t.driver_id,
                to_secs(t.transaction_date),
                t.fuel_amount,
                t.fuel_cost,
                t.odometer_reading,
                t.trip_id,
                t.location,
            ],
        )?;
        Ok(())
    }

    /// All transactions on or after `since`, oldest first.
    pub fn get_fuel_transactions_since(
        &self,
        company_id: &str,
        since: DateTime<Utc>,
    ) -> DetectResult<Vec<FuelTransaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLS} FROM fuel_transactions
             WHERE company_id = ?1 AND transaction_date >= ?2
             ORDER BY transaction_date ASC",
        ))?;
        let rows = stmt.query_map(params![company_id, to_secs(since)], txn_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
