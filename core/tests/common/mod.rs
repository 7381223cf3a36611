#![allow(dead_code)]

//! Shared fixtures: an in-memory store plus terse record builders.

use chrono::{DateTime, Duration, TimeZone, Utc};
use fleetfraud_core::{
    config::DetectionConfig,
    engine::DetectionEngine,
    store::{Driver, FleetStore, FraudAlert, FuelTransaction, GpsPosition, Route, Trip, Vehicle},
    types::{AlertStatus, Severity},
};

pub const COMPANY: &str = "acme-logistics";

/// Fixed reference time so every run sees identical windows.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub fn store() -> FleetStore {
    let store = FleetStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

pub fn engine(store: FleetStore) -> DetectionEngine {
    DetectionEngine::build_default(store, DetectionConfig::default())
}

pub fn vehicle(id: &str, capacity: f64) -> Vehicle {
    Vehicle {
        vehicle_id: id.into(),
        company_id: COMPANY.into(),
        plate: format!("PL-{id}"),
        fuel_type: "diesel".into(),
        fuel_capacity: capacity,
        risk_score: 0.0,
        status: "active".into(),
    }
}

pub fn driver(id: &str) -> Driver {
    Driver {
        driver_id: id.into(),
        company_id: COMPANY.into(),
        name: format!("Driver {id}"),
        license_number: format!("LIC-{id}"),
        risk_score: 0.0,
        status: "active".into(),
    }
}

pub fn route(id: &str, expected_km: f64) -> Route {
    Route {
        route_id: id.into(),
        company_id: COMPANY.into(),
        name: format!("Route {id}"),
        expected_distance_km: expected_km,
    }
}

/// Completed trip with a consistent odometer delta.
pub fn trip(
    id: &str,
    vehicle_id: &str,
    driver_id: &str,
    start: DateTime<Utc>,
    start_odometer: f64,
    distance: f64,
    fuel: f64,
) -> Trip {
    Trip {
        trip_id: id.into(),
        company_id: COMPANY.into(),
        vehicle_id: vehicle_id.into(),
        driver_id: driver_id.into(),
        route_id: None,
        start_time: start,
        end_time: Some(start + Duration::hours(2)),
        start_odometer,
        end_odometer: start_odometer + distance,
        distance_traveled: distance,
        fuel_consumed: fuel,
        status: "completed".into(),
    }
}

pub fn gps(vehicle_id: &str, at: DateTime<Utc>, speed: f64) -> GpsPosition {
    GpsPosition {
        id: None,
        company_id: COMPANY.into(),
        trip_id: None,
        vehicle_id: vehicle_id.into(),
        timestamp: at,
        latitude: 52.5,
        longitude: 13.4,
        speed,
        heading: 0.0,
    }
}

pub fn fuel_txn(
    id: &str,
    vehicle_id: &str,
    driver_id: &str,
    at: DateTime<Utc>,
    amount: f64,
) -> FuelTransaction {
    FuelTransaction {
        transaction_id: id.into(),
        company_id: COMPANY.into(),
        vehicle_id: vehicle_id.into(),
        driver_id: driver_id.into(),
        transaction_date: at,
        fuel_amount: amount,
        fuel_cost: amount * 1.6,
        odometer_reading: None,
        trip_id: None,
        location: Some("Depot Station".into()),
    }
}

pub fn alert(
    id: &str,
    alert_type: &str,
    severity: Severity,
    created_at: DateTime<Utc>,
    vehicle_id: Option<&str>,
    driver_id: Option<&str>,
) -> FraudAlert {
    FraudAlert {
        alert_id: id.into(),
        company_id: COMPANY.into(),
        alert_type: alert_type.into(),
        severity,
        status: AlertStatus::Open,
        vehicle_id: vehicle_id.map(Into::into),
        driver_id: driver_id.map(Into::into),
        trip_id: None,
        fuel_transaction_id: None,
        title: alert_type.into(),
        description: String::new(),
        details: serde_json::json!({}),
        fingerprint: format!("fp-{id}"),
        created_at,
        resolved_at: None,
        resolution_notes: None,
    }
}
