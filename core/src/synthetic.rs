//! Deterministic demo fleet generator.
//!
//! Seeds a small company with a month of plausible activity, then
//! injects one instance of each anomaly class so a full detection run
//! exercises every rule. All randomness flows through DemoRng: the same
//! seed always produces the same database.
//!
//! Baseline trips run on vehicles 0 and 1 with continuous odometers and
//! fixed day slots, so the clean data never trips the odometer checks.
//! Each anomaly lives on its own vehicle.

use crate::{
    error::DetectResult,
    rng::DemoRng,
    store::{Driver, FleetStore, FuelTransaction, Geofence, GpsPosition, Route, Trip, Vehicle},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const FUEL_TYPES: [&str; 2] = ["diesel", "petrol"];
const LOCATIONS: [&str; 4] = [
    "Shell A10 North",
    "BP Riverside",
    "Total Depot Road",
    "Esso Junction 4",
];
/// Start hours for the three daily trip slots. Slot order matches
/// insertion order, so per-vehicle odometer and time advance together.
const DAY_SLOTS: [i64; 3] = [7, 11, 15];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoSummary {
    pub vehicles: usize,
    pub drivers: usize,
    pub routes: usize,
    pub trips: usize,
    pub fuel_transactions: usize,
    pub gps_positions: usize,
    pub geofences: usize,
}

/// Anchor `days_back` days before `now`, at `hour`:`minute` UTC.
fn day_at(now: DateTime<Utc>, days_back: i64, hour: i64, minute: i64) -> DateTime<Utc> {
    let midnight = (now - Duration::days(days_back))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    midnight + Duration::hours(hour) + Duration::minutes(minute)
}

pub fn seed_demo_fleet(
    store: &FleetStore,
    company_id: &str,
    seed: u64,
    now: DateTime<Utc>,
) -> DetectResult<DemoSummary> {
    let mut rng = DemoRng::stream(seed, 0);
    let mut summary = DemoSummary::default();

    // ── Fleet ──────────────────────────────────────────────────────
    let vehicle_count = 6usize;
    let mut odometers = Vec::with_capacity(vehicle_count);
    for i in 0..vehicle_count {
        let fuel_type = FUEL_TYPES[i % FUEL_TYPES.len()];
        store.insert_vehicle(&Vehicle {
            vehicle_id: format!("veh-{i:03}"),
            company_id: company_id.to_string(),
            plate: format!("FL-{:04}", 1000 + i),
            fuel_type: fuel_type.to_string(),
            fuel_capacity: 80.0,
            risk_score: 0.0,
            status: "active".into(),
        })?;
        odometers.push(10_000.0 + rng.range_f64(0.0, 40_000.0));
        summary.vehicles += 1;
    }

    let driver_count = 8usize;
    for i in 0..driver_count {
        store.insert_driver(&Driver {
            driver_id: format!("drv-{i:03}"),
            company_id: company_id.to_string(),
            name: format!("Driver {i}"),
            license_number: format!("LIC-{:06}", 420_000 + i),
            risk_score: 0.0,
            status: "active".into(),
        })?;
        summary.drivers += 1;
    }

    let route_distances = [40.0, 80.0, 120.0];
    for (i, distance) in route_distances.iter().enumerate() {
        store.insert_route(&Route {
            route_id: format!("route-{i}"),
            company_id: company_id.to_string(),
            name: format!("Route {i}"),
            expected_distance_km: *distance,
        })?;
        summary.routes += 1;
    }

    // ── A month of clean baseline trips on vehicles 0 and 1 ────────
    let mut trip_seq = 0usize;
    for days_back in (1..=28i64).rev() {
        for slot_hour in DAY_SLOTS {
            let vehicle = rng.next_u64_below(2) as usize;
            let driver = rng.next_u64_below(driver_count as u64) as usize;
            let route = rng.next_u64_below(route_distances.len() as u64) as usize;
            let distance = route_distances[route] * rng.range_f64(0.95, 1.05);
            let fuel = distance / rng.range_f64(7.0, 9.0);
            let start = day_at(now, days_back, slot_hour, 0);
            let duration_mins = (distance / 55.0 * 60.0) as i64;
            let start_odo = odometers[vehicle];
            odometers[vehicle] += distance;

            let trip_id = format!("trip-{trip_seq:04}");
            store.insert_trip(&Trip {
                trip_id: trip_id.clone(),
                company_id: company_id.to_string(),
                vehicle_id: format!("veh-{vehicle:03}"),
                driver_id: format!("drv-{driver:03}"),
                route_id: Some(format!("route-{route}")),
                start_time: start,
                end_time: Some(start + Duration::minutes(duration_mins)),
                start_odometer: start_odo,
                end_odometer: start_odo + distance,
                distance_traveled: distance,
                fuel_consumed: fuel,
                status: "completed".into(),
            })?;
            trip_seq += 1;
            summary.trips += 1;

            // Roughly every third trip gets a linked refuel.
            if rng.chance(0.33) {
                store.insert_fuel_transaction(&FuelTransaction {
                    transaction_id: format!("fuel-{trip_seq:04}"),
                    company_id: company_id.to_string(),
                    vehicle_id: format!("veh-{vehicle:03}"),
                    driver_id: format!("drv-{driver:03}"),
                    transaction_date: start + Duration::minutes(duration_mins + 15),
                    fuel_amount: rng.range_f64(35.0, 60.0),
                    fuel_cost: rng.range_f64(60.0, 110.0),
                    odometer_reading: Some(start_odo + distance),
                    trip_id: Some(trip_id.clone()),
                    location: Some(rng.pick(&LOCATIONS).to_string()),
                })?;
                summary.fuel_transactions += 1;
            }
        }
    }

    // Benign GPS trail over the last few hours, city speeds.
    for i in 0..20i64 {
        store.insert_gps_position(&GpsPosition {
            id: None,
            company_id: company_id.to_string(),
            trip_id: None,
            vehicle_id: format!("veh-{:03}", (i % 2) as usize),
            timestamp: now - Duration::minutes(10 + i * 15),
            latitude: 52.0 + rng.range_f64(-0.3, 0.0),
            longitude: 13.3 + rng.range_f64(-0.3, 0.0),
            speed: rng.range_f64(40.0, 110.0),
            heading: rng.range_f64(0.0, 360.0),
        })?;
        summary.gps_positions += 1;
    }

    // ── Injected anomalies, one vehicle each ───────────────────────

    // Odometer rollback: veh-000's newest trip starts 200 km below the
    // previous end.
    let rolled_start = odometers[0] - 200.0;
    store.insert_trip(&Trip {
        trip_id: "trip-rollback".into(),
        company_id: company_id.to_string(),
        vehicle_id: "veh-000".into(),
        driver_id: "drv-000".into(),
        route_id: Some("route-0".into()),
        start_time: now - Duration::hours(3),
        end_time: Some(now - Duration::hours(2)),
        start_odometer: rolled_start,
        end_odometer: rolled_start + 40.0,
        distance_traveled: 40.0,
        fuel_consumed: 5.0,
        status: "completed".into(),
    })?;
    summary.trips += 1;

    // Overfill: 95 L into an 80 L tank.
    store.insert_fuel_transaction(&FuelTransaction {
        transaction_id: "fuel-overfill".into(),
        company_id: company_id.to_string(),
        vehicle_id: "veh-001".into(),
        driver_id: "drv-001".into(),
        transaction_date: day_at(now, 1, 12, 30),
        fuel_amount: 95.0,
        fuel_cost: 160.0,
        odometer_reading: None,
        trip_id: None,
        location: Some(LOCATIONS[0].to_string()),
    })?;
    summary.fuel_transactions += 1;

    // Speeding: one high and one extreme fix on separate vehicles, both
    // inside the depot hazard zone so a wired geometry backend flags
    // them too.
    for (vehicle_id, speed) in [("veh-002", 150.0), ("veh-004", 190.0)] {
        store.insert_gps_position(&GpsPosition {
            id: None,
            company_id: company_id.to_string(),
            trip_id: None,
            vehicle_id: vehicle_id.into(),
            timestamp: now - Duration::hours(1),
            latitude: 52.1,
            longitude: 13.4,
            speed,
            heading: 90.0,
        })?;
        summary.gps_positions += 1;
    }

    // Route deviation: veh-002's only trip runs 60% over plan.
    store.insert_trip(&Trip {
        trip_id: "trip-detour".into(),
        company_id: company_id.to_string(),
        vehicle_id: "veh-002".into(),
        driver_id: "drv-002".into(),
        route_id: Some("route-1".into()),
        start_time: now - Duration::hours(5),
        end_time: Some(now - Duration::hours(4)),
        start_odometer: 500.0,
        end_odometer: 628.0,
        distance_traveled: 128.0,
        fuel_consumed: 16.0,
        status: "completed".into(),
    })?;
    summary.trips += 1;

    // After-hours: veh-003's only trip starts at 23:00.
    store.insert_trip(&Trip {
        trip_id: "trip-night".into(),
        company_id: company_id.to_string(),
        vehicle_id: "veh-003".into(),
        driver_id: "drv-003".into(),
        route_id: None,
        start_time: day_at(now, 2, 23, 0),
        end_time: Some(day_at(now, 1, 1, 0)),
        start_odometer: 700.0,
        end_odometer: 730.0,
        distance_traveled: 30.0,
        fuel_consumed: 4.0,
        status: "completed".into(),
    })?;
    summary.trips += 1;

    // Rapid consecutive fueling: 20 minutes apart on veh-004.
    for (i, minute) in [0i64, 20].into_iter().enumerate() {
        store.insert_fuel_transaction(&FuelTransaction {
            transaction_id: format!("fuel-rapid-{i}"),
            company_id: company_id.to_string(),
            vehicle_id: "veh-004".into(),
            driver_id: "drv-004".into(),
            transaction_date: day_at(now, 1, 10, minute),
            fuel_amount: 30.0,
            fuel_cost: 50.0,
            odometer_reading: None,
            trip_id: None,
            location: Some(LOCATIONS[1].to_string()),
        })?;
        summary.fuel_transactions += 1;
    }

    // Fueling without a trip: veh-005 never drives.
    store.insert_fuel_transaction(&FuelTransaction {
        transaction_id: "fuel-phantom".into(),
        company_id: company_id.to_string(),
        vehicle_id: "veh-005".into(),
        driver_id: "drv-005".into(),
        transaction_date: day_at(now, 3, 14, 0),
        fuel_amount: 45.0,
        fuel_cost: 75.0,
        odometer_reading: None,
        trip_id: None,
        location: Some(LOCATIONS[2].to_string()),
    })?;
    summary.fuel_transactions += 1;

    // An exclusion zone around the depot approach.
    store.insert_geofence(&Geofence {
        geofence_id: "gf-depot".into(),
        company_id: company_id.to_string(),
        name: "Hazard zone".into(),
        fence_type: "exclusion".into(),
        polygon: r#"[[13.35, 52.05], [13.45, 52.05], [13.45, 52.15], [13.35, 52.15]]"#.into(),
        is_active: true,
    })?;
    summary.geofences += 1;

    log::info!(
        "company={company_id} demo fleet seeded: {} trips, {} fuel txns",
        summary.trips,
        summary.fuel_transactions
    );
    Ok(summary)
}
