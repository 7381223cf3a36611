//! fraud-scan: headless detection runner for fleet fraud analysis.
//!
//! Usage:
//!   fraud-scan --db fleet.db --company demo --seed-demo --detect
//!   fraud-scan --db fleet.db --company demo --detector speed_violation --dry-run
//!   fraud-scan --db fleet.db --company demo --risk --analyze
//!   fraud-scan --db fleet.db --company demo --detect \
//!       --webhook-url https://ops.example/hook --webhook-secret s3cret

mod geometry;
mod webhook;

use anyhow::Result;
use chrono::Utc;
use fleetfraud_core::{
    analytics::analyze_company,
    config::DetectionConfig,
    engine::DetectionEngine,
    risk_scoring::{recalculate_driver, recalculate_vehicle},
    store::FleetStore,
    synthetic::seed_demo_fleet,
};
use geometry::PlanarGeometry;
use std::env;
use std::sync::Arc;
use webhook::WebhookSink;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") {
        print_usage();
        return Ok(());
    }

    let db = parse_string(&args, "--db", ":memory:");
    let company = parse_string(&args, "--company", "demo");
    let seed = parse_arg(&args, "--seed", 42u64);
    let window_days = parse_arg(&args, "--window-days", 30i64);
    let dry_run = has_flag(&args, "--dry-run");

    let config = match opt_string(&args, "--config") {
        Some(path) => DetectionConfig::load(&path)?,
        None => DetectionConfig::default(),
    };

    println!("fraud-scan");
    println!("  db:       {db}");
    println!("  company:  {company}");
    println!();

    let store = FleetStore::open(&db)?;
    store.migrate()?;
    let now = Utc::now();

    if has_flag(&args, "--seed-demo") {
        let summary = seed_demo_fleet(&store, &company, seed, now)?;
        println!("seeded demo fleet: {}", serde_json::to_string(&summary)?);
    }

    let mut engine = DetectionEngine::build(store, config, Arc::new(PlanarGeometry));

    for hook in engine.store.get_active_webhooks(&company)? {
        engine.add_sink(Box::new(WebhookSink::new(
            &hook.webhook_id,
            &hook.url,
            &hook.secret,
        )?));
    }
    if let (Some(url), Some(secret)) = (
        opt_string(&args, "--webhook-url"),
        opt_string(&args, "--webhook-secret"),
    ) {
        engine.add_sink(Box::new(WebhookSink::new("cli", &url, &secret)?));
    }

    if let Some(name) = opt_string(&args, "--detector") {
        let report = engine.run_one(&name, &company, now, dry_run)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if has_flag(&args, "--detect") {
        let report = engine.run_all(&company, now, dry_run)?;
        println!(
            "run {}: {} indicators, {} alerts created, {} detectors degraded",
            report.run_id, report.indicators_found, report.alerts_created, report.detectors_failed
        );
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if has_flag(&args, "--risk") {
        let cfg = engine.config().risk.clone();
        for driver in engine.store.get_drivers(&company)? {
            let (assessment, written) =
                recalculate_driver(&engine.store, &cfg, &company, &driver.driver_id, now)?;
            println!(
                "driver {} score {:.3} tier {} {}",
                driver.driver_id,
                assessment.score,
                assessment.tier.as_str(),
                if written { "(updated)" } else { "" }
            );
        }
        for vehicle in engine.store.get_vehicles(&company)? {
            let (assessment, written) =
                recalculate_vehicle(&engine.store, &cfg, &company, &vehicle.vehicle_id, now)?;
            println!(
                "vehicle {} score {:.3} tier {} {}",
                vehicle.vehicle_id,
                assessment.score,
                assessment.tier.as_str(),
                if written { "(updated)" } else { "" }
            );
        }
    }

    if has_flag(&args, "--analyze") {
        let report = analyze_company(
            &engine.store,
            &engine.config().analytics,
            &company,
            window_days,
            now,
        )?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn print_usage() {
    println!("fraud-scan — run fleet fraud detection against a SQLite database");
    println!();
    println!("  --db <path>             database file (default :memory:)");
    println!("  --company <id>          company scope (default demo)");
    println!("  --seed-demo             seed a deterministic demo fleet");
    println!("  --seed <n>              demo fleet seed (default 42)");
    println!("  --detect                run all detectors");
    println!("  --detector <name>       run a single detector");
    println!("  --dry-run               detect without writing alerts");
    println!("  --risk                  recalculate driver/vehicle risk scores");
    println!("  --analyze               aggregate alert patterns");
    println!("  --window-days <n>       analytics window (default 30)");
    println!("  --config <path>         JSON threshold overrides");
    println!("  --webhook-url <url>     deliver created alerts to this endpoint");
    println!("  --webhook-secret <s>    HMAC secret for --webhook-url");
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn parse_string(args: &[String], flag: &str, default: &str) -> String {
    opt_string(args, flag).unwrap_or_else(|| default.to_string())
}

fn opt_string(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
