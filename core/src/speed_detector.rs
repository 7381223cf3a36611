//! Speed violation detection.
//!
//! Batch scan over recent GPS positions plus a single-position check for
//! callers evaluating a live fix. The two entry points intentionally use
//! different critical multipliers (1.5 batch, 1.2 real-time), matching
//! the source system; both are config knobs.

use crate::{
    config::SpeedConfig,
    detector::{DetectionContext, Detector},
    error::DetectResult,
    indicator::Indicator,
    store::GpsPosition,
    types::Severity,
};
use chrono::Duration;

pub struct SpeedDetector {
    cfg: SpeedConfig,
}

impl SpeedDetector {
    pub fn new(cfg: SpeedConfig) -> Self {
        Self { cfg }
    }
}

/// Severity for a batch-scan hit.
fn batch_severity(speed: f64, cfg: &SpeedConfig) -> Severity {
    if speed > cfg.threshold_kmh * cfg.batch_critical_multiplier {
        Severity::Critical
    } else {
        Severity::High
    }
}

fn indicator_for(position: &GpsPosition, severity: Severity, cfg: &SpeedConfig) -> Indicator {
    Indicator {
        kind: "speed_violation".into(),
        severity,
        vehicle_id: Some(position.vehicle_id.clone()),
        driver_id: None,
        trip_id: position.trip_id.clone(),
        fuel_transaction_id: None,
        title: "Speed violation".into(),
        reason: format!(
            "Recorded {:.1} km/h against a limit of {:.0} km/h",
            position.speed, cfg.threshold_kmh
        ),
        details: serde_json::json!({
            "speed_kmh": position.speed,
            "threshold_kmh": cfg.threshold_kmh,
            "latitude": position.latitude,
            "longitude": position.longitude,
        }),
        evidence_time: position.timestamp,
    }
}

/// Real-time check for a single position, e.g. on GPS ingestion.
/// Uses the real-time critical multiplier.
pub fn check_position(cfg: &SpeedConfig, position: &GpsPosition) -> Option<Indicator> {
    if position.speed <= cfg.threshold_kmh {
        return None;
    }
    let severity = if position.speed > cfg.threshold_kmh * cfg.realtime_critical_multiplier {
        Severity::Critical
    } else {
        Severity::High
    };
    Some(indicator_for(position, severity, cfg))
}

impl Detector for SpeedDetector {
    fn name(&self) -> &'static str {
        "speed_violation"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectResult<Vec<Indicator>> {
        let since = ctx.now - Duration::hours(self.cfg.lookback_hours);
        let positions =
            ctx.store
                .get_positions_over_speed(ctx.company_id, since, self.cfg.threshold_kmh)?;

        let indicators: Vec<Indicator> = positions
            .iter()
            .map(|p| indicator_for(p, batch_severity(p.speed, &self.cfg), &self.cfg))
            .collect();

        if !indicators.is_empty() {
            log::warn!(
                "company={} {} speed violations in the last {}h",
                ctx.company_id,
                indicators.len(),
                self.cfg.lookback_hours
            );
        }
        Ok(indicators)
    }
}
