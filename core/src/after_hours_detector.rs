//! After-hours vehicle usage detection.
//!
//! A trip is flagged when its start hour is >= start_hour OR <= end_hour.
//! The OR of two one-sided conditions spans midnight: 23:00 trips match
//! the first arm, 05:00 trips the second.

use crate::{
    config::AfterHoursConfig,
    detector::{DetectionContext, Detector},
    error::DetectResult,
    indicator::Indicator,
    types::Severity,
};
use chrono::{Duration, Timelike};

pub struct AfterHoursDetector {
    cfg: AfterHoursConfig,
}

impl AfterHoursDetector {
    pub fn new(cfg: AfterHoursConfig) -> Self {
        Self { cfg }
    }
}

fn is_after_hours(hour: u32, cfg: &AfterHoursConfig) -> bool {
    hour >= cfg.start_hour || hour <= cfg.end_hour
}

impl Detector for AfterHoursDetector {
    fn name(&self) -> &'static str {
        "after_hours_usage"
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectResult<Vec<Indicator>> {
        let since = ctx.now - Duration::days(self.cfg.lookback_days);
        let trips = ctx
            .store
            .get_trips_started_in_window(ctx.company_id, since, ctx.now)?;

        let mut indicators = Vec::new();
        for trip in trips {
            let hour = trip.start_time.hour();
            if !is_after_hours(hour, &self.cfg) {
                continue;
            }
            indicators.push(Indicator {
                kind: "after_hours_usage".into(),
                severity: Severity::Medium,
                vehicle_id: Some(trip.vehicle_id.clone()),
                driver_id: Some(trip.driver_id.clone()),
                trip_id: Some(trip.trip_id.clone()),
                fuel_transaction_id: None,
                title: "After-hours vehicle usage".into(),
                reason: format!("Trip started at {hour:02}:00, outside working hours"),
                details: serde_json::json!({
                    "start_hour": hour,
                    "window_start_hour": self.cfg.start_hour,
                    "window_end_hour": self.cfg.end_hour,
                }),
                evidence_time: trip.start_time,
            });
        }
        Ok(indicators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_midnight() {
        let cfg = AfterHoursConfig::default();
        assert!(is_after_hours(22, &cfg));
        assert!(is_after_hours(23, &cfg));
        assert!(is_after_hours(0, &cfg));
        assert!(is_after_hours(6, &cfg));
        assert!(!is_after_hours(7, &cfg));
        assert!(!is_after_hours(12, &cfg));
        assert!(!is_after_hours(21, &cfg));
    }
}
