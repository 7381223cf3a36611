//! Driver and vehicle risk scoring.
//!
//! A weighted sum over recent alert activity, clamped to [0, 1], mapped
//! onto a three-band tier. The cached score on the driver/vehicle row is
//! a denormalization: always re-derivable from alerts and trips. This is
//! a heuristic, not a calibrated classifier.

use crate::{
    config::RiskConfig,
    error::{DetectError, DetectResult},
    store::FleetStore,
    types::RiskTier,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub tier: RiskTier,
    pub alerts_in_window: i64,
    pub high_severity_alerts: i64,
    pub trips_in_window: i64,
    pub prior_score: f64,
}

/// The weighted-sum formula shared by both entity kinds. Pure; the
/// per-kind prior weight and volume threshold come in as arguments.
fn weighted_score(
    alerts_in_window: i64,
    high_severity_alerts: i64,
    trips_in_window: i64,
    prior_score: f64,
    prior_weight: f64,
    volume_threshold: i64,
    cfg: &RiskConfig,
) -> f64 {
    let alert_frequency = alerts_in_window as f64 / (trips_in_window.max(1)) as f64;
    let volume_bonus = if alerts_in_window > volume_threshold {
        cfg.volume_bonus
    } else {
        0.0
    };
    let sum = cfg.alert_frequency_weight * alert_frequency
        + cfg.high_severity_weight * high_severity_alerts as f64
        + prior_weight * prior_score
        + volume_bonus;
    sum.min(1.0).max(0.0)
}

/// Tier is a pure, total function of the score: every float in [0, 1]
/// lands in exactly one band.
pub fn tier_for(score: f64, cfg: &RiskConfig) -> RiskTier {
    if score > cfg.high_cutoff {
        RiskTier::High
    } else if score > cfg.medium_cutoff {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

pub fn assess_driver(
    store: &FleetStore,
    cfg: &RiskConfig,
    company_id: &str,
    driver_id: &str,
    now: DateTime<Utc>,
) -> DetectResult<RiskAssessment> {
    let driver = store
        .get_driver(company_id, driver_id)?
        .ok_or_else(|| DetectError::UnknownEntity {
            kind: "driver",
            id: driver_id.to_string(),
        })?;
    let since = now - Duration::days(cfg.window_days);

    let alerts = store.count_alerts_for_driver_since(company_id, driver_id, since)?;
    let high = store.count_high_severity_alerts_for_driver_since(company_id, driver_id, since)?;
    let trips = store.count_trips_for_driver_since(company_id, driver_id, since)?;

    let score = weighted_score(
        alerts,
        high,
        trips,
        driver.risk_score,
        cfg.driver_prior_weight,
        cfg.driver_volume_threshold,
        cfg,
    );
    Ok(RiskAssessment {
        score,
        tier: tier_for(score, cfg),
        alerts_in_window: alerts,
        high_severity_alerts: high,
        trips_in_window: trips,
        prior_score: driver.risk_score,
    })
}

pub fn assess_vehicle(
    store: &FleetStore,
    cfg: &RiskConfig,
    company_id: &str,
    vehicle_id: &str,
    now: DateTime<Utc>,
) -> DetectResult<RiskAssessment> {
    let vehicle = store
        .get_vehicle(company_id, vehicle_id)?
        .ok_or_else(|| DetectError::UnknownEntity {
            kind: "vehicle",
            id: vehicle_id.to_string(),
        })?;
    let since = now - Duration::days(cfg.window_days);

    let alerts = store.count_alerts_for_vehicle_since(company_id, vehicle_id, since)?;
    let high = store.count_high_severity_alerts_for_vehicle_since(company_id, vehicle_id, since)?;
    let trips = store.count_trips_for_vehicle_since(company_id, vehicle_id, since)?;

    let score = weighted_score(
        alerts,
        high,
        trips,
        vehicle.risk_score,
        cfg.vehicle_prior_weight,
        cfg.vehicle_volume_threshold,
        cfg,
    );
    Ok(RiskAssessment {
        score,
        tier: tier_for(score, cfg),
        alerts_in_window: alerts,
        high_severity_alerts: high,
        trips_in_window: trips,
        prior_score: vehicle.risk_score,
    })
}

/// Assess and persist the cached score when it moved more than the
/// write-back epsilon. Returns the assessment and whether it was written.
pub fn recalculate_driver(
    store: &FleetStore,
    cfg: &RiskConfig,
    company_id: &str,
    driver_id: &str,
    now: DateTime<Utc>,
) -> DetectResult<(RiskAssessment, bool)> {
    let assessment = assess_driver(store, cfg, company_id, driver_id, now)?;
    let moved = (assessment.score - assessment.prior_score).abs() > cfg.write_back_epsilon;
    if moved {
        store.update_driver_risk_score(company_id, driver_id, assessment.score)?;
        log::info!(
            "driver={driver_id} risk score {:.3} -> {:.3}",
            assessment.prior_score,
            assessment.score
        );
    }
    Ok((assessment, moved))
}

pub fn recalculate_vehicle(
    store: &FleetStore,
    cfg: &RiskConfig,
    company_id: &str,
    vehicle_id: &str,
    now: DateTime<Utc>,
) -> DetectResult<(RiskAssessment, bool)> {
    let assessment = assess_vehicle(store, cfg, company_id, vehicle_id, now)?;
    let moved = (assessment.score - assessment.prior_score).abs() > cfg.write_back_epsilon;
    if moved {
        store.update_vehicle_risk_score(company_id, vehicle_id, assessment.score)?;
        log::info!(
            "vehicle={vehicle_id} risk score {:.3} -> {:.3}",
            assessment.prior_score,
            assessment.score
        );
    }
    Ok((assessment, moved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_bounded() {
        let cfg = RiskConfig::default();
        // Pathological inputs still land in [0, 1].
        for (alerts, high, trips, prior) in [
            (0i64, 0i64, 0i64, 0.0),
            (100, 100, 1, 1.0),
            (3, 1, 50, 0.2),
            (7, 0, 0, 0.9),
        ] {
            let s = weighted_score(alerts, high, trips, prior, 0.3, 5, &cfg);
            assert!((0.0..=1.0).contains(&s), "score {s} out of bounds");
        }
    }

    #[test]
    fn no_activity_scores_zero() {
        let cfg = RiskConfig::default();
        assert_eq!(weighted_score(0, 0, 0, 0.0, 0.3, 5, &cfg), 0.0);
    }

    #[test]
    fn volume_bonus_applies_above_threshold() {
        let cfg = RiskConfig::default();
        let below = weighted_score(5, 0, 100, 0.0, 0.3, 5, &cfg);
        let above = weighted_score(6, 0, 100, 0.0, 0.3, 5, &cfg);
        assert!(above > below + 0.19, "expected the flat volume bonus");
    }

    #[test]
    fn tier_bands_are_total_and_disjoint() {
        let cfg = RiskConfig::default();
        let mut score = 0.0;
        while score <= 1.0 {
            // Every score maps to exactly one band.
            let tier = tier_for(score, &cfg);
            if score > cfg.high_cutoff {
                assert_eq!(tier, RiskTier::High);
            } else if score > cfg.medium_cutoff {
                assert_eq!(tier, RiskTier::Medium);
            } else {
                assert_eq!(tier, RiskTier::Low);
            }
            score += 0.01;
        }
    }
}
