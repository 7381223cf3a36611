//! Detector trait and invocation context.
//!
//! RULE: Every detection rule implements Detector.
//! Detectors only read from the store; they never insert alerts and
//! never mutate fleet records. The engine runs them in a fixed,
//! documented order per run.

use crate::{error::DetectResult, indicator::Indicator, store::FleetStore};
use chrono::{DateTime, Utc};

/// Everything a detector needs for one invocation. The store handle and
/// reference time are injected — detectors hold no hidden global state
/// and never read the wall clock themselves.
pub struct DetectionContext<'a> {
    pub store: &'a FleetStore,
    pub company_id: &'a str,
    pub now: DateTime<Utc>,
}

/// The contract every detection rule must fulfill.
///
/// - Returns an empty list on empty input, never an error.
/// - Deterministic given identical store contents and `now`.
pub trait Detector: Send {
    /// Unique stable name, also used to trigger a single rule by name.
    fn name(&self) -> &'static str;

    fn detect(&self, ctx: &DetectionContext<'_>) -> DetectResult<Vec<Indicator>>;
}
