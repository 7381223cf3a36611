//! Best-effort alert fan-out.
//!
//! Sinks receive every newly created alert. A sink failure is logged and
//! swallowed — notification is never allowed to fail a detection run.

use crate::store::FraudAlert;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "X-Fleet-Fraud-Signature";

/// The wire shape delivered to registered webhook endpoints. The body is
/// signed as exact bytes, so the signer and the serializer must agree.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub event_type: &'a str,
    pub timestamp: DateTime<Utc>,
    pub alert: &'a FraudAlert,
    pub company_id: &'a str,
}

impl<'a> WebhookPayload<'a> {
    pub fn alert_created(alert: &'a FraudAlert, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: "fraud_alert.created",
            timestamp,
            alert,
            company_id: &alert.company_id,
        }
    }
}

/// A destination for newly created alerts.
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    fn deliver(&self, alert: &FraudAlert) -> anyhow::Result<()>;
}

/// Deliver to every sink, logging failures and moving on.
pub fn fan_out(sinks: &[Box<dyn AlertSink>], alert: &FraudAlert) {
    for sink in sinks {
        if let Err(e) = sink.deliver(alert) {
            log::warn!(
                "sink '{}' failed for alert {}: {e}",
                sink.name(),
                alert.alert_id
            );
        }
    }
}
