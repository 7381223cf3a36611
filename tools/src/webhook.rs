//! Signed webhook delivery.
//!
//! Serializes the payload once, signs those exact bytes with
//! HMAC-SHA256 under the per-webhook secret, and posts them with the
//! signature header. Failures are logged by the engine's fan-out and
//! never retried.

use anyhow::Context;
use chrono::Utc;
use fleetfraud_core::{
    notify::{AlertSink, SIGNATURE_HEADER, WebhookPayload},
    store::FraudAlert,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub struct WebhookSink {
    name: String,
    url: String,
    secret: String,
    client: reqwest::blocking::Client,
}

impl WebhookSink {
    pub fn new(name: &str, url: &str, secret: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building webhook client")?;
        Ok(Self {
            name: format!("webhook:{name}"),
            url: url.to_string(),
            secret: secret.to_string(),
            client,
        })
    }
}

/// Hex HMAC-SHA256 over the exact body bytes.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn deliver(&self, alert: &FraudAlert) -> anyhow::Result<()> {
        let payload = WebhookPayload::alert_created(alert, Utc::now());
        let body = serde_json::to_vec(&payload)?;
        let signature = format!("sha256={}", sign(self.secret.as_bytes(), &body));

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .with_context(|| format!("POST {}", self.url))?;

        anyhow::ensure!(
            response.status().is_success(),
            "webhook endpoint returned {}",
            response.status()
        );
        log::debug!("delivered alert {} to {}", alert.alert_id, self.url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RFC 4231 test case 2.
    #[test]
    fn hmac_known_vector() {
        let sig = sign(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn signature_changes_with_secret() {
        let body = br#"{"event_type":"fraud_alert.created"}"#;
        assert_ne!(sign(b"secret-a", body), sign(b"secret-b", body));
    }
}
