//! Signed stats delivery.
//!
//! The body is serialized once; the HMAC-SHA256 digest is computed over
//! those bytes and the same buffer is sent. The collector recomputes the
//! digest from what it received, so any re-serialization in between would
//! be rejected.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use sha2::Sha256;
use tracing::info;

use crate::error::{TesterError, TesterResult};
use crate::types::JobStats;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> TesterResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| TesterError::Config {
        message: format!("invalid metrics secret: {}", e),
    })?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Serialized body and its signature. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    body: Vec<u8>,
    signature: String,
}

impl SignedPayload {
    pub fn new<T: Serialize>(value: &T, secret: &[u8]) -> TesterResult<Self> {
        let body = serde_json::to_vec(value).map_err(|e| TesterError::Build {
            message: format!("failed to serialize stats: {}", e),
        })?;
        let signature = sign_payload(secret, &body)?;
        Ok(Self { body, signature })
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// True when `signature` is the digest of `body` under `secret`.
    pub fn verify(body: &[u8], signature: &str, secret: &[u8]) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
            return false;
        };
        mac.update(body);
        match hex::decode(signature) {
            Ok(expected) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

/// Destination for per-job results.
#[async_trait]
pub trait StatsReporter: Send + Sync {
    /// Deliver one record. Called exactly once per dispatched tuple.
    async fn report(&self, stats: JobStats) -> TesterResult<()>;
}

/// Posts signed records to the stats collector.
#[derive(Debug, Clone)]
pub struct HttpStatsReporter {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
    timeout: Duration,
}

impl HttpStatsReporter {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            secret: secret.into(),
            timeout,
        }
    }

    /// Sign and POST any serializable record to `url`. One attempt, no retry.
    pub async fn post_signed<T: Serialize>(&self, url: &str, value: &T) -> TesterResult<()> {
        let payload = SignedPayload::new(value, self.secret.as_bytes())?;
        let SignedPayload { body, signature } = payload;

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(AUTHORIZATION, signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TesterError::Delivery {
                message: e.to_string(),
                status: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TesterError::Delivery {
                message: format!(
                    "invalid response status code from POST STATS [{}]",
                    status.as_u16()
                ),
                status: Some(status.as_u16()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StatsReporter for HttpStatsReporter {
    async fn report(&self, stats: JobStats) -> TesterResult<()> {
        self.post_signed(&self.endpoint, &stats).await?;
        info!(
            orchestrator = %stats.orchestrator,
            pipeline = %stats.pipeline,
            model = %stats.model,
            success = stats.success_rate,
            latency_secs = stats.round_trip_time,
            "posted stats"
        );
        Ok(())
    }
}
