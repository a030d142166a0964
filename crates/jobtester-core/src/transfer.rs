//! Copy raw transcoding stats from one collector to another.
//!
//! For every registered orchestrator the source collector's
//! `/api/raw_stats?orchestrator=<address>` is read and each record is
//! re-posted, signed, to the destination's `/api/post_stats`. Failures for a
//! single orchestrator or record are logged and skipped.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::client::GatewayClient;
use crate::error::{TesterError, TesterResult};
use crate::reporter::HttpStatsReporter;
use crate::types::TranscodeStats;

#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub source_api: String,
    pub destination_api: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub orchestrators: usize,
    pub posted: usize,
    pub failed: usize,
}

pub struct StatsTransfer {
    client: reqwest::Client,
    gateway: GatewayClient,
    destination: HttpStatsReporter,
    config: TransferConfig,
}

impl StatsTransfer {
    /// `destination` signs with its own secret; its endpoint is ignored in favour of `destination_api`.
    pub fn new(
        client: reqwest::Client,
        gateway: GatewayClient,
        destination: HttpStatsReporter,
        config: TransferConfig,
    ) -> Self {
        Self {
            client,
            gateway,
            destination,
            config,
        }
    }

    pub async fn run(&self) -> TesterResult<TransferSummary> {
        let orchestrators = self.gateway.registered_orchestrators().await?;
        let post_url = format!(
            "{}/api/post_stats",
            self.config.destination_api.trim_end_matches('/')
        );

        let mut summary = TransferSummary::default();
        for orchestrator in &orchestrators {
            let by_region = match self.fetch_raw_stats(&orchestrator.address).await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(orchestrator = %orchestrator.address, error = %e, "skipping orchestrator");
                    continue;
                }
            };
            summary.orchestrators += 1;

            for (region, records) in &by_region {
                for record in records {
                    match self.destination.post_signed(&post_url, record).await {
                        Ok(()) => {
                            summary.posted += 1;
                            info!(
                                orchestrator = %record.orchestrator,
                                region = %region,
                                success = record.success_rate,
                                latency_secs = record.round_trip_time,
                                transcode_secs = record.transcode_time,
                                "posted transcoding stats"
                            );
                        }
                        Err(e) => {
                            summary.failed += 1;
                            warn!(orchestrator = %record.orchestrator, error = %e, "error posting stats");
                        }
                    }
                }
            }
        }

        info!(
            orchestrators = summary.orchestrators,
            posted = summary.posted,
            failed = summary.failed,
            "stats transfer finished"
        );
        Ok(summary)
    }

    async fn fetch_raw_stats(
        &self,
        address: &str,
    ) -> TesterResult<BTreeMap<String, Vec<TranscodeStats>>> {
        let url = format!(
            "{}/api/raw_stats",
            self.config.source_api.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[("orchestrator", address)])
            .timeout(self.config.timeout)
            .send()
            .await?;

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TesterError::InvalidResponse {
            message: format!("failed to parse raw stats for {}: {}", address, e),
        })
    }
}
