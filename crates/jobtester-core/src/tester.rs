//! One complete test run: discover, count, dispatch, summarise.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

use crate::client::{build_http_client, GatewayClient};
use crate::config::TesterConfig;
use crate::context::RunContext;
use crate::dispatcher::{DispatchRecord, Dispatcher, JobOutcome};
use crate::error::TesterResult;
use crate::metrics::MetricsSnapshot;
use crate::reporter::{HttpStatsReporter, StatsReporter};
use crate::resolver::{count_expected, resolve_matrix};

/// End-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub metrics: MetricsSnapshot,
    pub tuples: usize,
}

impl RunSummary {
    pub fn any_failed(&self) -> bool {
        self.metrics.total_jobs_failed > 0 || self.metrics.total_jobs_tester_error > 0
    }
}

/// Wires the gateway client, dispatcher and reporter around one shared context.
pub struct JobTester {
    config: Arc<TesterConfig>,
    gateway: GatewayClient,
    dispatcher: Arc<Dispatcher>,
    context: Arc<RunContext>,
}

impl JobTester {
    /// Build with one shared HTTP client and the collector reporter.
    pub fn new(config: TesterConfig) -> TesterResult<Self> {
        let client = build_http_client(config.insecure_tls)?;
        let reporter = Arc::new(HttpStatsReporter::new(
            client.clone(),
            config.metrics_api_endpoint.clone(),
            config.metrics_secret.clone(),
            Duration::from_secs(config.stats_timeout_secs),
        ));
        Ok(Self::with_reporter(config, client, reporter))
    }

    pub fn with_reporter(
        config: TesterConfig,
        client: reqwest::Client,
        reporter: Arc<dyn StatsReporter>,
    ) -> Self {
        let config = Arc::new(config);
        let context = Arc::new(RunContext::new());
        let gateway = GatewayClient::new(
            client.clone(),
            config.broadcaster_cli_endpoint.clone(),
            Duration::from_secs(config.discovery_timeout_secs),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&config),
            client,
            reporter,
            Arc::clone(&context),
        ));
        Self {
            config,
            gateway,
            dispatcher,
            context,
        }
    }

    /// Shared with the callback server.
    pub fn context(&self) -> Arc<RunContext> {
        Arc::clone(&self.context)
    }

    /// Run every resolved tuple. Only discovery failures abort.
    pub async fn run(&self) -> TesterResult<RunSummary> {
        let orchestrators = self.gateway.fetch_orchestrators().await.inspect_err(|e| {
            self.context.metrics().increment_tester_error();
            error!(error = %e, "failed to fetch orchestrators");
        })?;
        self.context.set_fleet(&orchestrators);

        let catalogue = self.gateway.fetch_capabilities().await.inspect_err(|e| {
            self.context.metrics().increment_tester_error();
            error!(error = %e, "failed to fetch capabilities");
        })?;

        let expected = count_expected(&orchestrators, &catalogue);
        self.context.metrics().add_expected(expected);
        info!(expected, region = %self.config.region, "expected total jobs");

        let tuples = resolve_matrix(&orchestrators, &catalogue);
        let records = self.dispatcher.run_matrix(tuples).await;
        log_outcomes(&records);

        let summary = RunSummary {
            metrics: self.context.metrics().snapshot(),
            tuples: records.len(),
        };
        match serde_json::to_string(&summary.metrics) {
            Ok(json) => info!(report = %json, "job stats report"),
            Err(e) => error!(error = %e, "failed to serialize job stats report"),
        }
        Ok(summary)
    }
}

fn log_outcomes(records: &[DispatchRecord]) {
    for record in records.iter().filter(|r| r.outcome != JobOutcome::Passed) {
        info!(tuple = %record.tuple, outcome = ?record.outcome, "non-passing tuple");
    }
}
