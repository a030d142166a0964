//! Job dispatch and outcome classification.
//!
//! `dispatch` never returns an error: every tuple ends in exactly one of
//! passed / failed / tester-error and, where a record exists, one call to
//! the stats reporter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::TesterConfig;
use crate::context::RunContext;
use crate::error::TesterError;
use crate::reporter::StatsReporter;
use crate::request::{build_job_request, JobTarget};
use crate::resolver::TestTuple;
use crate::types::{JobError, JobStats, CAPTURE_DISABLED_PAYLOAD, TESTER_ERROR_CODE};

/// How a single tuple ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Broadcaster answered 2xx.
    Passed,
    /// Transport error or non-2xx.
    Failed,
    /// Never sent: unknown pipeline or request build failure.
    TesterError,
}

/// Outcome of one tuple within a matrix run.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub tuple: TestTuple,
    pub outcome: JobOutcome,
}

pub struct Dispatcher {
    config: Arc<TesterConfig>,
    client: reqwest::Client,
    reporter: Arc<dyn StatsReporter>,
    context: Arc<RunContext>,
    target: JobTarget,
    job_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        config: Arc<TesterConfig>,
        client: reqwest::Client,
        reporter: Arc<dyn StatsReporter>,
        context: Arc<RunContext>,
    ) -> Self {
        let target = JobTarget {
            job_endpoint: config.broadcaster_job_endpoint.clone(),
            bearer_token: config.broadcaster_request_token.clone(),
            fixtures: config.fixtures.clone(),
        };
        let job_timeout = Duration::from_secs(config.job_timeout_secs);
        Self {
            config,
            client,
            reporter,
            context,
            target,
            job_timeout,
        }
    }

    /// Drain `tuples` with at most `concurrency` jobs in flight.
    ///
    /// Tuples are grouped by orchestrator endpoint and the groups run one
    /// after another, so the callback pointer names the endpoint of every job
    /// in flight. Records come back in input order regardless of completion
    /// order.
    pub async fn run_matrix(self: &Arc<Self>, tuples: Vec<TestTuple>) -> Vec<DispatchRecord> {
        let parallel = self.config.concurrency.max(1);
        let sem = Arc::new(Semaphore::new(parallel));
        let mut records = Vec::with_capacity(tuples.len());

        for (service_uri, group) in group_by_endpoint(tuples) {
            self.context.set_under_test(&service_uri);
            let mut join_set = JoinSet::new();

            for (index, tuple) in group {
                let permit = match sem.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!(error = %e, "dispatch semaphore closed");
                        break;
                    }
                };
                let this = Arc::clone(self);
                join_set.spawn(async move {
                    let _permit = permit;
                    let outcome = this.execute(&tuple).await;
                    (index, DispatchRecord { tuple, outcome })
                });
            }

            while let Some(res) = join_set.join_next().await {
                match res {
                    Ok(record) => records.push(record),
                    Err(e) => error!(error = %e, "dispatch task failed"),
                }
            }
        }

        self.context.clear_under_test();
        records.sort_by_key(|(index, _)| *index);
        records.into_iter().map(|(_, record)| record).collect()
    }

    /// Point the callback at the tuple's orchestrator and run it end to end.
    pub async fn dispatch(&self, tuple: &TestTuple) -> JobOutcome {
        self.context.set_under_test(&tuple.service_uri);
        self.execute(tuple).await
    }

    async fn execute(&self, tuple: &TestTuple) -> JobOutcome {
        let metrics = self.context.metrics();
        metrics.increment_total_jobs();

        info!(
            region = %self.config.region,
            orchestrator = %tuple.orchestrator,
            service_uri = %tuple.service_uri,
            pipeline = %tuple.pipeline,
            model = %tuple.model,
            warm = tuple.warm,
            "sending test job"
        );

        let mut stats = self.new_stats(tuple);

        let Some(pipeline) = self.config.pipeline(&tuple.pipeline) else {
            let err = TesterError::PipelineNotConfigured {
                pipeline: tuple.pipeline.clone(),
            };
            return self.tester_error(stats, err).await;
        };

        let job = match build_job_request(pipeline, &tuple.model, &self.target).await {
            Ok(job) => job,
            Err(err) => return self.tester_error(stats, err).await,
        };
        stats.input_parameters = job.input_parameters.clone();
        let capture = pipeline.capture_response;

        let started = Instant::now();
        let sent = job.into_request(&self.client, self.job_timeout).send().await;
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                stats.round_trip_time = started.elapsed().as_secs_f64();
                let err = TesterError::from(e);
                return self
                    .failed(stats, JobError::once(err.to_string(), "failed to process the job"))
                    .await;
            }
        };

        let status = response.status();
        let body = response.text().await;
        stats.round_trip_time = started.elapsed().as_secs_f64();

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                return self
                    .failed(
                        stats,
                        JobError::once(e.to_string(), "failed to read response body"),
                    )
                    .await;
            }
        };

        if !status.is_success() {
            stats.response_payload = body.clone();
            return self
                .failed(stats, JobError::once(status.as_u16().to_string(), body))
                .await;
        }

        stats.response_payload = if capture {
            body
        } else {
            CAPTURE_DISABLED_PAYLOAD.to_string()
        };
        stats.success_rate = 1;
        metrics.increment_passed();
        self.deliver(stats).await;
        JobOutcome::Passed
    }

    fn new_stats(&self, tuple: &TestTuple) -> JobStats {
        JobStats {
            region: self.config.region.clone(),
            pipeline: tuple.pipeline.clone(),
            model: tuple.model.clone(),
            model_is_warm: tuple.warm,
            input_parameters: String::new(),
            response_payload: String::new(),
            orchestrator: tuple.orchestrator.clone(),
            success_rate: 0,
            round_trip_time: 0.0,
            errors: Vec::new(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    async fn failed(&self, mut stats: JobStats, job_error: JobError) -> JobOutcome {
        warn!(
            orchestrator = %stats.orchestrator,
            pipeline = %stats.pipeline,
            model = %stats.model,
            code = %job_error.error_code,
            latency_secs = stats.round_trip_time,
            "test job failed"
        );
        stats.errors.push(job_error);
        self.context.metrics().increment_failed();
        self.deliver(stats).await;
        JobOutcome::Failed
    }

    async fn tester_error(&self, mut stats: JobStats, err: TesterError) -> JobOutcome {
        warn!(
            region = %self.config.region,
            orchestrator = %stats.orchestrator,
            pipeline = %stats.pipeline,
            model = %stats.model,
            error = %err,
            "failed sending test job"
        );
        self.context.metrics().increment_tester_error();
        if self.config.report_tester_errors {
            stats
                .errors
                .push(JobError::once(TESTER_ERROR_CODE, err.to_string()));
            self.deliver(stats).await;
        }
        JobOutcome::TesterError
    }

    /// Delivery failures are counted and logged; they never change the job outcome.
    async fn deliver(&self, stats: JobStats) {
        let orchestrator = stats.orchestrator.clone();
        if let Err(e) = self.reporter.report(stats).await {
            self.context.metrics().increment_delivery_failed();
            warn!(orchestrator = %orchestrator, error = %e, "failed to post stats");
        }
    }
}

/// Tuples per service URI, groups in order of first appearance.
fn group_by_endpoint(tuples: Vec<TestTuple>) -> Vec<(String, Vec<(usize, TestTuple)>)> {
    let mut groups: Vec<(String, Vec<(usize, TestTuple)>)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    for (index, tuple) in tuples.into_iter().enumerate() {
        let slot = *slots.entry(tuple.service_uri.clone()).or_insert_with(|| {
            groups.push((tuple.service_uri.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push((index, tuple));
    }
    groups
}
