//! Job-test orchestration for AI orchestrator fleets.
//!
//! This crate probes every orchestrator a gateway knows about:
//!
//! - Fleet listing and capability catalogue discovery
//! - Resolution of the (orchestrator, pipeline, model) test matrix
//! - JSON or multipart job requests per pipeline
//! - Bounded-concurrency dispatch with outcome classification
//! - HMAC-SHA256 signed stats delivery to a collector
//! - A callback endpoint telling the broadcaster which orchestrator is under test
//!
//! # Quick Start
//!
//! ```no_run
//! use jobtester_core::{JobTester, TesterConfig};
//!
//! # async fn example() -> jobtester_core::TesterResult<()> {
//! let config = TesterConfig::load("configs/config.json")?;
//! let tester = JobTester::new(config)?;
//! let summary = tester.run().await?;
//! println!("passed {}", summary.metrics.total_jobs_passed);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod reporter;
pub mod request;
pub mod resolver;
pub mod server;
pub mod tester;
pub mod transfer;
pub mod types;

pub use client::{build_http_client, GatewayClient};
pub use config::{Fixture, FixtureRule, FixtureTable, Parameters, PipelineDefinition, TesterConfig};
pub use context::RunContext;
pub use dispatcher::{DispatchRecord, Dispatcher, JobOutcome};
pub use error::{TesterError, TesterResult};
pub use metrics::{MetricsSnapshot, RunMetrics};
pub use reporter::{sign_payload, HttpStatsReporter, SignedPayload, StatsReporter};
pub use request::{build_job_request, JobBody, JobTarget, PreparedJob};
pub use resolver::{count_expected, resolve_matrix, TestTuple};
pub use tester::{JobTester, RunSummary};
pub use transfer::{StatsTransfer, TransferConfig, TransferSummary};
pub use types::{
    CapabilityCatalogue, JobError, JobStats, OrchestratorRecord, TranscodeStats,
    CAPTURE_DISABLED_PAYLOAD,
};
