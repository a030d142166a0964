//! Shared run state: counters and the orchestrator currently under test.
//!
//! Passed explicitly (behind an `Arc`) to the dispatcher and the callback
//! server. Lock sections never span an await.

use std::sync::RwLock;

use crate::metrics::RunMetrics;
use crate::types::OrchestratorRecord;

#[derive(Debug, Default)]
pub struct RunContext {
    metrics: RunMetrics,
    under_test: RwLock<Option<String>>,
    known_endpoints: RwLock<Vec<String>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Remember the service URIs of the fleet for the callback's full listing.
    pub fn set_fleet(&self, orchestrators: &[OrchestratorRecord]) {
        let endpoints = orchestrators.iter().map(|o| o.service_uri.clone()).collect();
        *self
            .known_endpoints
            .write()
            .unwrap_or_else(|e| e.into_inner()) = endpoints;
    }

    pub fn set_under_test(&self, service_uri: impl Into<String>) {
        *self.under_test.write().unwrap_or_else(|e| e.into_inner()) = Some(service_uri.into());
    }

    pub fn clear_under_test(&self) {
        *self.under_test.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn under_test(&self) -> Option<String> {
        self.under_test
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Endpoints the broadcaster may route to right now: the one under test, or all of them.
    pub fn routable_endpoints(&self) -> Vec<String> {
        match self.under_test() {
            Some(uri) => vec![uri],
            None => self
                .known_endpoints
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }
}
