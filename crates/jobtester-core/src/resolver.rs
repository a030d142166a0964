//! Test matrix resolution.
//!
//! Joins the filtered fleet listing with the capability catalogue on
//! orchestrator address. Output order follows the fleet listing, then the
//! catalogue's pipeline and model order, so resolving the same inputs twice
//! yields the same sequence.

use std::fmt;

use crate::types::{CapabilityCatalogue, OrchestratorRecord};

/// One (orchestrator, pipeline, model) combination to probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestTuple {
    pub orchestrator: String,
    pub service_uri: String,
    pub pipeline: String,
    pub model: String,
    pub warm: bool,
}

impl fmt::Display for TestTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} ({})",
            self.orchestrator,
            self.pipeline,
            self.model,
            if self.warm { "warm" } else { "cold" }
        )
    }
}

/// Produce every tuple to test. Orchestrators missing from the catalogue contribute nothing.
pub fn resolve_matrix(
    orchestrators: &[OrchestratorRecord],
    catalogue: &CapabilityCatalogue,
) -> Vec<TestTuple> {
    let mut tuples = Vec::new();
    for orchestrator in orchestrators {
        let Some(capability) = catalogue.for_address(&orchestrator.address) else {
            continue;
        };
        for pipeline in &capability.pipelines {
            for model in &pipeline.models {
                tuples.push(TestTuple {
                    orchestrator: orchestrator.address.clone(),
                    service_uri: orchestrator.service_uri.clone(),
                    pipeline: pipeline.pipeline_type.clone(),
                    model: model.name.clone(),
                    warm: model.is_warm(),
                });
            }
        }
    }
    tuples
}

/// Counting pass: how many tuples `resolve_matrix` would emit, without building them.
pub fn count_expected(orchestrators: &[OrchestratorRecord], catalogue: &CapabilityCatalogue) -> u64 {
    orchestrators
        .iter()
        .filter_map(|o| catalogue.for_address(&o.address))
        .flat_map(|c| c.pipelines.iter())
        .map(|p| p.models.len() as u64)
        .sum()
}
