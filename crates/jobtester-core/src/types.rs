//! Wire types for the gateway, the capability catalogue and the stats collector.

use serde::{Deserialize, Serialize};

/// Placeholder stored instead of the response body when capture is disabled.
pub const CAPTURE_DISABLED_PAYLOAD: &str = r#"{"message":"(Job Tester) Capture Response Disabled"}"#;

/// Error code used for records describing a tester-side failure.
pub const TESTER_ERROR_CODE: &str = "tester_error";

/// A registered orchestrator as listed by the gateway.
///
/// Stake and round bookkeeping is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrchestratorRecord {
    pub address: String,

    #[serde(rename = "ServiceURI", default)]
    pub service_uri: String,

    #[serde(default)]
    pub last_reward_round: i64,

    #[serde(default)]
    pub reward_cut: i64,

    #[serde(default)]
    pub fee_share: i64,

    #[serde(default)]
    pub delegated_stake: f64,

    #[serde(default)]
    pub activation_round: i64,

    #[serde(default)]
    pub deactivation_round: f64,

    #[serde(default)]
    pub last_active_stake_update_round: i64,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub price_per_pixel: String,
}

impl OrchestratorRecord {
    /// Active and reachable through a service URI.
    pub fn is_testable(&self) -> bool {
        self.active && !self.service_uri.is_empty()
    }
}

/// Keep only orchestrators that can receive jobs, preserving order.
pub fn filter_testable(orchestrators: Vec<OrchestratorRecord>) -> Vec<OrchestratorRecord> {
    orchestrators
        .into_iter()
        .filter(OrchestratorRecord::is_testable)
        .collect()
}

/// Warm/cold instance counts for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelStatus {
    #[serde(default)]
    pub cold: u32,
    #[serde(default)]
    pub warm: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapability {
    pub name: String,
    #[serde(default)]
    pub status: ModelStatus,
}

impl ModelCapability {
    pub fn is_warm(&self) -> bool {
        self.status.warm > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCapability {
    #[serde(rename = "type")]
    pub pipeline_type: String,
    #[serde(default)]
    pub models: Vec<ModelCapability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorCapability {
    pub address: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineCapability>,
}

/// Response of `GET /getNetworkCapabilities`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityCatalogue {
    #[serde(default)]
    pub orchestrators: Vec<OrchestratorCapability>,
}

impl CapabilityCatalogue {
    /// Capabilities advertised for an address. Later entries shadow earlier ones.
    pub fn for_address(&self, address: &str) -> Option<&OrchestratorCapability> {
        self.orchestrators.iter().rev().find(|o| o.address == address)
    }
}

/// One error entry in a stats record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub error_code: String,
    pub message: String,
    pub count: u32,
}

impl JobError {
    pub fn once(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            count: 1,
        }
    }
}

/// Per-job result delivered to the stats collector.
///
/// Field order is the serialized order; the collector verifies the HMAC over
/// exactly these bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub region: String,
    pub pipeline: String,
    pub model: String,
    pub model_is_warm: bool,
    pub input_parameters: String,
    pub response_payload: String,
    pub orchestrator: String,
    pub success_rate: u8,
    pub round_trip_time: f64,
    pub errors: Vec<JobError>,
    pub timestamp: i64,
}

/// Legacy transcoding stats as served by a collector's `raw_stats` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeStats {
    pub region: String,
    pub orchestrator: String,
    #[serde(default)]
    pub segments_sent: u64,
    #[serde(default)]
    pub segments_received: u64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub seg_duration: f64,
    #[serde(default)]
    pub upload_time: f64,
    #[serde(default)]
    pub download_time: f64,
    #[serde(default)]
    pub transcode_time: f64,
    #[serde(default)]
    pub round_trip_time: f64,
    #[serde(default)]
    pub errors: Vec<TranscodeError>,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeError {
    pub error_code: String,
    pub count: u32,
}
