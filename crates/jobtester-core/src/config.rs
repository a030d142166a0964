//! Operator configuration.
//!
//! Loaded from a JSON (or YAML, by extension) file whose keys follow the
//! camelCase layout the gateway tooling already uses. Secrets can be
//! overridden from the environment:
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `JOBTESTER_METRICS_SECRET` | HMAC secret shared with the stats collector |
//! | `JOBTESTER_METRICS_ENDPOINT` | Stats collector URL |
//! | `JOBTESTER_BROADCASTER_TOKEN` | Bearer token for job submission |

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TesterError, TesterResult};

/// Content type that selects the JSON request shape. Anything else is multipart.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Operator-supplied pipeline parameters, kept in insertion order.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TesterConfig {
    /// Region tag stamped on every stats record.
    pub region: String,

    #[serde(default)]
    pub job_type: String,

    #[serde(default = "default_server_address")]
    pub internal_web_server_address: String,

    #[serde(default = "default_server_port")]
    pub internal_web_server_port: String,

    /// Stats collector URL (full path).
    pub metrics_api_endpoint: String,

    /// HMAC secret for stats delivery.
    #[serde(default)]
    pub metrics_secret: String,

    /// Base URL jobs are submitted to.
    pub broadcaster_job_endpoint: String,

    /// Base URL of the gateway CLI API (fleet listing, capabilities).
    pub broadcaster_cli_endpoint: String,

    #[serde(default)]
    pub broadcaster_request_token: String,

    #[serde(default)]
    pub pipelines: Vec<PipelineDefinition>,

    /// Maximum jobs in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,

    #[serde(default = "default_stats_timeout")]
    pub stats_timeout_secs: u64,

    /// Accept invalid TLS certificates (local gateways only).
    #[serde(default)]
    pub insecure_tls: bool,

    /// Hand resolution/build failures to the stats reporter as failed records.
    #[serde(default = "default_true")]
    pub report_tester_errors: bool,

    /// Fixture selection for multipart pipelines.
    #[serde(default)]
    pub fixtures: FixtureTable,
}

fn default_server_address() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> String {
    "8080".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_job_timeout() -> u64 {
    180
}

fn default_discovery_timeout() -> u64 {
    30
}

fn default_stats_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// A pipeline the operator knows how to exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name as advertised in the capability catalogue.
    pub name: String,

    /// Path appended to the broadcaster job endpoint.
    pub uri: String,

    /// Keep the broadcaster's response body in the stats record.
    #[serde(default)]
    pub capture_response: bool,

    #[serde(rename = "contentType", default = "default_content_type")]
    pub content_type: String,

    #[serde(default)]
    pub parameters: Parameters,
}

fn default_content_type() -> String {
    JSON_CONTENT_TYPE.to_string()
}

impl PipelineDefinition {
    pub fn is_json(&self) -> bool {
        self.content_type == JSON_CONTENT_TYPE
    }
}

/// One row of the fixture lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureRule {
    /// Matched against the end of the pipeline URI.
    pub uri_suffix: String,
    pub path: String,
    pub field: String,
}

/// File attached to a multipart job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub path: String,
    pub field: String,
}

/// Lookup table from pipeline URI suffix to fixture file and form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureTable {
    #[serde(default)]
    pub rules: Vec<FixtureRule>,
    #[serde(default = "default_fixture")]
    pub default: Fixture,
}

fn default_fixture() -> Fixture {
    Fixture {
        path: "test-assets/test-image.png".to_string(),
        field: "image".to_string(),
    }
}

impl Default for FixtureTable {
    fn default() -> Self {
        Self {
            rules: vec![
                FixtureRule {
                    uri_suffix: "audio-to-text".to_string(),
                    path: "test-assets/test-audio.mp4".to_string(),
                    field: "audio".to_string(),
                },
                FixtureRule {
                    uri_suffix: "upscale".to_string(),
                    path: "test-assets/test-upscale.jpg".to_string(),
                    field: "image".to_string(),
                },
            ],
            default: default_fixture(),
        }
    }
}

impl FixtureTable {
    /// First rule whose suffix ends the URI wins; otherwise the default.
    pub fn select(&self, uri: &str) -> Fixture {
        let uri = uri.trim_end_matches('/');
        self.rules
            .iter()
            .find(|rule| !rule.uri_suffix.is_empty() && uri.ends_with(&rule.uri_suffix))
            .map(|rule| Fixture {
                path: rule.path.clone(),
                field: rule.field.clone(),
            })
            .unwrap_or_else(|| self.default.clone())
    }
}

impl TesterConfig {
    /// Load from a file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> TesterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TesterError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            Self::from_yaml_str(&content)?
        } else {
            Self::from_json_str(&content)?
        };

        let config = config.with_env_overrides();
        config.validate()?;
        debug!(
            path = %path.display(),
            pipelines = config.pipelines.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> TesterResult<Self> {
        serde_json::from_str(content).map_err(|e| TesterError::Config {
            message: format!("invalid JSON configuration: {}", e),
        })
    }

    pub fn from_yaml_str(content: &str) -> TesterResult<Self> {
        serde_yaml::from_str(content).map_err(|e| TesterError::Config {
            message: format!("invalid YAML configuration: {}", e),
        })
    }

    /// Environment variables take precedence over file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(secret) = non_empty_env("JOBTESTER_METRICS_SECRET") {
            self.metrics_secret = secret;
        }
        if let Some(endpoint) = non_empty_env("JOBTESTER_METRICS_ENDPOINT") {
            self.metrics_api_endpoint = endpoint;
        }
        if let Some(token) = non_empty_env("JOBTESTER_BROADCASTER_TOKEN") {
            self.broadcaster_request_token = token;
        }
        self
    }

    pub fn validate(&self) -> TesterResult<()> {
        for (key, value) in [
            ("metricsApiEndpoint", &self.metrics_api_endpoint),
            ("broadcasterJobEndpoint", &self.broadcaster_job_endpoint),
            ("broadcasterCliEndpoint", &self.broadcaster_cli_endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(TesterError::Config {
                    message: format!("{} must not be empty", key),
                });
            }
            url::Url::parse(value).map_err(|e| TesterError::Config {
                message: format!("{} is not a valid URL ({}): {}", key, value, e),
            })?;
        }

        if self.concurrency == 0 {
            return Err(TesterError::Config {
                message: "concurrency must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for pipeline in &self.pipelines {
            if !seen.insert(pipeline.name.as_str()) {
                return Err(TesterError::Config {
                    message: format!("duplicate pipeline definition: {}", pipeline.name),
                });
            }
        }

        Ok(())
    }

    /// Pipeline definition by catalogue name.
    pub fn pipeline(&self, name: &str) -> Option<&PipelineDefinition> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// `address:port` the callback server binds to.
    pub fn server_addr(&self) -> String {
        format!(
            "{}:{}",
            self.internal_web_server_address, self.internal_web_server_port
        )
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
