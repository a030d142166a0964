//! Job request construction.
//!
//! A [`PreparedJob`] is fully materialised (body bytes, fixture contents)
//! before anything is sent, so build failures are tester errors and never
//! reach the broadcaster.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::config::{FixtureTable, Parameters, PipelineDefinition};
use crate::error::{TesterError, TesterResult};

/// Where and how jobs are submitted.
#[derive(Debug, Clone)]
pub struct JobTarget {
    pub job_endpoint: String,
    pub bearer_token: String,
    pub fixtures: FixtureTable,
}

/// Request body, ready to hand to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum JobBody {
    Json(Vec<u8>),
    Multipart {
        fields: Vec<(String, String)>,
        file: FileUpload,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A job request plus the serialized parameters recorded in stats.
#[derive(Debug, Clone)]
pub struct PreparedJob {
    pub url: String,
    pub content_type: String,
    pub input_parameters: String,
    pub body: JobBody,
    bearer_token: String,
}

impl PreparedJob {
    /// Turn into a `reqwest` request on the shared client.
    pub fn into_request(self, client: &reqwest::Client, timeout: Duration) -> reqwest::RequestBuilder {
        let request = client
            .post(&self.url)
            .timeout(timeout)
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer_token));

        match self.body {
            JobBody::Json(bytes) => request.header(CONTENT_TYPE, self.content_type).body(bytes),
            JobBody::Multipart { fields, file } => {
                let mut form = Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                let part = Part::bytes(file.bytes).file_name(file.file_name);
                request.multipart(form.part(file.field, part))
            }
        }
    }
}

/// Operator parameters plus `model_id`. The definition itself is never touched.
pub fn merge_parameters(params: &Parameters, model: &str) -> Parameters {
    let mut merged = params.clone();
    merged.insert("model_id".to_string(), Value::String(model.to_string()));
    merged
}

/// Build the request for one pipeline/model pair.
pub async fn build_job_request(
    pipeline: &PipelineDefinition,
    model: &str,
    target: &JobTarget,
) -> TesterResult<PreparedJob> {
    let merged = merge_parameters(&pipeline.parameters, model);
    let input = serde_json::to_vec(&merged).map_err(|e| TesterError::Build {
        message: format!(
            "failed to create job parameters for pipeline {}: {}",
            pipeline.name, e
        ),
    })?;
    let input_parameters = String::from_utf8(input.clone()).map_err(|e| TesterError::Build {
        message: e.to_string(),
    })?;

    let url = join_url(&target.job_endpoint, &pipeline.uri);

    let body = if pipeline.is_json() {
        JobBody::Json(input)
    } else {
        let fixture = target.fixtures.select(&pipeline.uri);
        let bytes = tokio::fs::read(&fixture.path).await.map_err(|e| TesterError::Fixture {
            path: fixture.path.clone(),
            message: e.to_string(),
        })?;
        let file_name = Path::new(&fixture.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(fixture.path.as_str())
            .to_string();

        JobBody::Multipart {
            fields: merged
                .iter()
                .map(|(k, v)| (k.clone(), form_value(v)))
                .collect(),
            file: FileUpload {
                field: fixture.field,
                file_name,
                bytes,
            },
        }
    };

    Ok(PreparedJob {
        url,
        content_type: pipeline.content_type.clone(),
        input_parameters,
        body,
        bearer_token: target.bearer_token.clone(),
    })
}

/// Strings go in raw, everything else in its JSON form.
fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
