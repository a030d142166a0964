//! Gateway client for fleet discovery.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use std::time::Duration;

use tracing::info;

use crate::error::TesterResult;
use crate::types::{filter_testable, CapabilityCatalogue, OrchestratorRecord};

mod http;

pub use http::build_http_client;
use http::HttpBackend;

/// Client for the gateway's CLI endpoint.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: HttpBackend,
}

impl GatewayClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: HttpBackend {
                client,
                base_url,
                timeout,
            },
        }
    }

    /// Every registered orchestrator, unfiltered.
    pub async fn registered_orchestrators(&self) -> TesterResult<Vec<OrchestratorRecord>> {
        let url = format!("{}/registeredOrchestrators", self.http.base_url);
        self.http.get_json("orchestrators", &url).await
    }

    /// Registered orchestrators that are active and have a service URI.
    pub async fn fetch_orchestrators(&self) -> TesterResult<Vec<OrchestratorRecord>> {
        let all = self.registered_orchestrators().await?;
        let total = all.len();
        let testable = filter_testable(all);
        info!(
            registered = total,
            testable = testable.len(),
            "orchestrators found"
        );
        Ok(testable)
    }

    pub async fn fetch_capabilities(&self) -> TesterResult<CapabilityCatalogue> {
        let url = format!("{}/getNetworkCapabilities", self.http.base_url);
        let catalogue: CapabilityCatalogue = self.http.get_json("capabilities", &url).await?;
        info!(
            orchestrators = catalogue.orchestrators.len(),
            "capability catalogue fetched"
        );
        Ok(catalogue)
    }

    pub fn base_url(&self) -> &str {
        &self.http.base_url
    }
}
