//! HTTP layer: shared transport construction and status mapping for discovery calls.
//!
//! Job submission and stats delivery interpret status codes themselves;
//! this module only covers the gateway's read endpoints.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{TesterError, TesterResult};

const USER_AGENT_VALUE: &str = concat!("jobtester/", env!("CARGO_PKG_VERSION"));

/// Build the one `reqwest::Client` shared by every outbound call of a run.
///
/// No client-wide timeout is set; each call applies its own.
pub fn build_http_client(insecure_tls: bool) -> TesterResult<reqwest::Client> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    reqwest::Client::builder()
        .default_headers(default_headers)
        .danger_accept_invalid_certs(insecure_tls)
        .build()
        .map_err(|e| TesterError::Config {
            message: format!("failed to create HTTP client: {}", e),
        })
}

/// Discovery backend (holds the shared client and the read timeout).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
}

impl HttpBackend {
    /// GET `url` and decode a JSON body. Anything but 200 is a fetch error.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
    ) -> TesterResult<T> {
        debug!(url = %url, "fetching {}", what);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TesterError::fetch(what, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TesterError::fetch(
                what,
                format!("response contained a non-200 status code: {}", status.as_u16()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TesterError::fetch(what, format!("failed to read body: {}", e)))?;

        serde_json::from_slice(&body).map_err(|e| TesterError::InvalidResponse {
            message: format!("failed to parse {}: {}", what, e),
        })
    }
}
