//! Shared HTTP plumbing for registry connectors

use super::{ConnectorError, ConnectorResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("aicat/", env!("CARGO_PKG_VERSION"));

/// Failed upstream request, before a connector gives it meaning
#[derive(Debug)]
pub struct HttpFailure {
    /// HTTP status, `None` for transport failures
    pub status: Option<u16>,
    /// Upstream error message (or transport error text)
    pub detail: String,
}

impl HttpFailure {
    /// Wrap as an upstream error: `<context>: '<detail>'`
    pub fn into_upstream(self, context: &str) -> ConnectorError {
        ConnectorError::Upstream {
            status: self.status,
            message: format!("{}: '{}'", context, self.detail),
        }
    }

    /// Same message, reported as the registry not knowing the record
    pub fn into_not_found(self, context: &str) -> ConnectorError {
        ConnectorError::NotFound(Some(format!("{}: '{}'", context, self.detail)))
    }
}

/// JSON-over-HTTP access to one registry
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    error_message: fn(&Value) -> Option<String>,
}

impl HttpSource {
    /// `error_message` extracts the human-readable message from an
    /// upstream error body
    pub fn new(
        base_url: &str,
        timeout: Duration,
        error_message: fn(&Value) -> Option<String>,
    ) -> ConnectorResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectorError::Upstream {
                status: None,
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            error_message,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `<base><path>` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, HttpFailure> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Querying upstream registry");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| HttpFailure {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| HttpFailure {
            status: Some(status.as_u16()),
            detail: e.to_string(),
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|json| (self.error_message)(&json))
                .unwrap_or(body);
            warn!(url = %url, status = status.as_u16(), detail = %detail, "Upstream request failed");
            return Err(HttpFailure {
                status: Some(status.as_u16()),
                detail,
            });
        }

        serde_json::from_str(&body).map_err(|e| HttpFailure {
            status: Some(status.as_u16()),
            detail: format!("unexpected response format: {}", e),
        })
    }
}
