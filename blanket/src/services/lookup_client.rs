use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use told_core::observability::TracedClientExt;

use crate::models::LookupResponse;
use crate::services::metrics::LOOKUP_REQUESTS_TOTAL;
use crate::services::resolver::LookupRequest;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Lookup request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Lookup endpoint {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Lookup response from {url} could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Transport for counterparty lookups.
#[async_trait]
pub trait CounterpartyLookup: Send + Sync {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, LookupError>;
}

pub struct HttpLookupClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpLookupClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Relative endpoint paths from the page are resolved against the base URL.
    fn url_for(&self, api: &str) -> String {
        if api.starts_with("http://") || api.starts_with("https://") {
            api.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                api.trim_start_matches('/')
            )
        }
    }
}

#[async_trait]
impl CounterpartyLookup for HttpLookupClient {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, LookupError> {
        let url = self.url_for(&request.url);

        let response = self
            .client
            .traced_get(&url)
            .query(&request.filter)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| LookupError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response
            .json::<LookupResponse>()
            .await
            .map_err(|source| LookupError::Decode { url, source })
    }
}

/// Perform a lookup; failures are logged and yield `None` so the form keeps
/// its prior state.
pub async fn lookup_or_warn(
    lookup: &dyn CounterpartyLookup,
    request: &LookupRequest,
) -> Option<LookupResponse> {
    match lookup.lookup(request).await {
        Ok(response) => {
            LOOKUP_REQUESTS_TOTAL
                .with_label_values(&[request.role.as_str(), "ok"])
                .inc();
            tracing::debug!(role = %request.role, seq = request.seq, count = response.count, "Lookup completed");
            Some(response)
        }
        Err(e) => {
            LOOKUP_REQUESTS_TOTAL
                .with_label_values(&[request.role.as_str(), "error"])
                .inc();
            tracing::warn!(role = %request.role, seq = request.seq, error = %e, "Counterparty lookup failed");
            None
        }
    }
}
