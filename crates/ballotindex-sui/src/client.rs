//! Sui full-node client backed by `reqwest`.
//!
//! Implements [`EventSource`] with `suix_queryEvents`. Transient HTTP failures
//! are retried with exponential backoff; anything still failing is reported
//! as [`IndexerError::Rpc`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use ballotindex_core::cursor::EventCursor;
use ballotindex_core::error::IndexerError;
use ballotindex_core::indexer::fullnode_url;
use ballotindex_core::source::EventSource;
use ballotindex_core::types::{EventFilter, EventPage};

use crate::retry::{RetryConfig, RetryPolicy};
use crate::rpc::{JsonRpcRequest, JsonRpcResponse, TransportError};

/// Configuration for [`SuiRpcClient`].
#[derive(Debug, Clone)]
pub struct SuiClientConfig {
    pub retry: RetryConfig,
    pub request_timeout: Duration,
}

impl Default for SuiClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// JSON-RPC client for a single Sui full node.
pub struct SuiRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl SuiRpcClient {
    pub fn new(url: impl Into<String>, config: SuiClientConfig) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IndexerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Client for the public full node of `network`.
    pub fn for_network(network: &str) -> Result<Self, IndexerError> {
        let url = fullnode_url(network)
            .ok_or_else(|| IndexerError::Config(format!("unknown Sui network '{network}'")))?;
        Self::new(url, SuiClientConfig::default())
    }

    /// Call `method`, retrying transient failures.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let req = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(&req).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            url = %self.url,
                            method,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(
                            attempt,
                            error = %e,
                            url = %self.url,
                            method,
                            "max retries exceeded"
                        );
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Identifier of the chain the node serves (used as a connectivity probe).
    pub async fn chain_identifier(&self) -> Result<String, IndexerError> {
        let value = self.call("sui_getChainIdentifier", vec![]).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| IndexerError::Rpc(format!("unexpected chain identifier: {value}")))
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<Value, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        let parsed: JsonRpcResponse = serde_json::from_slice(&body)?;
        parsed.into_result().map_err(TransportError::Rpc)
    }

    fn transport_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl EventSource for SuiRpcClient {
    async fn query_events(
        &self,
        filter: &EventFilter,
        after: Option<&EventCursor>,
        limit: usize,
    ) -> Result<EventPage, IndexerError> {
        let params = query_events_params(filter, after, limit).map_err(TransportError::from)?;
        let value = self.call("suix_queryEvents", params).await?;
        let page: EventPage = serde_json::from_value(value).map_err(TransportError::from)?;
        debug!(
            url = %self.url,
            events = page.data.len(),
            has_next_page = page.has_next_page,
            "suix_queryEvents"
        );
        Ok(page)
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Positional params of `suix_queryEvents`: `[filter, cursor, limit, descending]`.
pub fn query_events_params(
    filter: &EventFilter,
    after: Option<&EventCursor>,
    limit: usize,
) -> Result<Vec<Value>, serde_json::Error> {
    Ok(vec![
        serde_json::to_value(filter)?,
        serde_json::to_value(after)?,
        Value::from(limit),
        Value::Bool(false),
    ])
}
