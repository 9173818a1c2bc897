//! GraphQL-over-HTTP implementation of [`IngestClient`].
//!
//! # Design
//! - Connect errors, timeouts and HTTP 408/429/5xx are transient: retried with
//!   exponential backoff until the call succeeds or is cancelled.
//! - Any other non-success status, a non-empty `errors` list, `accepted = false`
//!   or an undecodable body is a final answer and is never retried.
//! - The api key travels in the `x-api-key` header on every request.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use devicehub_config::{AppSettings, DeviceConfig, parse_endpoint_url, validate_device_config};
use devicehub_telemetry::Metrics;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::client::{Delivery, IngestClient, ScanSubmission};
use crate::error::{TransportError, TransportResult};
use crate::wire::{
    GET_CONFIG_QUERY, GetConfigData, GetConfigVariables, GraphqlRequest, GraphqlResponse,
    SEND_SCAN_MUTATION, SendScanData, SendScanVariables,
};

/// Header carrying the device api key.
pub const HEADER_API_KEY: &str = "x-api-key";

enum Attempt<T> {
    Done(T),
    Transient(String),
    Rejected(String),
}

enum Failure {
    Rejected(String),
    Cancelled,
}

/// HTTP client speaking the ingestion endpoint's GraphQL dialect.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http: Client,
    endpoint: Url,
    backoff: BackoffPolicy,
    metrics: Metrics,
}

impl GraphqlClient {
    /// Client posting to `endpoint` with an optional api key.
    ///
    /// # Errors
    ///
    /// Returns an error if the api key is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(
        endpoint: Url,
        api_key: Option<&str>,
        timeout: Duration,
        metrics: Metrics,
    ) -> TransportResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.map(str::trim).filter(|key| !key.is_empty()) {
            let mut value = HeaderValue::from_str(key).map_err(|_| TransportError::InvalidHeader {
                header: HEADER_API_KEY,
            })?;
            value.set_sensitive(true);
            headers.insert(HEADER_API_KEY, value);
        }
        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| TransportError::BuildClient { source })?;
        Ok(Self {
            http,
            endpoint,
            backoff: BackoffPolicy::default(),
            metrics,
        })
    }

    /// Client configured from relay settings and a resolved api key.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid or the client cannot be built.
    pub fn from_settings(
        settings: &AppSettings,
        api_key: Option<&str>,
        metrics: Metrics,
    ) -> TransportResult<Self> {
        let endpoint = parse_endpoint_url(&settings.graphql_url)
            .map_err(|source| TransportError::InvalidEndpoint { source })?;
        Self::new(endpoint, api_key, settings.request_timeout(), metrics)
    }

    /// Replace the retry schedule.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Endpoint requests are posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn execute<V, T>(
        &self,
        operation: &'static str,
        request: &GraphqlRequest<V>,
        cancel: &CancellationToken,
    ) -> Result<GraphqlResponse<T>, Failure>
    where
        V: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let mut backoff = self.backoff.start();
        loop {
            let attempt = tokio::select! {
                () = cancel.cancelled() => return Err(Failure::Cancelled),
                attempt = self.attempt(request) => attempt,
            };
            match attempt {
                Attempt::Done(response) => return Ok(response),
                Attempt::Rejected(reason) => return Err(Failure::Rejected(reason)),
                Attempt::Transient(reason) => {
                    let delay = backoff.next_delay();
                    self.metrics.inc_transport_retry();
                    warn!(
                        operation,
                        reason = %reason,
                        retry = backoff.retries(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient transport failure; retrying"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(Failure::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn attempt<V, T>(&self, request: &GraphqlRequest<V>) -> Attempt<GraphqlResponse<T>>
    where
        V: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let response = match self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_connect() || err.is_timeout() || err.is_request() => {
                return Attempt::Transient(err.to_string());
            }
            Err(err) => return Attempt::Rejected(format!("request failed: {err}")),
        };

        let status = response.status();
        if is_transient_status(status) {
            return Attempt::Transient(format!("http status {}", status.as_u16()));
        }
        if !status.is_success() {
            return Attempt::Rejected(format!("http status {}", status.as_u16()));
        }

        match response.json::<GraphqlResponse<T>>().await {
            Ok(body) => Attempt::Done(body),
            Err(err) if err.is_timeout() => Attempt::Transient(err.to_string()),
            Err(err) => Attempt::Rejected(format!("invalid response body: {err}")),
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn first_error<T>(response: &GraphqlResponse<T>) -> Option<String> {
    response
        .errors
        .first()
        .map(|error| format!("graphql error: {}", error.message))
}

fn interpret_send(response: GraphqlResponse<SendScanData>) -> Delivery {
    if let Some(reason) = first_error(&response) {
        return Delivery::Rejected(reason);
    }
    match response.data.and_then(|data| data.send_scan) {
        Some(result) if result.accepted => Delivery::Accepted,
        Some(result) => Delivery::Rejected(
            result
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "rejected by server".to_string()),
        ),
        None => Delivery::Rejected("response missing sendScan result".to_string()),
    }
}

#[async_trait]
impl IngestClient for GraphqlClient {
    #[instrument(name = "transport.send_scan", skip(self, submission, cancel), fields(event_id = %submission.event_id))]
    async fn send_scan(&self, submission: &ScanSubmission, cancel: &CancellationToken) -> Delivery {
        let request = GraphqlRequest::new(
            SEND_SCAN_MUTATION,
            SendScanVariables {
                input: submission.into(),
            },
        );
        let delivery = match self
            .execute::<_, SendScanData>("sendScan", &request, cancel)
            .await
        {
            Ok(response) => interpret_send(response),
            Err(Failure::Rejected(reason)) => Delivery::Rejected(reason),
            Err(Failure::Cancelled) => Delivery::Cancelled,
        };
        debug!(?delivery, "send_scan finished");
        delivery
    }

    #[instrument(name = "transport.get_config", skip(self, cancel))]
    async fn get_config(
        &self,
        device_id: &str,
        cancel: &CancellationToken,
    ) -> Option<DeviceConfig> {
        let request = GraphqlRequest::new(
            GET_CONFIG_QUERY,
            GetConfigVariables {
                device_id: device_id.to_string(),
            },
        );
        let started = Instant::now();
        let result = self
            .execute::<_, GetConfigData>("getConfig", &request, cancel)
            .await;
        self.metrics.observe_config_fetch_latency(started.elapsed());

        let response = match result {
            Ok(response) => response,
            Err(Failure::Rejected(reason)) => {
                warn!(reason = %reason, "config fetch rejected");
                return None;
            }
            Err(Failure::Cancelled) => return None,
        };
        if let Some(reason) = first_error(&response) {
            warn!(reason = %reason, "config fetch returned errors");
            return None;
        }
        let Some(payload) = response.data.and_then(|data| data.get_config) else {
            warn!("config fetch returned no configuration");
            return None;
        };
        let config = DeviceConfig::from(payload);
        match validate_device_config(&config) {
            Ok(()) => Some(config),
            Err(err) => {
                warn!(error = %err, "config fetch returned invalid values");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::SendScanResult;

    fn accepted(accepted: bool, message: Option<&str>) -> GraphqlResponse<SendScanData> {
        GraphqlResponse::data(SendScanData {
            send_scan: Some(SendScanResult {
                accepted,
                message: message.map(str::to_string),
                processed_at: None,
            }),
        })
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn send_responses_are_classified() {
        assert_eq!(interpret_send(accepted(true, Some("duplicate"))), Delivery::Accepted);
        assert_eq!(
            interpret_send(accepted(false, Some("invalid code"))),
            Delivery::Rejected("invalid code".to_string())
        );
        assert_eq!(
            interpret_send(accepted(false, Some(" "))),
            Delivery::Rejected("rejected by server".to_string())
        );
        assert_eq!(
            interpret_send(GraphqlResponse::error("device unknown")),
            Delivery::Rejected("graphql error: device unknown".to_string())
        );
        assert!(matches!(
            interpret_send(GraphqlResponse::data(SendScanData { send_scan: None })),
            Delivery::Rejected(_)
        ));
    }

    #[test]
    fn invalid_api_key_is_reported() -> anyhow::Result<()> {
        let endpoint = Url::parse("http://127.0.0.1:1/graphql")?;
        let result = GraphqlClient::new(
            endpoint,
            Some("bad\nkey"),
            Duration::from_secs(1),
            Metrics::new()?,
        );
        assert!(matches!(result, Err(TransportError::InvalidHeader { .. })));
        Ok(())
    }
}
