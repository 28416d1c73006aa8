//! HTTP transport with retries, compression and mutual TLS
//!
//! The transport is stateless with respect to the queue: it never
//! re-queues anything. On a terminal failure the caller decides what to
//! do with the items it tried to send.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::{header, Certificate, Client, ClientBuilder, Identity, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::utils::{calc_exp_backoff, BackoffOptions};

/// Immutable delivery policy, enforced per call
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL of the management service API
    pub base_url: String,

    /// Maximum records per batch request
    pub batch_max_items: usize,

    /// Maximum serialized batch size per request, in bytes
    pub batch_max_bytes: usize,

    /// Gzip request bodies
    pub compress: bool,

    /// Total timeout per attempt
    pub timeout: Duration,

    /// Attempt ceiling (first try included)
    pub attempts: u32,

    /// Initial backoff, doubled per attempt
    pub initial_backoff: Duration,

    /// Optional PEM CA bundle for server verification
    pub ca_cert_path: Option<PathBuf>,

    /// Optional PEM client certificate for mutual TLS
    pub client_cert_path: Option<PathBuf>,

    /// Optional PEM client key for mutual TLS
    pub client_key_path: Option<PathBuf>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            batch_max_items: 100,
            batch_max_bytes: 1024 * 1024,
            compress: true,
            timeout: Duration::from_secs(30),
            attempts: 3,
            initial_backoff: Duration::from_millis(500),
            ca_cert_path: None,
            client_cert_path: None,
            client_key_path: None,
        }
    }
}

/// Transport client for the management service
pub struct Transport {
    client: Client,
    stream_client: Client,
    config: TransportConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Transport {
    /// Build the clients. TLS material is loaded once here and never
    /// mutated afterwards.
    ///
    /// Two clients share the TLS setup: the API client bounds the whole
    /// request with the per-attempt timeout, while the stream client only
    /// bounds the connect phase so a long artifact transfer is never cut
    /// off while bytes are still flowing.
    pub fn new(config: TransportConfig) -> Result<Self, AgentError> {
        let mut ca_cert = None;
        if let Some(ca_path) = &config.ca_cert_path {
            let pem = std::fs::read(ca_path)?;
            ca_cert = Some(Certificate::from_pem(&pem)?);
        }

        let mut identity = None;
        if let (Some(cert_path), Some(key_path)) =
            (&config.client_cert_path, &config.client_key_path)
        {
            let mut pem = std::fs::read(cert_path)?;
            pem.extend(std::fs::read(key_path)?);
            identity = Some(Identity::from_pem(&pem)?);
        }

        let with_tls = |mut builder: ClientBuilder| -> Result<Client, AgentError> {
            if let Some(ca) = &ca_cert {
                builder = builder.add_root_certificate(ca.clone());
            }
            if let Some(id) = &identity {
                builder = builder.identity(id.clone());
            }
            Ok(builder.build()?)
        };

        Ok(Self {
            client: with_tls(Client::builder().timeout(config.timeout))?,
            stream_client: with_tls(Client::builder().connect_timeout(config.timeout))?,
            config: TransportConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            shutdown: None,
        })
    }

    /// Attach a shutdown signal, checked between retry attempts
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The delivery policy this transport enforces
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// POST a JSON body, discarding the response body
    pub(crate) async fn post_json<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), AgentError> {
        let raw = serde_json::to_vec(body)?;
        let url = format!("{}{}", self.config.base_url, path);
        debug!("POST {} ({} bytes)", url, raw.len());

        let request = self.build_post(&url, raw)?;
        self.execute_with_retry(request).await?;
        Ok(())
    }

    /// GET a JSON document
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AgentError> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("GET {}", url);

        let request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json");
        let response = self.execute_with_retry(request).await?;
        Ok(response.json().await?)
    }

    /// Streaming GET of an artifact at an absolute URL. Not retried:
    /// download actions decide their own failure handling.
    pub async fn fetch_artifact(&self, url: &str) -> Result<Response, AgentError> {
        let response = self.stream_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::DeliveryError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn build_post(&self, url: &str, raw: Vec<u8>) -> Result<RequestBuilder, AgentError> {
        let mut request = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json");

        if self.config.compress {
            request = request
                .header(header::CONTENT_ENCODING, "gzip")
                .body(gzip(&raw)?);
        } else {
            request = request.body(raw);
        }

        Ok(request)
    }

    /// Shared request path: bounded per-attempt timeout, no retry on any
    /// response below 500, exponential backoff on 5xx and transport-level
    /// errors, shutdown observed between attempts.
    async fn execute_with_retry(&self, request: RequestBuilder) -> Result<Response, AgentError> {
        let attempts = self.config.attempts.max(1);
        let mut last_err = AgentError::Internal("no delivery attempts made".to_string());

        for attempt in 0..attempts {
            if attempt > 0 {
                self.backoff_sleep(attempt - 1).await?;
            }

            let attempt_request = request
                .try_clone()
                .ok_or_else(|| AgentError::Internal("request is not retryable".to_string()))?;

            match attempt_request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let err = AgentError::DeliveryError {
                        status: status.as_u16(),
                        body,
                    };
                    if !err.is_retryable() {
                        // Request defect; retrying will not fix it.
                        return Err(err);
                    }
                    warn!(
                        "Attempt {}/{} failed with status {}",
                        attempt + 1,
                        attempts,
                        status
                    );
                    last_err = err;
                }
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt + 1, attempts, e);
                    last_err = e.into();
                }
            }
        }

        Err(last_err)
    }

    /// Sleep for the current backoff (doubled per prior failure), racing
    /// the shutdown signal.
    async fn backoff_sleep(&self, prior_failures: u32) -> Result<(), AgentError> {
        let options = BackoffOptions {
            base_delay: self.config.initial_backoff,
            ..Default::default()
        };
        let delay = calc_exp_backoff(&options, prior_failures);

        match &self.shutdown {
            Some(rx) => {
                let mut rx = rx.clone();
                if *rx.borrow() {
                    return Err(AgentError::Cancelled);
                }
                tokio::select! {
                    _ = tokio::time::sleep(delay) => Ok(()),
                    _ = rx.changed() => Err(AgentError::Cancelled),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, AgentError> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
