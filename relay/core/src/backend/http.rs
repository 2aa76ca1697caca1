//! HTTP provider adapter
//!
//! One adapter type serves every wire format: it builds the format's request,
//! retries transient failures with backoff, frames the response into lines and
//! hands each line to the format's decoder.
//!
//! Retries only happen while nothing has been yielded for the current call.
//! Once a delta has reached the caller, a later transport failure ends the
//! stream with a single [`Delta::Error`] instead of replaying output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use thiserror::Error;

use super::decoder::decoder_for;
use super::lines::{LineError, LineStream};
use super::traits::{BackendError, Delta, DeltaStream, LlmRequest, ProviderAdapter, WireFormat};
use super::{deepseek, greatwall, openai};
use crate::config::ProviderConfig;

/// Longest upstream error body kept for logs
const MAX_ERROR_BODY: usize = 512;

/// Why an adapter could not be built from configuration
#[derive(Debug, Error)]
pub enum AdapterBuildError {
    /// No `base_url` configured
    #[error("provider {0} has no base_url")]
    MissingBaseUrl(String),

    /// `api_key_env` names a variable that is not set
    #[error("provider {provider} expects an API key in ${var}")]
    MissingApiKey {
        /// Provider name
        provider: String,
        /// Environment variable name
        var: String,
    },

    /// The HTTP client could not be created
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

struct Inner {
    name: String,
    config: ProviderConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

/// Streaming adapter for HTTP providers
#[derive(Clone)]
pub struct HttpProviderAdapter {
    inner: Arc<Inner>,
}

impl HttpProviderAdapter {
    /// Build an adapter from a provider definition
    ///
    /// # Errors
    ///
    /// Fails when the base URL or a required API key is missing, or the HTTP
    /// client cannot be constructed.
    pub fn new(name: impl Into<String>, config: ProviderConfig) -> Result<Self, AdapterBuildError> {
        let name = name.into();
        if config.base_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(AdapterBuildError::MissingBaseUrl(name));
        }
        let api_key = config
            .resolve_api_key()
            .map_err(|var| AdapterBuildError::MissingApiKey {
                provider: name.clone(),
                var,
            })?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!("relay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                config,
                api_key,
                client,
            }),
        })
    }

    /// Provider definition this adapter was built from
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.inner.config
    }
}

impl Inner {
    fn request_body(&self, request: &LlmRequest) -> serde_json::Value {
        match self.config.format {
            WireFormat::OpenAi => openai::request_body(request),
            WireFormat::DeepSeek => deepseek::request_body(request),
            WireFormat::GreatWall => {
                let tpuid = greatwall::generate_tpuid(&self.config.tpuid_prefix);
                greatwall::request_body(request, &tpuid)
            }
        }
    }

    /// Send the request and wait for a successful status line
    async fn open(&self, request: &LlmRequest) -> Result<reqwest::Response, BackendError> {
        let read_timeout = self.config.read_timeout();
        let url = self
            .config
            .endpoint_url(&request.model)
            .ok_or_else(|| BackendError::Request("provider has no base_url".into()))?;

        let mut builder = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(&self.request_body(request));
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(provider = %self.name, model = %request.model, url = %url, "Opening upstream stream");

        let response = tokio::time::timeout(read_timeout, builder.send())
            .await
            .map_err(|_| BackendError::Timeout(read_timeout))?
            .map_err(|e| BackendError::from_reqwest(&e, read_timeout))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

fn run_stream(inner: Arc<Inner>, request: LlmRequest) -> DeltaStream {
    Box::pin(async_stream::stream! {
        let retry = &inner.config.retry;
        let read_timeout: Duration = inner.config.read_timeout();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let failure = match inner.open(&request).await {
                Ok(response) => {
                    let mut lines = LineStream::new(Box::pin(response.bytes_stream()));
                    let mut decoder = decoder_for(inner.config.format);
                    let mut emitted = false;

                    let failure = loop {
                        match tokio::time::timeout(read_timeout, lines.next()).await {
                            Err(_) => break Some(BackendError::Timeout(read_timeout)),
                            Ok(None) => break None,
                            Ok(Some(Err(LineError::Source(e)))) => {
                                break Some(BackendError::from_reqwest(&e, read_timeout));
                            }
                            Ok(Some(Err(e @ LineError::TooLong { .. }))) => {
                                break Some(BackendError::Stream(e.to_string()));
                            }
                            Ok(Some(Ok(line))) => {
                                let outcome = decoder.decode_line(&line);
                                for delta in outcome.deltas {
                                    emitted = true;
                                    yield delta;
                                }
                                if outcome.finished {
                                    break None;
                                }
                            }
                        }
                    };

                    match failure {
                        None => {
                            tracing::debug!(provider = %inner.name, attempt, "Upstream stream finished");
                            return;
                        }
                        Some(err) if emitted => {
                            tracing::warn!(
                                provider = %inner.name,
                                error = %err,
                                "Upstream stream broke after output was delivered"
                            );
                            yield Delta::Error(err);
                            return;
                        }
                        Some(err) => err,
                    }
                }
                Err(err) => err,
            };

            if retry.should_retry(&failure) && retry.has_attempts_left(attempt) {
                let backoff = retry.backoff_for_attempt(attempt - 1);
                tracing::warn!(
                    provider = %inner.name,
                    attempt,
                    max_attempts = retry.max_attempts,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %failure,
                    "Upstream call failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            tracing::error!(
                provider = %inner.name,
                attempt,
                error = %failure,
                "Upstream call failed"
            );
            yield Delta::Error(failure);
            return;
        }
    })
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn wire_format(&self) -> WireFormat {
        self.inner.config.format
    }

    fn stream(&self, request: &LlmRequest) -> DeltaStream {
        run_stream(Arc::clone(&self.inner), request.clone())
    }

    async fn health_check(&self) -> bool {
        let Some(base) = self.inner.config.base_url.as_deref() else {
            return false;
        };
        self.inner
            .client
            .get(base)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_base_url_is_rejected() {
        let result = HttpProviderAdapter::new("nowhere", ProviderConfig::default());
        assert!(matches!(result, Err(AdapterBuildError::MissingBaseUrl(name)) if name == "nowhere"));
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let config = ProviderConfig {
            api_key_env: Some("RELAY_TEST_UNSET_PROVIDER_KEY".into()),
            ..ProviderConfig::new(WireFormat::OpenAi, "https://api.example.com")
        };
        let result = HttpProviderAdapter::new("openai", config);
        assert!(matches!(
            result,
            Err(AdapterBuildError::MissingApiKey { ref var, .. }) if var == "RELAY_TEST_UNSET_PROVIDER_KEY"
        ));
    }

    #[test]
    fn test_adapter_reports_identity() {
        let adapter = HttpProviderAdapter::new(
            "deepseek",
            ProviderConfig::new(WireFormat::DeepSeek, "https://api.deepseek.com"),
        )
        .unwrap();
        assert_eq!(adapter.name(), "deepseek");
        assert_eq!(adapter.wire_format(), WireFormat::DeepSeek);
    }

    #[test]
    fn test_greatwall_body_has_fresh_tpuid() {
        let adapter = HttpProviderAdapter::new(
            "gw",
            ProviderConfig {
                tpuid_prefix: "chat".into(),
                ..ProviderConfig::new(WireFormat::GreatWall, "https://gw.example.com")
            },
        )
        .unwrap();
        let request = LlmRequest::new("p", "gw-large");
        let first = adapter.inner.request_body(&request);
        let second = adapter.inner.request_body(&request);

        assert!(first["tpuid"].as_str().unwrap().starts_with("chat_"));
        assert_ne!(first["tpuid"], second["tpuid"]);
    }
}
