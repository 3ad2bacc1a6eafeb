//! Minimal client for OpenAI-compatible JSON endpoints.
//!
//! Handles bearer auth, the per-request timeout, and mapping transport and
//! status failures into [`ServiceError`]. Response bodies of failed requests
//! are logged, never returned to the caller.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::config::{Config, Credential};
use crate::core::error::{ServiceError, SetupError};

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Credential,
    timeout: Duration,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, SetupError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SetupError::Configuration(format!("Could not create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.credential.clone(),
            timeout: config.request_timeout,
        })
    }

    /// POST `body` to `{base_url}{path}` and decode the JSON response.
    pub async fn post_json<B, R>(
        &self,
        service: &'static str,
        path: &str,
        body: &B,
    ) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(service, %url, "sending request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(service, e))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::warn!(service, status = status.as_u16(), body = %message, "request rejected");
            return Err(ServiceError::Status {
                service,
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| self.transport_error(service, e))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(service, error = %e, "could not decode response");
            ServiceError::InvalidResponse {
                service,
                reason: "malformed JSON body".to_string(),
            }
        })
    }

    fn transport_error(&self, service: &'static str, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout {
                service,
                after: self.timeout,
            }
        } else {
            tracing::warn!(service, error = %e, "transport failure");
            ServiceError::Http { service, source: e }
        }
    }
}
