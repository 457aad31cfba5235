//! Minimal client for JSON-1.1 services that dispatch on an `X-Amz-Target`
//! header, shared by the analysis and text-analytics clients.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ServiceError;
use crate::sanitize;

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Clone)]
pub struct JsonTargetClient {
    client: reqwest::Client,
    endpoint: String,
    target_prefix: &'static str,
    api_key: Option<SecretString>,
}

impl JsonTargetClient {
    pub fn new(
        endpoint: &str,
        target_prefix: &'static str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        if endpoint.trim().is_empty() {
            return Err(ServiceError::Config("endpoint must not be empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            target_prefix,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts `body` to the `{prefix}.{operation}` target and decodes the reply.
    pub async fn call<B, R>(&self, operation: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{}.{}", self.target_prefix, operation))
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: sanitize::truncate_body(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for JsonTargetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonTargetClient")
            .field("endpoint", &self.endpoint)
            .field("target_prefix", &self.target_prefix)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}
