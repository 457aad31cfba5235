use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::{AnalysisPage, AnalysisService, DocumentLocation};
use crate::config::AnalysisConfig;
use crate::error::ServiceError;
use crate::http::JsonTargetClient;
use crate::secrets;

const TARGET_PREFIX: &str = "Textract";
const MAX_RESULTS: u32 = 1000;

/// Document analysis over the JSON-1.1 `Textract.*` operations.
#[derive(Debug, Clone)]
pub struct HttpAnalysisService {
    client: JsonTargetClient,
    feature_types: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartRequest<'a> {
    document_location: RequestLocation<'a>,
    feature_types: &'a [String],
    job_tag: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RequestLocation<'a> {
    s3_object: S3Object<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct S3Object<'a> {
    bucket: &'a str,
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartResponse {
    job_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetRequest<'a> {
    job_id: &'a str,
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

impl HttpAnalysisService {
    pub fn new(
        endpoint: &str,
        api_key: Option<SecretString>,
        feature_types: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: JsonTargetClient::new(endpoint, TARGET_PREFIX, api_key, timeout)?,
            feature_types,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ServiceError> {
        let api_key = secrets::resolve_credentials(&config.credentials)
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        Self::new(
            &config.endpoint,
            api_key,
            config.feature_types.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn start_analysis(
        &self,
        location: &DocumentLocation,
        job_tag: &str,
    ) -> Result<String, ServiceError> {
        let request = StartRequest {
            document_location: RequestLocation {
                s3_object: S3Object {
                    bucket: &location.bucket,
                    name: &location.key,
                },
            },
            feature_types: &self.feature_types,
            job_tag,
        };
        let response: StartResponse = self.client.call("StartDocumentAnalysis", &request).await?;
        Ok(response.job_id)
    }

    async fn get_analysis(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<AnalysisPage, ServiceError> {
        let request = GetRequest {
            job_id,
            max_results: MAX_RESULTS,
            next_token,
        };
        self.client.call("GetDocumentAnalysis", &request).await
    }
}
