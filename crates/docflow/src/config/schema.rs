use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_status_table")]
    pub status_table: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub text_analytics: TextAnalyticsConfig,
    #[serde(default)]
    pub dead_jobs: DeadJobsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_status_table() -> String {
    "file-records".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// Credential sources for an external service. Resolved in order:
/// direct value, file, environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_feature_types")]
    pub feature_types: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_analysis_endpoint() -> String {
    "http://localhost:4566".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_feature_types() -> Vec<String> {
    vec![
        "TABLES".to_string(),
        "FORMS".to_string(),
        "LAYOUT".to_string(),
    ]
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analysis_endpoint(),
            credentials: Credentials::default(),
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
            feature_types: default_feature_types(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnalyticsConfig {
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_chars() -> usize {
    5000
}

impl Default for TextAnalyticsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_analysis_endpoint(),
            credentials: Credentials::default(),
            max_chars: default_max_chars(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Upper bound for `timeout_minutes`, one year.
pub const MAX_DEAD_JOB_TIMEOUT_MINUTES: u64 = 525_600;

/// Upper bound for `sweep_interval_secs`, one day.
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadJobsConfig {
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_timeout_minutes() -> u64 {
    120
}

fn default_sweep_interval_secs() -> u64 {
    900
}

impl Default for DeadJobsConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.status_table, "file-records");
        assert!(config.worker_count >= 1);
        assert_eq!(config.analysis.poll_interval_secs, 5);
        assert_eq!(config.analysis.max_poll_attempts, 60);
        assert_eq!(config.analysis.feature_types, vec!["TABLES", "FORMS", "LAYOUT"]);
        assert_eq!(config.text_analytics.max_chars, 5000);
        assert_eq!(config.dead_jobs.timeout_minutes, 120);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_credentials_are_flattened() {
        let config: Config = serde_json::from_str(
            r#"{
                "version": "1.0",
                "analysis": {"endpoint": "http://ocr", "api_key_env_var": "OCR_KEY"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.analysis.endpoint, "http://ocr");
        assert_eq!(
            config.analysis.credentials.api_key_env_var.as_deref(),
            Some("OCR_KEY")
        );
        assert!(config.analysis.credentials.api_key.is_none());
    }
}
