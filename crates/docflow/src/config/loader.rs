use std::path::Path;

use crate::config::schema::{
    Config, Credentials, MAX_DEAD_JOB_TIMEOUT_MINUTES, MAX_SWEEP_INTERVAL_SECS,
};
use crate::error::ConfigError;
use crate::secrets;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.status_table.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "status_table must not be empty".to_string(),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    for (section, endpoint) in [
        ("analysis", &config.analysis.endpoint),
        ("text_analytics", &config.text_analytics.endpoint),
    ] {
        if endpoint.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("{}.endpoint must not be empty", section),
            });
        }
    }

    if config.analysis.poll_interval_secs == 0 || config.analysis.max_poll_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "analysis polling interval and attempt count must be positive".to_string(),
        });
    }

    if config.text_analytics.max_chars == 0 {
        return Err(ConfigError::Validation {
            message: "text_analytics.max_chars must be positive".to_string(),
        });
    }

    if config.dead_jobs.timeout_minutes == 0 || config.dead_jobs.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "dead_jobs timeout and sweep interval must be positive".to_string(),
        });
    }

    if config.dead_jobs.timeout_minutes > MAX_DEAD_JOB_TIMEOUT_MINUTES {
        return Err(ConfigError::Validation {
            message: format!(
                "dead_jobs.timeout_minutes must be at most {}",
                MAX_DEAD_JOB_TIMEOUT_MINUTES
            ),
        });
    }

    if config.dead_jobs.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
        return Err(ConfigError::Validation {
            message: format!(
                "dead_jobs.sweep_interval_secs must be at most {}",
                MAX_SWEEP_INTERVAL_SECS
            ),
        });
    }

    validate_credentials("analysis", &config.analysis.credentials)?;
    validate_credentials("text_analytics", &config.text_analytics.credentials)?;

    Ok(())
}

/// A direct key alongside a file or env source is almost always a mistake
/// left over from local testing.
fn validate_credentials(section: &str, creds: &Credentials) -> Result<(), ConfigError> {
    let direct = creds.api_key.as_deref().is_some_and(|s| !s.is_empty());
    let indirect = secrets::has_secret_source(
        None,
        creds.api_key_file.as_deref(),
        creds.api_key_env_var.as_deref(),
    );
    if direct && indirect {
        log::warn!(
            "{}: api_key is set together with api_key_file/api_key_env_var; the direct value wins",
            section
        );
    }
    Ok(())
}
