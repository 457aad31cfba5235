use std::time::Duration;

use crate::config::Config;

pub struct PipelineConfig {
    /// The only destination table work items may reference.
    pub status_table: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub max_enrichment_chars: usize,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            status_table: config.status_table.clone(),
            poll_interval: Duration::from_secs(config.analysis.poll_interval_secs),
            max_poll_attempts: config.analysis.max_poll_attempts,
            max_enrichment_chars: config.text_analytics.max_chars,
        }
    }
}
