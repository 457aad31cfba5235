//! Typed job name: `process-file-{fileId}-{unixMillis}`.
//!
//! The name travels with the analysis job as its tag, so a completion event
//! can be traced back to the file it belongs to. Decoding splits at the last
//! `-`, which keeps hyphenated ids (UUIDs) intact.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

const PREFIX: &str = "process-file-";

pub const MAX_JOB_NAME_LEN: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobNameError {
    #[error("Malformed job name '{0}': expected process-file-{{fileId}}-{{timestamp}}")]
    Malformed(String),

    #[error("Invalid file id '{0}': only ASCII letters, digits, '_' and '-' are allowed")]
    InvalidFileId(String),

    #[error("Job name for file '{file_id}' exceeds {max} characters")]
    TooLong { file_id: String, max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobName {
    file_id: String,
    timestamp_ms: i64,
}

impl JobName {
    pub fn new(file_id: &str, at: DateTime<Utc>) -> Result<Self, JobNameError> {
        validate_file_id(file_id)?;
        let name = Self {
            file_id: file_id.to_string(),
            timestamp_ms: at.timestamp_millis().max(0),
        };
        if name.to_string().len() > MAX_JOB_NAME_LEN {
            return Err(JobNameError::TooLong {
                file_id: file_id.to_string(),
                max: MAX_JOB_NAME_LEN,
            });
        }
        Ok(name)
    }

    pub fn parse(s: &str) -> Result<Self, JobNameError> {
        let malformed = || JobNameError::Malformed(s.to_string());

        if s.len() > MAX_JOB_NAME_LEN {
            return Err(malformed());
        }
        let rest = s.strip_prefix(PREFIX).ok_or_else(malformed)?;
        let (file_id, timestamp) = rest.rsplit_once('-').ok_or_else(malformed)?;

        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let timestamp_ms = timestamp.parse::<i64>().map_err(|_| malformed())?;

        if file_id.is_empty() {
            return Err(malformed());
        }
        validate_file_id(file_id)?;

        Ok(Self {
            file_id: file_id.to_string(),
            timestamp_ms,
        })
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

fn validate_file_id(file_id: &str) -> Result<(), JobNameError> {
    let valid = !file_id.is_empty()
        && file_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(JobNameError::InvalidFileId(file_id.to_string()))
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", PREFIX, self.file_id, self.timestamp_ms)
    }
}

impl FromStr for JobName {
    type Err = JobNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
