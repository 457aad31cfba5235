//! Credential resolution for the external analysis services.
//!
//! A credential may come from one of three sources, checked in order:
//!
//! 1. **Direct value** - local testing (`"api_key": "..."`)
//! 2. **File reference** - mounted secrets (`"api_key_file": "/run/secrets/ocr"`)
//! 3. **Env var reference** - container environments (`"api_key_env_var": "OCR_API_KEY"`)

use std::fs;

use secrecy::SecretString;

use crate::config::Credentials;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No credential source configured (need api_key, api_key_file or api_key_env_var)")]
    NoSourceProvided,

    #[error("Failed to read credential file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a credential is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecretSource<'a> {
    Direct(&'a str),
    File(&'a str),
    Env(&'a str),
}

impl<'a> SecretSource<'a> {
    /// The highest-priority source that is set and non-empty.
    fn select(
        direct: Option<&'a str>,
        file_path: Option<&'a str>,
        env_var: Option<&'a str>,
    ) -> Option<Self> {
        let non_empty = |v: Option<&'a str>| v.filter(|s| !s.is_empty());
        non_empty(direct)
            .map(Self::Direct)
            .or_else(|| non_empty(file_path).map(Self::File))
            .or_else(|| non_empty(env_var).map(Self::Env))
    }

    /// File and env values are trimmed; a direct value is taken as written.
    fn read(self) -> Result<SecretString> {
        match self {
            Self::Direct(value) => Ok(SecretString::from(value)),
            Self::File(path) => {
                let expanded = expand_home(path);
                let content =
                    fs::read_to_string(&expanded).map_err(|source| SecretError::FileReadError {
                        path: expanded.clone(),
                        source,
                    })?;
                Ok(SecretString::from(content.trim()))
            }
            Self::Env(name) => match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            },
        }
    }
}

/// Resolves a secret from the first non-empty source: direct value, file
/// contents, then environment variable.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    SecretSource::select(direct, file_path, env_var)
        .ok_or(SecretError::NoSourceProvided)?
        .read()
}

/// Like [`resolve_secret`], but a missing source yields `None`.
/// Services that run unauthenticated (local emulators) rely on this.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    SecretSource::select(direct, file_path, env_var)
        .map(SecretSource::read)
        .transpose()
}

/// Resolves the optional API key for a service section.
pub fn resolve_credentials(creds: &Credentials) -> Result<Option<SecretString>> {
    resolve_secret_optional(
        creds.api_key.as_deref(),
        creds.api_key_file.as_deref(),
        creds.api_key_env_var.as_deref(),
    )
}

pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    SecretSource::select(direct, file_path, env_var).is_some()
}

/// Expands a leading `~` to the current user's home directory.
/// `~user/path` is not supported.
pub fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}
