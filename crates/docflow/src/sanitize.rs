//! Helpers for sanitizing data before it enters tracing span attributes
//! and error messages.
//!
//! Storage keys can embed customer names and service error bodies can echo
//! whole documents, so neither goes into logs verbatim.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Longest service error body kept in an error message.
pub const MAX_BODY_CHARS: usize = 200;

/// Returns only the final path component of an object key.
///
/// `uploads/acme/2026/invoice.pdf` → `invoice.pdf`
pub fn redact_key(key: &str) -> String {
    key.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Caps a response body at [`MAX_BODY_CHARS`] characters.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    out.push_str("...");
    out
}

/// Short deterministic hash of a bucket/key pair for log correlation.
pub fn hash_location(bucket: &str, key: &str) -> String {
    let mut hasher = DefaultHasher::new();
    bucket.hash(&mut hasher);
    key.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
