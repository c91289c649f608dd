//! Helpers for sanitizing data before it enters span attributes or file names.
//!
//! Traces are safe to share for debugging. Sender addresses and message ids
//! are reduced to something that still correlates but does not identify.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Masks the local part of an email address.
///
/// - `orders@target.com` → `o***@target.com`
/// - `Target <orders@target.com>` → `o***@target.com`
/// - anything without `@` → `<redacted>`
pub fn redact_email(value: &str) -> String {
    let addr = crate::model::bare_address(value);
    match addr.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        _ => "<redacted>".to_string(),
    }
}

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Short deterministic hash of an identifier for log correlation.
pub fn hash_id(id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Makes `value` safe to use as one path segment.
///
/// Path separators and control/reserved characters become `_`, runs of
/// whitespace collapse to one space, and leading/trailing dots and spaces
/// are trimmed. Returns `fallback` when nothing usable is left.
pub fn sanitize_path_component(value: &str, fallback: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c| c == '.' || c == ' ');

    if trimmed.is_empty() {
        return fallback.to_string();
    }

    // Keep segments well under common filesystem limits.
    trimmed.chars().take(120).collect()
}
