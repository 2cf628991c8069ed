//! Text and clock helpers shared by the store, the remote client and the CLI.

use chrono::Utc;

/// Characters of a server response body kept in an error message
const EXCERPT_CHARS: usize = 180;

/// Unix milliseconds, the unit of every record timestamp.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Unix seconds, the unit of session expiry.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Trimmed text, or `None` when only whitespace remains.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Why an API endpoint was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointError {
    Missing,
    NotHttp,
}

/// Accept `http(s)://host[/path]` and drop trailing slashes.
pub fn parse_endpoint(raw: &str) -> Result<String, EndpointError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EndpointError::Missing);
    }
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .ok_or(EndpointError::NotHttp)?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(EndpointError::NotHttp);
    }
    Ok(raw.trim_end_matches('/').to_owned())
}

/// Start of a response body on one line, short enough to show to a user.
pub fn excerpt(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(EXCERPT_CHARS)
        .collect()
}
