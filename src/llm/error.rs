//! Provider error types, classified by upstream failure.

use serde::Deserialize;

/// Classification of provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Quota or rate limit hit (429)
    RateLimited,
    /// Provider-side failure (5xx, or an error object in a 200 body)
    ServerError,
    /// Request rejected (bad key, unknown model, invalid schema)
    ClientError,
    /// Connection failed or timed out
    NetworkError,
    /// Body was not the expected JSON
    ParseError,
    /// No usable candidate (safety block, empty answer, truncation)
    Blocked,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LlmErrorKind::RateLimited => "Rate limited",
            LlmErrorKind::ServerError => "Server error",
            LlmErrorKind::ClientError => "Client error",
            LlmErrorKind::NetworkError => "Network error",
            LlmErrorKind::ParseError => "Parse error",
            LlmErrorKind::Blocked => "Blocked",
        };
        f.write_str(label)
    }
}

/// Error from one provider call.
#[derive(Debug, Clone)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// Upstream HTTP status, when there was one
    pub status_code: Option<u16>,
    pub message: String,
}

impl LlmError {
    fn new(kind: LlmErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
        }
    }

    pub fn rate_limited(message: String) -> Self {
        Self::new(LlmErrorKind::RateLimited, Some(429), message)
    }

    pub fn server_error(status_code: u16, message: String) -> Self {
        Self::new(LlmErrorKind::ServerError, Some(status_code), message)
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }

    pub fn blocked(message: String) -> Self {
        Self::new(LlmErrorKind::Blocked, None, message)
    }

    /// Build an error from a non-2xx response.
    ///
    /// Gemini wraps failures as `{"error": {"message": ...}}`; the inner
    /// message is used when present, the raw body otherwise.
    pub fn from_status(status_code: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| body.trim().to_string());
        Self::new(classify_http_status(status_code), Some(status_code), message)
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Map an HTTP status to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(400), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(403), LlmErrorKind::ClientError);
    }

    #[test]
    fn test_from_status_unwraps_gemini_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        let err = LlmError::from_status(400, body);
        assert_eq!(err.kind, LlmErrorKind::ClientError);
        assert_eq!(err.to_string(), "Client error (HTTP 400): API key not valid.");
    }

    #[test]
    fn test_from_status_plain_body() {
        let err = LlmError::from_status(429, "Resource exhausted\n");
        assert_eq!(err.kind, LlmErrorKind::RateLimited);
        assert_eq!(err.status_code, Some(429));
        assert_eq!(err.message, "Resource exhausted");
    }

    #[test]
    fn test_display_without_status() {
        let err = LlmError::network_error("Connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: Connection refused");
    }
}
