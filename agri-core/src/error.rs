use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by the backend client and the session layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required user input was absent; no request was sent.
    #[error("{0}")]
    MissingInput(&'static str),

    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    #[error("Failed to reach the backend: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to parse {context} response: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The backend answered but reported a logical failure.
    #[error("{0}")]
    Backend(String),

    #[error("Request was superseded by a newer one")]
    Cancelled,

    #[error("Invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Input errors are reported to the user before any network call.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ApiError::MissingInput(_) | ApiError::InvalidImage { .. })
    }

    pub(crate) fn invalid_image(reason: impl Into<String>) -> Self {
        ApiError::InvalidImage { reason: reason.into() }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("oops"), "oops");
    }

    #[test]
    fn truncate_body_cuts_on_char_boundary() {
        let body = "é".repeat(300);
        let cut = truncate_body(&body);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }

    #[test]
    fn user_errors_are_classified() {
        assert!(ApiError::MissingInput("Please enter a location.").is_user_error());
        assert!(ApiError::invalid_image("too large").is_user_error());
        assert!(!ApiError::Backend("model not loaded".into()).is_user_error());
        assert!(!ApiError::Cancelled.is_user_error());
    }
}
