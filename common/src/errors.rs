use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Double-quotes `s` with Go `%q` escaping: printable characters pass
/// through, ASCII controls become `\a`-style or `\xNN` escapes, other
/// controls become `\uNNNN`.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{b}' => out.push_str("\\v"),
            c if (c as u32) < 0x80 && c.is_control() => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Failures surfaced by an upstream weather provider.
///
/// Every kind of upstream failure has its own variant so callers can tell
/// a refused request apart from a broken payload.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("city is required")]
    MissingCity,

    #[error("{} is an unknown city for this provider", quote(.0))]
    UnknownCity(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{provider} returned bad status {status}")]
    Status { provider: String, status: u16 },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Failed reading response body: {0}")]
    Body(String),

    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn status(provider: impl Into<String>, status: u16) -> Self {
        Self::Status {
            provider: provider.into(),
            status,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

/// Startup configuration problems. These are fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("must have at least one provider")]
    NoProviders,

    #[error("{0} is required")]
    Missing(String),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: String, reason: String },

    #[error("HTTP_PORT must be between 1024 and 65535 (exclusive), got {0}")]
    PortOutOfRange(u32),
}

impl ConfigError {
    pub fn missing(var: impl Into<String>) -> Self {
        Self::Missing(var.into())
    }

    pub fn invalid(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned to HTTP callers of the weather endpoint.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AppError {
    #[error("Bad method - Go away!")]
    BadMethod,

    #[error("Bad Request")]
    MissingCity,

    #[error("Sorry, don't know that city {}", quote(.0))]
    UnknownCity(String),

    #[error("Internal Server Error")]
    Serialization(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadMethod => StatusCode::METHOD_NOT_ALLOWED,
            AppError::MissingCity | AppError::UnknownCity(_) => StatusCode::BAD_REQUEST,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = format!("{}\n", self);

        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            body,
        )
            .into_response()
    }
}
