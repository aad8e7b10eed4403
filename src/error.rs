// Error types
//
// `ApiError` covers a single HTTP exchange with the service; `AuthError` is
// what the resolution protocol reports to the binary.

use std::path::PathBuf;

use crate::api::{FieldError, TwoFactorMethod};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("two-factor code required ({0})")]
    OtpRequired(TwoFactorMethod),

    #[error("bad credentials: {0}")]
    Unauthorized(String),

    #[error("unexpected response {status}: {message}{}", format_field_errors(.errors))]
    Status {
        status: u16,
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("gave up following pagination after {0} pages")]
    TooManyPages(usize),
}

impl ApiError {
    /// Build an error from a non-success status and the raw response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = if parsed.message.is_empty() {
            body.trim().to_string()
        } else {
            parsed.message
        };
        if status == 401 {
            return ApiError::Unauthorized(message);
        }
        ApiError::Status {
            status,
            message,
            errors: parsed.errors,
        }
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!(" [{}]", parts.join(", "))
}

/// Error document the service returns alongside 4xx responses
#[derive(Debug, Default, serde::Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<FieldError>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("application name must not be empty")]
    EmptyAppName,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("token cache {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read from terminal: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("two-factor authentication failed after {0} attempts")]
    TwoFactorFailed(u32),

    #[error("service returned an empty token")]
    EmptyToken,
}
