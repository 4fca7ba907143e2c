use thiserror::Error;

pub type Result<T> = std::result::Result<T, SellerError>;

#[derive(Debug, Error)]
pub enum SellerError {
    /// HTTP 403 and 429 both land here. The client has already waited out
    /// the rate-limit interval by the time the caller sees this.
    #[error("Rate limited ({status}). Please wait before retrying.")]
    RateLimited { status: u16 },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Remote envelope came back with `code != 0`.
    #[error("{message} (code: {code})")]
    Application { code: i64, message: String },

    #[error("Invalid seller domain: {0}")]
    InvalidDomain(String),
}

impl SellerError {
    /// Whether a retry after backoff has any chance of succeeding.
    ///
    /// Transport-level 403/429 always qualify. Application failures qualify
    /// only when the remote message itself talks about rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            SellerError::RateLimited { .. } => true,
            SellerError::Http { status, .. } => *status == 403 || *status == 429,
            SellerError::Application { message, .. } => mentions_rate_limit(message),
            _ => false,
        }
    }
}

/// Whether a free-form failure message reads like a rate-limit rejection.
pub fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests") || lower.contains("403")
}

impl From<reqwest::Error> for SellerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SellerError::MalformedResponse(err.to_string())
        } else {
            SellerError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SellerError {
    fn from(err: serde_json::Error) -> Self {
        SellerError::MalformedResponse(err.to_string())
    }
}
