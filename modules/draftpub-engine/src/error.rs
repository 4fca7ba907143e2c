use thiserror::Error;

use draftpub_common::DraftpubError;
use seller_client::SellerError;

pub type Result<T> = std::result::Result<T, RunError>;

/// Failures that end a run.
///
/// Per-page and per-candidate failures never surface here; the stages count
/// and log them and keep going.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error(transparent)]
    Api(#[from] SellerError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<DraftpubError> for RunError {
    fn from(err: DraftpubError) -> Self {
        match err {
            DraftpubError::Anyhow(e) => RunError::Anyhow(e),
            other => RunError::Storage(other.to_string()),
        }
    }
}
