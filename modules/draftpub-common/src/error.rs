use thiserror::Error;

#[derive(Error, Debug)]
pub enum DraftpubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<std::io::Error> for DraftpubError {
    fn from(err: std::io::Error) -> Self {
        DraftpubError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DraftpubError {
    fn from(err: serde_json::Error) -> Self {
        DraftpubError::Storage(err.to_string())
    }
}
