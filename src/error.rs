use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid import: {0}")]
    ImportFormat(String),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for NoteError {
    fn from(value: anyhow::Error) -> Self {
        Self::Storage(format!("{value:#}"))
    }
}

pub type NoteResult<T> = Result<T, NoteError>;

/// Failures talking to the remote problem catalogue. These never reach the
/// user; the resolver downgrades them to an unresolved record.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("api returned {status}: {comment}")]
    Api { status: String, comment: String },
}
