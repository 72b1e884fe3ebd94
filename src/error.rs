use thiserror::Error;

/// Errors surfaced by the counting core and its host-side helpers.
#[derive(Debug, Error)]
pub enum CountError {
    /// Malformed ROI, crossing line or threshold set. Always fatal.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed frame on line {line}: {source}")]
    MalformedFrame {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl CountError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CountError::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CountError>;
