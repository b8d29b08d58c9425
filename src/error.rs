//! Error taxonomy shared by the normalizer, the preparer and the pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source data is missing a required shape (envelope, column, array).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A time value could not be turned into a timezone-aware instant.
    #[error("invalid timestamp {value:?} at row {position}")]
    InvalidTimestamp { position: usize, value: String },

    /// An object-store, HTTP or messaging call failed.
    #[error("{service} call failed: {source}")]
    CollaboratorFailure {
        service: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl PipelineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        PipelineError::MalformedInput(msg.into())
    }

    pub fn collaborator(service: &'static str, err: anyhow::Error) -> Self {
        PipelineError::CollaboratorFailure {
            service,
            source: err.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
