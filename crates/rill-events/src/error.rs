use std::io;
use std::path::PathBuf;

/// Errors produced anywhere along the notification pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No source-router entry matches any segment of the source chain.
    #[error("unknown route for source {chain}")]
    RouteNotFound { chain: String },

    /// The type router has no handler registered for the payload kind.
    #[error("no handler for event data of kind {kind}")]
    NoHandlerForType { kind: String },

    /// The coercion adapter cannot interpret the payload shape.
    #[error("failed to process event of shape {shape}")]
    UnsupportedPayloadShape { shape: String },

    /// Structured data could not be decoded into the target type.
    #[error("decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// A payload or record could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[source] serde_json::Error),

    /// File open, write, or rename failure on a table or queue.
    #[error("persistence failure on {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading a streaming payload failed.
    #[error("stream read error: {0}")]
    Stream(#[source] io::Error),

    /// A downstream handler was configured twice.
    #[error("handler already configured for {0}")]
    HandlerAlreadyConfigured(String),

    /// The dispatcher was created outside a tokio runtime.
    #[error("no async runtime available for dispatch")]
    NoRuntime,

    /// A spawned notification task panicked or was aborted.
    #[error("notification task failed: {0}")]
    TaskFailed(String),

    /// A domain handler refused the event.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl PipelineError {
    /// Build a [`PipelineError::Persistence`] for the given path.
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the pipeline crates.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
