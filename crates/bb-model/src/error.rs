use thiserror::Error;

/// Errors from loading or running a classifier.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Artifact could not be read.
    #[error("cannot read model {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Artifact bytes are not a valid model.
    #[error("invalid model artifact: {0}")]
    Parse(String),

    /// Artifact parsed but its dimensions or labels are inconsistent.
    #[error("inconsistent model: {0}")]
    Invalid(String),

    /// Feature vector length does not match the model input.
    #[error("model expects {expected} features, got {got}")]
    InputShape { expected: usize, got: usize },

    /// Inference produced NaN or infinity.
    #[error("model produced a non-finite confidence")]
    NonFinite,

    /// File extension not handled by any backend.
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// Inference runtime failure.
    #[error("inference backend error: {0}")]
    Backend(String),
}
