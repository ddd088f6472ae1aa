use thiserror::Error;

/// Errors originating from the audio module.
#[derive(Error, Debug)]
pub enum AudioError {
    /// The upload or the decoded stream holds no samples.
    #[error("audio clip is empty")]
    Empty,

    /// Unsupported audio format.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Audio decode error.
    #[error("decode error: {0}")]
    Decode(String),

    /// Sample rate conversion failed.
    #[error("resample error: {0}")]
    Resample(String),

    /// Reading a clip from disk failed.
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
