use thiserror::Error;

/// Configuration problems that clamping cannot repair.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Unsupported file or data format.
    #[error("unsupported format: {format}")]
    UnsupportedFormat {
        /// The format string that is unsupported.
        format: String,
    },
}
