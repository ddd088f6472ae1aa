//! Configuration, error and result types shared by the BugBeats workspace.
//!
//! Every other crate depends on this one for `DetectorConfig` and the
//! `Detection` value that flows from the pipeline to the HTTP response and
//! to telemetry.

pub mod config;
pub mod detection;
pub mod error;

pub use config::DetectorConfig;
pub use detection::{Detection, Stage, Verdict};
pub use error::CoreError;
