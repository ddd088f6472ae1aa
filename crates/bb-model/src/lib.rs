// Pretrained classifiers for the BugBeats detector, their on-disk artifacts
// and the background slot that loads them.

pub mod artifact;
pub mod classifier;
pub mod decision;
pub mod error;
pub mod logistic;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod quantized;
pub mod slot;

pub use artifact::{ModelArtifact, load_classifier};
pub use classifier::Classifier;
pub use decision::decide;
pub use error::ModelError;
pub use slot::{ModelSlot, ModelState, ModelStatus};
