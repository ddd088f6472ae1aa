// Clip decoding, DSP and feature extraction for the BugBeats detector.

pub mod decode;
pub mod error;
pub mod features;
pub mod fft;
pub mod gate;
pub mod mel;
pub mod mfcc;
pub mod normalize;
pub mod pipeline;
pub mod resample;
pub mod wav;

pub use decode::Clip;
pub use error::AudioError;
pub use pipeline::{Prepared, Preprocessor};
