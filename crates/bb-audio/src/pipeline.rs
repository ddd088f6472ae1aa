use bb_core::config::{AudioConfig, GateConfig};
use bb_core::detection::Stage;

use crate::decode::{Clip, decode_clip};
use crate::error::AudioError;
use crate::features::mean_centroid;
use crate::gate::{CentroidGate, SilenceGate};
use crate::mfcc::{MfccExtractor, summarize};
use crate::normalize::{fit_length, peak_normalize, rms};
use crate::resample::resample;

/// Outcome of preprocessing one upload.
#[derive(Clone, Debug, PartialEq)]
pub enum Prepared {
    /// A gate rejected the clip; the classifier must not run.
    Gated {
        stage: Stage,
        rms: f32,
        centroid_hz: f32,
    },
    /// Pooled MFCC vector ready for the classifier.
    Features {
        vector: Vec<f32>,
        rms: f32,
        centroid_hz: f32,
        frames: usize,
    },
}

/// Decode → resample → fit → gates → normalize → MFCC → pooling.
///
/// Holds the audio configuration and the MFCC extractor built from it.
/// Gate thresholds are passed per call because they can be reloaded while
/// the server runs; framing parameters cannot.
///
/// # Example
/// ```
/// use bb_audio::pipeline::{Prepared, Preprocessor};
/// use bb_core::config::{AudioConfig, GateConfig};
/// use bb_core::detection::Stage;
///
/// let pre = Preprocessor::new(AudioConfig::default());
/// let silence = vec![0u8; 32000]; // 1 s of s16le zeros
/// let out = pre.prepare(&silence, &GateConfig::default()).unwrap();
/// assert!(matches!(out, Prepared::Gated { stage: Stage::SilenceGate, .. }));
/// ```
pub struct Preprocessor {
    config: AudioConfig,
    mfcc: MfccExtractor,
}

impl Preprocessor {
    #[must_use]
    pub fn new(config: AudioConfig) -> Self {
        let mfcc = MfccExtractor::new(&config, config.target_sample_rate);
        Self { config, mfcc }
    }

    /// Decode, resample to the target rate and apply the fixed duration.
    ///
    /// # Errors
    /// Propagates decode and resample failures.
    pub fn condition(&self, bytes: &[u8]) -> Result<Clip, AudioError> {
        let clip = decode_clip(bytes, &self.config)?;
        self.condition_clip(clip)
    }

    /// Resample a decoded clip to the target rate and apply the fixed duration.
    ///
    /// # Errors
    /// Returns `AudioError::Empty` if nothing is left, or the resample error.
    pub fn condition_clip(&self, clip: Clip) -> Result<Clip, AudioError> {
        let target = self.config.target_sample_rate;
        let mut samples = if clip.sample_rate == target {
            clip.samples
        } else {
            resample(&clip.samples, clip.sample_rate, target)?
        };
        if let Some(secs) = self.config.clip_seconds {
            let len = (secs * target as f32).round() as usize;
            samples = fit_length(samples, len);
        }
        if samples.is_empty() {
            return Err(AudioError::Empty);
        }
        Ok(Clip {
            samples,
            sample_rate: target,
        })
    }

    /// Run the whole pipeline on an upload.
    ///
    /// # Errors
    /// Returns `AudioError::Empty` for an empty upload and the decode or
    /// resample error otherwise.
    pub fn prepare(&self, bytes: &[u8], gates: &GateConfig) -> Result<Prepared, AudioError> {
        let clip = decode_clip(bytes, &self.config)?;
        self.prepare_clip(clip, gates)
    }

    /// Run the pipeline on an already decoded clip.
    ///
    /// # Errors
    /// Same as [`Preprocessor::prepare`], minus decoding.
    pub fn prepare_clip(&self, clip: Clip, gates: &GateConfig) -> Result<Prepared, AudioError> {
        let Clip {
            mut samples,
            sample_rate,
        } = self.condition_clip(clip)?;

        let level = rms(&samples);
        let centroid_hz = mean_centroid(
            &samples,
            sample_rate,
            self.config.n_fft,
            self.config.hop_length,
        );

        let silence = SilenceGate {
            min_rms: gates.min_rms,
        };
        if !silence.check(level) {
            log::debug!("Silence gate: rms {level:.5} < {:.5}", gates.min_rms);
            return Ok(Prepared::Gated {
                stage: Stage::SilenceGate,
                rms: level,
                centroid_hz,
            });
        }

        let centroid = CentroidGate {
            min_hz: gates.min_centroid_hz,
        };
        if gates.centroid_gate && !centroid.check(centroid_hz) {
            log::debug!(
                "Centroid gate: {centroid_hz:.0}Hz < {:.0}Hz",
                gates.min_centroid_hz
            );
            return Ok(Prepared::Gated {
                stage: Stage::CentroidGate,
                rms: level,
                centroid_hz,
            });
        }

        peak_normalize(&mut samples);
        let matrix = self.mfcc.frames(&samples);
        let vector = summarize(&matrix, self.config.pooling);
        log::debug!(
            "Extracted {} features from {} frames (rms {level:.4}, centroid {centroid_hz:.0}Hz)",
            vector.len(),
            matrix.frames
        );

        Ok(Prepared::Features {
            vector,
            rms: level,
            centroid_hz,
            frames: matrix.frames,
        })
    }
}
