use std::sync::Arc;

use arc_swap::ArcSwap;
use bb_audio::{AudioError, Clip, Prepared, Preprocessor};
use bb_core::config::{AudioConfig, DetectorConfig};
use bb_core::detection::Detection;
use bb_model::{ModelError, ModelSlot, ModelStatus, decide};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("model not ready ({})", .0.state)]
    NotReady(ModelStatus),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Preprocessor + classifier + live thresholds.
///
/// Framing parameters are fixed at construction; gates and the decision
/// threshold are read from the shared config on every call so a reload
/// applies to the next request.
pub struct Detector {
    pre: Preprocessor,
    model: Arc<ModelSlot>,
    config: Arc<ArcSwap<DetectorConfig>>,
}

impl Detector {
    #[must_use]
    pub fn new(
        audio: AudioConfig,
        model: Arc<ModelSlot>,
        config: Arc<ArcSwap<DetectorConfig>>,
    ) -> Self {
        Self {
            pre: Preprocessor::new(audio),
            model,
            config,
        }
    }

    #[must_use]
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.pre
    }

    #[must_use]
    pub fn model_status(&self) -> ModelStatus {
        self.model.status()
    }

    /// Classify one upload. CPU bound; call from a blocking context.
    ///
    /// # Errors
    /// `NotReady` until the model is loaded, `Audio` for unusable clips,
    /// `Model` for shape mismatches or a non-finite score.
    pub fn detect(&self, bytes: &[u8]) -> Result<Detection, DetectError> {
        // Checked first so every request during startup gets the same answer
        let classifier = self.ready_classifier()?;
        let settings = self.config.load();
        let prepared = self.pre.prepare(bytes, &settings.gates)?;
        Self::finish(prepared, classifier.as_ref(), settings.model.threshold)
    }

    /// Same as [`Detector::detect`] for an already decoded clip.
    ///
    /// # Errors
    /// See [`Detector::detect`].
    pub fn detect_clip(&self, clip: Clip) -> Result<Detection, DetectError> {
        let classifier = self.ready_classifier()?;
        let settings = self.config.load();
        let prepared = self.pre.prepare_clip(clip, &settings.gates)?;
        Self::finish(prepared, classifier.as_ref(), settings.model.threshold)
    }

    fn ready_classifier(&self) -> Result<Arc<dyn bb_model::Classifier>, DetectError> {
        self.model
            .classifier()
            .ok_or_else(|| DetectError::NotReady(self.model.status()))
    }

    fn finish(
        prepared: Prepared,
        classifier: &dyn bb_model::Classifier,
        threshold: f32,
    ) -> Result<Detection, DetectError> {
        match prepared {
            Prepared::Gated {
                stage,
                rms,
                centroid_hz,
            } => Ok(Detection::gated(stage, rms, centroid_hz)),
            Prepared::Features {
                vector,
                rms,
                centroid_hz,
                ..
            } => {
                let confidence = classifier.predict(&vector)?;
                let verdict = decide(confidence, threshold)?;
                log::debug!(
                    "{}: confidence {confidence:.3} (threshold {threshold:.2}) → {verdict:?}",
                    classifier.name()
                );
                Ok(Detection::classified(confidence, threshold, rms, centroid_hz))
            }
        }
    }
}
