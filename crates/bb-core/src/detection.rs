use serde::Serialize;

/// Final classification of a clip.
///
/// # Example
/// ```
/// use bb_core::detection::Verdict;
/// assert!(Verdict::Rat.is_rat());
/// assert!(!Verdict::Ambient.is_rat());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// A rat vocalisation was detected.
    Rat,
    /// Background noise, silence, or anything else.
    Ambient,
}

impl Verdict {
    #[must_use]
    pub fn is_rat(self) -> bool {
        matches!(self, Self::Rat)
    }

    /// Inclusive threshold: `confidence >= threshold` is a rat.
    #[must_use]
    pub fn from_score(confidence: f32, threshold: f32) -> Self {
        if confidence >= threshold {
            Self::Rat
        } else {
            Self::Ambient
        }
    }
}

/// Pipeline step that produced the verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Clip rejected because its RMS level was below the silence threshold.
    SilenceGate,
    /// Clip rejected because its spectral centroid was too low.
    CentroidGate,
    /// The classifier scored the clip.
    Classifier,
}

impl Stage {
    /// Wire name, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SilenceGate => "silence_gate",
            Self::CentroidGate => "centroid_gate",
            Self::Classifier => "classifier",
        }
    }
}

/// Outcome of running one clip through the detector.
///
/// `confidence` is always the probability assigned to "rat present"; gated
/// clips never reach the model and carry 0.0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub verdict: Verdict,
    pub confidence: f32,
    pub stage: Stage,
    /// RMS level of the resampled clip before normalization.
    pub rms: f32,
    /// Mean spectral centroid in Hz (0.0 for silent clips).
    pub centroid_hz: f32,
}

impl Detection {
    /// Build a detection for a clip stopped by one of the gates.
    ///
    /// # Example
    /// ```
    /// use bb_core::detection::{Detection, Stage, Verdict};
    /// let d = Detection::gated(Stage::SilenceGate, 0.001, 0.0);
    /// assert_eq!(d.verdict, Verdict::Ambient);
    /// assert_eq!(d.confidence, 0.0);
    /// ```
    #[must_use]
    pub fn gated(stage: Stage, rms: f32, centroid_hz: f32) -> Self {
        Self {
            verdict: Verdict::Ambient,
            confidence: 0.0,
            stage,
            rms,
            centroid_hz,
        }
    }

    /// Build a detection from a classifier score.
    ///
    /// The verdict is `Rat` iff `confidence >= threshold`.
    ///
    /// # Example
    /// ```
    /// use bb_core::detection::{Detection, Verdict};
    /// let d = Detection::classified(0.7, 0.7, 0.2, 3000.0);
    /// assert_eq!(d.verdict, Verdict::Rat);
    /// ```
    #[must_use]
    pub fn classified(confidence: f32, threshold: f32, rms: f32, centroid_hz: f32) -> Self {
        Self {
            verdict: Verdict::from_score(confidence, threshold),
            confidence,
            stage: Stage::Classifier,
            rms,
            centroid_hz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_below_threshold_is_ambient() {
        let d = Detection::classified(0.69, 0.7, 0.1, 2500.0);
        assert_eq!(d.verdict, Verdict::Ambient);
        assert_eq!(d.stage, Stage::Classifier);
    }

    #[test]
    fn gated_detection_keeps_measurements() {
        let d = Detection::gated(Stage::CentroidGate, 0.3, 850.0);
        assert!(!d.verdict.is_rat());
        assert_eq!(d.stage.as_str(), "centroid_gate");
        assert!((d.centroid_hz - 850.0).abs() < f32::EPSILON);
    }
}
