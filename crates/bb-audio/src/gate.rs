//! Scalar gates evaluated before the classifier.
//!
//! Both gates look at the signal before peak normalization: after it every
//! clip has the same peak and loudness no longer means anything.

/// Rejects clips quieter than `min_rms`.
///
/// # Example
/// ```
/// use bb_audio::gate::SilenceGate;
/// let gate = SilenceGate { min_rms: 0.01 };
/// assert!(gate.check(0.02));
/// assert!(!gate.check(0.001));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct SilenceGate {
    pub min_rms: f32,
}

impl SilenceGate {
    /// True when the clip is loud enough to be classified.
    #[must_use]
    pub fn check(&self, rms: f32) -> bool {
        rms >= self.min_rms
    }
}

/// Rejects clips whose mean spectral centroid is below `min_hz`.
///
/// Rat vocalizations sit high in the spectrum; HVAC hum and voices do not.
#[derive(Clone, Copy, Debug)]
pub struct CentroidGate {
    pub min_hz: f32,
}

impl CentroidGate {
    #[must_use]
    pub fn check(&self, centroid_hz: f32) -> bool {
        centroid_hz >= self.min_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive() {
        assert!(SilenceGate { min_rms: 0.005 }.check(0.005));
        assert!(CentroidGate { min_hz: 1500.0 }.check(1500.0));
        assert!(!CentroidGate { min_hz: 1500.0 }.check(1499.9));
    }

    #[test]
    fn nan_never_passes() {
        assert!(!SilenceGate { min_rms: 0.0 }.check(f32::NAN));
        assert!(!CentroidGate { min_hz: 0.0 }.check(f32::NAN));
    }
}
