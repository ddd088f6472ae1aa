use bb_core::detection::Verdict;

use crate::error::ModelError;

/// Compare a confidence against the decision threshold.
///
/// The threshold is inclusive: `confidence >= threshold` is a rat.
///
/// # Errors
/// Returns `ModelError::NonFinite` for NaN or infinite confidence, which
/// would otherwise silently compare as "ambient".
///
/// # Example
/// ```
/// use bb_core::detection::Verdict;
/// use bb_model::decide;
/// assert_eq!(decide(0.7, 0.7).unwrap(), Verdict::Rat);
/// assert_eq!(decide(0.69, 0.7).unwrap(), Verdict::Ambient);
/// assert!(decide(f32::NAN, 0.7).is_err());
/// ```
pub fn decide(confidence: f32, threshold: f32) -> Result<Verdict, ModelError> {
    if !confidence.is_finite() {
        return Err(ModelError::NonFinite);
    }
    Ok(Verdict::from_score(confidence, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_confidence_is_rejected() {
        assert!(matches!(decide(f32::INFINITY, 0.5), Err(ModelError::NonFinite)));
        assert!(matches!(decide(f32::NEG_INFINITY, 0.5), Err(ModelError::NonFinite)));
    }

    #[test]
    fn zero_threshold_accepts_everything() {
        assert_eq!(decide(0.0, 0.0).unwrap(), Verdict::Rat);
    }
}
