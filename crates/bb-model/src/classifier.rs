use crate::error::ModelError;

/// A pretrained rat-vs-ambient classifier.
///
/// Implementations are immutable after loading and shared across request
/// handlers behind an `Arc`.
pub trait Classifier: Send + Sync {
    /// Probability in [0, 1] that the clip contains a rat.
    ///
    /// # Errors
    /// `ModelError::InputShape` when `features` has the wrong length,
    /// `ModelError::Backend` for runtime failures.
    fn predict(&self, features: &[f32]) -> Result<f32, ModelError>;

    /// Expected feature vector length, when the model knows it.
    fn input_len(&self) -> Option<usize>;

    /// Short backend name for logs and `/health`.
    fn name(&self) -> &'static str;
}

/// Reject a feature vector whose length differs from `expected`.
///
/// # Errors
/// Returns `ModelError::InputShape` on mismatch.
pub fn check_input(expected: usize, features: &[f32]) -> Result<(), ModelError> {
    if features.len() == expected {
        Ok(())
    } else {
        Err(ModelError::InputShape {
            expected,
            got: features.len(),
        })
    }
}

/// Warn when a model declares an input length other than `expected`.
///
/// Returns false on mismatch. Models that do not declare a length pass.
pub fn warn_on_input_mismatch(model: &dyn Classifier, expected: usize) -> bool {
    match model.input_len() {
        Some(len) if len != expected => {
            log::warn!(
                "{} model expects {len} features but the audio settings produce {expected}; \
                 every scored clip will be rejected",
                model.name()
            );
            false
        }
        _ => true,
    }
}

/// Numerically stable logistic function.
///
/// # Example
/// ```
/// use bb_model::classifier::sigmoid;
/// assert!((sigmoid(0.0) - 0.5).abs() < 1e-7);
/// assert!(sigmoid(-1000.0) >= 0.0);
/// assert!(sigmoid(1000.0) <= 1.0);
/// ```
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Softmax in place, shifted by the maximum.
pub fn softmax(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let mut v = vec![1.0, 2.0, 3.0, 1000.0];
        softmax(&mut v);
        let sum: f32 = v.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(v[3] > 0.99);
    }

    #[test]
    fn input_check_reports_both_lengths() {
        let err = check_input(40, &[0.0; 13]).unwrap_err();
        assert!(matches!(err, ModelError::InputShape { expected: 40, got: 13 }));
        assert!(check_input(2, &[0.0; 2]).is_ok());
    }
}
