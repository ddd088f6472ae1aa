/// Scale `samples` in place so that the largest magnitude is exactly 1.0.
///
/// All-zero (or non-finite peak) input is left untouched.
///
/// # Example
/// ```
/// use bb_audio::normalize::peak_normalize;
/// let mut s = vec![0.1, -0.25, 0.05];
/// peak_normalize(&mut s);
/// assert_eq!(s, vec![0.4, -1.0, 0.2]);
/// ```
pub fn peak_normalize(samples: &mut [f32]) {
    let p = peak(samples);
    if p <= f32::MIN_POSITIVE || !p.is_finite() {
        return;
    }
    let gain = 1.0 / p;
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Truncate or zero-pad to exactly `len` samples.
///
/// # Example
/// ```
/// use bb_audio::normalize::fit_length;
/// assert_eq!(fit_length(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
/// assert_eq!(fit_length(vec![1.0], 3), vec![1.0, 0.0, 0.0]);
/// ```
#[must_use]
pub fn fit_length(mut samples: Vec<f32>, len: usize) -> Vec<f32> {
    samples.resize(len, 0.0);
    samples
}

/// Root mean square level (0.0 for an empty slice).
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Largest absolute sample value.
#[must_use]
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}
