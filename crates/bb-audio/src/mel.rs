//! Mel filterbank, log compression and DCT used by the MFCC extractor.
//!
//! Slaney mel scale with area-normalized triangular filters, matching the
//! feature pipeline the classifiers are trained against.

const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
/// ln(6.4) / 27
const LOG_STEP: f32 = 0.068_751_78;

/// Hz → mel (Slaney: linear below 1 kHz, logarithmic above).
///
/// # Example
/// ```
/// use bb_audio::mel::{hz_to_mel, mel_to_hz};
/// assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-4);
/// assert!((mel_to_hz(hz_to_mel(4321.0)) - 4321.0).abs() < 0.05);
/// ```
#[must_use]
pub fn hz_to_mel(hz: f32) -> f32 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / LOG_STEP
    } else {
        hz / F_SP
    }
}

/// Mel → Hz, inverse of [`hz_to_mel`].
#[must_use]
pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (LOG_STEP * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// One triangular filter, stored sparsely from its first non-zero bin.
struct Filter {
    start: usize,
    weights: Vec<f32>,
}

/// Bank of `n_mels` triangular filters over an `n_fft` power spectrum.
///
/// # Example
/// ```
/// use bb_audio::mel::MelFilterbank;
/// let bank = MelFilterbank::new(40, 512, 16000, 0.0, None);
/// let spectrum = vec![1.0f32; 257];
/// let mut out = vec![0.0f32; 40];
/// bank.apply(&spectrum, &mut out);
/// assert!(out.iter().all(|&e| e > 0.0));
/// ```
pub struct MelFilterbank {
    filters: Vec<Filter>,
    n_bins: usize,
}

impl MelFilterbank {
    /// Build the filterbank. `fmax` defaults to Nyquist and is capped there.
    #[must_use]
    pub fn new(n_mels: usize, n_fft: usize, sample_rate: u32, fmin: f32, fmax: Option<f32>) -> Self {
        let n_bins = n_fft / 2 + 1;
        let nyquist = sample_rate as f32 / 2.0;
        let fmax = fmax.unwrap_or(nyquist).min(nyquist);
        let fmin = fmin.clamp(0.0, fmax);

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let n_points = n_mels + 2;
        let hz_points: Vec<f32> = (0..n_points)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_points - 1) as f32))
            .collect();

        let bin_hz = sample_rate as f32 / n_fft as f32;

        let filters = (0..n_mels)
            .map(|m| {
                let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
                let lower_width = (center - left).max(f32::EPSILON);
                let upper_width = (right - center).max(f32::EPSILON);
                // Slaney normalization: constant energy per filter
                let enorm = 2.0 / (right - left).max(f32::EPSILON);

                let mut start = None;
                let mut weights = Vec::new();
                for bin in 0..n_bins {
                    let f = bin as f32 * bin_hz;
                    let lower = (f - left) / lower_width;
                    let upper = (right - f) / upper_width;
                    let w = lower.min(upper).max(0.0) * enorm;
                    if w > 0.0 {
                        start.get_or_insert(bin);
                        weights.push(w);
                    } else if start.is_some() {
                        break;
                    }
                }
                Filter {
                    start: start.unwrap_or(0),
                    weights,
                }
            })
            .collect();

        Self { filters, n_bins }
    }

    /// Mel energies of one power spectrum frame.
    pub fn apply(&self, power: &[f32], out: &mut [f32]) {
        debug_assert!(power.len() >= self.n_bins, "spectrum shorter than filterbank");
        for (slot, filter) in out.iter_mut().zip(&self.filters) {
            *slot = power
                .iter()
                .skip(filter.start)
                .zip(&filter.weights)
                .map(|(p, w)| p * w)
                .sum();
        }
    }

    #[must_use]
    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }
}

/// Convert power values to decibels in place.
///
/// `10 * log10(max(x, 1e-10))`, then everything below `max - top_db` is
/// raised to that floor. The floor is taken over the whole slice, so pass
/// the full spectrogram rather than a single frame.
///
/// # Example
/// ```
/// use bb_audio::mel::power_to_db;
/// let mut v = vec![1.0, 0.01, 0.0];
/// power_to_db(&mut v, Some(30.0));
/// assert!((v[0] - 0.0).abs() < 1e-5);
/// assert!((v[1] + 20.0).abs() < 1e-4);
/// assert!((v[2] + 30.0).abs() < 1e-4);
/// ```
pub fn power_to_db(values: &mut [f32], top_db: Option<f32>) {
    const AMIN: f32 = 1e-10;
    let mut max_db = f32::NEG_INFINITY;
    for v in values.iter_mut() {
        *v = 10.0 * v.max(AMIN).log10();
        max_db = max_db.max(*v);
    }
    if let Some(top) = top_db {
        let floor = max_db - top;
        for v in values.iter_mut() {
            *v = v.max(floor);
        }
    }
}

/// Orthonormal DCT-II basis, `n_out × n_in`, row-major.
///
/// # Example
/// ```
/// use bb_audio::mel::dct_matrix;
/// let basis = dct_matrix(4, 4);
/// // First row is the constant 1/sqrt(N).
/// assert!((basis[0] - 0.5).abs() < 1e-6);
/// ```
#[must_use]
pub fn dct_matrix(n_out: usize, n_in: usize) -> Vec<f32> {
    let n = n_in as f64;
    let mut basis = Vec::with_capacity(n_out * n_in);
    for k in 0..n_out {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        for i in 0..n_in {
            let angle = std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n);
            basis.push((scale * angle.cos()) as f32);
        }
    }
    basis
}

/// Apply a `dct_matrix` basis to one log-mel frame.
pub fn dct_apply(basis: &[f32], input: &[f32], out: &mut [f32]) {
    let n_in = input.len();
    for (k, slot) in out.iter_mut().enumerate() {
        let row = &basis[k * n_in..(k + 1) * n_in];
        *slot = row.iter().zip(input).map(|(b, x)| b * x).sum();
    }
}
