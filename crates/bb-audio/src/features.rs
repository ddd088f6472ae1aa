use crate::fft::FftPipeline;

/// Spectral centroid of a magnitude spectrum, in Hz.
///
/// Returns 0.0 for a silent spectrum.
///
/// # Example
/// ```
/// use bb_audio::features::spectral_centroid;
/// let mut spectrum = vec![0.0f32; 513];
/// spectrum[100] = 1.0;
/// let hz = spectral_centroid(&spectrum, 16000);
/// assert!((hz - 100.0 * 16000.0 / 1024.0).abs() < 1e-3);
/// ```
#[must_use]
pub fn spectral_centroid(spectrum: &[f32], sample_rate: u32) -> f32 {
    if spectrum.len() < 2 {
        return 0.0;
    }
    let bin_hz = sample_rate as f32 / ((spectrum.len() - 1) * 2) as f32;

    let total: f32 = spectrum.iter().sum();
    if total <= 1e-10 {
        return 0.0;
    }
    let weighted: f32 = spectrum
        .iter()
        .enumerate()
        .map(|(i, &mag)| i as f32 * bin_hz * mag)
        .sum();
    weighted / total
}

/// Mean spectral centroid over non-silent frames of `samples`.
///
/// Frames start every `hop` samples and are not centered; a clip shorter
/// than `n_fft` is analysed as a single zero-padded frame.
#[must_use]
pub fn mean_centroid(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> f32 {
    if samples.is_empty() || n_fft == 0 {
        return 0.0;
    }
    let hop = hop.max(1);
    let mut fft = FftPipeline::new(n_fft);
    let mut spectrum = vec![0.0f32; fft.n_bins()];

    let mut sum = 0.0f64;
    let mut count = 0usize;
    let mut start = 0;
    loop {
        let end = (start + n_fft).min(samples.len());
        fft.magnitude_into(&samples[start..end], &mut spectrum);
        let c = spectral_centroid(&spectrum, sample_rate);
        if c > 0.0 {
            sum += f64::from(c);
            count += 1;
        }
        if end == samples.len() {
            break;
        }
        start += hop;
    }

    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}
