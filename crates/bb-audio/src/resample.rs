use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::AudioError;

const CHUNK_SIZE: usize = 1024;

/// Number of output samples a `from → to` conversion of `len` samples yields.
///
/// # Example
/// ```
/// use bb_audio::resample::output_len;
/// assert_eq!(output_len(16000, 16000, 22050), 22050);
/// assert_eq!(output_len(3, 48000, 16000), 1);
/// ```
#[must_use]
pub fn output_len(len: usize, from: u32, to: u32) -> usize {
    if from == 0 {
        return 0;
    }
    (len as f64 * f64::from(to) / f64::from(from)).round() as usize
}

/// Resample mono audio from `from` Hz to `to` Hz.
///
/// Uses a windowed-sinc resampler. The resampler latency is removed and the
/// output is trimmed to `output_len(samples.len(), from, to)`, so the clip
/// stays time-aligned. Equal rates return a copy.
///
/// # Errors
/// Returns an error if the rates are zero or rubato rejects the ratio.
///
/// # Example
/// ```
/// use bb_audio::resample::resample;
/// let samples = vec![0.0f32; 16000];
/// let out = resample(&samples, 16000, 22050).unwrap();
/// assert_eq!(out.len(), 22050);
/// ```
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, AudioError> {
    if from == 0 || to == 0 {
        return Err(AudioError::Resample(format!("invalid rates {from} -> {to}")));
    }
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to) / f64::from(from);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
        .map_err(|e| AudioError::Resample(format!("init: {e}")))?;

    let wanted = output_len(samples.len(), from, to);
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(wanted + delay + CHUNK_SIZE);
    let mut input = vec![vec![0.0f32; CHUNK_SIZE]];

    let mut chunks = samples.chunks(CHUNK_SIZE);
    // Keep feeding (zero padding once the clip is exhausted) until the
    // delayed tail has come out.
    while output.len() < wanted + delay {
        let slot = &mut input[0];
        match chunks.next() {
            Some(chunk) => {
                slot[..chunk.len()].copy_from_slice(chunk);
                slot[chunk.len()..].fill(0.0);
            }
            None => slot.fill(0.0),
        }

        let resampled = resampler
            .process(&input, None)
            .map_err(|e| AudioError::Resample(format!("process: {e}")))?;
        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }

    output.drain(..delay);
    output.truncate(wanted);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn identity_is_a_copy() {
        let samples = sine(440.0, 16000, 1000);
        assert_eq!(resample(&samples, 16000, 16000).unwrap(), samples);
    }

    #[test]
    fn upsample_length_and_alignment() {
        let samples = sine(440.0, 16000, 16000);
        let out = resample(&samples, 16000, 22050).unwrap();
        assert_eq!(out.len(), 22050);
        // Latency removed: a sample in the middle matches the analytic sine.
        let t = 11025;
        let expected = (2.0 * std::f32::consts::PI * 440.0 * t as f32 / 22050.0).sin();
        assert!((out[t] - expected).abs() < 0.05, "{} vs {expected}", out[t]);
    }

    #[test]
    fn downsample_short_clip() {
        let samples = sine(200.0, 48000, 500);
        let out = resample(&samples, 48000, 16000).unwrap();
        assert_eq!(out.len(), 167);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(resample(&[0.0; 10], 0, 16000).is_err());
    }
}
