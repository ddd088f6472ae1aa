use realfft::RealFftPlanner;
use realfft::num_complex::Complex;

/// FFT pipeline: windowed real FFT using realfft.
///
/// Pre-allocates the FFT plan and scratch buffers so a pipeline can be
/// reused across every frame of a clip.
///
/// # Example
/// ```
/// use bb_audio::fft::FftPipeline;
/// let fft = FftPipeline::new(2048);
/// assert_eq!(fft.n_bins(), 1025);
/// ```
pub struct FftPipeline {
    fft_size: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    plan: std::sync::Arc<dyn realfft::RealToComplex<f32>>,
    /// Periodic Hann window coefficients.
    window: Vec<f32>,
}

impl FftPipeline {
    /// Create a new FFT pipeline with the given window size.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        // Periodic Hann, the STFT convention
        let window: Vec<f32> = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
            .collect();

        Self {
            fft_size: size,
            input_buf,
            spectrum_buf,
            scratch,
            plan,
            window,
        }
    }

    /// Window `samples` (zero-padded to the FFT size) and run the forward FFT.
    fn transform(&mut self, samples: &[f32]) -> bool {
        let n = self.fft_size.min(samples.len());
        for (i, slot) in self.input_buf.iter_mut().enumerate() {
            *slot = if i < n { samples[i] * self.window[i] } else { 0.0 };
        }

        self.plan
            .process_with_scratch(
                &mut self.input_buf,
                &mut self.spectrum_buf,
                &mut self.scratch,
            )
            .is_ok()
    }

    /// Magnitude spectrum |X| written into `out` (N/2+1 bins, unnormalized).
    ///
    /// # Example
    /// ```
    /// use bb_audio::fft::FftPipeline;
    /// let mut fft = FftPipeline::new(256);
    /// let mut spectrum = vec![1.0f32; fft.n_bins()];
    /// fft.magnitude_into(&vec![0.0f32; 256], &mut spectrum);
    /// assert!(spectrum.iter().all(|&m| m == 0.0));
    /// ```
    pub fn magnitude_into(&mut self, samples: &[f32], out: &mut [f32]) {
        if self.transform(samples) {
            for (o, c) in out.iter_mut().zip(&self.spectrum_buf) {
                *o = c.norm();
            }
        } else {
            out.fill(0.0);
        }
    }

    /// Power spectrum |X|² written into `out` (N/2+1 bins).
    pub fn power_into(&mut self, samples: &[f32], out: &mut [f32]) {
        if self.transform(samples) {
            for (o, c) in out.iter_mut().zip(&self.spectrum_buf) {
                *o = c.norm_sqr();
            }
        } else {
            out.fill(0.0);
        }
    }

    /// Number of one-sided spectrum bins.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_tone_peaks_at_its_bin() {
        let n = 1024;
        let rate = 16000.0;
        // bin 64 → 1000 Hz
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / rate).sin())
            .collect();
        let mut fft = FftPipeline::new(n);
        let mut mag = vec![0.0; fft.n_bins()];
        fft.magnitude_into(&samples, &mut mag);
        let argmax = mag
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(argmax, Some(64));
    }

    #[test]
    fn power_is_squared_magnitude() {
        let samples: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).cos()).collect();
        let mut fft = FftPipeline::new(64);
        let mut mag = vec![0.0; fft.n_bins()];
        fft.magnitude_into(&samples, &mut mag);
        let mut pow = vec![0.0; fft.n_bins()];
        fft.power_into(&samples, &mut pow);
        for (m, p) in mag.iter().zip(&pow) {
            assert!((m * m - p).abs() <= 1e-3 * p.max(1.0));
        }
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut fft = FftPipeline::new(128);
        assert_eq!(fft.n_bins(), 65);
        let mut mag = vec![0.0; fft.n_bins()];
        fft.magnitude_into(&[1.0; 10], &mut mag);
        assert!(mag[0] > 0.0);
    }
}
