use bb_core::config::{AudioConfig, Pooling};
use rayon::prelude::*;

use crate::fft::FftPipeline;
use crate::mel::{MelFilterbank, dct_apply, dct_matrix, power_to_db};

/// MFCC coefficients of a clip, row-major `frames × n_mfcc`.
#[derive(Clone, Debug, PartialEq)]
pub struct MfccMatrix {
    pub frames: usize,
    pub n_mfcc: usize,
    pub data: Vec<f32>,
}

impl MfccMatrix {
    /// Coefficients of frame `i`.
    #[must_use]
    pub fn frame(&self, i: usize) -> &[f32] {
        &self.data[i * self.n_mfcc..(i + 1) * self.n_mfcc]
    }
}

/// Short-time MFCC extractor.
///
/// Built once per audio configuration; the filterbank and DCT basis are
/// shared read-only by all rayon workers. Frames are split into one block
/// per thread and each block plans its own FFT.
///
/// # Example
/// ```
/// use bb_audio::mfcc::MfccExtractor;
/// use bb_core::config::AudioConfig;
///
/// let audio = AudioConfig::default();
/// let extractor = MfccExtractor::new(&audio, 22050);
/// let m = extractor.frames(&vec![0.0f32; 22050]);
/// assert_eq!(m.frames, 1 + 22050 / 512);
/// assert_eq!(m.n_mfcc, 40);
/// ```
pub struct MfccExtractor {
    n_fft: usize,
    hop: usize,
    n_mfcc: usize,
    top_db: Option<f32>,
    filterbank: MelFilterbank,
    dct: Vec<f32>,
}

impl MfccExtractor {
    #[must_use]
    pub fn new(config: &AudioConfig, sample_rate: u32) -> Self {
        let n_fft = config.n_fft.max(16);
        let n_mels = config.n_mels.max(1);
        let n_mfcc = config.n_mfcc.clamp(1, n_mels);
        Self {
            n_fft,
            hop: config.hop_length.clamp(1, n_fft),
            n_mfcc,
            top_db: config.top_db,
            filterbank: MelFilterbank::new(n_mels, n_fft, sample_rate, config.fmin, config.fmax),
            dct: dct_matrix(n_mfcc, n_mels),
        }
    }

    /// Number of centered frames produced for `len` samples.
    #[must_use]
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Compute the MFCC matrix of `samples`.
    ///
    /// Frames are centered: the signal is zero-padded by `n_fft / 2` on both
    /// sides, so an empty signal still yields one frame.
    #[must_use]
    pub fn frames(&self, samples: &[f32]) -> MfccMatrix {
        let n_mels = self.filterbank.n_mels();
        let n_frames = self.frame_count(samples.len());
        let padded = center_pad(samples, self.n_fft / 2);

        // Mel power spectrogram, one row per frame. One block of rows per
        // rayon thread, each block planning its FFT once.
        let mut mel = vec![0.0f32; n_frames * n_mels];
        let block_frames = n_frames.div_ceil(rayon::current_num_threads()).max(1);
        mel.par_chunks_mut(block_frames * n_mels)
            .enumerate()
            .for_each(|(block, rows)| {
                let mut fft = FftPipeline::new(self.n_fft);
                let mut power = vec![0.0f32; fft.n_bins()];
                for (j, row) in rows.chunks_mut(n_mels).enumerate() {
                    let start = (block * block_frames + j) * self.hop;
                    let end = (start + self.n_fft).min(padded.len());
                    fft.power_into(&padded[start..end], &mut power);
                    self.filterbank.apply(&power, row);
                }
            });

        // top_db floor is relative to the loudest cell of the whole clip
        power_to_db(&mut mel, self.top_db);

        let mut data = vec![0.0f32; n_frames * self.n_mfcc];
        data.par_chunks_mut(self.n_mfcc)
            .zip(mel.par_chunks(n_mels))
            .for_each(|(out, log_mel)| dct_apply(&self.dct, log_mel, out));

        MfccMatrix {
            frames: n_frames,
            n_mfcc: self.n_mfcc,
            data,
        }
    }
}

fn center_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, 0.0);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + 2 * pad, 0.0);
    padded
}

/// Collapse the time axis into a fixed-size feature vector.
///
/// `Mean` gives `n_mfcc` values. `MeanStd` appends the population standard
/// deviation of each coefficient, giving `2 * n_mfcc` values.
///
/// # Example
/// ```
/// use bb_audio::mfcc::{MfccMatrix, summarize};
/// use bb_core::config::Pooling;
///
/// let m = MfccMatrix { frames: 2, n_mfcc: 2, data: vec![1.0, 10.0, 3.0, 10.0] };
/// assert_eq!(summarize(&m, Pooling::Mean), vec![2.0, 10.0]);
/// assert_eq!(summarize(&m, Pooling::MeanStd), vec![2.0, 10.0, 1.0, 0.0]);
/// ```
#[must_use]
pub fn summarize(matrix: &MfccMatrix, pooling: Pooling) -> Vec<f32> {
    let n = matrix.n_mfcc;
    if matrix.frames == 0 {
        return vec![0.0; n * if pooling == Pooling::MeanStd { 2 } else { 1 }];
    }
    let count = matrix.frames as f64;

    let mut mean = vec![0.0f64; n];
    for row in matrix.data.chunks_exact(n) {
        for (m, &c) in mean.iter_mut().zip(row) {
            *m += f64::from(c);
        }
    }
    for m in &mut mean {
        *m /= count;
    }

    let mut out: Vec<f32> = mean.iter().map(|&m| m as f32).collect();
    if pooling == Pooling::MeanStd {
        let mut var = vec![0.0f64; n];
        for row in matrix.data.chunks_exact(n) {
            for ((v, &c), &m) in var.iter_mut().zip(row).zip(&mean) {
                let d = f64::from(c) - m;
                *v += d * d;
            }
        }
        out.extend(var.iter().map(|&v| (v / count).sqrt() as f32));
    }
    out
}
