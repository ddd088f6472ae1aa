use std::io::Cursor;
use std::path::Path;

use bb_core::config::{AudioConfig, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE, RawFormat};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;

/// Mono clip, samples in [-1, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// True when `bytes` carries a RIFF/WAVE header.
#[must_use]
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Decode an uploaded clip into mono f32 samples.
///
/// WAV uploads are decoded through symphonia and downmixed. Anything else is
/// treated as headerless PCM in `config.raw_format` at `config.raw_sample_rate`,
/// which is what the microcontroller firmware streams.
///
/// # Errors
/// Returns `AudioError::Empty` for an empty upload or a stream without
/// samples, `AudioError::Decode` for a corrupt WAV and
/// `AudioError::UnsupportedFormat` for a WAV header rate outside
/// 1 kHz..=192 kHz.
///
/// # Example
/// ```
/// use bb_audio::decode::decode_clip;
/// use bb_core::config::AudioConfig;
///
/// let raw: Vec<u8> = [0i16, 16384, -16384].iter().flat_map(|s| s.to_le_bytes()).collect();
/// let clip = decode_clip(&raw, &AudioConfig::default()).unwrap();
/// assert_eq!(clip.samples, vec![0.0, 0.5, -0.5]);
/// assert_eq!(clip.sample_rate, 16000);
/// ```
pub fn decode_clip(bytes: &[u8], config: &AudioConfig) -> Result<Clip, AudioError> {
    if bytes.is_empty() {
        return Err(AudioError::Empty);
    }
    if is_wav(bytes) {
        decode_wav(bytes)
    } else {
        decode_raw(bytes, config.raw_format, config.raw_sample_rate)
    }
}

/// Read a clip from disk and decode it like an upload.
///
/// # Errors
/// Returns an error if the file cannot be read or decoded.
pub fn decode_file(path: impl AsRef<Path>, config: &AudioConfig) -> Result<Clip, AudioError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| AudioError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let clip = decode_clip(&bytes, config)?;
    log::info!(
        "Decoded {} samples @ {}Hz from {}",
        clip.samples.len(),
        clip.sample_rate,
        path.display()
    );
    Ok(clip)
}

/// Headerless PCM. A trailing partial sample is dropped.
fn decode_raw(bytes: &[u8], format: RawFormat, sample_rate: u32) -> Result<Clip, AudioError> {
    let width = format.bytes_per_sample();
    let samples: Vec<f32> = match format {
        RawFormat::S16Le => bytes
            .chunks_exact(width)
            .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])) / 32768.0)
            .collect(),
        RawFormat::S32Le => bytes
            .chunks_exact(width)
            .map(|c| (f64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])) / 2_147_483_648.0) as f32)
            .collect(),
        RawFormat::U8 => bytes
            .iter()
            .map(|&b| (f32::from(b) - 128.0) / 128.0)
            .collect(),
    };

    if samples.is_empty() {
        return Err(AudioError::Empty);
    }
    Ok(Clip {
        samples,
        sample_rate,
    })
}

fn decode_wav(bytes: &[u8]) -> Result<Clip, AudioError> {
    let mss = MediaSourceStream::new(
        Box::new(Cursor::new(bytes.to_vec())),
        MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("probe failed: {e}")))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no audio track found".into()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("missing sample rate".into()))?;
    // Resampling cost scales with target / source; a 10 Hz header would
    // inflate a small upload by thousands
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(AudioError::UnsupportedFormat(format!(
            "WAV sample rate {sample_rate} Hz outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE} Hz"
        )));
    }
    let channels = track
        .codec_params
        .channels
        .map_or(1, symphonia::core::audio::Channels::count)
        .max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("codec init failed: {e}")))?;

    let track_id = track.id;
    let mut all_samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut max_sample_frames: usize = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("WAV packet error: {e}");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("WAV frame error: {e}");
                continue;
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.capacity();
        // Reallocate only when this packet is bigger than the current buffer
        if sample_buf.is_none() || num_frames > max_sample_frames {
            sample_buf = Some(SampleBuffer::<f32>::new(num_frames as u64, spec));
            max_sample_frames = num_frames;
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        // Downmix to mono
        for chunk in buf.samples().chunks(channels) {
            all_samples.push(chunk.iter().sum::<f32>() / channels as f32);
        }
    }

    if all_samples.is_empty() {
        return Err(AudioError::Empty);
    }

    Ok(Clip {
        samples: all_samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::encode_pcm16;

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(
            decode_clip(&[], &AudioConfig::default()),
            Err(AudioError::Empty)
        ));
    }

    #[test]
    fn raw_odd_byte_is_dropped() {
        let clip = decode_clip(&[0x00, 0x40, 0x7f], &AudioConfig::default()).unwrap();
        assert_eq!(clip.samples, vec![0.5]);
    }

    #[test]
    fn single_raw_byte_is_empty() {
        assert!(matches!(
            decode_clip(&[0x01], &AudioConfig::default()),
            Err(AudioError::Empty)
        ));
    }

    #[test]
    fn raw_s32_and_u8_layouts() {
        let config = AudioConfig {
            raw_format: RawFormat::S32Le,
            raw_sample_rate: 8000,
            ..AudioConfig::default()
        };
        let bytes: Vec<u8> = [i32::MIN, 0, 1 << 30]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let clip = decode_clip(&bytes, &config).unwrap();
        assert_eq!(clip.sample_rate, 8000);
        assert_eq!(clip.samples, vec![-1.0, 0.0, 0.5]);

        let config = AudioConfig {
            raw_format: RawFormat::U8,
            ..AudioConfig::default()
        };
        let clip = decode_clip(&[128, 0, 192], &config).unwrap();
        assert_eq!(clip.samples, vec![0.0, -1.0, 0.5]);
    }

    #[test]
    fn wav_stereo_is_downmixed() {
        // L = 0.5, R = -0.5 everywhere → mono silence
        let interleaved: Vec<f32> = (0..800)
            .flat_map(|_| [0.5f32, -0.5f32])
            .collect();
        let wav = encode_pcm16(&interleaved, 44100, 2).unwrap();
        let clip = decode_clip(&wav, &AudioConfig::default()).unwrap();
        assert_eq!(clip.sample_rate, 44100);
        assert_eq!(clip.samples.len(), 800);
        assert!(clip.samples.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn wav_header_overrides_raw_settings() {
        let wav = encode_pcm16(&[0.25; 1600], 8000, 1).unwrap();
        let clip = decode_clip(&wav, &AudioConfig::default()).unwrap();
        assert_eq!(clip.sample_rate, 8000);
        assert!((clip.samples[10] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn truncated_wav_header_is_a_decode_error() {
        let mut wav = encode_pcm16(&[0.1; 100], 16000, 1).unwrap();
        wav.truncate(20);
        assert!(matches!(
            decode_clip(&wav, &AudioConfig::default()),
            Err(AudioError::Decode(_))
        ));
    }

    #[test]
    fn implausible_wav_rates_are_unsupported() {
        for rate in [10, 999, 192_001] {
            let wav = encode_pcm16(&[0.3; 2000], rate, 1).unwrap();
            assert!(
                matches!(
                    decode_clip(&wav, &AudioConfig::default()),
                    Err(AudioError::UnsupportedFormat(_))
                ),
                "rate {rate}"
            );
        }
        let wav = encode_pcm16(&[0.3; 2000], 1000, 1).unwrap();
        assert_eq!(decode_clip(&wav, &AudioConfig::default()).unwrap().sample_rate, 1000);
    }
}
