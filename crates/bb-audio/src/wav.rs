//! 16-bit PCM WAV writing through hound.
//!
//! Used to dump conditioned clips for inspection and to build fixtures.

use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

fn pcm16_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels: channels.max(1),
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn write_pcm16<W: Write + Seek>(
    writer: W,
    samples: &[f32],
    spec: WavSpec,
) -> Result<(), hound::Error> {
    let mut wav = WavWriter::new(writer, spec)?;
    for &s in samples {
        wav.write_sample((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16)?;
    }
    wav.finalize()
}

/// Encode interleaved f32 samples as an in-memory 16-bit PCM WAV file.
///
/// Samples are clamped to [-1, 1] before quantization.
///
/// # Errors
/// Returns an error if hound cannot write the header or a sample.
///
/// # Example
/// ```
/// use bb_audio::wav::encode_pcm16;
/// let wav = encode_pcm16(&[0.0, 0.5, -0.5], 16000, 1).unwrap();
/// assert_eq!(&wav[0..4], b"RIFF");
/// assert_eq!(&wav[8..12], b"WAVE");
/// ```
pub fn encode_pcm16(
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    write_pcm16(&mut cursor, samples, pcm16_spec(sample_rate, channels))?;
    Ok(cursor.into_inner())
}

/// Write a mono clip to disk as 16-bit PCM WAV.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let file = BufWriter::new(std::fs::File::create(path)?);
    write_pcm16(file, samples, pcm16_spec(sample_rate, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_describes_the_clip() {
        let wav = encode_pcm16(&[0.25; 1000], 8000, 1).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 1000);
    }

    #[test]
    fn samples_are_clamped_to_full_scale() {
        let wav = encode_pcm16(&[2.0, -2.0, 0.0], 16000, 1).unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let got: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(got, vec![i16::MAX, -i16::MAX, 0]);
    }

    #[test]
    fn write_mono_creates_a_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_mono(&path, &[0.1; 320], 16000).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.duration(), 320);
    }
}
