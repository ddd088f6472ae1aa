//! `--classify`: run one file through the full pipeline without a server.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use bb_audio::decode::decode_file;
use bb_audio::wav::write_mono;
use bb_core::config::DetectorConfig;
use bb_model::classifier::warn_on_input_mismatch;
use bb_model::{ModelSlot, load_classifier};

use crate::detector::Detector;
use crate::response::DetectResponse;

/// Classify `file` and return the body `/detectar` would have answered.
///
/// The model is loaded synchronously and telemetry is never sent. When
/// `save_clip` is set the conditioned clip (resampled, length-fitted, not
/// normalized) is written there as 16-bit WAV.
///
/// # Errors
/// Returns an error if the model or the file cannot be loaded, or the clip
/// cannot be classified.
pub fn classify_file(
    config: &DetectorConfig,
    file: &Path,
    save_clip: Option<&Path>,
) -> Result<DetectResponse> {
    let model = load_classifier(&config.model.path)
        .with_context(|| format!("Cannot load model {}", config.model.path.display()))?;
    warn_on_input_mismatch(model.as_ref(), config.audio.feature_len());
    let detector = Detector::new(
        config.audio.clone(),
        Arc::new(ModelSlot::ready(model)),
        Arc::new(ArcSwap::from_pointee(config.clone())),
    );

    let clip = decode_file(file, &config.audio)?;
    if let Some(out) = save_clip {
        let conditioned = detector.preprocessor().condition_clip(clip.clone())?;
        write_mono(out, &conditioned.samples, conditioned.sample_rate)
            .with_context(|| format!("Cannot write {}", out.display()))?;
        log::info!("Conditioned clip written to {}", out.display());
    }

    let detection = detector
        .detect_clip(clip)
        .with_context(|| format!("Cannot classify {}", file.display()))?;
    Ok(DetectResponse::from(&detection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::tests::test_audio;

    const MODEL: &str = r#"{"kind": "logistic", "classes": ["ambient", "rat"],
        "positive_class": "rat", "coef": [[0,0,0,0,0,0,0,0,0,0,0,0,0]], "intercept": [3.0]}"#;

    #[test]
    fn classifies_a_wav_and_saves_the_clip() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.json");
        std::fs::write(&model, MODEL).unwrap();

        let samples: Vec<f32> = (0..4000)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 3000.0 * i as f32 / 8000.0).sin())
            .collect();
        let input = dir.path().join("clip.wav");
        write_mono(&input, &samples, 8000).unwrap();
        let saved = dir.path().join("conditioned.wav");

        let mut config = DetectorConfig {
            audio: test_audio(),
            ..DetectorConfig::default()
        };
        config.model.path = model;

        let body = classify_file(&config, &input, Some(&saved)).unwrap();
        assert_eq!(body.es_rata, 1);
        assert_eq!(body.etapa, "classifier");

        // 0.5 s at 8 kHz resampled to 16 kHz
        let conditioned = decode_file(&saved, &config.audio).unwrap();
        assert_eq!(conditioned.sample_rate, 16_000);
        assert_eq!(conditioned.samples.len(), 8000);
    }

    #[test]
    fn missing_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DetectorConfig::default();
        config.model.path = dir.path().join("absent.json");
        let err = classify_file(&config, &dir.path().join("clip.wav"), None).unwrap_err();
        assert!(format!("{err:#}").contains("absent.json"));
    }
}
