use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;
use crate::error::ModelError;
use crate::logistic::LogisticModel;
use crate::quantized::QuantizedNetwork;

/// Reference to an ONNX graph stored next to a JSON descriptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnnxRef {
    /// Relative paths resolve against the descriptor's directory.
    pub path: PathBuf,
    #[serde(default)]
    pub input_len: Option<usize>,
    #[serde(default)]
    pub output_index: usize,
    #[serde(default = "default_positive_index")]
    pub positive_index: usize,
}

fn default_positive_index() -> usize {
    1
}

/// A model file as stored on disk, tagged by `kind`.
///
/// # Example
/// ```
/// use bb_model::ModelArtifact;
/// let json = r#"{"kind": "logistic", "classes": ["ambient", "rat"],
///     "positive_class": "rat", "coef": [[1.0]], "intercept": [0.0]}"#;
/// let artifact: ModelArtifact = serde_json::from_str(json).unwrap();
/// assert!(matches!(artifact, ModelArtifact::Logistic(_)));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Logistic(LogisticModel),
    Quantized(QuantizedNetwork),
    Onnx(OnnxRef),
}

/// bincode cannot read internally tagged enums; binary files use the
/// default external tagging and carry only self-contained models.
#[derive(Serialize, Deserialize)]
enum BinaryArtifact {
    Logistic(LogisticModel),
    Quantized(QuantizedNetwork),
}

impl ModelArtifact {
    /// Validate and turn the artifact into a ready classifier.
    ///
    /// `base_dir` resolves relative ONNX references.
    ///
    /// # Errors
    /// Returns the validation error, or `UnsupportedFormat` for an ONNX
    /// reference when the `onnx` feature is disabled.
    pub fn into_classifier(self, base_dir: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
        match self {
            Self::Logistic(m) => Ok(Arc::new(m.validated()?)),
            Self::Quantized(n) => Ok(Arc::new(n.validated()?)),
            Self::Onnx(r) => {
                let path = if r.path.is_relative() {
                    base_dir.join(&r.path)
                } else {
                    r.path.clone()
                };
                load_onnx(&path, r.input_len, r.output_index, r.positive_index)
            }
        }
    }

    /// Serialize as bincode for `.bin` files.
    ///
    /// # Errors
    /// ONNX references have no binary form.
    pub fn to_bincode(&self) -> Result<Vec<u8>, ModelError> {
        let bin = match self {
            Self::Logistic(m) => BinaryArtifact::Logistic(m.clone()),
            Self::Quantized(n) => BinaryArtifact::Quantized(n.clone()),
            Self::Onnx(_) => {
                return Err(ModelError::UnsupportedFormat(
                    "ONNX references cannot be stored as .bin".into(),
                ));
            }
        };
        bincode::serialize(&bin).map_err(|e| ModelError::Parse(e.to_string()))
    }

    fn from_bincode(bytes: &[u8]) -> Result<Self, ModelError> {
        let bin: BinaryArtifact =
            bincode::deserialize(bytes).map_err(|e| ModelError::Parse(format!("bincode: {e}")))?;
        Ok(match bin {
            BinaryArtifact::Logistic(m) => Self::Logistic(m),
            BinaryArtifact::Quantized(n) => Self::Quantized(n),
        })
    }
}

/// Load a classifier, choosing the format from the file extension:
/// `.json` (serde_json), `.bin` (bincode) or `.onnx` (ONNX Runtime).
///
/// # Errors
/// Returns `ModelError::Io` when the file cannot be read, `Parse` or
/// `Invalid` for bad contents, `UnsupportedFormat` for other extensions.
pub fn load_classifier(path: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let read = || {
        std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })
    };

    match ext.as_str() {
        "json" => {
            let bytes = read()?;
            let artifact: ModelArtifact = serde_json::from_slice(&bytes)
                .map_err(|e| ModelError::Parse(format!("{}: {e}", path.display())))?;
            artifact.into_classifier(base_dir)
        }
        "bin" => ModelArtifact::from_bincode(&read()?)?.into_classifier(base_dir),
        "onnx" => {
            if !path.exists() {
                return Err(ModelError::Io {
                    path: path.display().to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            load_onnx(path, None, 0, default_positive_index())
        }
        other => Err(ModelError::UnsupportedFormat(format!(
            "{} (extension {other:?})",
            path.display()
        ))),
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(
    path: &Path,
    input_len: Option<usize>,
    output_index: usize,
    positive_index: usize,
) -> Result<Arc<dyn Classifier>, ModelError> {
    let model = crate::onnx::OnnxModel::load(path, input_len, output_index, positive_index)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(
    path: &Path,
    _input_len: Option<usize>,
    _output_index: usize,
    _positive_index: usize,
) -> Result<Arc<dyn Classifier>, ModelError> {
    Err(ModelError::UnsupportedFormat(format!(
        "{}: built without the `onnx` feature",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantized::{Activation, DenseLayer, QuantParams};
    use std::io::Write;

    const LOGISTIC_JSON: &str = r#"{
        "kind": "logistic",
        "classes": ["ambient", "rat"],
        "positive_class": "rat",
        "scaler": {"mean": [0.0, 0.0], "scale": [1.0, 1.0]},
        "coef": [[2.0, 0.0]],
        "intercept": [0.0]
    }"#;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    fn network() -> QuantizedNetwork {
        QuantizedNetwork {
            input: QuantParams {
                scale: 0.05,
                zero_point: 0,
            },
            layers: vec![DenseLayer {
                inputs: 3,
                outputs: 1,
                weights: vec![20, 0, -20],
                bias: vec![0],
                weight_scale: 0.05,
                output: QuantParams {
                    scale: 1.0 / 256.0,
                    zero_point: -128,
                },
                activation: Activation::Sigmoid,
            }],
            positive_index: 0,
        }
    }

    #[test]
    fn loads_logistic_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "model.json", LOGISTIC_JSON.as_bytes());
        let model = load_classifier(&path).unwrap();
        assert_eq!(model.name(), "logistic");
        assert_eq!(model.input_len(), Some(2));
        let p = model.predict(&[1.0, 5.0]).unwrap();
        assert!((p - crate::classifier::sigmoid(2.0)).abs() < 1e-6);
    }

    #[test]
    fn bincode_artifact_predicts_like_json() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ModelArtifact::Quantized(network());
        let bin = write(dir.path(), "net.bin", &artifact.to_bincode().unwrap());
        let json = write(
            dir.path(),
            "net.json",
            serde_json::to_string(&artifact).unwrap().as_bytes(),
        );

        let a = load_classifier(&bin).unwrap();
        let b = load_classifier(&json).unwrap();
        let x = [1.0, 0.3, 0.2];
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a.name(), "quantized");
    }

    #[test]
    fn invalid_model_is_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let bad = LOGISTIC_JSON.replace(r#""positive_class": "rat""#, r#""positive_class": "mouse""#);
        let path = write(dir.path(), "bad.json", bad.as_bytes());
        assert!(matches!(load_classifier(&path), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn load_errors_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_classifier(&dir.path().join("missing.json")),
            Err(ModelError::Io { .. })
        ));
        let garbage = write(dir.path(), "garbage.json", b"{not json");
        assert!(matches!(load_classifier(&garbage), Err(ModelError::Parse(_))));
        let pickle = write(dir.path(), "model.pkl", b"\x80\x04");
        assert!(matches!(
            load_classifier(&pickle),
            Err(ModelError::UnsupportedFormat(_))
        ));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn onnx_needs_the_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "model.onnx", b"onnx");
        assert!(matches!(
            load_classifier(&path),
            Err(ModelError::UnsupportedFormat(_))
        ));
    }
}
