//! ONNX Runtime backend.
//!
//! `Session::run` needs `&mut self`, so the session sits behind a mutex;
//! requests are short and the detector serializes them anyway.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;

use crate::classifier::{Classifier, check_input};
use crate::error::ModelError;

/// Intra-op threads per session. Inputs are a single pooled vector.
const INTRA_THREADS: usize = 1;

fn backend(e: impl std::fmt::Display) -> ModelError {
    ModelError::Backend(e.to_string())
}

/// `output_index` comes from the artifact descriptor; reject it before any
/// request can index past the graph outputs.
fn check_output_index(output_index: usize, outputs: usize) -> Result<(), ModelError> {
    if output_index < outputs {
        Ok(())
    } else {
        Err(ModelError::Invalid(format!(
            "output_index {output_index} but the graph has {outputs} output(s)"
        )))
    }
}

pub struct OnnxModel {
    session: Mutex<Session>,
    input_len: Option<usize>,
    output_index: usize,
    positive_index: usize,
}

impl OnnxModel {
    /// Load an ONNX graph taking a `[1, n]` f32 input.
    ///
    /// `output_index` selects the graph output holding the probabilities
    /// (sklearn-onnx puts the label first, probabilities second).
    ///
    /// # Errors
    /// Returns `ModelError::Backend` if the runtime rejects the file and
    /// `ModelError::Invalid` if `output_index` names no graph output.
    pub fn load(
        path: &Path,
        input_len: Option<usize>,
        output_index: usize,
        positive_index: usize,
    ) -> Result<Self, ModelError> {
        let session = Session::builder()
            .map_err(backend)?
            .with_intra_threads(INTRA_THREADS)
            .map_err(backend)?
            .commit_from_file(path)
            .map_err(|e| ModelError::Backend(format!("{}: {e}", path.display())))?;
        check_output_index(output_index, session.outputs().len())?;
        log::info!("ONNX session ready: {}", path.display());
        Ok(Self {
            session: Mutex::new(session),
            input_len,
            output_index,
            positive_index,
        })
    }
}

impl Classifier for OnnxModel {
    fn predict(&self, features: &[f32]) -> Result<f32, ModelError> {
        if let Some(n) = self.input_len {
            check_input(n, features)?;
        }
        let shape = vec![1i64, features.len() as i64];
        let tensor = ort::value::Tensor::from_array((shape, features.to_vec())).map_err(backend)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Backend("session lock poisoned".into()))?;
        let outputs = session.run(ort::inputs![tensor]).map_err(backend)?;
        let (_, data) = outputs[self.output_index]
            .try_extract_tensor::<f32>()
            .map_err(backend)?;

        match data {
            [p] => Ok(*p),
            probs => probs.get(self.positive_index).copied().ok_or_else(|| {
                ModelError::Backend(format!(
                    "output has {} values, positive_index is {}",
                    probs.len(),
                    self.positive_index
                ))
            }),
        }
    }

    fn input_len(&self) -> Option<usize> {
        self.input_len
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}
