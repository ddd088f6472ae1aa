use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::artifact::load_classifier;
use crate::classifier::{Classifier, warn_on_input_mismatch};

/// Lifecycle of the process-wide classifier.
pub enum ModelState {
    Loading,
    Ready(Arc<dyn Classifier>),
    Failed(String),
}

/// Serializable summary of a [`ModelState`], as reported by `/health`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ModelStatus {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Holds the classifier once the background loader has published it.
///
/// Readers never block: they load the current state snapshot from the
/// `ArcSwap` and either get the model or learn why it is not there.
///
/// # Example
/// ```
/// use bb_model::slot::ModelSlot;
/// let slot = ModelSlot::loading("models/none.json");
/// assert_eq!(slot.status().state, "loading");
/// assert!(slot.classifier().is_none());
/// ```
pub struct ModelSlot {
    path: PathBuf,
    state: ArcSwap<ModelState>,
}

impl ModelSlot {
    /// Empty slot waiting for a loader.
    #[must_use]
    pub fn loading(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: ArcSwap::from_pointee(ModelState::Loading),
        }
    }

    /// Slot already holding a model (offline mode, tests).
    #[must_use]
    pub fn ready(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            path: PathBuf::new(),
            state: ArcSwap::from_pointee(ModelState::Ready(classifier)),
        }
    }

    /// Start the single model-load thread.
    ///
    /// The slot is returned immediately in the `Loading` state; the thread
    /// publishes `Ready` or `Failed` when it is done. A load failure is not
    /// retried. `expected_inputs` is the feature length the audio settings
    /// produce; a model declaring another length is logged.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn_loader(
        path: &Path,
        expected_inputs: usize,
    ) -> std::io::Result<(Arc<Self>, JoinHandle<()>)> {
        let slot = Arc::new(Self::loading(path));
        let worker = Arc::clone(&slot);
        let handle = thread::Builder::new()
            .name("bb-model-loader".to_string())
            .spawn(move || worker.load(expected_inputs))?;
        Ok((slot, handle))
    }

    /// Load the artifact on the current thread and publish the outcome.
    pub fn load(&self, expected_inputs: usize) {
        let started = Instant::now();
        log::info!("Loading model from {}", self.path.display());
        match load_classifier(&self.path) {
            Ok(model) => {
                log::info!(
                    "Model ready: {} ({} inputs) in {:.0?}",
                    model.name(),
                    model
                        .input_len()
                        .map_or_else(|| "?".to_string(), |n| n.to_string()),
                    started.elapsed()
                );
                warn_on_input_mismatch(model.as_ref(), expected_inputs);
                self.publish(ModelState::Ready(model));
            }
            Err(e) => {
                log::error!("Model load failed: {e}");
                self.publish(ModelState::Failed(e.to_string()));
            }
        }
    }

    pub fn publish(&self, state: ModelState) {
        self.state.store(Arc::new(state));
    }

    /// The classifier, only when loaded.
    #[must_use]
    pub fn classifier(&self) -> Option<Arc<dyn Classifier>> {
        match self.state.load().as_ref() {
            ModelState::Ready(model) => Some(Arc::clone(model)),
            ModelState::Loading | ModelState::Failed(_) => None,
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> Arc<ModelState> {
        self.state.load_full()
    }

    #[must_use]
    pub fn status(&self) -> ModelStatus {
        match self.state.load().as_ref() {
            ModelState::Loading => ModelStatus {
                state: "loading",
                name: None,
                error: None,
            },
            ModelState::Ready(model) => ModelStatus {
                state: "ready",
                name: Some(model.name()),
                error: None,
            },
            ModelState::Failed(e) => ModelStatus {
                state: "failed",
                name: None,
                error: Some(e.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"{"kind": "logistic", "classes": ["ambient", "rat"],
        "positive_class": "rat", "coef": [[1.0, 1.0]], "intercept": [0.0]}"#;

    #[test]
    fn loader_thread_publishes_ready_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, MODEL).unwrap();

        let (slot, handle) = ModelSlot::spawn_loader(&path, 2).unwrap();
        handle.join().unwrap();

        let status = slot.status();
        assert_eq!(status.state, "ready");
        assert_eq!(status.name, Some("logistic"));
        assert_eq!(slot.classifier().unwrap().input_len(), Some(2));
    }

    #[test]
    fn missing_artifact_leaves_slot_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (slot, handle) = ModelSlot::spawn_loader(&dir.path().join("absent.json"), 2).unwrap();
        handle.join().unwrap();

        assert!(slot.classifier().is_none());
        let status = slot.status();
        assert_eq!(status.state, "failed");
        assert!(status.error.unwrap().contains("absent.json"));
        assert!(matches!(slot.state().as_ref(), ModelState::Failed(_)));
    }

    #[test]
    fn shape_mismatch_still_publishes_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, MODEL).unwrap();

        let slot = ModelSlot::loading(&path);
        slot.load(40);
        let model = slot.classifier().unwrap();
        assert!(!warn_on_input_mismatch(model.as_ref(), 40));
        assert!(warn_on_input_mismatch(model.as_ref(), 2));
    }

    #[test]
    fn status_serializes_without_empty_fields() {
        let slot = ModelSlot::loading("x.json");
        let json = serde_json::to_value(slot.status()).unwrap();
        assert_eq!(json, serde_json::json!({"state": "loading"}));
    }
}
