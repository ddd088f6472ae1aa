use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, check_input, sigmoid, softmax};
use crate::error::ModelError;

/// Per-feature standardization, `(x - mean) / scale`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Scaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

/// Linear model with a logistic (binary) or softmax (multi-class) link,
/// exported from a scikit-learn `StandardScaler` + `LogisticRegression`
/// pipeline.
///
/// Binary models carry a single coefficient row whose sigmoid is the
/// probability of `classes[1]`. Multi-class models carry one row per class.
///
/// # Example
/// ```
/// use bb_model::Classifier;
/// use bb_model::logistic::LogisticModel;
///
/// let model = LogisticModel {
///     classes: vec!["ambient".into(), "rat".into()],
///     positive_class: "rat".into(),
///     scaler: None,
///     coef: vec![vec![1.0, -1.0]],
///     intercept: vec![0.0],
///     positive: 0,
/// }
/// .validated()
/// .unwrap();
/// let p = model.predict(&[2.0, 0.0]).unwrap();
/// assert!((p - 0.880_797).abs() < 1e-5);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogisticModel {
    pub classes: Vec<String>,
    pub positive_class: String,
    #[serde(default)]
    pub scaler: Option<Scaler>,
    pub coef: Vec<Vec<f32>>,
    pub intercept: Vec<f32>,
    /// Index of `positive_class` in `classes`, filled by [`LogisticModel::validated`].
    #[serde(skip)]
    pub positive: usize,
}

impl LogisticModel {
    /// Check dimensions and labels, and resolve the positive class.
    ///
    /// Zero entries of `scaler.scale` are replaced by 1.0 (constant features).
    ///
    /// # Errors
    /// Returns `ModelError::Invalid` describing the first inconsistency.
    pub fn validated(mut self) -> Result<Self, ModelError> {
        let invalid = |msg: String| Err(ModelError::Invalid(msg));

        if self.classes.len() < 2 {
            return invalid(format!("need at least 2 classes, got {}", self.classes.len()));
        }
        let expected_rows = if self.classes.len() == 2 { 1 } else { self.classes.len() };
        if self.coef.len() != expected_rows {
            return invalid(format!(
                "{} classes need {expected_rows} coefficient rows, got {}",
                self.classes.len(),
                self.coef.len()
            ));
        }
        if self.intercept.len() != self.coef.len() {
            return invalid(format!(
                "{} intercepts for {} coefficient rows",
                self.intercept.len(),
                self.coef.len()
            ));
        }
        let n = self.coef[0].len();
        if n == 0 || self.coef.iter().any(|row| row.len() != n) {
            return invalid("coefficient rows are empty or ragged".into());
        }
        if let Some(scaler) = self.scaler.as_mut() {
            if scaler.mean.len() != n || scaler.scale.len() != n {
                return invalid(format!(
                    "scaler has {}/{} entries for {n} features",
                    scaler.mean.len(),
                    scaler.scale.len()
                ));
            }
            for s in &mut scaler.scale {
                if *s == 0.0 {
                    *s = 1.0;
                }
            }
        }
        let Some(positive) = self.classes.iter().position(|c| *c == self.positive_class) else {
            return invalid(format!(
                "positive class {:?} not in {:?}",
                self.positive_class, self.classes
            ));
        };
        self.positive = positive;
        Ok(self)
    }

    fn n_features(&self) -> usize {
        self.coef.first().map_or(0, Vec::len)
    }

    fn decision(&self, x: &[f32], row: usize) -> f32 {
        self.coef[row]
            .iter()
            .zip(x)
            .map(|(w, v)| w * v)
            .sum::<f32>()
            + self.intercept[row]
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, features: &[f32]) -> Result<f32, ModelError> {
        check_input(self.n_features(), features)?;

        let x: Vec<f32> = match &self.scaler {
            Some(s) => features
                .iter()
                .zip(s.mean.iter().zip(&s.scale))
                .map(|(v, (m, sc))| (v - m) / sc)
                .collect(),
            None => features.to_vec(),
        };

        if self.coef.len() == 1 {
            let p1 = sigmoid(self.decision(&x, 0));
            return Ok(if self.positive == 1 { p1 } else { 1.0 - p1 });
        }

        let mut scores: Vec<f32> = (0..self.coef.len()).map(|k| self.decision(&x, k)).collect();
        softmax(&mut scores);
        Ok(scores[self.positive])
    }

    fn input_len(&self) -> Option<usize> {
        Some(self.n_features())
    }

    fn name(&self) -> &'static str {
        "logistic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(positive: &str) -> LogisticModel {
        LogisticModel {
            classes: vec!["ambient".into(), "rat".into()],
            positive_class: positive.into(),
            scaler: Some(Scaler {
                mean: vec![1.0, 1.0],
                scale: vec![0.0, 2.0],
            }),
            coef: vec![vec![1.0, -1.0]],
            intercept: vec![0.5],
            positive: 0,
        }
    }

    #[test]
    fn zero_scale_is_treated_as_one() {
        let model = binary("rat").validated().unwrap();
        // (3-1)/1 = 2, (1-1)/2 = 0 → z = 2.5
        let p = model.predict(&[3.0, 1.0]).unwrap();
        assert!((p - sigmoid(2.5)).abs() < 1e-6);
    }

    #[test]
    fn negative_class_as_positive_flips_probability() {
        let rat = binary("rat").validated().unwrap();
        let ambient = binary("ambient").validated().unwrap();
        let x = [0.2, 4.0];
        let a = rat.predict(&x).unwrap();
        let b = ambient.predict(&x).unwrap();
        assert!((a + b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn multiclass_uses_softmax_of_positive_row() {
        let model = LogisticModel {
            classes: vec!["ambient".into(), "rat".into(), "insect".into()],
            positive_class: "rat".into(),
            scaler: None,
            coef: vec![vec![0.0], vec![1.0], vec![0.0]],
            intercept: vec![0.0, 0.0, 0.0],
            positive: 0,
        }
        .validated()
        .unwrap();
        let p = model.predict(&[1.0]).unwrap();
        let e = std::f32::consts::E;
        assert!((p - e / (e + 2.0)).abs() < 1e-6);
    }

    #[test]
    fn rejects_inconsistent_artifacts() {
        let mut m = binary("rat");
        m.positive_class = "mouse".into();
        assert!(matches!(m.validated(), Err(ModelError::Invalid(_))));

        let mut m = binary("rat");
        m.intercept = vec![0.0, 0.0];
        assert!(m.validated().is_err());

        let mut m = binary("rat");
        m.scaler = Some(Scaler {
            mean: vec![0.0],
            scale: vec![1.0],
        });
        assert!(m.validated().is_err());
    }

    #[test]
    fn wrong_feature_count_is_an_input_error() {
        let model = binary("rat").validated().unwrap();
        assert!(matches!(
            model.predict(&[1.0; 5]),
            Err(ModelError::InputShape { expected: 2, got: 5 })
        ));
    }

    #[test]
    fn parses_sklearn_export() {
        let json = r#"{
            "classes": ["ambient", "rat"],
            "positive_class": "rat",
            "coef": [[0.5, 0.25]],
            "intercept": [-1.0]
        }"#;
        let model: LogisticModel = serde_json::from_str(json).unwrap();
        let model = model.validated().unwrap();
        assert_eq!(model.input_len(), Some(2));
        let p = model.predict(&[2.0, 0.0]).unwrap();
        assert!((p - 0.5).abs() < 1e-6);
    }
}
