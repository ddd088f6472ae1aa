//! Int8 fully connected network, TFLite-style affine quantization.
//!
//! Activations are `real = scale * (q - zero_point)`. Weights are symmetric
//! (zero point 0) with one scale per layer; biases are i32 in units of
//! `input_scale * weight_scale`. Accumulation is integer, activation
//! functions run in float on the rescaled accumulator.

use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, check_input, sigmoid, softmax};
use crate::error::ModelError;

/// Affine quantization of one tensor.
///
/// # Example
/// ```
/// use bb_model::quantized::QuantParams;
/// let q = QuantParams { scale: 0.5, zero_point: -10 };
/// assert_eq!(q.quantize(2.0), -6);
/// assert_eq!(q.quantize(1000.0), 127);
/// assert!((q.dequantize(-6) - 2.0).abs() < 1e-6);
/// ```
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl QuantParams {
    /// `round(x / scale) + zero_point`, saturated to i8.
    #[must_use]
    pub fn quantize(&self, x: f32) -> i8 {
        let q = (x / self.scale).round() as i64 + i64::from(self.zero_point);
        q.clamp(i64::from(i8::MIN), i64::from(i8::MAX)) as i8
    }

    #[must_use]
    pub fn dequantize(&self, q: i8) -> f32 {
        (i32::from(q) - self.zero_point) as f32 * self.scale
    }

    fn is_valid(&self) -> bool {
        self.scale.is_finite()
            && self.scale > 0.0
            && (i32::from(i8::MIN)..=i32::from(i8::MAX)).contains(&self.zero_point)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    None,
    Sigmoid,
    Softmax,
}

/// Dense layer, weights row-major `outputs × inputs`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseLayer {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<i8>,
    pub bias: Vec<i32>,
    pub weight_scale: f32,
    pub output: QuantParams,
    pub activation: Activation,
}

impl DenseLayer {
    /// Run the layer on quantized input, returning quantized output.
    fn forward(&self, input: &[i8], input_q: QuantParams) -> Vec<i8> {
        let rescale = input_q.scale * self.weight_scale;
        let mut real: Vec<f32> = self
            .weights
            .chunks_exact(self.inputs)
            .zip(&self.bias)
            .map(|(row, &bias)| {
                let acc = row.iter().zip(input).fold(bias, |acc, (&w, &x)| {
                    acc.saturating_add((i32::from(x) - input_q.zero_point) * i32::from(w))
                });
                acc as f32 * rescale
            })
            .collect();

        match self.activation {
            Activation::Relu => real.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::None => {}
            Activation::Sigmoid => real.iter_mut().for_each(|v| *v = sigmoid(*v)),
            Activation::Softmax => softmax(&mut real),
        }

        real.iter().map(|&v| self.output.quantize(v)).collect()
    }
}

/// Quantized feed-forward classifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuantizedNetwork {
    pub input: QuantParams,
    pub layers: Vec<DenseLayer>,
    /// Output unit holding the "rat present" probability.
    pub positive_index: usize,
}

impl QuantizedNetwork {
    /// Check that layer shapes chain and quantization parameters are usable.
    ///
    /// # Errors
    /// Returns `ModelError::Invalid` describing the first inconsistency.
    pub fn validated(self) -> Result<Self, ModelError> {
        let invalid = |msg: String| Err(ModelError::Invalid(msg));

        let Some(last) = self.layers.last() else {
            return invalid("network has no layers".into());
        };
        if !self.input.is_valid() {
            return invalid("bad input quantization".into());
        }

        let mut width = self.layers[0].inputs;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.inputs == 0 || layer.outputs == 0 {
                return invalid(format!("layer {i} has an empty dimension"));
            }
            if layer.inputs != width {
                return invalid(format!("layer {i} expects {} inputs, previous gives {width}", layer.inputs));
            }
            if layer.weights.len() != layer.inputs * layer.outputs || layer.bias.len() != layer.outputs {
                return invalid(format!("layer {i} weights or bias have the wrong size"));
            }
            if !(layer.weight_scale.is_finite() && layer.weight_scale > 0.0) || !layer.output.is_valid() {
                return invalid(format!("layer {i} has bad quantization parameters"));
            }
            width = layer.outputs;
        }

        if !matches!(last.activation, Activation::Sigmoid | Activation::Softmax) {
            return invalid("last layer must end in sigmoid or softmax".into());
        }
        if self.positive_index >= last.outputs {
            return invalid(format!(
                "positive_index {} out of {} outputs",
                self.positive_index, last.outputs
            ));
        }
        Ok(self)
    }
}

impl Classifier for QuantizedNetwork {
    fn predict(&self, features: &[f32]) -> Result<f32, ModelError> {
        let Some(first) = self.layers.first() else {
            return Err(ModelError::Invalid("network has no layers".into()));
        };
        check_input(first.inputs, features)?;

        let mut q_params = self.input;
        let mut activations: Vec<i8> = features.iter().map(|&x| q_params.quantize(x)).collect();
        for layer in &self.layers {
            activations = layer.forward(&activations, q_params);
            q_params = layer.output;
        }

        let q = activations
            .get(self.positive_index)
            .copied()
            .ok_or_else(|| ModelError::Invalid("positive_index out of range".into()))?;
        Ok(q_params.dequantize(q).clamp(0.0, 1.0))
    }

    fn input_len(&self) -> Option<usize> {
        self.layers.first().map(|l| l.inputs)
    }

    fn name(&self) -> &'static str {
        "quantized"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGMOID_OUT: QuantParams = QuantParams {
        scale: 1.0 / 256.0,
        zero_point: -128,
    };

    /// 2 → relu(identity) → 1 sigmoid(x0 - x1)
    fn tiny() -> QuantizedNetwork {
        QuantizedNetwork {
            input: QuantParams {
                scale: 0.1,
                zero_point: 0,
            },
            layers: vec![
                DenseLayer {
                    inputs: 2,
                    outputs: 2,
                    weights: vec![10, 0, 0, 10],
                    bias: vec![0, 0],
                    weight_scale: 0.1,
                    output: QuantParams {
                        scale: 0.1,
                        zero_point: 0,
                    },
                    activation: Activation::Relu,
                },
                DenseLayer {
                    inputs: 2,
                    outputs: 1,
                    weights: vec![10, -10],
                    bias: vec![0],
                    weight_scale: 0.1,
                    output: SIGMOID_OUT,
                    activation: Activation::Sigmoid,
                },
            ],
            positive_index: 0,
        }
        .validated()
        .unwrap()
    }

    #[test]
    fn matches_float_reference_within_one_step() {
        let net = tiny();
        let p = net.predict(&[1.0, 0.2]).unwrap();
        assert!((p - sigmoid(0.8)).abs() <= 1.0 / 256.0, "{p}");
    }

    #[test]
    fn relu_clips_negative_hidden_units() {
        let net = tiny();
        // hidden = relu([-1.0, 0.5]) = [0, 0.5] → sigmoid(-0.5)
        let p = net.predict(&[-1.0, 0.5]).unwrap();
        assert!((p - sigmoid(-0.5)).abs() <= 1.0 / 256.0, "{p}");
    }

    #[test]
    fn saturated_input_stays_in_range() {
        let net = tiny();
        let p = net.predict(&[1e6, -1e6]).unwrap();
        assert!((0.0..=1.0).contains(&p));
        assert!(p > 0.99);
    }

    #[test]
    fn softmax_head_reads_positive_index() {
        let net = QuantizedNetwork {
            input: QuantParams {
                scale: 0.1,
                zero_point: 0,
            },
            layers: vec![DenseLayer {
                inputs: 1,
                outputs: 2,
                weights: vec![0, 10],
                bias: vec![0, 0],
                weight_scale: 0.1,
                output: SIGMOID_OUT,
                activation: Activation::Softmax,
            }],
            positive_index: 1,
        }
        .validated()
        .unwrap();
        // logits [0, 2] → softmax[1] = e²/(1+e²)
        let p = net.predict(&[2.0]).unwrap();
        let e2 = 2.0f32.exp();
        assert!((p - e2 / (1.0 + e2)).abs() <= 1.0 / 256.0, "{p}");
    }

    #[test]
    fn rejects_broken_shapes() {
        let mut net = tiny();
        net.layers[1].inputs = 3;
        assert!(net.validated().is_err());

        let mut net = tiny();
        net.positive_index = 1;
        assert!(net.validated().is_err());

        let mut net = tiny();
        net.layers[1].activation = Activation::Relu;
        assert!(net.validated().is_err());

        let mut net = tiny();
        net.input.scale = 0.0;
        assert!(net.validated().is_err());
    }

    #[test]
    fn wrong_feature_count_is_an_input_error() {
        assert!(matches!(
            tiny().predict(&[0.0; 3]),
            Err(ModelError::InputShape { expected: 2, got: 3 })
        ));
    }
}
