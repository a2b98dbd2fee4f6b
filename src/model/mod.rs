//! The trainable MLP: topology, flat weight vector, and rescaling state
//!
//! A [`NetworkModel`] is a plain feed-forward perceptron. Weights live in a
//! single flat vector in layer order — for each target neuron the bias weight
//! first, then one weight per source neuron. The trainer swaps complete
//! weight snapshots in and out; there is deliberately no partial-update API.

use ndarray::{Array1, ArrayView2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{NeurotrackError, Result};

/// Neuron activation function, applied to all hidden layers.
///
/// The output layer is always linear; targets are rescaled to `[-1, 1]`
/// before training so a linear output covers the learnable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Symmetric sigmoid in (-1, 1): `2 / (1 + e^-x) - 1`
    SigmoidSymmetric,
    /// Logistic sigmoid in (0, 1)
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Rectified Linear Unit
    ReLU,
    /// Identity
    Linear,
}

impl Default for Activation {
    fn default() -> Self {
        Self::SigmoidSymmetric
    }
}

impl Activation {
    /// Closed name-to-variant lookup used by the configuration parser.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SigmoidSymmetric" => Some(Self::SigmoidSymmetric),
            "Sigmoid" => Some(Self::Sigmoid),
            "Tanh" => Some(Self::Tanh),
            "ReLU" => Some(Self::ReLU),
            "Linear" => Some(Self::Linear),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SigmoidSymmetric => "SigmoidSymmetric",
            Self::Sigmoid => "Sigmoid",
            Self::Tanh => "Tanh",
            Self::ReLU => "ReLU",
            Self::Linear => "Linear",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Self::SigmoidSymmetric => 2.0 / (1.0 + (-x).exp()) - 1.0,
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Self::Tanh => x.tanh(),
            Self::ReLU => x.max(0.0),
            Self::Linear => x,
        }
    }

    /// Derivative expressed through the activated value.
    fn derivative(self, y: f64) -> f64 {
        match self {
            Self::SigmoidSymmetric => 0.5 * (1.0 - y * y),
            Self::Sigmoid => y * (1.0 - y),
            Self::Tanh => 1.0 - y * y,
            Self::ReLU => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Linear => 1.0,
        }
    }
}

/// Batch training algorithm applied once per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingAlgorithm {
    /// Resilient backpropagation (iRprop-)
    Rprop,
    /// Batch gradient descent with momentum
    Backprop,
}

impl Default for TrainingAlgorithm {
    fn default() -> Self {
        Self::Rprop
    }
}

impl TrainingAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Rprop" => Some(Self::Rprop),
            "Backprop" => Some(Self::Backprop),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rprop => "Rprop",
            Self::Backprop => "Backprop",
        }
    }
}

/// One multi-layer perceptron with its rescaling state.
///
/// `run` is the single evaluation contract: it rescales the raw input,
/// feeds forward, and returns the output in physical units. The scaled-space
/// pass used during training is internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkModel {
    array_name: String,
    topology: Vec<usize>,
    activation: Activation,
    algorithm: TrainingAlgorithm,
    weights: Array1<f64>,
    input_min: Array1<f64>,
    input_max: Array1<f64>,
    target_min: f64,
    target_max: f64,
    scaling_captured: bool,
}

impl NetworkModel {
    /// Build a model from a resolved topology `[input, hidden..., output]`.
    ///
    /// The output layer must have size 1; every layer must be non-empty.
    /// Weights start at zero until [`randomize_weights`](Self::randomize_weights)
    /// or [`set_weights`](Self::set_weights) is called.
    pub fn new(
        array_name: impl Into<String>,
        topology: Vec<usize>,
        activation: Activation,
        algorithm: TrainingAlgorithm,
    ) -> Result<Self> {
        if topology.len() < 2 {
            return Err(NeurotrackError::InvalidParameter {
                name: "topology".to_string(),
                value: format!("{:?}", topology),
                reason: "need at least an input and an output layer".to_string(),
            });
        }
        if topology.iter().any(|&n| n == 0) {
            return Err(NeurotrackError::InvalidParameter {
                name: "topology".to_string(),
                value: format!("{:?}", topology),
                reason: "layer sizes must be positive".to_string(),
            });
        }
        if *topology.last().unwrap() != 1 {
            return Err(NeurotrackError::InvalidParameter {
                name: "topology".to_string(),
                value: format!("{:?}", topology),
                reason: "output layer must have size 1".to_string(),
            });
        }

        let n_weights = Self::count_weights(&topology);
        let n_inputs = topology[0];
        Ok(Self {
            array_name: array_name.into(),
            topology,
            activation,
            algorithm,
            weights: Array1::zeros(n_weights),
            input_min: Array1::zeros(n_inputs),
            input_max: Array1::zeros(n_inputs),
            target_min: 0.0,
            target_max: 0.0,
            scaling_captured: false,
        })
    }

    fn count_weights(topology: &[usize]) -> usize {
        topology
            .windows(2)
            .map(|pair| pair[1] * (pair[0] + 1))
            .sum()
    }

    pub fn array_name(&self) -> &str {
        &self.array_name
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn algorithm(&self) -> TrainingAlgorithm {
        self.algorithm
    }

    /// Total number of inter-layer connections, bias weights included.
    pub fn weight_count(&self) -> usize {
        self.weights.len()
    }

    pub fn n_layers(&self) -> usize {
        self.topology.len()
    }

    /// Bounds-checked layer size query.
    pub fn layer_size(&self, layer: usize) -> Result<usize> {
        self.topology
            .get(layer)
            .copied()
            .ok_or(NeurotrackError::IndexOutOfRange {
                index: layer,
                len: self.topology.len(),
            })
    }

    pub fn n_inputs(&self) -> usize {
        self.topology[0]
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Replace the whole weight vector.
    pub fn set_weights(&mut self, weights: Array1<f64>) -> Result<()> {
        if weights.len() != self.weights.len() {
            return Err(NeurotrackError::ShapeError {
                expected: format!("{} weights", self.weights.len()),
                actual: format!("{}", weights.len()),
            });
        }
        self.weights = weights;
        Ok(())
    }

    pub(crate) fn weights_mut(&mut self) -> &mut Array1<f64> {
        &mut self.weights
    }

    /// Reset all weights uniformly in `[-0.1, 0.1]` from the given seed.
    pub fn randomize_weights(&mut self, seed: u64) {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        for w in self.weights.iter_mut() {
            *w = rng.gen::<f64>() * 0.2 - 0.1;
        }
    }

    /// Capture input/target extrema from the sample set for rescaling.
    ///
    /// A zero-range input feature is usable (it maps to the constant -1) but
    /// gets a diagnostic. A zero-range target is rejected by the trainer
    /// before this is called.
    pub fn capture_scaling(
        &mut self,
        input_extrema: ArrayView2<'_, f64>,
        target_min: f64,
        target_max: f64,
    ) -> Result<()> {
        if input_extrema.ncols() != self.n_inputs() || input_extrema.nrows() != 2 {
            return Err(NeurotrackError::ShapeError {
                expected: format!("(2, {}) extrema table", self.n_inputs()),
                actual: format!("{:?}", input_extrema.shape()),
            });
        }
        for j in 0..self.n_inputs() {
            if input_extrema[[0, j]] == input_extrema[[1, j]] {
                warn!(
                    model = %self.array_name,
                    feature = j,
                    "input feature has zero range; it will be scaled to a constant"
                );
            }
        }
        self.input_min = input_extrema.row(0).to_owned();
        self.input_max = input_extrema.row(1).to_owned();
        self.target_min = target_min;
        self.target_max = target_max;
        self.scaling_captured = true;
        Ok(())
    }

    /// Map a raw input vector feature-wise onto `[-1, 1]`.
    ///
    /// Features with zero captured range map to the constant -1.
    pub fn scale_input(&self, raw: &[f64]) -> Result<Vec<f64>> {
        self.ensure_scaled()?;
        if raw.len() != self.n_inputs() {
            return Err(NeurotrackError::ShapeError {
                expected: format!("{} inputs", self.n_inputs()),
                actual: format!("{}", raw.len()),
            });
        }
        Ok(raw
            .iter()
            .enumerate()
            .map(|(j, &x)| {
                let (lo, hi) = (self.input_min[j], self.input_max[j]);
                if hi > lo {
                    -1.0 + 2.0 * (x - lo) / (hi - lo)
                } else {
                    -1.0
                }
            })
            .collect())
    }

    /// Map a physical-unit target onto `[-1, 1]`.
    pub fn scale_target(&self, t: f64) -> f64 {
        if self.target_max > self.target_min {
            -1.0 + 2.0 * (t - self.target_min) / (self.target_max - self.target_min)
        } else {
            -1.0
        }
    }

    /// Exact inverse of [`scale_target`](Self::scale_target) on the captured range.
    pub fn unscale_target(&self, s: f64) -> f64 {
        self.target_min + 0.5 * (s + 1.0) * (self.target_max - self.target_min)
    }

    /// Evaluate the network on a raw input vector.
    ///
    /// Returns the output in physical units: the input is rescaled, fed
    /// forward, and the network output is mapped back through the captured
    /// target range. Callers never rescale themselves.
    pub fn run(&self, raw_input: &[f64]) -> Result<f64> {
        let scaled = self.scale_input(raw_input)?;
        Ok(self.unscale_target(self.forward_scaled(&scaled)))
    }

    /// Feed-forward pass in scaled space.
    pub(crate) fn forward_scaled(&self, input: &[f64]) -> f64 {
        let activations = self.forward_layers(input);
        activations.last().map(|out| out[0]).unwrap_or(0.0)
    }

    /// Per-sample gradient of the half squared error in scaled space.
    ///
    /// Returns the flat gradient (same layout as the weight vector) and the
    /// squared error of this sample.
    pub(crate) fn gradient(&self, input: &[f64], target: f64) -> (Array1<f64>, f64) {
        let activations = self.forward_layers(input);
        let output = activations.last().map(|out| out[0]).unwrap_or(0.0);
        let error = output - target;

        let mut gradient = Array1::zeros(self.weights.len());
        // Output layer is linear, so its delta is just the error.
        let mut deltas = vec![error];

        let offsets = self.layer_offsets();
        for l in (0..self.topology.len() - 1).rev() {
            let n = self.topology[l];
            let m = self.topology[l + 1];
            let base_off = offsets[l];
            let mut prev_deltas = vec![0.0; n];

            for (j, &delta) in deltas.iter().enumerate().take(m) {
                let base = base_off + j * (n + 1);
                gradient[base] += delta;
                for i in 0..n {
                    gradient[base + 1 + i] += delta * activations[l][i];
                    prev_deltas[i] += delta * self.weights[base + 1 + i];
                }
            }

            if l > 0 {
                for i in 0..n {
                    prev_deltas[i] *= self.activation.derivative(activations[l][i]);
                }
                deltas = prev_deltas;
            }
        }

        (gradient, error * error)
    }

    /// Activations per layer, input layer first.
    fn forward_layers(&self, input: &[f64]) -> Vec<Vec<f64>> {
        debug_assert_eq!(input.len(), self.topology[0]);
        let last = self.topology.len() - 1;
        let mut activations = Vec::with_capacity(self.topology.len());
        activations.push(input.to_vec());

        let mut offset = 0;
        for l in 0..last {
            let n = self.topology[l];
            let m = self.topology[l + 1];
            let prev = &activations[l];
            let mut next = vec![0.0; m];
            for (j, out) in next.iter_mut().enumerate() {
                let base = offset + j * (n + 1);
                let mut sum = self.weights[base];
                for i in 0..n {
                    sum += self.weights[base + 1 + i] * prev[i];
                }
                *out = if l + 1 == last {
                    sum
                } else {
                    self.activation.apply(sum)
                };
            }
            activations.push(next);
            offset += m * (n + 1);
        }

        activations
    }

    /// Flat-vector offset of each connection layer's weight block.
    fn layer_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.topology.len() - 1);
        let mut offset = 0;
        for pair in self.topology.windows(2) {
            offsets.push(offset);
            offset += pair[1] * (pair[0] + 1);
        }
        offsets
    }

    fn ensure_scaled(&self) -> Result<()> {
        if self.scaling_captured {
            Ok(())
        } else {
            Err(NeurotrackError::ModelNotTrained)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn scaled_model(topology: Vec<usize>) -> NetworkModel {
        let n = topology[0];
        let mut model = NetworkModel::new(
            "test",
            topology,
            Activation::SigmoidSymmetric,
            TrainingAlgorithm::Rprop,
        )
        .unwrap();
        let mut extrema = ndarray::Array2::zeros((2, n));
        extrema.row_mut(0).fill(-1.0);
        extrema.row_mut(1).fill(1.0);
        model.capture_scaling(extrema.view(), -1.0, 1.0).unwrap();
        model
    }

    #[test]
    fn test_weight_count() {
        // 2 inputs -> 3 hidden -> 1 output: 3*(2+1) + 1*(3+1) = 13
        let model = scaled_model(vec![2, 3, 1]);
        assert_eq!(model.weight_count(), 13);
        assert_eq!(model.n_layers(), 3);
        assert_eq!(model.layer_size(1).unwrap(), 3);
        assert!(model.layer_size(3).is_err());
    }

    #[test]
    fn test_topology_validation() {
        let bad = NetworkModel::new(
            "t",
            vec![2, 3, 2],
            Activation::Tanh,
            TrainingAlgorithm::Rprop,
        );
        assert!(bad.is_err());
        let bad = NetworkModel::new("t", vec![4], Activation::Tanh, TrainingAlgorithm::Rprop);
        assert!(bad.is_err());
        let bad = NetworkModel::new(
            "t",
            vec![2, 0, 1],
            Activation::Tanh,
            TrainingAlgorithm::Rprop,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_set_weights_length_check() {
        let mut model = scaled_model(vec![2, 2, 1]);
        assert!(model.set_weights(Array1::zeros(3)).is_err());
        assert!(model.set_weights(Array1::zeros(model.weight_count())).is_ok());
    }

    #[test]
    fn test_target_scaling_round_trip() {
        let mut model = NetworkModel::new(
            "t",
            vec![1, 1],
            Activation::SigmoidSymmetric,
            TrainingAlgorithm::Rprop,
        )
        .unwrap();
        model
            .capture_scaling(array![[0.0], [1.0]].view(), 2.0, 10.0)
            .unwrap();
        for t in [2.0, 3.5, 6.0, 9.99, 10.0] {
            let round = model.unscale_target(model.scale_target(t));
            assert!((round - t).abs() < 1e-12, "round trip failed for {}", t);
        }
        assert_eq!(model.scale_target(2.0), -1.0);
        assert_eq!(model.scale_target(10.0), 1.0);
    }

    #[test]
    fn test_degenerate_feature_scales_to_constant() {
        let mut model = NetworkModel::new(
            "t",
            vec![2, 1],
            Activation::Linear,
            TrainingAlgorithm::Rprop,
        )
        .unwrap();
        model
            .capture_scaling(array![[3.0, 0.0], [3.0, 2.0]].view(), 0.0, 1.0)
            .unwrap();
        let scaled = model.scale_input(&[3.0, 1.0]).unwrap();
        assert_eq!(scaled[0], -1.0);
        assert_eq!(scaled[1], 0.0);
    }

    #[test]
    fn test_run_requires_captured_scaling() {
        let model = NetworkModel::new(
            "t",
            vec![2, 1],
            Activation::Linear,
            TrainingAlgorithm::Rprop,
        )
        .unwrap();
        assert!(matches!(
            model.run(&[0.0, 0.0]),
            Err(NeurotrackError::ModelNotTrained)
        ));
    }

    #[test]
    fn test_forward_linear_identity() {
        // Single connection layer, linear output: out = bias + w * x.
        let mut model = scaled_model(vec![1, 1]);
        model.set_weights(array![0.25, 0.5]).unwrap();
        let out = model.forward_scaled(&[0.8]);
        assert!((out - (0.25 + 0.5 * 0.8)).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut model = scaled_model(vec![2, 3, 1]);
        model.randomize_weights(7);
        let input = [0.3, -0.6];
        let target = 0.2;

        let (grad, _) = model.gradient(&input, target);
        let eps = 1e-6;
        for k in 0..model.weight_count() {
            let mut plus = model.clone();
            let mut w = plus.weights().clone();
            w[k] += eps;
            plus.set_weights(w).unwrap();
            let mut minus = model.clone();
            let mut w = minus.weights().clone();
            w[k] -= eps;
            minus.set_weights(w).unwrap();

            let e_plus = 0.5 * (plus.forward_scaled(&input) - target).powi(2);
            let e_minus = 0.5 * (minus.forward_scaled(&input) - target).powi(2);
            let numeric = (e_plus - e_minus) / (2.0 * eps);
            assert!(
                (grad[k] - numeric).abs() < 1e-5,
                "gradient mismatch at weight {}: {} vs {}",
                k,
                grad[k],
                numeric
            );
        }
    }

    #[test]
    fn test_activation_names_round_trip() {
        for a in [
            Activation::SigmoidSymmetric,
            Activation::Sigmoid,
            Activation::Tanh,
            Activation::ReLU,
            Activation::Linear,
        ] {
            assert_eq!(Activation::from_name(a.name()), Some(a));
        }
        assert_eq!(Activation::from_name("Softmax"), None);
        for a in [TrainingAlgorithm::Rprop, TrainingAlgorithm::Backprop] {
            assert_eq!(TrainingAlgorithm::from_name(a.name()), Some(a));
        }
    }

    #[test]
    fn test_randomize_is_deterministic() {
        let mut a = scaled_model(vec![3, 4, 1]);
        let mut b = scaled_model(vec![3, 4, 1]);
        a.randomize_weights(42);
        b.randomize_weights(42);
        assert_eq!(a.weights(), b.weights());
        b.randomize_weights(43);
        assert_ne!(a.weights(), b.weights());
    }
}
