//! Batch weight-update rules
//!
//! Both algorithms consume the mean gradient of one epoch and update the
//! whole weight vector in place. Update state (step sizes, velocity) lives
//! here and is private to a single restart.

use ndarray::Array1;

use crate::model::TrainingAlgorithm;

// iRprop- constants.
const ETA_PLUS: f64 = 1.2;
const ETA_MINUS: f64 = 0.5;
const STEP_INITIAL: f64 = 0.1;
const STEP_MAX: f64 = 50.0;
const STEP_MIN: f64 = 1e-9;

// Batch backprop constants.
const LEARNING_RATE: f64 = 0.1;
const MOMENTUM: f64 = 0.9;

pub(crate) enum WeightUpdater {
    Rprop {
        step: Array1<f64>,
        prev_grad: Array1<f64>,
    },
    Backprop {
        velocity: Array1<f64>,
    },
}

impl WeightUpdater {
    pub(crate) fn new(algorithm: TrainingAlgorithm, n_weights: usize) -> Self {
        match algorithm {
            TrainingAlgorithm::Rprop => Self::Rprop {
                step: Array1::from_elem(n_weights, STEP_INITIAL),
                prev_grad: Array1::zeros(n_weights),
            },
            TrainingAlgorithm::Backprop => Self::Backprop {
                velocity: Array1::zeros(n_weights),
            },
        }
    }

    pub(crate) fn apply(&mut self, weights: &mut Array1<f64>, gradient: &Array1<f64>) {
        match self {
            Self::Rprop { step, prev_grad } => {
                for i in 0..weights.len() {
                    let signed = prev_grad[i] * gradient[i];
                    if signed > 0.0 {
                        step[i] = (step[i] * ETA_PLUS).min(STEP_MAX);
                    } else if signed < 0.0 {
                        // Sign flip: shrink the step and sit this one out.
                        step[i] = (step[i] * ETA_MINUS).max(STEP_MIN);
                        prev_grad[i] = 0.0;
                        continue;
                    }
                    if gradient[i] > 0.0 {
                        weights[i] -= step[i];
                    } else if gradient[i] < 0.0 {
                        weights[i] += step[i];
                    }
                    prev_grad[i] = gradient[i];
                }
            }
            Self::Backprop { velocity } => {
                *velocity = &*velocity * MOMENTUM - gradient * LEARNING_RATE;
                *weights += &*velocity;
            }
        }
    }
}
