//! The training orchestrator for one network
//!
//! Drives the full state machine: capacity gate, extrema capture, positional
//! fold construction, the restart loop with early stopping, and champion
//! selection. Each restart produces an immutable outcome; the model is only
//! touched once, at the end, when the champion's weights are installed.

use ndarray::Array1;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::data::SampleSet;
use crate::error::{NeurotrackError, Result};
use crate::model::NetworkModel;

use super::epoch::{make_runner, EpochRunner};
use super::update::WeightUpdater;

use std::ops::Range;

/// Positional train/validation/test split.
///
/// Fold membership is determined purely by insertion order; the three index
/// ranges are pairwise disjoint and cover `[0, total)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folds {
    pub train: Range<usize>,
    pub valid: Range<usize>,
    pub test: Range<usize>,
}

impl Folds {
    pub fn positional(total: usize, valid_count: usize, test_count: usize) -> Self {
        let train_end = total - valid_count - test_count;
        Self {
            train: 0..train_end,
            valid: train_end..train_end + valid_count,
            test: train_end + valid_count..total,
        }
    }
}

/// Why a model was not trained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientSamples { available: usize, required: usize },
}

/// Result of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Root-mean-square error on the held-out test fold, scaled target space.
    pub test_rms: f64,
    /// Champion restart's per-epoch training error curve.
    pub train_log: Vec<f64>,
    /// Champion restart's per-epoch validation error curve.
    pub valid_log: Vec<f64>,
    /// Which restart won.
    pub best_restart: usize,
    /// How many restarts ran.
    pub restarts: usize,
}

/// Terminal state of the per-model state machine.
#[derive(Debug, Clone)]
pub enum TrainOutcome {
    Trained(TrainReport),
    Skipped(SkipReason),
}

/// Outcome of a single restart; compared, never re-applied.
struct RestartOutcome {
    weights: Array1<f64>,
    test_rms: f64,
    train_log: Vec<f64>,
    valid_log: Vec<f64>,
}

/// Early-stopping rule: stop when the latest validation error exceeds the
/// one from `patience` epochs ago. A single relapse after the window
/// triggers the stop; there is no smoothing or counter decay.
pub(crate) fn validation_relapsed(valid_log: &[f64], patience: usize) -> bool {
    if valid_log.is_empty() {
        return false;
    }
    let epoch = valid_log.len() - 1;
    epoch >= patience && valid_log[epoch] > valid_log[epoch - patience]
}

/// Trains one [`NetworkModel`] against a read-only [`SampleSet`].
pub struct Trainer<'a> {
    set: &'a SampleSet,
    config: NetworkConfig,
    runner: Box<dyn EpochRunner>,
    base_seed: u64,
}

impl<'a> Trainer<'a> {
    /// Build a trainer; the epoch runner is chosen from the configured
    /// thread count.
    pub fn new(set: &'a SampleSet, config: NetworkConfig) -> Result<Self> {
        let runner = make_runner(config.threads)?;
        Ok(Self::with_runner(set, config, runner))
    }

    /// Build a trainer with an injected epoch runner.
    pub fn with_runner(
        set: &'a SampleSet,
        config: NetworkConfig,
        runner: Box<dyn EpochRunner>,
    ) -> Self {
        Self {
            set,
            config,
            runner,
            base_seed: 42,
        }
    }

    /// Base seed for weight randomization; restart `r` uses `seed + r`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    /// Run the full state machine for one model.
    ///
    /// Returns `Skipped` when the capacity gate fails (warning, not error).
    /// A zero-range target is an error, local to this model. On success the
    /// model holds the best weights found across all restarts and the report
    /// carries the champion's error curves.
    pub fn train(&self, model: &mut NetworkModel) -> Result<TrainOutcome> {
        let total = self.set.len();
        let valid_count = (0.5 * self.config.validation_fraction * total as f64).floor() as usize;
        let test_count = valid_count;

        let required = 10 * model.weight_count() + valid_count + test_count;
        if total < required {
            warn!(
                model = %model.array_name(),
                available = total,
                required,
                "not enough samples; skipping training"
            );
            return Ok(TrainOutcome::Skipped(SkipReason::InsufficientSamples {
                available: total,
                required,
            }));
        }

        let target_extrema = self.set.target_extrema()?;
        let (target_min, target_max) = (target_extrema[[0, 0]], target_extrema[[1, 0]]);
        if target_min == target_max {
            return Err(NeurotrackError::TrainingError(format!(
                "target for '{}' has zero range; nothing is learnable",
                model.array_name()
            )));
        }
        model.capture_scaling(self.set.input_extrema()?, target_min, target_max)?;

        let folds = Folds::positional(total, valid_count, test_count);
        debug!(
            train = folds.train.len(),
            valid = folds.valid.len(),
            test = folds.test.len(),
            "fold sizes"
        );

        let restarts = self.config.random_restarts.max(1);
        let mut best: Option<RestartOutcome> = None;
        let mut best_restart = 0;
        for restart in 0..restarts {
            let seed = self.base_seed.wrapping_add(restart as u64);
            let outcome = self.run_restart(model, &folds, seed)?;
            info!(
                model = %model.array_name(),
                restart,
                epochs = outcome.valid_log.len(),
                test_rms = outcome.test_rms,
                "restart finished"
            );
            if best.as_ref().map_or(true, |b| outcome.test_rms < b.test_rms) {
                best_restart = restart;
                best = Some(outcome);
            }
        }

        let champion = best.expect("at least one restart runs");
        model.set_weights(champion.weights)?;
        Ok(TrainOutcome::Trained(TrainReport {
            test_rms: champion.test_rms,
            train_log: champion.train_log,
            valid_log: champion.valid_log,
            best_restart,
            restarts,
        }))
    }

    /// One restart: fresh random weights, epoch loop with early stopping,
    /// best-validation snapshot, test-fold evaluation.
    fn run_restart(
        &self,
        model: &NetworkModel,
        folds: &Folds,
        seed: u64,
    ) -> Result<RestartOutcome> {
        let mut candidate = model.clone();
        candidate.randomize_weights(seed);
        let mut updater = WeightUpdater::new(self.config.algorithm, candidate.weight_count());

        let train_count = folds.train.len().max(1) as f64;
        let mut train_log = Vec::new();
        let mut valid_log = Vec::new();
        let mut best_valid = f64::INFINITY;
        let mut best_weights = candidate.weights().clone();

        for epoch in 0..self.config.cycles {
            let stats = self.runner.run(&candidate, self.set, folds.train.clone())?;
            let mean_gradient = stats.gradient / train_count;
            updater.apply(candidate.weights_mut(), &mean_gradient);

            let valid_mse = self
                .runner
                .evaluate(&candidate, self.set, folds.valid.clone())?;
            train_log.push(stats.mse);
            valid_log.push(valid_mse);

            if valid_mse < best_valid {
                best_valid = valid_mse;
                best_weights = candidate.weights().clone();
            }
            if self.config.epoch_monitoring {
                debug!(epoch, train_mse = stats.mse, valid_mse, "epoch complete");
            }
            if validation_relapsed(&valid_log, self.config.test_rate) {
                debug!(epoch, "validation error relapsed; stopping restart");
                break;
            }
        }

        candidate.set_weights(best_weights)?;
        let test_mse = self
            .runner
            .evaluate(&candidate, self.set, folds.test.clone())?;
        Ok(RestartOutcome {
            weights: candidate.weights().clone(),
            test_rms: test_mse.sqrt(),
            train_log,
            valid_log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activation, TrainingAlgorithm};

    /// Deterministic pseudo-shuffled inputs so the positional folds all
    /// cover the same domain.
    fn linear_set(n: usize) -> SampleSet {
        let mut set = SampleSet::new();
        for i in 0..n {
            let x = (i * 37 % n) as f64 / n as f64;
            let y = (i * 17 % n) as f64 / n as f64;
            set.add(vec![x, y], vec![3.0 * x - y + 0.5]).unwrap();
        }
        set
    }

    fn small_config(text: &str) -> NetworkConfig {
        NetworkConfig::parse("test", text).unwrap().0
    }

    #[test]
    fn test_folds_are_disjoint_and_cover() {
        let folds = Folds::positional(100, 25, 25);
        assert_eq!(folds.train, 0..50);
        assert_eq!(folds.valid, 50..75);
        assert_eq!(folds.test, 75..100);

        let folds = Folds::positional(101, 25, 25);
        assert_eq!(
            folds.train.len() + folds.valid.len() + folds.test.len(),
            101
        );
        assert_eq!(folds.train.end, folds.valid.start);
        assert_eq!(folds.valid.end, folds.test.start);
        assert_eq!(folds.test.end, 101);
    }

    #[test]
    fn test_validation_relapse_fires_at_patience() {
        // Decreasing until epoch 10, strictly increasing after.
        let k = 10;
        let patience = 4;
        let mut log: Vec<f64> = Vec::new();
        let mut stopped_at = None;
        for epoch in 0..100 {
            let value = if epoch <= k {
                1.0 - 0.05 * epoch as f64
            } else {
                0.5 + 0.05 * (epoch - k) as f64
            };
            log.push(value);
            if validation_relapsed(&log, patience) {
                stopped_at = Some(epoch);
                break;
            }
        }
        assert_eq!(stopped_at, Some(k + patience));
    }

    #[test]
    fn test_validation_relapse_needs_full_window() {
        assert!(!validation_relapsed(&[1.0, 2.0], 5));
        assert!(!validation_relapsed(&[1.0, 0.9, 0.8], 2));
        assert!(validation_relapsed(&[1.0, 0.9, 1.1], 2));
    }

    #[test]
    fn test_capacity_gate_skips() {
        // 50 samples, W = 9 requires 10*9 + 2*floor(0.25*50) = 114 > 50.
        let set = linear_set(50);
        let config = small_config("HiddenLayers=2:NCycles=5");
        let mut model = NetworkModel::new(
            "gate",
            vec![2, 2, 1],
            Activation::SigmoidSymmetric,
            TrainingAlgorithm::Rprop,
        )
        .unwrap();
        assert_eq!(model.weight_count(), 9);

        let trainer = Trainer::new(&set, config).unwrap();
        match trainer.train(&mut model).unwrap() {
            TrainOutcome::Skipped(SkipReason::InsufficientSamples {
                available,
                required,
            }) => {
                assert_eq!(available, 50);
                assert_eq!(required, 10 * 9 + 12 + 12);
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_range_target_is_error() {
        let mut set = SampleSet::new();
        for i in 0..400 {
            set.add(vec![i as f64, -(i as f64), 0.5], vec![7.0]).unwrap();
        }
        let config = small_config("HiddenLayers=1:NCycles=5");
        let mut model = NetworkModel::new(
            "flat",
            vec![3, 1, 1],
            Activation::SigmoidSymmetric,
            TrainingAlgorithm::Rprop,
        )
        .unwrap();
        let trainer = Trainer::new(&set, config).unwrap();
        assert!(matches!(
            trainer.train(&mut model),
            Err(NeurotrackError::TrainingError(_))
        ));
    }

    #[test]
    fn test_training_learns_linear_relation() {
        let set = linear_set(400);
        let config = small_config("HiddenLayers=4:NCycles=300:TestRate=50");
        let mut model = NetworkModel::new(
            "linear",
            config.resolve_topology(2).unwrap(),
            Activation::SigmoidSymmetric,
            TrainingAlgorithm::Rprop,
        )
        .unwrap();
        let trainer = Trainer::new(&set, config).unwrap().with_seed(1);
        let report = match trainer.train(&mut model).unwrap() {
            TrainOutcome::Trained(report) => report,
            other => panic!("expected training, got {:?}", other),
        };
        assert!(
            report.test_rms < 0.2,
            "test RMS too high: {}",
            report.test_rms
        );
        assert_eq!(report.train_log.len(), report.valid_log.len());
        assert!(!report.train_log.is_empty());
    }

    #[test]
    fn test_determinism_given_seed() {
        let set = linear_set(400);
        let make_model = |config: &NetworkConfig| {
            NetworkModel::new(
                "det",
                config.resolve_topology(2).unwrap(),
                Activation::SigmoidSymmetric,
                TrainingAlgorithm::Rprop,
            )
            .unwrap()
        };

        let config = small_config("HiddenLayers=3:NCycles=50:RandomSeeds=2");
        let mut a = make_model(&config);
        let mut b = make_model(&config);
        Trainer::new(&set, config.clone())
            .unwrap()
            .with_seed(9)
            .train(&mut a)
            .unwrap();
        Trainer::new(&set, config)
            .unwrap()
            .with_seed(9)
            .train(&mut b)
            .unwrap();
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn test_degenerate_feature_is_not_fatal() {
        let mut set = SampleSet::new();
        for i in 0..400 {
            let x = i as f64 / 399.0;
            set.add(vec![x, 1.5], vec![2.0 * x]).unwrap();
        }
        let config = small_config("HiddenLayers=2:NCycles=20");
        let mut model = NetworkModel::new(
            "degenerate",
            config.resolve_topology(2).unwrap(),
            Activation::SigmoidSymmetric,
            TrainingAlgorithm::Rprop,
        )
        .unwrap();
        let trainer = Trainer::new(&set, config).unwrap();
        assert!(matches!(
            trainer.train(&mut model).unwrap(),
            TrainOutcome::Trained(_)
        ));
        // The constant feature scales to -1 for every sample.
        assert_eq!(model.scale_input(&[0.3, 1.5]).unwrap()[1], -1.0);
    }

    #[test]
    fn test_backprop_algorithm_runs() {
        let set = linear_set(400);
        let config = small_config("HiddenLayers=3:NCycles=100:TrainingMethod=Backprop");
        let mut model = NetworkModel::new(
            "bp",
            config.resolve_topology(2).unwrap(),
            Activation::SigmoidSymmetric,
            TrainingAlgorithm::Backprop,
        )
        .unwrap();
        let trainer = Trainer::new(&set, config).unwrap();
        assert!(matches!(
            trainer.train(&mut model).unwrap(),
            TrainOutcome::Trained(_)
        ));
    }
}
