//! Data-parallel epoch passes over a fold
//!
//! One epoch accumulates the batch gradient and squared error over a
//! positional fold of the sample set. The pass is embarrassingly parallel,
//! so two interchangeable runners exist: a sequential one and a rayon
//! thread-pool one. The reduction is a plain sum; worker order can only
//! perturb results within floating-point summation tolerance.

use ndarray::Array1;
use rayon::prelude::*;
use std::ops::Range;

use crate::data::SampleSet;
use crate::error::{NeurotrackError, Result};
use crate::model::NetworkModel;

/// Accumulated result of one epoch pass.
pub struct EpochStats {
    /// Sum of per-sample gradients, flat weight layout.
    pub gradient: Array1<f64>,
    /// Mean squared error over the fold, scaled target space.
    pub mse: f64,
}

/// One full pass of gradient accumulation or evaluation over a fold.
///
/// Implementations must not mutate the model; weight updates happen in the
/// trainer after the reduction.
pub trait EpochRunner: Send + Sync {
    /// Accumulate gradient and error over the fold.
    fn run(&self, model: &NetworkModel, set: &SampleSet, fold: Range<usize>) -> Result<EpochStats>;

    /// Mean squared error over the fold, no gradient work.
    fn evaluate(&self, model: &NetworkModel, set: &SampleSet, fold: Range<usize>) -> Result<f64>;
}

/// Pick a runner for the configured thread count.
pub fn make_runner(threads: usize) -> Result<Box<dyn EpochRunner>> {
    if threads <= 1 {
        Ok(Box::new(SequentialRunner))
    } else {
        Ok(Box::new(ParallelRunner::new(threads)?))
    }
}

fn sample_gradient(model: &NetworkModel, set: &SampleSet, i: usize) -> Result<(Array1<f64>, f64)> {
    let input = model.scale_input(set.input(i)?)?;
    let target = model.scale_target(set.target(i)?[0]);
    Ok(model.gradient(&input, target))
}

fn sample_sq_error(model: &NetworkModel, set: &SampleSet, i: usize) -> Result<f64> {
    let input = model.scale_input(set.input(i)?)?;
    let target = model.scale_target(set.target(i)?[0]);
    let error = model.forward_scaled(&input) - target;
    Ok(error * error)
}

/// Single-threaded epoch pass.
pub struct SequentialRunner;

impl EpochRunner for SequentialRunner {
    fn run(&self, model: &NetworkModel, set: &SampleSet, fold: Range<usize>) -> Result<EpochStats> {
        let count = fold.len();
        let mut gradient = Array1::zeros(model.weight_count());
        let mut sq_sum = 0.0;
        for i in fold {
            let (grad, sq) = sample_gradient(model, set, i)?;
            gradient += &grad;
            sq_sum += sq;
        }
        Ok(EpochStats {
            gradient,
            mse: if count > 0 { sq_sum / count as f64 } else { 0.0 },
        })
    }

    fn evaluate(&self, model: &NetworkModel, set: &SampleSet, fold: Range<usize>) -> Result<f64> {
        let count = fold.len();
        let mut sq_sum = 0.0;
        for i in fold {
            sq_sum += sample_sq_error(model, set, i)?;
        }
        Ok(if count > 0 { sq_sum / count as f64 } else { 0.0 })
    }
}

/// Thread-pool epoch pass with sum reduction.
pub struct ParallelRunner {
    pool: rayon::ThreadPool,
}

impl ParallelRunner {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| NeurotrackError::ThreadPoolError(e.to_string()))?;
        Ok(Self { pool })
    }
}

impl EpochRunner for ParallelRunner {
    fn run(&self, model: &NetworkModel, set: &SampleSet, fold: Range<usize>) -> Result<EpochStats> {
        let count = fold.len();
        let n_weights = model.weight_count();
        let (gradient, sq_sum) = self.pool.install(|| {
            fold.into_par_iter()
                .map(|i| sample_gradient(model, set, i))
                .try_reduce(
                    || (Array1::zeros(n_weights), 0.0),
                    |a, b| Ok((a.0 + b.0, a.1 + b.1)),
                )
        })?;
        Ok(EpochStats {
            gradient,
            mse: if count > 0 { sq_sum / count as f64 } else { 0.0 },
        })
    }

    fn evaluate(&self, model: &NetworkModel, set: &SampleSet, fold: Range<usize>) -> Result<f64> {
        let count = fold.len();
        let sq_sum = self.pool.install(|| {
            fold.into_par_iter()
                .map(|i| sample_sq_error(model, set, i))
                .try_reduce(|| 0.0, |a, b| Ok(a + b))
        })?;
        Ok(if count > 0 { sq_sum / count as f64 } else { 0.0 })
    }
}
