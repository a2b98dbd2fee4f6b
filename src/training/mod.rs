//! Model training
//!
//! Parallel epoch training with iterative early stopping across multiple
//! random restarts. The sample set is read-only for the duration of a run;
//! each model's weight vector is owned exclusively by the trainer driving
//! its restart loop, and models are processed strictly sequentially.

mod epoch;
mod trainer;
mod update;

pub use epoch::{make_runner, EpochRunner, EpochStats, ParallelRunner, SequentialRunner};
pub use trainer::{Folds, SkipReason, TrainOutcome, TrainReport, Trainer};
