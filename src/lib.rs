//! neurotrack - MLP training engine for track-parameter estimation
//!
//! Trains small multi-layer perceptrons that predict track parameters from
//! detector hit patterns. Samples are accumulated into a [`data::SampleSet`]
//! over many events; at finalization each configured network is trained with
//! parallel epoch passes, iterative early stopping and best-weight selection
//! across random restarts, then persisted to a keyed binary container.
//!
//! # Modules
//!
//! - [`data`] - Sample storage, per-feature extrema, CSV interchange
//! - [`config`] - The `Key=Value` training mini-language
//! - [`model`] - The trainable MLP with input/target rescaling
//! - [`training`] - Folds, epoch runners, early stopping, restarts
//! - [`storage`] - Keyed binary container for models and samples
//! - [`teacher`] - Campaign orchestration (accumulate, train, persist)
//! - [`cli`] - Command-line interface

pub mod error;

pub mod config;
pub mod data;
pub mod model;
pub mod storage;
pub mod teacher;
pub mod training;

pub mod cli;

pub use error::{NeurotrackError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigIssue, NetworkConfig};
    pub use crate::data::{Sample, SampleSet};
    pub use crate::error::{NeurotrackError, Result};
    pub use crate::model::{Activation, NetworkModel, TrainingAlgorithm};
    pub use crate::storage::{ModelGroup, SampleGroup};
    pub use crate::teacher::{MethodKind, MethodSpec, Teacher, TeacherSettings};
    pub use crate::training::{TrainOutcome, TrainReport, Trainer};
}
