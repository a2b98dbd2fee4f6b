//! Training-sample storage
//!
//! A [`SampleSet`] accumulates `(input, target)` pairs in insertion order and
//! exposes per-feature extrema for rescaling. Sample order is significant:
//! the trainer slices train/validation/test folds positionally.

mod interchange;
mod sample_set;

pub use interchange::{dataframe_to_sample_set, sample_set_to_dataframe};
pub use sample_set::{Sample, SampleSet};
