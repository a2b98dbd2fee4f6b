//! Sample storage with cached per-feature extrema

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{NeurotrackError, Result};

/// One training sample: an input vector and a target vector.
///
/// Immutable once created; owned by the [`SampleSet`] that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    input: Vec<f64>,
    target: Vec<f64>,
}

impl Sample {
    pub fn input(&self) -> &[f64] {
        &self.input
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }
}

/// Per-feature minimum and maximum, one column per feature.
///
/// Row 0 holds the minima, row 1 the maxima.
#[derive(Debug, Clone)]
struct Extrema {
    input: Array2<f64>,
    target: Array2<f64>,
}

/// Ordered store of training samples.
///
/// Insertion order is preserved and significant: fold membership during
/// training is purely positional. Duplicates are legal and simply bias the
/// distribution. Extrema are computed lazily by a single linear scan and
/// cached until the next insertion.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SampleSet {
    samples: Vec<Sample>,
    n_inputs: usize,
    n_targets: usize,
    #[serde(skip)]
    extrema: OnceLock<Extrema>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample, invalidating the cached extrema.
    ///
    /// The first sample fixes the input/target dimensionality; later samples
    /// must match it. Samples containing non-finite values are rejected with
    /// a [`NeurotrackError::DataError`] and leave the set unchanged.
    pub fn add(&mut self, input: Vec<f64>, target: Vec<f64>) -> Result<()> {
        if input.iter().chain(target.iter()).any(|v| !v.is_finite()) {
            return Err(NeurotrackError::DataError(
                "sample contains non-finite values".to_string(),
            ));
        }
        if self.samples.is_empty() {
            if input.is_empty() || target.is_empty() {
                return Err(NeurotrackError::DataError(
                    "sample input and target must be non-empty".to_string(),
                ));
            }
            self.n_inputs = input.len();
            self.n_targets = target.len();
        } else if input.len() != self.n_inputs || target.len() != self.n_targets {
            return Err(NeurotrackError::ShapeError {
                expected: format!("input {} / target {}", self.n_inputs, self.n_targets),
                actual: format!("input {} / target {}", input.len(), target.len()),
            });
        }
        self.samples.push(Sample { input, target });
        self.extrema = OnceLock::new();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_targets(&self) -> usize {
        self.n_targets
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Indexed access to one input vector.
    pub fn input(&self, index: usize) -> Result<&[f64]> {
        self.samples
            .get(index)
            .map(|s| s.input())
            .ok_or(NeurotrackError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            })
    }

    /// Indexed access to one target vector.
    pub fn target(&self, index: usize) -> Result<&[f64]> {
        self.samples
            .get(index)
            .map(|s| s.target())
            .ok_or(NeurotrackError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            })
    }

    /// Min/max per input feature as a `(2, n_inputs)` table.
    ///
    /// Row 0 = minima, row 1 = maxima. Recomputed on demand after insertions,
    /// never incrementally maintained.
    pub fn input_extrema(&self) -> Result<ArrayView2<'_, f64>> {
        Ok(self.extrema()?.input.view())
    }

    /// Min/max per target feature as a `(2, n_targets)` table.
    pub fn target_extrema(&self) -> Result<ArrayView2<'_, f64>> {
        Ok(self.extrema()?.target.view())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.n_inputs = 0;
        self.n_targets = 0;
        self.extrema = OnceLock::new();
    }

    fn extrema(&self) -> Result<&Extrema> {
        if self.samples.is_empty() {
            return Err(NeurotrackError::DataError(
                "extrema requested for empty sample set".to_string(),
            ));
        }
        Ok(self.extrema.get_or_init(|| self.scan_extrema()))
    }

    /// One pass over all samples, both tables at once.
    fn scan_extrema(&self) -> Extrema {
        let mut input = Array2::zeros((2, self.n_inputs));
        let mut target = Array2::zeros((2, self.n_targets));
        input.row_mut(0).fill(f64::INFINITY);
        input.row_mut(1).fill(f64::NEG_INFINITY);
        target.row_mut(0).fill(f64::INFINITY);
        target.row_mut(1).fill(f64::NEG_INFINITY);

        for sample in &self.samples {
            for (j, &v) in sample.input.iter().enumerate() {
                if v < input[[0, j]] {
                    input[[0, j]] = v;
                }
                if v > input[[1, j]] {
                    input[[1, j]] = v;
                }
            }
            for (j, &v) in sample.target.iter().enumerate() {
                if v < target[[0, j]] {
                    target[[0, j]] = v;
                }
                if v > target[[1, j]] {
                    target[[1, j]] = v;
                }
            }
        }

        Extrema { input, target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_set() -> SampleSet {
        let mut set = SampleSet::new();
        set.add(vec![1.0, -2.0], vec![0.5]).unwrap();
        set.add(vec![3.0, 4.0], vec![-1.5]).unwrap();
        set.add(vec![-1.0, 0.0], vec![2.5]).unwrap();
        set
    }

    #[test]
    fn test_add_and_access() {
        let set = filled_set();
        assert_eq!(set.len(), 3);
        assert_eq!(set.n_inputs(), 2);
        assert_eq!(set.n_targets(), 1);
        assert_eq!(set.input(1).unwrap(), &[3.0, 4.0]);
        assert_eq!(set.target(2).unwrap(), &[2.5]);
    }

    #[test]
    fn test_index_out_of_range() {
        let set = filled_set();
        assert!(matches!(
            set.input(3),
            Err(NeurotrackError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut set = filled_set();
        let err = set.add(vec![f64::NAN, 1.0], vec![0.0]);
        assert!(matches!(err, Err(NeurotrackError::DataError(_))));
        assert_eq!(set.len(), 3);

        let err = set.add(vec![1.0, 1.0], vec![f64::INFINITY]);
        assert!(err.is_err());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let mut set = filled_set();
        assert!(set.add(vec![1.0], vec![0.0]).is_err());
        assert!(set.add(vec![1.0, 2.0], vec![0.0, 1.0]).is_err());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_extrema_tables() {
        let set = filled_set();
        let input = set.input_extrema().unwrap();
        assert_eq!(input.shape(), &[2, 2]);
        assert_eq!(input[[0, 0]], -1.0);
        assert_eq!(input[[1, 0]], 3.0);
        assert_eq!(input[[0, 1]], -2.0);
        assert_eq!(input[[1, 1]], 4.0);

        let target = set.target_extrema().unwrap();
        assert_eq!(target[[0, 0]], -1.5);
        assert_eq!(target[[1, 0]], 2.5);
    }

    #[test]
    fn test_extrema_invalidated_by_add() {
        let mut set = filled_set();
        let _ = set.input_extrema().unwrap();
        set.add(vec![10.0, -10.0], vec![5.0]).unwrap();
        let input = set.input_extrema().unwrap();
        assert_eq!(input[[1, 0]], 10.0);
        assert_eq!(input[[0, 1]], -10.0);
        assert_eq!(set.target_extrema().unwrap()[[1, 0]], 5.0);
    }

    #[test]
    fn test_extrema_on_empty_set() {
        let set = SampleSet::new();
        assert!(set.input_extrema().is_err());
    }

    #[test]
    fn test_duplicates_are_legal() {
        let mut set = SampleSet::new();
        set.add(vec![1.0], vec![1.0]).unwrap();
        set.add(vec![1.0], vec![1.0]).unwrap();
        assert_eq!(set.len(), 2);
    }
}
