//! Conversions between the sample store and a flat tabular form
//!
//! The keyed container is a bespoke binary format; these conversions let the
//! CLI move sample tables in and out of CSV so they can be inspected and
//! produced with ordinary tools.

use polars::prelude::*;
use tracing::warn;

use crate::error::{NeurotrackError, Result};

use super::SampleSet;

/// Build a [`SampleSet`] from a data frame.
///
/// Every column except `target_name` becomes an input feature, in column
/// order. Rows with missing or non-finite values are dropped with a warning.
/// Returns the set together with the input column names.
pub fn dataframe_to_sample_set(
    df: &DataFrame,
    target_name: &str,
) -> Result<(SampleSet, Vec<String>)> {
    let input_names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != target_name)
        .map(|name| name.to_string())
        .collect();

    if input_names.len() == df.width() {
        return Err(NeurotrackError::DataError(format!(
            "target column '{}' not found",
            target_name
        )));
    }
    if input_names.is_empty() {
        return Err(NeurotrackError::DataError(
            "data frame has no input columns".to_string(),
        ));
    }

    let mut input_cols: Vec<Vec<Option<f64>>> = Vec::with_capacity(input_names.len());
    for name in &input_names {
        input_cols.push(column_as_f64(df, name)?);
    }
    let target_col = column_as_f64(df, target_name)?;

    let mut set = SampleSet::new();
    let mut dropped = 0usize;
    for row in 0..df.height() {
        let input: Option<Vec<f64>> = input_cols.iter().map(|col| col[row]).collect();
        match (input, target_col[row]) {
            (Some(input), Some(target)) => {
                if set.add(input, vec![target]).is_err() {
                    dropped += 1;
                }
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(dropped, "dropped rows with missing or non-finite values");
    }

    Ok((set, input_names))
}

/// Flatten a [`SampleSet`] into a data frame with one column per feature.
pub fn sample_set_to_dataframe(
    set: &SampleSet,
    input_names: &[String],
    target_name: &str,
) -> Result<DataFrame> {
    if input_names.len() != set.n_inputs() {
        return Err(NeurotrackError::ShapeError {
            expected: format!("{} input names", set.n_inputs()),
            actual: format!("{}", input_names.len()),
        });
    }

    let mut columns: Vec<Column> = Vec::with_capacity(set.n_inputs() + 1);
    for (j, name) in input_names.iter().enumerate() {
        let values: Vec<f64> = set.samples().iter().map(|s| s.input()[j]).collect();
        columns.push(Series::new(name.as_str().into(), values).into());
    }
    let targets: Vec<f64> = set.samples().iter().map(|s| s.target()[0]).collect();
    columns.push(Series::new(target_name.into(), targets).into());

    DataFrame::new(columns).map_err(|e| NeurotrackError::DataError(e.to_string()))
}

fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| NeurotrackError::DataError(format!("column '{}' not found", name)))?
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| NeurotrackError::DataError(e.to_string()))?;
    Ok(series
        .f64()
        .map_err(|e| NeurotrackError::DataError(e.to_string()))?
        .into_iter()
        .collect())
}
