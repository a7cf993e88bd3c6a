//! Missing value analysis

use polars::prelude::*;

use super::error::AnalysisResult;

/// Fraction of missing values per column, sorted descending.
///
/// NaN in float columns counts as missing alongside nulls.
pub fn analyze_missing_values(df: &DataFrame) -> AnalysisResult<Vec<(String, f64)>> {
    // Handle empty DataFrame
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|col| (col.name().to_string(), missing_count(col) as f64 / rows))
        .collect();

    // Sort by missing ratio descending
    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(missing_ratios)
}

/// Columns with at least one missing value and their counts, in column order
pub fn check_missing_values(df: &DataFrame) -> Vec<(String, usize)> {
    df.get_columns()
        .iter()
        .map(|col| (col.name().to_string(), missing_count(col)))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Columns whose missing ratio exceeds `threshold`, never including `protected` ones
pub fn get_features_above_threshold(
    missing_ratios: &[(String, f64)],
    threshold: f64,
    protected: &[&str],
) -> Vec<String> {
    missing_ratios
        .iter()
        .filter(|(name, ratio)| *ratio > threshold && !protected.contains(&name.as_str()))
        .map(|(name, _)| name.clone())
        .collect()
}

fn missing_count(col: &Column) -> usize {
    let nulls = col.null_count();
    if col.dtype().is_float() {
        let nans = col
            .cast(&DataType::Float64)
            .ok()
            .and_then(|c| c.f64().ok().map(|ca| ca.into_iter().filter(|v| v.is_some_and(f64::is_nan)).count()))
            .unwrap_or(0);
        nulls + nans
    } else {
        nulls
    }
}
