//! Pairwise Pearson correlation between numeric columns

use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

use super::columns::f64_values;
use super::error::AnalysisResult;
use super::stats::pearson_correlation;

/// Symmetric correlation matrix; `None` where a pair has too little variation
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

/// Correlate every pair of `columns`, each pair over the rows where both are present.
///
/// Pairs are computed in parallel.
pub fn correlation_matrix(df: &DataFrame, columns: &[&str]) -> AnalysisResult<CorrelationMatrix> {
    let data: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|c| f64_values(df, c))
        .collect::<AnalysisResult<_>>()?;

    let k = columns.len();
    let pairs: Vec<(usize, usize)> = (0..k).flat_map(|i| (i..k).map(move |j| (i, j))).collect();

    let results: Vec<((usize, usize), Option<f64>)> = pairs
        .par_iter()
        .map(|&(i, j)| ((i, j), pearson_correlation(&data[i], &data[j])))
        .collect();

    let mut values = vec![vec![None; k]; k];
    for ((i, j), r) in results {
        values[i][j] = r;
        values[j][i] = r;
    }

    Ok(CorrelationMatrix {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_matrix_is_symmetric() {
        let df = df! {
            "a" => [1.0f64, 2.0, 3.0, 4.0],
            "b" => [2.0f64, 4.0, 6.0, 8.0],
            "c" => [4.0f64, 3.0, 2.0, 1.0],
            "flat" => [1.0f64, 1.0, 1.0, 1.0],
        }
        .unwrap();
        let m = correlation_matrix(&df, &["a", "b", "c", "flat"]).unwrap();

        assert!((m.get("a", "b").unwrap() - 1.0).abs() < 1e-12);
        assert!((m.get("c", "a").unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(m.get("a", "c"), m.get("c", "a"));
        assert!((m.get("a", "a").unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(m.get("flat", "a"), None);
    }

    #[test]
    fn test_correlation_skips_rows_with_nulls() {
        let df = df! {
            "a" => [Some(1.0f64), Some(2.0), None, Some(3.0)],
            "b" => [Some(1.0f64), Some(2.0), Some(100.0), Some(3.0)],
        }
        .unwrap();
        let m = correlation_matrix(&df, &["a", "b"]).unwrap();
        assert!((m.get("a", "b").unwrap() - 1.0).abs() < 1e-12);
    }
}
