//! Feature preparation for the claim models
//!
//! Turns the cleaned policy frame into an all-numeric frame, then into a
//! dense [`FeatureMatrix`] that the models consume.

use std::collections::BTreeMap;

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use super::columns::{
    add_claim_targets, column_f64_values, column_string_values, filter_rows, is_categorical,
    is_numeric, positive_premium_mask, HAS_CLAIM, LOSS_RATIO, MARGIN, TOTAL_CLAIMS, TOTAL_PREMIUM,
};
use super::error::{AnalysisError, AnalysisResult};
use super::stats::mean;

/// Identifier and uninformative columns removed before modelling
pub const DROP_COLUMNS: &[&str] = &[
    "UnderwrittenCoverID",
    "PolicyID",
    "TransactionMonth",
    "VehicleIntroDate",
    "CapitalOutstanding",
    "CrossBorder",
    "NumberOfVehiclesInFleet",
];

/// Columns derived from the outcome; never used as model inputs
pub const LEAKAGE_COLUMNS: &[&str] = &[HAS_CLAIM, TOTAL_CLAIMS, TOTAL_PREMIUM, MARGIN, LOSS_RATIO];

/// Level that rare categories are merged into
pub const OTHER_LEVEL: &str = "OTHER";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrepareOptions {
    /// Levels seen on fewer rows than this are merged into `OTHER`; 0 disables merging
    pub min_category_samples: usize,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            min_category_samples: 5,
        }
    }
}

/// Filter, impute and encode the policy frame for modelling.
///
/// The result contains `has_claim`, `margin`, the untouched premium and
/// claims amounts, mean-imputed numeric features and one-hot columns named
/// `<column>_<level>` (first level dropped, nulls encoded as all zeros).
pub fn prepare_model_data(df: &DataFrame, options: &PrepareOptions) -> AnalysisResult<DataFrame> {
    let keep = positive_premium_mask(df)?;
    let filtered = filter_rows(df, &keep)?;
    let prepared = add_claim_targets(&filtered)?;

    let mut columns: Vec<Column> = Vec::new();
    for col in prepared.get_columns() {
        let name = col.name().as_str();
        if DROP_COLUMNS.contains(&name) {
            continue;
        }

        if matches!(name, TOTAL_CLAIMS | TOTAL_PREMIUM) {
            columns.push(col.clone());
        } else if col.dtype() == &DataType::Boolean {
            columns.push(col.cast(&DataType::Int32)?);
        } else if is_numeric(col) {
            match impute_mean(col)? {
                Some(imputed) => columns.push(imputed),
                None => log::debug!("dropping all-null numeric column '{}'", name),
            }
        } else if is_categorical(col) {
            columns.extend(one_hot(col, options.min_category_samples)?);
        } else {
            log::debug!("dropping non-numeric column '{}' ({})", name, col.dtype());
        }
    }

    let encoded = DataFrame::new(columns)?;
    log::info!("model data: {} rows x {} columns", encoded.height(), encoded.width());
    Ok(encoded)
}

/// Fill missing values with the column mean; `None` if the column has no values.
fn impute_mean(col: &Column) -> AnalysisResult<Option<Column>> {
    let values = column_f64_values(col)?;
    if !values.iter().any(Option::is_none) {
        return Ok(Some(col.clone()));
    }
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let Some(fill) = mean(&present) else {
        return Ok(None);
    };
    let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
    Ok(Some(Column::new(col.name().clone(), filled)))
}

/// Dummy columns for a string column, first sorted level dropped.
fn one_hot(col: &Column, min_samples: usize) -> AnalysisResult<Vec<Column>> {
    let values = column_string_values(col)?;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }

    let level_of = |v: &str| -> String {
        if counts.get(v).copied().unwrap_or(0) < min_samples {
            OTHER_LEVEL.to_string()
        } else {
            v.to_string()
        }
    };

    let levels: Vec<Option<String>> = values.iter().map(|v| v.as_deref().map(level_of)).collect();
    let mut distinct: Vec<&str> = levels.iter().flatten().map(String::as_str).collect();
    distinct.sort_unstable();
    distinct.dedup();

    Ok(distinct
        .iter()
        .skip(1)
        .map(|level| {
            let indicator: Vec<i32> = levels
                .iter()
                .map(|v| i32::from(v.as_deref() == Some(*level)))
                .collect();
            Column::new(format!("{}_{}", col.name(), level).into(), indicator)
        })
        .collect())
}

/// Dense row-major feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    data: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build from row-major values
    pub fn new(names: Vec<String>, data: Vec<f64>) -> AnalysisResult<Self> {
        let n_cols = names.len();
        if n_cols == 0 {
            return Err(AnalysisError::invalid("features", "at least one feature is required"));
        }
        if data.len() % n_cols != 0 {
            return Err(AnalysisError::ShapeMismatch(format!(
                "{} values do not fill rows of {} features",
                data.len(),
                n_cols
            )));
        }
        Ok(Self {
            n_rows: data.len() / n_cols,
            names,
            data,
        })
    }

    /// Every column of `df` except `exclude`; all must be numeric without nulls.
    pub fn from_frame(df: &DataFrame, exclude: &[&str]) -> AnalysisResult<Self> {
        let cols: Vec<&Column> = df
            .get_columns()
            .iter()
            .filter(|c| !exclude.contains(&c.name().as_str()))
            .collect();

        let n_rows = df.height();
        let n_cols = cols.len();
        let mut data = vec![0.0; n_rows * n_cols];
        let mut names = Vec::with_capacity(n_cols);

        for (j, col) in cols.iter().enumerate() {
            if !is_numeric(col) {
                return Err(AnalysisError::invalid(
                    "features",
                    format!("column '{}' is not numeric ({})", col.name(), col.dtype()),
                ));
            }
            for (i, v) in column_f64_values(col)?.into_iter().enumerate() {
                data[i * n_cols + j] = v.ok_or_else(|| {
                    AnalysisError::invalid("features", format!("column '{}' has missing values", col.name()))
                })?;
            }
            names.push(col.name().to_string());
        }

        Self::new(names, data)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols() + col]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.n_cols();
        &self.data[i * n..(i + 1) * n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.n_cols())
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows().map(|r| r[j]).collect()
    }

    /// New matrix holding `indices` in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols());
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            names: self.names.clone(),
            data,
            n_rows: indices.len(),
        }
    }
}

/// A target column as `f64`, failing on missing values
pub fn target_values(df: &DataFrame, name: &str) -> AnalysisResult<Vec<f64>> {
    let col = super::columns::require_column(df, name)?;
    column_f64_values(col)?
        .into_iter()
        .map(|v| v.ok_or_else(|| AnalysisError::invalid("target", format!("'{}' has missing values", name))))
        .collect()
}

/// Shuffled train/test indices; the test set holds `ceil(test_size * n)` rows.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> AnalysisResult<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AnalysisError::invalid(
            "test_size",
            format!("must be between 0 and 1, got {}", test_size),
        ));
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(AnalysisError::invalid(
            "test_size",
            format!("{} rows cannot be split with test_size {}", n, test_size),
        ));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = Pcg64::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Features and target split into train and test parts
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
}

impl DataSplit {
    pub fn new(x: &FeatureMatrix, y: &[f64], test_size: f64, seed: u64) -> AnalysisResult<Self> {
        if x.n_rows() != y.len() {
            return Err(AnalysisError::ShapeMismatch(format!(
                "{} feature rows for {} targets",
                x.n_rows(),
                y.len()
            )));
        }
        let (train, test) = train_test_split(y.len(), test_size, seed)?;
        Ok(Self {
            x_train: x.select_rows(&train),
            x_test: x.select_rows(&test),
            y_train: train.iter().map(|&i| y[i]).collect(),
            y_test: test.iter().map(|&i| y[i]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_test_split_sizes_and_determinism() {
        let (train, test) = train_test_split(10, 0.25, 42).unwrap();
        assert_eq!(test.len(), 3, "ceil(0.25 * 10) rows go to test");
        assert_eq!(train.len(), 7);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(train_test_split(10, 0.25, 42).unwrap(), (train, test));
    }

    #[test]
    fn test_train_test_split_rejects_bad_sizes() {
        assert!(train_test_split(10, 0.0, 1).is_err());
        assert!(train_test_split(10, 1.5, 1).is_err());
        assert!(train_test_split(1, 0.5, 1).is_err());
    }

    #[test]
    fn test_one_hot_drops_first_level_and_merges_rare() {
        let col = Column::new(
            "Cover".into(),
            [Some("b"), Some("a"), Some("b"), Some("c"), None, Some("a")],
        );
        let dummies = one_hot(&col, 2).unwrap();
        let names: Vec<&str> = dummies.iter().map(|c| c.name().as_str()).collect();
        // "c" is rare -> OTHER; levels OTHER, a, b -> "OTHER" dropped
        assert_eq!(names, vec!["Cover_a", "Cover_b"]);

        let b: Vec<Option<i32>> = dummies[1].i32().unwrap().into_iter().collect();
        assert_eq!(b, vec![Some(1), Some(0), Some(1), Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn test_feature_matrix_from_frame() {
        let df = df! {
            "a" => [1.0f64, 2.0, 3.0],
            "b" => [4i32, 5, 6],
            "TotalClaims" => [0.0f64, 1.0, 0.0],
        }
        .unwrap();
        let x = FeatureMatrix::from_frame(&df, &["TotalClaims"]).unwrap();
        assert_eq!(x.n_rows(), 3);
        assert_eq!(x.names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(x.row(1), &[2.0, 5.0]);
        assert_eq!(x.column(1), vec![4.0, 5.0, 6.0]);
        assert_eq!(x.select_rows(&[2, 0]).row(0), &[3.0, 6.0]);
    }

    #[test]
    fn test_feature_matrix_rejects_strings() {
        let df = df! { "s" => ["x", "y"] }.unwrap();
        assert!(FeatureMatrix::from_frame(&df, &[]).is_err());
    }
}
