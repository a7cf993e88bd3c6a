//! Column access helpers shared by the analysis steps
//!
//! The steps work on plain vectors extracted from the frame; these helpers
//! do the casting and null handling in one place.

use polars::prelude::*;

use super::error::{AnalysisError, AnalysisResult};

pub const TOTAL_PREMIUM: &str = "TotalPremium";
pub const TOTAL_CLAIMS: &str = "TotalClaims";
pub const LOSS_RATIO: &str = "LossRatio";
pub const HAS_CLAIM: &str = "has_claim";
pub const MARGIN: &str = "margin";
pub const GENDER: &str = "Gender";
pub const PROVINCE: &str = "Province";
pub const POSTAL_CODE: &str = "PostalCode";
pub const TRANSACTION_MONTH: &str = "TransactionMonth";
pub const CUSTOM_VALUE_ESTIMATE: &str = "CustomValueEstimate";
pub const SUM_INSURED: &str = "SumInsured";
pub const MAIN_CRESTA_ZONE: &str = "MainCrestaZone";
pub const VEHICLE_TYPE: &str = "VehicleType";
pub const MAKE: &str = "make";
pub const MODEL: &str = "Model";

/// Get a column or fail with [`AnalysisError::MissingColumn`].
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> AnalysisResult<&'a Column> {
    df.column(name)
        .map_err(|_| AnalysisError::missing_column(name))
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// True for string-like columns (treated as categorical features).
pub fn is_categorical(col: &Column) -> bool {
    matches!(col.dtype(), DataType::String | DataType::Categorical(_, _))
}

pub fn is_numeric(col: &Column) -> bool {
    col.dtype().is_primitive_numeric()
}

/// Extract a column as `f64` values. Nulls and NaN both become `None`.
pub fn f64_values(df: &DataFrame, name: &str) -> AnalysisResult<Vec<Option<f64>>> {
    let col = require_column(df, name)?;
    column_f64_values(col)
}

pub fn column_f64_values(col: &Column) -> AnalysisResult<Vec<Option<f64>>> {
    let cast = col.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Extract a column as strings (numeric keys such as postal codes are formatted).
pub fn string_values(df: &DataFrame, name: &str) -> AnalysisResult<Vec<Option<String>>> {
    let col = require_column(df, name)?;
    column_string_values(col)
}

pub fn column_string_values(col: &Column) -> AnalysisResult<Vec<Option<String>>> {
    let cast = col.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Keep only the rows where `mask` is true.
pub fn filter_rows(df: &DataFrame, mask: &[bool]) -> AnalysisResult<DataFrame> {
    if mask.len() != df.height() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "row mask has {} entries for {} rows",
            mask.len(),
            df.height()
        )));
    }
    let mask = BooleanChunked::from_slice("mask".into(), mask);
    Ok(df.filter(&mask)?)
}

/// Return a copy of `df` with `name` added or replaced.
pub fn with_column<T, Phantom: ?Sized>(
    df: &DataFrame,
    name: &str,
    values: T,
) -> AnalysisResult<DataFrame>
where
    Series: NamedFrom<T, Phantom>,
{
    let mut out = df.clone();
    out.with_column(Column::new(name.into(), values))?;
    Ok(out)
}

/// Add the `has_claim` and `margin` targets derived from premium and claims.
pub fn add_claim_targets(df: &DataFrame) -> AnalysisResult<DataFrame> {
    let premium = f64_values(df, TOTAL_PREMIUM)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;

    let has_claim: Vec<i32> = claims
        .iter()
        .map(|c| i32::from(c.is_some_and(|v| v > 0.0)))
        .collect();
    let margin: Vec<Option<f64>> = premium
        .iter()
        .zip(claims.iter())
        .map(|(p, c)| match (p, c) {
            (Some(p), Some(c)) => Some(p - c),
            _ => None,
        })
        .collect();

    let out = with_column(df, HAS_CLAIM, has_claim)?;
    with_column(&out, MARGIN, margin)
}

/// Rows with a strictly positive premium and non-negative claims.
pub fn positive_premium_mask(df: &DataFrame) -> AnalysisResult<Vec<bool>> {
    let premium = f64_values(df, TOTAL_PREMIUM)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;
    Ok(premium
        .iter()
        .zip(claims.iter())
        .map(|(p, c)| p.is_some_and(|p| p > 0.0) && c.is_some_and(|c| c >= 0.0))
        .collect())
}
