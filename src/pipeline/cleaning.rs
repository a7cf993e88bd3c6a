//! Cleaning of raw insurance transaction records

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;

use super::columns::{
    f64_values, filter_rows, has_column, require_column, with_column, LOSS_RATIO, TOTAL_CLAIMS,
    TOTAL_PREMIUM, TRANSACTION_MONTH,
};
use super::error::AnalysisResult;
use super::missing::{analyze_missing_values, check_missing_values, get_features_above_threshold};

/// Columns with a larger missing fraction than this are dropped during cleaning
pub const DEFAULT_MISSING_THRESHOLD: f64 = 0.90;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// What the cleaning step changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    /// Columns dropped for exceeding the missing threshold
    pub dropped_columns: Vec<String>,
    /// Non-null `TransactionMonth` values that could not be parsed
    pub unparseable_dates: usize,
    /// Rows removed for a negative or missing premium/claims amount
    pub removed_negative_rows: usize,
    /// Missing counts per column after cleaning
    pub remaining_missing: Vec<(String, usize)>,
}

/// Parse a single date string; unknown formats yield `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    // Year-month only
    NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").ok()
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

fn epoch_days(date: NaiveDate) -> i32 {
    use chrono::Datelike;
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Read a column as dates, whatever its storage type (date, datetime or text).
pub fn date_values(df: &DataFrame, name: &str) -> AnalysisResult<Vec<Option<NaiveDate>>> {
    let col = require_column(df, name)?;
    match col.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            let days = col.cast(&DataType::Date)?.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(date_from_epoch_days))
                .collect())
        }
        _ => {
            let text = col.cast(&DataType::String)?;
            Ok(text
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_date))
                .collect())
        }
    }
}

/// Replace `name` with a proper date column, coercing bad values to null.
///
/// Returns the new frame and the number of non-null values that failed to parse.
pub fn convert_to_date(df: &DataFrame, name: &str) -> AnalysisResult<(DataFrame, usize)> {
    let col = require_column(df, name)?;
    let before_nulls = col.null_count();
    let dates = date_values(df, name)?;
    let after_nulls = dates.iter().filter(|d| d.is_none()).count();

    let days: Vec<Option<i32>> = dates.into_iter().map(|d| d.map(epoch_days)).collect();
    let date_col = Column::new(name.into(), days).cast(&DataType::Date)?;

    let mut out = df.clone();
    out.with_column(date_col)?;
    Ok((out, after_nulls.saturating_sub(before_nulls)))
}

/// Clean the insurance dataset:
///
/// 1. convert `TransactionMonth` to a date (bad values become null)
/// 2. drop columns with more than `missing_threshold` missing values
/// 3. remove rows with a negative (or missing) premium or claims amount
/// 4. recompute `LossRatio`, using 0 where the premium is not positive
/// 5. report the remaining missingness
pub fn clean_insurance_data(
    df: &DataFrame,
    missing_threshold: f64,
    verbose: bool,
) -> AnalysisResult<(DataFrame, CleaningReport)> {
    let mut report = CleaningReport {
        rows_before: df.height(),
        ..Default::default()
    };

    // 1. Dates
    let mut cleaned = if has_column(df, TRANSACTION_MONTH) {
        let (converted, bad) = convert_to_date(df, TRANSACTION_MONTH)?;
        report.unparseable_dates = bad;
        converted
    } else {
        df.clone()
    };

    // 2. Sparse columns
    let ratios = analyze_missing_values(&cleaned)?;
    let drop_cols =
        get_features_above_threshold(&ratios, missing_threshold, &[TOTAL_PREMIUM, TOTAL_CLAIMS]);
    if !drop_cols.is_empty() {
        cleaned = cleaned.drop_many(&drop_cols);
    }
    report.dropped_columns = drop_cols;

    // 3. Negative amounts
    let premium = f64_values(&cleaned, TOTAL_PREMIUM)?;
    let claims = f64_values(&cleaned, TOTAL_CLAIMS)?;
    let keep: Vec<bool> = premium
        .iter()
        .zip(claims.iter())
        .map(|(p, c)| p.is_some_and(|p| p >= 0.0) && c.is_some_and(|c| c >= 0.0))
        .collect();
    report.removed_negative_rows = keep.iter().filter(|k| !**k).count();
    cleaned = filter_rows(&cleaned, &keep)?;

    // 4. Loss ratio, safe against zero premium
    let premium = f64_values(&cleaned, TOTAL_PREMIUM)?;
    let claims = f64_values(&cleaned, TOTAL_CLAIMS)?;
    let loss_ratio: Vec<f64> = premium
        .iter()
        .zip(claims.iter())
        .map(|(p, c)| match (p, c) {
            (Some(p), Some(c)) if *p > 0.0 => c / p,
            _ => 0.0,
        })
        .collect();
    cleaned = with_column(&cleaned, LOSS_RATIO, loss_ratio)?;

    // 5. Missingness report
    report.rows_after = cleaned.height();
    report.remaining_missing = check_missing_values(&cleaned);

    if verbose {
        log::info!(
            "columns dropped due to missingness > {:.0}%: {:?}",
            missing_threshold * 100.0,
            report.dropped_columns
        );
        log::info!("remaining missing value counts: {:?}", report.remaining_missing);
    }

    Ok((cleaned, report))
}
