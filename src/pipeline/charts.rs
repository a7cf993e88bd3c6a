//! Data behind the exploratory charts
//!
//! Each chart is reduced to the numbers needed to draw it; rendering to the
//! terminal lives in `report::charts` and the same data is exported as JSON.

use std::collections::BTreeMap;

use chrono::Datelike;
use polars::prelude::*;
use serde::Serialize;

use super::cleaning::date_values;
use super::columns::{
    f64_values, has_column, string_values, CUSTOM_VALUE_ESTIMATE, POSTAL_CODE, PROVINCE,
    SUM_INSURED, TOTAL_CLAIMS, TOTAL_PREMIUM, TRANSACTION_MONTH,
};
use super::correlation::{correlation_matrix, CorrelationMatrix};
use super::error::AnalysisResult;
use super::metrics::{loss_ratio_by_group, GroupLossRatio};
use super::stats::{quantile_sorted, sorted_finite};

pub const HISTOGRAM_BINS: usize = 50;

/// Columns in the correlation heatmap
pub const CORRELATION_COLUMNS: &[&str] = &[TOTAL_CLAIMS, TOTAL_PREMIUM, CUSTOM_VALUE_ESTIMATE, SUM_INSURED];

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    pub column: String,
    pub bins: Vec<HistogramBin>,
}

/// Box-plot statistics with 1.5 IQR whiskers
#[derive(Debug, Clone, Serialize)]
pub struct BoxStats {
    pub column: String,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outlier_count: usize,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub total_claims: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostalCodeTotals {
    pub postal_code: String,
    pub total_premium: f64,
    pub total_claims: f64,
}

/// Everything the chart step draws; charts whose columns are absent are empty
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartData {
    pub claim_distribution: Option<Histogram>,
    pub premium_distribution: Option<Histogram>,
    pub custom_value_outliers: Option<BoxStats>,
    /// Ascending by loss ratio
    pub loss_ratio_by_province: Vec<GroupLossRatio>,
    pub claims_by_month: Vec<MonthlyTotal>,
    pub correlation: Option<CorrelationMatrix>,
    pub claims_vs_premium_by_postal_code: Vec<PostalCodeTotals>,
}

/// Equal-width histogram over the finite values; the last bin is closed.
pub fn histogram(column: &str, values: &[Option<f64>], bins: usize) -> Option<Histogram> {
    let sorted = sorted_finite(values.iter().flatten().copied());
    let (&lo, &hi) = (sorted.first()?, sorted.last()?);
    let bins = bins.max(1);

    // A single distinct value gets a unit-wide range around it
    let (lo, hi) = if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) };
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in &sorted {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Some(Histogram {
        column: column.to_string(),
        bins: counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                start: lo + width * i as f64,
                end: lo + width * (i + 1) as f64,
                count,
            })
            .collect(),
    })
}

pub fn box_stats(column: &str, values: &[Option<f64>]) -> Option<BoxStats> {
    let sorted = sorted_finite(values.iter().flatten().copied());
    let q1 = quantile_sorted(&sorted, 0.25)?;
    let median = quantile_sorted(&sorted, 0.5)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let iqr = q3 - q1;
    let (low_fence, high_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

    let inside: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|v| *v >= low_fence && *v <= high_fence)
        .collect();

    Some(BoxStats {
        column: column.to_string(),
        q1,
        median,
        q3,
        lower_whisker: inside.first().copied().unwrap_or(q1),
        upper_whisker: inside.last().copied().unwrap_or(q3),
        outlier_count: sorted.len() - inside.len(),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
    })
}

/// Total claims per calendar month, in month order
pub fn claims_by_month(df: &DataFrame) -> AnalysisResult<Vec<MonthlyTotal>> {
    let dates = date_values(df, TRANSACTION_MONTH)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;

    let mut totals: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (d, c) in dates.into_iter().zip(claims) {
        if let Some(d) = d {
            *totals.entry((d.year(), d.month())).or_insert(0.0) += c.unwrap_or(0.0);
        }
    }

    Ok(totals
        .into_iter()
        .map(|((y, m), total_claims)| MonthlyTotal {
            month: format!("{:04}-{:02}", y, m),
            total_claims,
        })
        .collect())
}

/// Premium and claims summed per postal code
pub fn postal_code_totals(df: &DataFrame) -> AnalysisResult<Vec<PostalCodeTotals>> {
    let codes = string_values(df, POSTAL_CODE)?;
    let premium = f64_values(df, TOTAL_PREMIUM)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;

    let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for ((code, p), c) in codes.into_iter().zip(premium).zip(claims) {
        if let Some(code) = code {
            let entry = totals.entry(code).or_insert((0.0, 0.0));
            entry.0 += p.unwrap_or(0.0);
            entry.1 += c.unwrap_or(0.0);
        }
    }

    Ok(totals
        .into_iter()
        .map(|(postal_code, (total_premium, total_claims))| PostalCodeTotals {
            postal_code,
            total_premium,
            total_claims,
        })
        .collect())
}

/// Compute every chart the data supports
pub fn build_chart_data(df: &DataFrame) -> AnalysisResult<ChartData> {
    let mut charts = ChartData::default();

    if has_column(df, TOTAL_CLAIMS) {
        charts.claim_distribution = histogram(TOTAL_CLAIMS, &f64_values(df, TOTAL_CLAIMS)?, HISTOGRAM_BINS);
    }
    if has_column(df, TOTAL_PREMIUM) {
        charts.premium_distribution =
            histogram(TOTAL_PREMIUM, &f64_values(df, TOTAL_PREMIUM)?, HISTOGRAM_BINS);
    }
    if has_column(df, CUSTOM_VALUE_ESTIMATE) {
        charts.custom_value_outliers =
            box_stats(CUSTOM_VALUE_ESTIMATE, &f64_values(df, CUSTOM_VALUE_ESTIMATE)?);
    }

    let has_amounts = has_column(df, TOTAL_CLAIMS) && has_column(df, TOTAL_PREMIUM);
    if has_amounts && has_column(df, PROVINCE) {
        let mut by_province = loss_ratio_by_group(df, PROVINCE)?;
        by_province.sort_by(|a, b| a.loss_ratio.total_cmp(&b.loss_ratio));
        charts.loss_ratio_by_province = by_province;
    }
    if has_column(df, TOTAL_CLAIMS) && has_column(df, TRANSACTION_MONTH) {
        charts.claims_by_month = claims_by_month(df)?;
    }
    if CORRELATION_COLUMNS.iter().all(|c| has_column(df, c)) {
        charts.correlation = Some(correlation_matrix(df, CORRELATION_COLUMNS)?);
    }
    if has_amounts && has_column(df, POSTAL_CODE) {
        charts.claims_vs_premium_by_postal_code = postal_code_totals(df)?;
    }

    Ok(charts)
}
