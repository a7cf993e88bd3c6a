//! Descriptive statistics and loss-ratio metrics

use std::cmp::Ordering;
use std::collections::BTreeMap;

use polars::prelude::*;
use serde::Serialize;

use super::columns::{
    column_f64_values, f64_values, is_numeric, string_values, with_column, LOSS_RATIO, MAKE,
    MODEL, TOTAL_CLAIMS, TOTAL_PREMIUM,
};
use super::error::{AnalysisError, AnalysisResult};
use super::stats::{mean, quantile_sorted, sample_variance, sorted_finite};

/// Name, type and non-null count of one column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub non_null: usize,
}

/// Descriptive statistics of one numeric column
#[derive(Debug, Clone, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

/// Dataset info plus descriptive statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub memory_mb: f64,
    pub column_info: Vec<ColumnInfo>,
    pub describe: Vec<NumericSummary>,
}

/// Loss ratio aggregated over one group value
#[derive(Debug, Clone, Serialize)]
pub struct GroupLossRatio {
    pub group: String,
    pub total_claims: f64,
    pub total_premium: f64,
    pub loss_ratio: f64,
}

/// Total claims of one vehicle make/model
#[derive(Debug, Clone, Serialize)]
pub struct MakeModelClaims {
    pub make: String,
    pub model: String,
    pub total_claims: f64,
}

/// Portfolio-level profitability figures
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioMetrics {
    pub policies: usize,
    pub total_premium: f64,
    pub total_claims: f64,
    pub loss_ratio: f64,
    pub claim_frequency: f64,
    pub claim_severity: Option<f64>,
}

/// Describe one numeric column
pub fn describe_values(column: &str, values: &[Option<f64>]) -> NumericSummary {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let sorted = sorted_finite(present.iter().copied());

    NumericSummary {
        column: column.to_string(),
        count: present.len(),
        mean: mean(&present),
        std: sample_variance(&present).map(f64::sqrt),
        min: sorted.first().copied(),
        q25: quantile_sorted(&sorted, 0.25),
        median: quantile_sorted(&sorted, 0.5),
        q75: quantile_sorted(&sorted, 0.75),
        max: sorted.last().copied(),
    }
}

/// Info and descriptive stats of the dataset
pub fn summarize_data(df: &DataFrame) -> AnalysisResult<DatasetSummary> {
    let (rows, columns) = df.shape();

    let column_info = df
        .get_columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_string(),
            dtype: col.dtype().to_string(),
            non_null: col.len() - col.null_count(),
        })
        .collect();

    let mut describe = Vec::new();
    for col in df.get_columns().iter().filter(|c| is_numeric(c)) {
        let values = column_f64_values(col)?;
        describe.push(describe_values(col.name().as_str(), &values));
    }

    Ok(DatasetSummary {
        rows,
        columns,
        memory_mb: df.estimated_size() as f64 / (1024.0 * 1024.0),
        column_info,
        describe,
    })
}

/// Add a raw `LossRatio = TotalClaims / TotalPremium` column.
///
/// Unlike cleaning, no guard is applied: a zero premium yields inf or NaN.
pub fn calculate_loss_ratio(df: &DataFrame) -> AnalysisResult<DataFrame> {
    let premium = f64_values(df, TOTAL_PREMIUM)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;
    let ratio: Vec<Option<f64>> = premium
        .iter()
        .zip(claims.iter())
        .map(|(p, c)| match (p, c) {
            (Some(p), Some(c)) => Some(c / p),
            _ => None,
        })
        .collect();
    with_column(df, LOSS_RATIO, ratio)
}

/// Portfolio totals, loss ratio, claim frequency and claim severity
pub fn overall_loss_ratio(df: &DataFrame) -> AnalysisResult<PortfolioMetrics> {
    let premium = f64_values(df, TOTAL_PREMIUM)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;
    if df.height() == 0 {
        return Err(AnalysisError::EmptyData {
            step: "portfolio metrics",
        });
    }

    let total_premium: f64 = premium.iter().flatten().sum();
    let total_claims: f64 = claims.iter().flatten().sum();
    let positive: Vec<f64> = claims.iter().flatten().copied().filter(|c| *c > 0.0).collect();

    Ok(PortfolioMetrics {
        policies: df.height(),
        total_premium,
        total_claims,
        loss_ratio: total_claims / total_premium,
        claim_frequency: positive.len() as f64 / df.height() as f64,
        claim_severity: mean(&positive),
    })
}

/// Descending order with NaN last
fn cmp_desc_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Loss ratio per value of `group_col` (ratio of sums), highest first.
///
/// Rows with a missing group value are excluded.
pub fn loss_ratio_by_group(df: &DataFrame, group_col: &str) -> AnalysisResult<Vec<GroupLossRatio>> {
    let groups = string_values(df, group_col)?;
    let premium = f64_values(df, TOTAL_PREMIUM)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;

    let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for ((g, p), c) in groups.into_iter().zip(premium).zip(claims) {
        if let Some(g) = g {
            let entry = sums.entry(g).or_insert((0.0, 0.0));
            entry.0 += c.unwrap_or(0.0);
            entry.1 += p.unwrap_or(0.0);
        }
    }

    let mut out: Vec<GroupLossRatio> = sums
        .into_iter()
        .map(|(group, (total_claims, total_premium))| GroupLossRatio {
            group,
            total_claims,
            total_premium,
            loss_ratio: total_claims / total_premium,
        })
        .collect();

    out.sort_by(|a, b| cmp_desc_nan_last(a.loss_ratio, b.loss_ratio));
    Ok(out)
}

/// Top and bottom `top_n` vehicle make/model combinations by total claims.
///
/// Returns `(top, bottom)`: top sorted descending, bottom ascending.
pub fn claims_by_make_model(
    df: &DataFrame,
    top_n: usize,
) -> AnalysisResult<(Vec<MakeModelClaims>, Vec<MakeModelClaims>)> {
    let makes = string_values(df, MAKE)?;
    let models = string_values(df, MODEL)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;

    let mut sums: BTreeMap<(String, String), f64> = BTreeMap::new();
    for ((make, model), c) in makes.into_iter().zip(models).zip(claims) {
        if let (Some(make), Some(model)) = (make, model) {
            *sums.entry((make.trim().to_string(), model.trim().to_string())).or_insert(0.0) +=
                c.unwrap_or(0.0);
        }
    }

    let summary: Vec<MakeModelClaims> = sums
        .into_iter()
        .map(|((make, model), total_claims)| MakeModelClaims {
            make,
            model,
            total_claims,
        })
        .collect();

    let mut top = summary.clone();
    top.sort_by(|a, b| cmp_desc_nan_last(a.total_claims, b.total_claims));
    top.truncate(top_n);

    let mut bottom = summary;
    bottom.sort_by(|a, b| a.total_claims.total_cmp(&b.total_claims));
    bottom.truncate(top_n);

    Ok((top, bottom))
}
