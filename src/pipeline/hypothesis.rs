//! Segment hypothesis testing
//!
//! Compares claim frequency (chi-squared), claim severity and margin (Welch t)
//! between pairs of segments, then controls the false discovery rate over all
//! tests that could be run with Benjamini-Hochberg.

use std::collections::{BTreeMap, HashSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::columns::{
    add_claim_targets, f64_values, filter_rows, has_column, is_categorical, positive_premium_mask,
    require_column, string_values, with_column, GENDER, HAS_CLAIM, MAIN_CRESTA_ZONE, MARGIN,
    PROVINCE, TOTAL_CLAIMS,
};
use super::error::{AnalysisError, AnalysisResult};
use super::stats::{benjamini_hochberg, chi2_contingency, mean, welch_t_test, ContingencyTable};

/// Minimum expected cell count for a chi-squared test to be run
pub const MIN_CELL_COUNT: f64 = 5.0;

/// Minimum sample size per group for a t-test
pub const MIN_GROUP_SIZE: usize = 2;

/// Column holding the High/Low tier assignment during risk-tier comparisons
pub const RISK_TIER: &str = "RiskTier";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestKind {
    #[serde(rename = "Chi-Squared")]
    ChiSquared,
    #[serde(rename = "T-Test")]
    TTest,
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestKind::ChiSquared => write!(f, "Chi-Squared"),
            TestKind::TTest => write!(f, "T-Test"),
        }
    }
}

/// Quantity being compared between the two segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ClaimFrequency,
    ClaimSeverity,
    Margin,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::ClaimFrequency => write!(f, "claim_frequency"),
            Metric::ClaimSeverity => write!(f, "claim_severity"),
            Metric::Margin => write!(f, "margin"),
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claim_frequency" => Ok(Metric::ClaimFrequency),
            "claim_severity" => Ok(Metric::ClaimSeverity),
            "margin" => Ok(Metric::Margin),
            _ => Err(format!(
                "Unknown metric: '{}'. Use 'claim_frequency', 'claim_severity' or 'margin'.",
                s
            )),
        }
    }
}

/// Outcome of one two-segment test
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub test: TestKind,
    pub metric: Metric,
    /// Column the segments come from
    pub segment: String,
    pub group_a: String,
    pub group_b: String,
    pub n_a: usize,
    pub n_b: usize,
    pub statistic: f64,
    pub dof: f64,
    pub p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value_adjusted: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_null: Option<bool>,
}

/// Balance check of one control column between two segments
#[derive(Debug, Clone, Serialize)]
pub struct EquivalenceResult {
    pub column: String,
    pub test: TestKind,
    pub p_value: f64,
}

/// Claim frequency, severity and margin of one segment
#[derive(Debug, Clone, Serialize)]
pub struct SegmentMetrics {
    pub group: String,
    pub policies: usize,
    pub claim_frequency: f64,
    pub claim_severity: Option<f64>,
    pub margin: Option<f64>,
}

/// Two segment values to compare
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPair {
    pub a: String,
    pub b: String,
}

impl GroupPair {
    pub fn new(a: &str, b: &str) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
        }
    }
}

/// Which comparisons `run_all_hypothesis_tests` performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HypothesisPlan {
    pub province_pair: GroupPair,
    pub gender_pair: GroupPair,
    /// Columns whose highest- and lowest-frequency segments are compared
    pub tier_columns: Vec<String>,
    /// Segments per tier
    pub tier_size: usize,
    /// Significance level applied to the adjusted p-values
    pub alpha: f64,
}

impl Default for HypothesisPlan {
    fn default() -> Self {
        Self {
            province_pair: GroupPair::new("Gauteng", "KwaZulu-Natal"),
            gender_pair: GroupPair::new("Female", "Male"),
            tier_columns: vec![MAIN_CRESTA_ZONE.to_string()],
            tier_size: 3,
            alpha: 0.05,
        }
    }
}

/// High and Low tier membership for a tiered column
#[derive(Debug, Clone, Serialize)]
pub struct RiskTiers {
    pub column: String,
    pub high: Vec<String>,
    pub low: Vec<String>,
}

/// All test results of a run, with adjusted p-values
#[derive(Debug, Clone, Serialize)]
pub struct HypothesisReport {
    pub rows_tested: usize,
    pub alpha: f64,
    pub tiers: Vec<RiskTiers>,
    pub results: Vec<TestResult>,
}

impl HypothesisReport {
    pub fn rejected(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.reject_null == Some(true))
    }
}

/// Filter and prepare the dataset for hypothesis testing.
///
/// Keeps rows with a positive premium and non-negative claims, adds
/// `has_claim` and `margin`, and keeps only Male/Female policyholders.
pub fn prepare_hypothesis_data(df: &DataFrame) -> AnalysisResult<DataFrame> {
    let amounts_ok = positive_premium_mask(df)?;
    let genders = string_values(df, GENDER)?;

    let keep: Vec<bool> = amounts_ok
        .iter()
        .zip(genders.iter())
        .map(|(ok, g)| *ok && matches!(g.as_deref(), Some("Male") | Some("Female")))
        .collect();

    let filtered = filter_rows(df, &keep)?;
    let prepared = add_claim_targets(&filtered)?;
    log::info!("filtered data: {:?}", prepared.shape());
    Ok(prepared)
}

/// Claim frequency, claim severity and mean margin by `group_col`.
///
/// Groups are returned in key order; missing group values are excluded.
pub fn calculate_metrics(df: &DataFrame, group_col: &str) -> AnalysisResult<Vec<SegmentMetrics>> {
    let groups = string_values(df, group_col)?;
    let has_claim = f64_values(df, HAS_CLAIM)?;
    let claims = f64_values(df, TOTAL_CLAIMS)?;
    let margin = f64_values(df, MARGIN)?;

    #[derive(Default)]
    struct Acc {
        policies: usize,
        claim_flags: Vec<f64>,
        positive_claims: Vec<f64>,
        margins: Vec<f64>,
    }

    let mut acc: BTreeMap<String, Acc> = BTreeMap::new();
    for (i, g) in groups.into_iter().enumerate() {
        let Some(g) = g else { continue };
        let entry = acc.entry(g).or_default();
        entry.policies += 1;
        if let Some(h) = has_claim[i] {
            entry.claim_flags.push(h);
        }
        if let Some(c) = claims[i].filter(|c| *c > 0.0) {
            entry.positive_claims.push(c);
        }
        if let Some(m) = margin[i] {
            entry.margins.push(m);
        }
    }

    Ok(acc
        .into_iter()
        .map(|(group, a)| SegmentMetrics {
            group,
            policies: a.policies,
            claim_frequency: mean(&a.claim_flags).unwrap_or(f64::NAN),
            claim_severity: mean(&a.positive_claims),
            margin: mean(&a.margins),
        })
        .collect())
}

/// Row indices belonging to `a` and `b`
fn split_groups(df: &DataFrame, group_col: &str, a: &str, b: &str) -> AnalysisResult<(Vec<usize>, Vec<usize>)> {
    let groups = string_values(df, group_col)?;
    let mut rows_a = Vec::new();
    let mut rows_b = Vec::new();
    for (i, g) in groups.iter().enumerate() {
        match g.as_deref() {
            Some(g) if g == a => rows_a.push(i),
            Some(g) if g == b => rows_b.push(i),
            _ => {}
        }
    }
    Ok((rows_a, rows_b))
}

/// Chi-squared test of claim frequency between segments `a` and `b`.
///
/// Returns `None` when the group × has_claim crosstab has fewer than two
/// outcome columns or any cell below 5. A crosstab with one group present
/// has no degrees of freedom and yields p = 1.
pub fn chi_squared_test(
    df: &DataFrame,
    group_col: &str,
    a: &str,
    b: &str,
) -> AnalysisResult<Option<TestResult>> {
    let (rows_a, rows_b) = split_groups(df, group_col, a, b)?;
    let has_claim = f64_values(df, HAS_CLAIM)?;

    let pairs = rows_a
        .iter()
        .map(|&i| (a, i))
        .chain(rows_b.iter().map(|&i| (b, i)))
        .filter_map(|(g, i)| has_claim[i].map(|h| (g.to_string(), format!("{}", h as i64))));
    let table = ContingencyTable::from_pairs(pairs);

    let (n_groups, n_outcomes) = table.shape();
    if n_outcomes < 2 || table.min_cell() < MIN_CELL_COUNT {
        log::debug!(
            "skipping chi-squared on {} ({} vs {}): table {}x{}, min cell {}",
            group_col,
            a,
            b,
            n_groups,
            n_outcomes,
            table.min_cell()
        );
        return Ok(None);
    }

    Ok(chi2_contingency(&table).map(|chi| TestResult {
        test: TestKind::ChiSquared,
        metric: Metric::ClaimFrequency,
        segment: group_col.to_string(),
        group_a: a.to_string(),
        group_b: b.to_string(),
        n_a: rows_a.len(),
        n_b: rows_b.len(),
        statistic: chi.statistic,
        dof: chi.dof as f64,
        p_value: chi.p_value,
        p_value_adjusted: None,
        reject_null: None,
    }))
}

/// Welch t-test of claim severity or margin between segments `a` and `b`.
///
/// Severity uses only policies with a positive claim. Returns `None` when
/// either side has fewer than two values or both sides are constant.
pub fn t_test(
    df: &DataFrame,
    group_col: &str,
    a: &str,
    b: &str,
    metric: Metric,
) -> AnalysisResult<Option<TestResult>> {
    let (rows_a, rows_b) = split_groups(df, group_col, a, b)?;

    let values: Vec<Option<f64>> = match metric {
        Metric::ClaimSeverity => f64_values(df, TOTAL_CLAIMS)?
            .into_iter()
            .map(|c| c.filter(|c| *c > 0.0))
            .collect(),
        Metric::Margin => f64_values(df, MARGIN)?,
        Metric::ClaimFrequency => {
            return Err(AnalysisError::invalid(
                "metric",
                "claim_frequency is tested with chi_squared_test",
            ))
        }
    };

    let a_vals: Vec<f64> = rows_a.iter().filter_map(|&i| values[i]).collect();
    let b_vals: Vec<f64> = rows_b.iter().filter_map(|&i| values[i]).collect();

    if a_vals.len() < MIN_GROUP_SIZE || b_vals.len() < MIN_GROUP_SIZE {
        log::debug!(
            "skipping t-test of {} on {} ({} vs {}): {} and {} values",
            metric,
            group_col,
            a,
            b,
            a_vals.len(),
            b_vals.len()
        );
        return Ok(None);
    }

    Ok(welch_t_test(&a_vals, &b_vals).map(|t| TestResult {
        test: TestKind::TTest,
        metric,
        segment: group_col.to_string(),
        group_a: a.to_string(),
        group_b: b.to_string(),
        n_a: a_vals.len(),
        n_b: b_vals.len(),
        statistic: t.statistic,
        dof: t.dof,
        p_value: t.p_value,
        p_value_adjusted: None,
        reject_null: None,
    }))
}

/// Check whether segments `a` and `b` are statistically similar on control columns.
///
/// Categorical columns use a chi-squared test (only when every cell has at
/// least 5 observations), numeric columns a Welch t-test. Columns that do not
/// meet the sample requirements are left out.
pub fn check_group_equivalence(
    df: &DataFrame,
    group_col: &str,
    a: &str,
    b: &str,
    check_cols: &[&str],
) -> AnalysisResult<Vec<EquivalenceResult>> {
    let (rows_a, rows_b) = split_groups(df, group_col, a, b)?;
    let mut results = Vec::new();

    for &col_name in check_cols {
        let col = require_column(df, col_name)?;

        if is_categorical(col) {
            let values = string_values(df, col_name)?;
            let pairs = rows_a
                .iter()
                .map(|&i| (a, i))
                .chain(rows_b.iter().map(|&i| (b, i)))
                .filter_map(|(g, i)| values[i].clone().map(|v| (g.to_string(), v)));
            let table = ContingencyTable::from_pairs(pairs);
            if table.min_cell() >= MIN_CELL_COUNT {
                if let Some(chi) = chi2_contingency(&table) {
                    results.push(EquivalenceResult {
                        column: col_name.to_string(),
                        test: TestKind::ChiSquared,
                        p_value: chi.p_value,
                    });
                }
            }
        } else {
            let values = f64_values(df, col_name)?;
            let a_vals: Vec<f64> = rows_a.iter().filter_map(|&i| values[i]).collect();
            let b_vals: Vec<f64> = rows_b.iter().filter_map(|&i| values[i]).collect();
            if a_vals.len() >= MIN_GROUP_SIZE && b_vals.len() >= MIN_GROUP_SIZE {
                if let Some(t) = welch_t_test(&a_vals, &b_vals) {
                    results.push(EquivalenceResult {
                        column: col_name.to_string(),
                        test: TestKind::TTest,
                        p_value: t.p_value,
                    });
                }
            }
        }
    }

    Ok(results)
}

/// Label the `tier_size` segments of `column` with the highest claim frequency
/// `High` and the lowest `Low`; other rows are dropped.
///
/// A segment in both tiers (few segments) is labelled `High`.
pub fn assign_risk_tiers(
    df: &DataFrame,
    column: &str,
    tier_size: usize,
) -> AnalysisResult<(DataFrame, RiskTiers)> {
    let metrics = calculate_metrics(df, column)?;

    // Stable sorts over key-ordered groups keep ties in key order
    let mut by_freq: Vec<&SegmentMetrics> = metrics.iter().collect();
    by_freq.sort_by(|x, y| y.claim_frequency.total_cmp(&x.claim_frequency));
    let high: Vec<String> = by_freq.iter().take(tier_size).map(|m| m.group.clone()).collect();
    by_freq.sort_by(|x, y| x.claim_frequency.total_cmp(&y.claim_frequency));
    let low: Vec<String> = by_freq.iter().take(tier_size).map(|m| m.group.clone()).collect();

    let high_set: HashSet<&str> = high.iter().map(String::as_str).collect();
    let low_set: HashSet<&str> = low.iter().map(String::as_str).collect();

    let tier: Vec<Option<&str>> = string_values(df, column)?
        .iter()
        .map(|g| match g.as_deref() {
            Some(g) if high_set.contains(g) => Some("High"),
            Some(g) if low_set.contains(g) => Some("Low"),
            _ => None,
        })
        .collect();
    let keep: Vec<bool> = tier.iter().map(Option::is_some).collect();

    let tiered = with_column(df, RISK_TIER, tier)?;
    let tiered = filter_rows(&tiered, &keep)?;

    Ok((
        tiered,
        RiskTiers {
            column: column.to_string(),
            high,
            low,
        },
    ))
}

/// Run the full comparison plan and adjust p-values for multiple testing.
///
/// Expects a frame from [`prepare_hypothesis_data`]. Comparisons whose
/// column is absent are skipped; tests without enough data are dropped
/// before the Benjamini-Hochberg adjustment.
pub fn run_all_hypothesis_tests(
    df: &DataFrame,
    plan: &HypothesisPlan,
) -> AnalysisResult<HypothesisReport> {
    if !(0.0..1.0).contains(&plan.alpha) || plan.alpha == 0.0 {
        return Err(AnalysisError::invalid("alpha", format!("must be in (0, 1), got {}", plan.alpha)));
    }

    log::info!("running hypothesis tests on {} rows", df.height());
    let mut results: Vec<Option<TestResult>> = Vec::new();
    let mut tiers = Vec::new();

    // Province
    if has_column(df, PROVINCE) {
        let GroupPair { a, b } = &plan.province_pair;
        results.push(chi_squared_test(df, PROVINCE, a, b)?);
        results.push(t_test(df, PROVINCE, a, b, Metric::ClaimSeverity)?);
    } else {
        log::warn!("column '{}' not present, skipping province tests", PROVINCE);
    }

    // High vs Low risk tiers
    for column in &plan.tier_columns {
        if !has_column(df, column) {
            log::warn!("column '{}' not present, skipping risk-tier tests", column);
            continue;
        }
        let (tiered, tier) = assign_risk_tiers(df, column, plan.tier_size)?;
        for result in [
            chi_squared_test(&tiered, RISK_TIER, "High", "Low")?,
            t_test(&tiered, RISK_TIER, "High", "Low", Metric::ClaimSeverity)?,
            t_test(&tiered, RISK_TIER, "High", "Low", Metric::Margin)?,
        ] {
            results.push(result.map(|mut r| {
                r.segment = column.clone();
                r
            }));
        }
        tiers.push(tier);
    }

    // Gender
    if has_column(df, GENDER) {
        let present: HashSet<String> = string_values(df, GENDER)?.into_iter().flatten().collect();
        let GroupPair { a, b } = &plan.gender_pair;
        if present.contains(a) && present.contains(b) {
            results.push(chi_squared_test(df, GENDER, a, b)?);
            results.push(t_test(df, GENDER, a, b, Metric::ClaimSeverity)?);
        }
    }

    // Filter valid results and adjust p-values
    let mut results: Vec<TestResult> = results.into_iter().flatten().collect();
    let p_values: Vec<f64> = results.iter().map(|r| r.p_value).collect();
    let adjusted = benjamini_hochberg(&p_values);
    for (r, p) in results.iter_mut().zip(adjusted) {
        r.p_value_adjusted = Some(p);
        r.reject_null = Some(p < plan.alpha);
    }

    Ok(HypothesisReport {
        rows_tested: df.height(),
        alpha: plan.alpha,
        tiers,
        results,
    })
}
