//! Statistical primitives: descriptive statistics, contingency tables,
//! chi-squared and Welch t tests, and Benjamini-Hochberg adjustment.
//!
//! Distribution tail probabilities come from `statrs`; everything here is the
//! textbook definition of the statistic.

use std::collections::BTreeMap;

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator), `None` with fewer than two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (n - 1) as f64)
}

/// Quantile of already sorted data using linear interpolation between
/// closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Sort finite values ascending, dropping NaN.
pub fn sorted_finite(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Two-way frequency table of observed counts.
#[derive(Debug, Clone, Serialize)]
pub struct ContingencyTable {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// `counts[row][col]`
    pub counts: Vec<Vec<f64>>,
}

impl ContingencyTable {
    /// Cross-tabulate (row, column) label pairs. Labels are sorted, matching
    /// the layout of a pandas crosstab.
    pub fn from_pairs<I, R, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (R, C)>,
        R: Into<String>,
        C: Into<String>,
    {
        let mut cells: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        let mut columns: BTreeMap<String, ()> = BTreeMap::new();

        for (r, c) in pairs {
            let c = c.into();
            columns.insert(c.clone(), ());
            *cells.entry(r.into()).or_default().entry(c).or_insert(0.0) += 1.0;
        }

        let col_labels: Vec<String> = columns.into_keys().collect();
        let row_labels: Vec<String> = cells.keys().cloned().collect();
        let counts = cells
            .values()
            .map(|row| {
                col_labels
                    .iter()
                    .map(|c| row.get(c).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        Self {
            row_labels,
            col_labels,
            counts,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.row_labels.len(), self.col_labels.len())
    }

    /// Smallest observed cell count (0 for an empty table).
    pub fn min_cell(&self) -> f64 {
        self.counts
            .iter()
            .flatten()
            .copied()
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChiSquaredResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    pub expected: Vec<Vec<f64>>,
}

/// Chi-squared test of independence on a contingency table.
///
/// With one degree of freedom the Yates continuity correction is applied.
/// Returns `None` for tables with a zero expected frequency.
pub fn chi2_contingency(table: &ContingencyTable) -> Option<ChiSquaredResult> {
    let (rows, cols) = table.shape();
    if rows == 0 || cols == 0 {
        return None;
    }

    let total = table.total();
    if total <= 0.0 {
        return None;
    }

    let row_sums: Vec<f64> = table.counts.iter().map(|r| r.iter().sum()).collect();
    let col_sums: Vec<f64> = (0..cols)
        .map(|j| table.counts.iter().map(|r| r[j]).sum())
        .collect();

    let expected: Vec<Vec<f64>> = row_sums
        .iter()
        .map(|rs| col_sums.iter().map(|cs| rs * cs / total).collect())
        .collect();

    if expected.iter().flatten().any(|&e| e <= 0.0) {
        return None;
    }

    let dof = (rows - 1) * (cols - 1);
    if dof == 0 {
        return Some(ChiSquaredResult {
            statistic: 0.0,
            p_value: 1.0,
            dof,
            expected,
        });
    }

    let mut statistic = 0.0;
    for (obs_row, exp_row) in table.counts.iter().zip(expected.iter()) {
        for (&o, &e) in obs_row.iter().zip(exp_row.iter()) {
            let mut o = o;
            if dof == 1 {
                let diff = e - o;
                o += diff.signum() * diff.abs().min(0.5);
            }
            statistic += (o - e) * (o - e) / e;
        }
    }

    let dist = ChiSquared::new(dof as f64).ok()?;
    let p_value = dist.sf(statistic).clamp(0.0, 1.0);

    Some(ChiSquaredResult {
        statistic,
        p_value,
        dof,
        expected,
    })
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TTestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: f64,
}

/// Welch's unequal-variance two-sample t-test (two-sided).
///
/// Returns `None` when either sample has fewer than two values or both
/// samples are constant.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Option<TTestResult> {
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let va = sample_variance(a)?;
    let vb = sample_variance(b)?;
    let (ma, mb) = (mean(a)?, mean(b)?);

    let sa = va / na;
    let sb = vb / nb;
    let se2 = sa + sb;
    if se2 <= 0.0 {
        return None;
    }

    let statistic = (ma - mb) / se2.sqrt();
    let dof = se2 * se2 / (sa * sa / (na - 1.0) + sb * sb / (nb - 1.0));

    let dist = StudentsT::new(0.0, 1.0, dof).ok()?;
    let p_value = (2.0 * dist.sf(statistic.abs())).clamp(0.0, 1.0);

    Some(TTestResult {
        statistic,
        p_value,
        dof,
    })
}

/// Benjamini-Hochberg FDR adjusted p-values, in the input order.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| p_values[i].total_cmp(&p_values[j]));

    let mut adjusted = vec![0.0; n];
    let mut running_min = f64::INFINITY;
    for rank in (0..n).rev() {
        let idx = order[rank];
        let candidate = p_values[idx] * n as f64 / (rank + 1) as f64;
        running_min = running_min.min(candidate);
        adjusted[idx] = running_min.min(1.0);
    }

    adjusted
}

/// Pearson correlation over rows where both values are present.
///
/// Single-pass Welford update for numerical stability.
pub fn pearson_correlation(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }

    let mut n = 0.0;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut cov_xy = 0.0;

    for (a, b) in x.iter().zip(y.iter()) {
        if let (Some(a), Some(b)) = (a, b) {
            n += 1.0;
            let dx = a - mean_x;
            let dy = b - mean_y;
            mean_x += dx / n;
            mean_y += dy / n;
            var_x += dx * (a - mean_x);
            var_y += dy * (b - mean_y);
            cov_xy += dx * (b - mean_y);
        }
    }

    if n < 2.0 || var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some(cov_xy / (var_x.sqrt() * var_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_linear_interpolation() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&data, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&data, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&data, 1.0), Some(4.0));
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_sample_variance() {
        let v = sample_variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((v - 32.0 / 7.0).abs() < 1e-12);
        assert!(sample_variance(&[1.0]).is_none());
    }

    #[test]
    fn test_contingency_table_layout() {
        let table = ContingencyTable::from_pairs(vec![
            ("b", "1"),
            ("a", "0"),
            ("a", "1"),
            ("a", "0"),
        ]);
        assert_eq!(table.row_labels, vec!["a", "b"]);
        assert_eq!(table.col_labels, vec!["0", "1"]);
        assert_eq!(table.counts, vec![vec![2.0, 1.0], vec![0.0, 1.0]]);
        assert_eq!(table.min_cell(), 0.0);
    }

    #[test]
    fn test_chi2_with_yates_correction() {
        // [[10, 20], [20, 10]]: expected 15 everywhere, corrected |O-E| = 4.5
        let table = ContingencyTable {
            row_labels: vec!["a".into(), "b".into()],
            col_labels: vec!["0".into(), "1".into()],
            counts: vec![vec![10.0, 20.0], vec![20.0, 10.0]],
        };
        let result = chi2_contingency(&table).unwrap();
        assert_eq!(result.dof, 1);
        assert!((result.statistic - 4.0 * 4.5 * 4.5 / 15.0).abs() < 1e-9);
        assert!((result.p_value - 0.0201).abs() < 1e-3);
    }

    #[test]
    fn test_chi2_independent_table_has_high_p() {
        let table = ContingencyTable {
            row_labels: vec!["a".into(), "b".into(), "c".into()],
            col_labels: vec!["x".into(), "y".into()],
            counts: vec![vec![20.0, 20.0], vec![30.0, 30.0], vec![10.0, 10.0]],
        };
        let result = chi2_contingency(&table).unwrap();
        assert_eq!(result.dof, 2);
        assert!(result.statistic.abs() < 1e-12);
        assert!((result.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_welch_t_test_known_values() {
        let a = [27.5, 21.0, 19.0, 23.6, 17.0, 17.9, 16.9, 20.1, 21.9, 22.6, 23.1, 19.6, 19.0, 21.7, 21.4];
        let b = [27.1, 22.0, 20.8, 23.4, 23.4, 23.5, 25.8, 22.0, 24.8, 20.2, 21.9, 22.1, 22.9, 20.5, 24.4];
        let result = welch_t_test(&a, &b).unwrap();
        assert!((result.statistic - (-2.46)).abs() < 0.01, "t = {}", result.statistic);
        assert!((result.p_value - 0.021).abs() < 0.002, "p = {}", result.p_value);
    }

    #[test]
    fn test_welch_t_test_insufficient_data() {
        assert!(welch_t_test(&[1.0], &[1.0, 2.0]).is_none());
        assert!(welch_t_test(&[1.0, 1.0], &[2.0, 2.0]).is_none());
    }

    #[test]
    fn test_benjamini_hochberg() {
        let adjusted = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.20]);
        let expected = [0.04, 0.05333333, 0.05333333, 0.20];
        for (a, e) in adjusted.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-6, "{} vs {}", a, e);
        }
        assert!(benjamini_hochberg(&[]).is_empty());
    }

    #[test]
    fn test_benjamini_hochberg_caps_at_one() {
        let adjusted = benjamini_hochberg(&[0.9, 0.95]);
        assert!(adjusted.iter().all(|&p| p <= 1.0));
    }

    #[test]
    fn test_pearson_correlation() {
        let x = [Some(1.0), Some(2.0), Some(3.0), None];
        let y = [Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        assert!((pearson_correlation(&x, &y).unwrap() - 1.0).abs() < 1e-12);

        let flat = [Some(1.0), Some(1.0), Some(1.0), Some(1.0)];
        assert!(pearson_correlation(&flat, &y).is_none());
    }
}
