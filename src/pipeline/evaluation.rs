//! Model evaluation metrics

use serde::Serialize;

use super::error::{AnalysisError, AnalysisResult};

/// Precision, recall and F1 of one class or average
#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Absent when the true labels contain a single class
    pub roc_auc: Option<f64>,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[usize; 2]; 2],
    /// Per-class rows followed by `macro avg` and `weighted avg`
    pub report: Vec<ClassReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub r2: f64,
}

fn check_lengths(a: usize, b: usize) -> AnalysisResult<()> {
    if a != b {
        return Err(AnalysisError::ShapeMismatch(format!(
            "{} true values for {} predictions",
            a, b
        )));
    }
    if a == 0 {
        return Err(AnalysisError::EmptyData { step: "evaluation" });
    }
    Ok(())
}

/// Ratio with a zero denominator mapped to 0
fn safe_div(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    safe_div(2.0 * precision * recall, precision + recall)
}

/// Area under the ROC curve from the Mann-Whitney rank sum, ties averaged.
///
/// `None` unless both classes are present.
pub fn roc_auc(y_true: &[f64], scores: &[f64]) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&y| y == 1.0).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || y_true.len() != scores.len() {
        return None;
    }

    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(y_true.iter())
        .map(|(&s, &y)| (s, y == 1.0))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        // Tie group [i, j)
        let mut j = i;
        while j < pairs.len() && pairs[j].0 == pairs[i].0 {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        rank_sum_pos += avg_rank * pairs[i..j].iter().filter(|p| p.1).count() as f64;
        i = j;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Binary classification metrics with the positive class `1`.
///
/// Undefined precision, recall and F1 (zero denominators) are reported as 0.
pub fn evaluate_classifier(
    y_true: &[f64],
    y_pred: &[f64],
    y_proba: Option<&[f64]>,
) -> AnalysisResult<ClassificationMetrics> {
    check_lengths(y_true.len(), y_pred.len())?;

    let mut cm = [[0usize; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        cm[usize::from(t == 1.0)][usize::from(p == 1.0)] += 1;
    }
    let [[tn, fp], [fn_, tp]] = cm;
    let n = y_true.len() as f64;

    let per_class = |label: usize| -> ClassReport {
        let (hit, predicted, actual) = if label == 1 {
            (tp, tp + fp, tp + fn_)
        } else {
            (tn, tn + fn_, tn + fp)
        };
        let precision = safe_div(hit as f64, predicted as f64);
        let recall = safe_div(hit as f64, actual as f64);
        ClassReport {
            label: label.to_string(),
            precision,
            recall,
            f1: f1_score(precision, recall),
            support: actual,
        }
    };

    let present = |label: usize| cm[label][0] + cm[label][1] + cm[0][label] + cm[1][label] > 0;
    let mut report: Vec<ClassReport> = (0..2).filter(|&l| present(l)).map(per_class).collect();

    let k = report.len() as f64;
    let macro_avg = ClassReport {
        label: "macro avg".to_string(),
        precision: report.iter().map(|r| r.precision).sum::<f64>() / k,
        recall: report.iter().map(|r| r.recall).sum::<f64>() / k,
        f1: report.iter().map(|r| r.f1).sum::<f64>() / k,
        support: y_true.len(),
    };
    let weighted = |f: fn(&ClassReport) -> f64| {
        report.iter().map(|r| f(r) * r.support as f64).sum::<f64>() / n
    };
    let weighted_avg = ClassReport {
        label: "weighted avg".to_string(),
        precision: weighted(|r| r.precision),
        recall: weighted(|r| r.recall),
        f1: weighted(|r| r.f1),
        support: y_true.len(),
    };
    report.push(macro_avg);
    report.push(weighted_avg);

    let positive = per_class(1);
    Ok(ClassificationMetrics {
        accuracy: (tp + tn) as f64 / n,
        precision: positive.precision,
        recall: positive.recall,
        f1: positive.f1,
        roc_auc: y_proba.and_then(|p| roc_auc(y_true, p)),
        confusion_matrix: cm,
        report,
    })
}

/// RMSE and coefficient of determination.
///
/// For a constant target R² is 1 on a perfect fit and 0 otherwise.
pub fn regression_metrics(y_true: &[f64], y_pred: &[f64]) -> AnalysisResult<RegressionMetrics> {
    check_lengths(y_true.len(), y_pred.len())?;
    let n = y_true.len() as f64;

    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let mean = y_true.iter().sum::<f64>() / n;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(RegressionMetrics {
        rmse: (ss_res / n).sqrt(),
        r2,
    })
}
