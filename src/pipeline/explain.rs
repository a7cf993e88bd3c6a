//! SHAP explanations for the tree ensembles
//!
//! Exact path-dependent TreeSHAP: for every row the tree is walked once,
//! tracking for each feature on the path the fraction of training cover that
//! would follow the path with the feature absent (`zero`) or present (`one`).

use console::style;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use rayon::prelude::*;
use serde::Serialize;

use super::error::{AnalysisError, AnalysisResult};
use super::features::FeatureMatrix;
use super::models::{GradientBoosting, RandomForest, Tree, TreeEnsemble, GRADIENT_BOOSTING, RANDOM_FOREST};

/// Width of the longest bar in the terminal summary
const BAR_WIDTH: usize = 40;

/// SHAP values of a sample of rows
#[derive(Debug, Clone)]
pub struct ShapValues {
    pub model: String,
    pub feature_names: Vec<String>,
    /// `values[row][feature]`
    pub values: Vec<Vec<f64>>,
    /// Model output when no feature is known
    pub expected_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub mean_abs_shap: f64,
}

/// Importance summary of one model, as exported
#[derive(Debug, Clone, Serialize)]
pub struct ShapAnalysis {
    pub model: String,
    pub expected_value: f64,
    pub rows_explained: usize,
    pub importance: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero: f64,
    one: f64,
    weight: f64,
}

fn extend_path(path: &mut Vec<PathElement>, zero: f64, one: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero,
        one,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero * path[i].weight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one = path[index].one;
    let zero = path[index].zero;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * denom / ((i + 1) as f64 * one);
            next_one_portion = tmp - path[i].weight * zero * (depth - i) as f64 / denom;
        } else {
            path[i].weight = path[i].weight * denom / (zero * (depth - i) as f64);
        }
    }

    // Weights stay in place; the rest shifts down over the removed element
    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero = path[i + 1].zero;
        path[i].one = path[i + 1].one;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one = path[index].one;
    let zero = path[index].zero;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero * (depth - i) as f64 / denom;
        } else if zero != 0.0 {
            total += path[i].weight / zero / ((depth - i) as f64 / denom);
        }
    }
    total
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    node_idx: usize,
    row: &[f64],
    phi: &mut [f64],
    mut path: Vec<PathElement>,
    zero: f64,
    one: f64,
    feature: Option<usize>,
) {
    extend_path(&mut path, zero, one, feature);
    let node = &tree.nodes()[node_idx];

    let Some(split) = node.feature else {
        for i in 1..path.len() {
            let w = unwound_path_sum(&path, i);
            let el = path[i];
            if let Some(f) = el.feature {
                phi[f] += w * (el.one - el.zero) * node.value;
            }
        }
        return;
    };

    let (hot, cold) = if row[split] <= node.threshold {
        (node.left, node.right)
    } else {
        (node.right, node.left)
    };

    // A feature already on the path is folded into the new split
    let mut incoming_zero = 1.0;
    let mut incoming_one = 1.0;
    if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(split)) {
        incoming_zero = path[k].zero;
        incoming_one = path[k].one;
        unwind_path(&mut path, k);
    }

    let cover = node.cover;
    let fraction = |child: usize| {
        if cover > 0.0 {
            tree.nodes()[child].cover / cover
        } else {
            0.0
        }
    };

    recurse(
        tree,
        hot,
        row,
        phi,
        path.clone(),
        incoming_zero * fraction(hot),
        incoming_one,
        Some(split),
    );
    recurse(
        tree,
        cold,
        row,
        phi,
        path,
        incoming_zero * fraction(cold),
        0.0,
        Some(split),
    );
}

/// Add one tree's SHAP values for `row` into `phi`
pub fn tree_shap(tree: &Tree, row: &[f64], phi: &mut [f64]) {
    let path = Vec::with_capacity(tree.depth() + 2);
    recurse(tree, 0, row, phi, path, 1.0, 1.0, None);
}

/// SHAP values of every row of `x` for a tree ensemble.
///
/// Values explain the raw model output: probability for forests, margin for
/// boosted classifiers.
pub fn ensemble_shap(model: &dyn TreeEnsemble, x: &FeatureMatrix, model_name: &str) -> AnalysisResult<ShapValues> {
    if model.trees().is_empty() {
        return Err(AnalysisError::ModelFit {
            model: "shap",
            reason: format!("{} has no trees", model_name),
        });
    }
    if x.n_rows() == 0 {
        return Err(AnalysisError::EmptyData { step: "shap" });
    }
    let p = x.n_cols();
    let max_feature = model
        .trees()
        .iter()
        .flat_map(|t| t.nodes().iter().filter_map(|n| n.feature))
        .max();
    if max_feature.is_some_and(|f| f >= p) {
        return Err(AnalysisError::ShapeMismatch(format!(
            "{} splits on feature {} but the data has {} columns",
            model_name,
            max_feature.unwrap_or(0),
            p
        )));
    }

    let values: Vec<Vec<f64>> = (0..x.n_rows())
        .into_par_iter()
        .map(|i| {
            let row = x.row(i);
            let mut phi = vec![0.0; p];
            for tree in model.trees() {
                tree_shap(tree, row, &mut phi);
            }
            phi.into_iter().map(|v| model.combine(v)).collect()
        })
        .collect();

    Ok(ShapValues {
        model: model_name.to_string(),
        feature_names: x.names().to_vec(),
        values,
        expected_value: model.expected_value(),
    })
}

/// At most `max_rows` rows of `x`, drawn without replacement in row order
pub fn shap_sample(x: &FeatureMatrix, max_rows: usize, seed: u64) -> FeatureMatrix {
    if max_rows == 0 || x.n_rows() <= max_rows {
        return x.clone();
    }
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, x.n_rows(), max_rows).into_vec();
    picked.sort_unstable();
    x.select_rows(&picked)
}

/// SHAP values for `x_test`, or `None` (with a warning) if they cannot be computed
pub fn compute_shap_values(
    model: &dyn TreeEnsemble,
    x_test: &FeatureMatrix,
    model_name: &str,
) -> Option<ShapValues> {
    match ensemble_shap(model, x_test, model_name) {
        Ok(values) => Some(values),
        Err(e) => {
            log::warn!("error computing SHAP values for {}: {}", model_name, e);
            None
        }
    }
}

/// Mean absolute SHAP value per feature, largest first, top `max_display`
pub fn shap_importance(shap: &ShapValues, max_display: usize) -> Vec<FeatureImportance> {
    let n = shap.values.len().max(1) as f64;
    let mut importance: Vec<FeatureImportance> = shap
        .feature_names
        .iter()
        .enumerate()
        .map(|(j, name)| FeatureImportance {
            feature: name.clone(),
            mean_abs_shap: shap.values.iter().map(|r| r[j].abs()).sum::<f64>() / n,
        })
        .collect();
    importance.sort_by(|a, b| b.mean_abs_shap.total_cmp(&a.mean_abs_shap));
    importance.truncate(max_display);
    importance
}

/// Terminal bar chart of the feature importance
pub fn render_shap_summary(model_name: &str, importance: &[FeatureImportance]) -> String {
    let mut out = format!("    {} SHAP feature importance (mean |SHAP|)\n", style(model_name).bold());
    let max = importance.iter().map(|i| i.mean_abs_shap).fold(0.0f64, f64::max);
    let label_width = importance.iter().map(|i| i.feature.len()).max().unwrap_or(0);

    for item in importance {
        let len = if max > 0.0 {
            ((item.mean_abs_shap / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "    {:>width$} {} {:.4}\n",
            item.feature,
            style("█".repeat(len.max(1))).cyan(),
            item.mean_abs_shap,
            width = label_width
        ));
    }
    out
}

/// Print the SHAP importance chart, or a skip message when there are no values
pub fn plot_shap_summary(shap: Option<&ShapValues>, model_name: &str, max_display: usize) {
    match shap {
        Some(values) => println!("{}", render_shap_summary(model_name, &shap_importance(values, max_display))),
        None => println!(
            "    {} No SHAP values to plot for {}",
            style("⚠").yellow(),
            model_name
        ),
    }
}

/// SHAP values and importance charts for the forest and boosting classifiers
pub fn run_shap_analysis(
    rf: &RandomForest,
    gbt: &GradientBoosting,
    x_test: &FeatureMatrix,
    sample_size: usize,
    max_display: usize,
    seed: u64,
) -> Vec<ShapAnalysis> {
    let sample = shap_sample(x_test, sample_size, seed);
    let models: [(&str, &dyn TreeEnsemble); 2] = [(RANDOM_FOREST, rf), (GRADIENT_BOOSTING, gbt)];

    let mut analyses = Vec::new();
    for (name, model) in models {
        let shap = compute_shap_values(model, &sample, name);
        plot_shap_summary(shap.as_ref(), name, max_display);
        if let Some(values) = shap {
            analyses.push(ShapAnalysis {
                model: name.to_string(),
                expected_value: values.expected_value,
                rows_explained: values.values.len(),
                importance: shap_importance(&values, max_display),
            });
        }
    }
    analyses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::tree::{fit_tree, Objective, RowStat, TreeParams};
    use crate::pipeline::models::{BoostingParams, ForestParams, Loss};

    fn interaction_data() -> (FeatureMatrix, Vec<f64>) {
        // y = x0 * 2 + (x1 > 1) * x2; x3 is constant
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let row = [(i % 5) as f64, (i % 3) as f64, (i % 4) as f64, 1.0];
            y.push(row[0] * 2.0 + if row[1] > 1.0 { row[2] } else { 0.0 });
            data.extend_from_slice(&row);
        }
        let names = (0..4).map(|j| format!("f{}", j)).collect();
        (FeatureMatrix::new(names, data).unwrap(), y)
    }

    #[test]
    fn test_single_split_tree_attribution() {
        let x = FeatureMatrix::new(vec!["a".into()], vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let stats: Vec<RowStat> = [0.0, 0.0, 1.0, 1.0].iter().map(|&v| Objective::row_stat(v)).collect();
        let mut rng = Pcg64::seed_from_u64(0);
        let tree = fit_tree(&x, &stats, (0..4).collect(), Objective::Variance, TreeParams::default(), &mut rng);

        let mut phi = vec![0.0];
        tree_shap(&tree, &[1.0], &mut phi);
        // prediction 1, expectation 0.5
        assert!((phi[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_local_accuracy_for_forest_and_boosting() {
        let (x, y) = interaction_data();
        let forest = RandomForest::fit_regressor(
            &x,
            &y,
            &ForestParams {
                n_estimators: 8,
                max_depth: Some(4),
                seed: 7,
            },
        )
        .unwrap();
        let boosting = GradientBoosting::fit(
            &x,
            &y,
            Loss::Squared,
            &BoostingParams {
                n_rounds: 20,
                ..Default::default()
            },
        )
        .unwrap();

        let models: [(&str, &dyn TreeEnsemble); 2] = [("rf", &forest), ("gbt", &boosting)];
        for (name, model) in models {
            let shap = ensemble_shap(model, &x, name).unwrap();
            for (i, phi) in shap.values.iter().enumerate() {
                let total: f64 = phi.iter().sum::<f64>() + shap.expected_value;
                let output = model.raw_output(x.row(i));
                assert!(
                    (total - output).abs() < 1e-8,
                    "{} row {}: shap sum {} vs output {}",
                    name,
                    i,
                    total,
                    output
                );
            }
        }
    }

    #[test]
    fn test_constant_feature_gets_zero_importance() {
        let (x, y) = interaction_data();
        let boosting = GradientBoosting::fit(&x, &y, Loss::Squared, &BoostingParams::default()).unwrap();
        let shap = ensemble_shap(&boosting, &x, "gbt").unwrap();
        let importance = shap_importance(&shap, 10);

        assert_eq!(importance.len(), 4);
        assert_eq!(importance[0].feature, "f0");
        let f3 = importance.iter().find(|i| i.feature == "f3").unwrap();
        assert_eq!(f3.mean_abs_shap, 0.0);
    }

    #[test]
    fn test_shap_sample_caps_rows() {
        let (x, _) = interaction_data();
        let sample = shap_sample(&x, 10, 42);
        assert_eq!(sample.n_rows(), 10);
        assert_eq!(shap_sample(&x, 10, 42), sample);
        assert_eq!(shap_sample(&x, 100, 42).n_rows(), 40);
    }

    #[test]
    fn test_compute_shap_values_logs_and_returns_none_on_mismatch() {
        let (x, y) = interaction_data();
        let boosting = GradientBoosting::fit(&x, &y, Loss::Squared, &BoostingParams::default()).unwrap();
        let narrow = FeatureMatrix::new(vec!["only".into()], vec![1.0, 2.0]).unwrap();
        assert!(compute_shap_values(&boosting, &narrow, "gbt").is_none());
    }
}
