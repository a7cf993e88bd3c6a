//! Gradient-boosted trees with second-order splits

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use super::tree::{fit_tree, Objective, RowStat, Tree, TreeParams};
use super::{check_fit_input, sigmoid, Classifier, Regressor, TreeEnsemble};
use crate::pipeline::error::{AnalysisError, AnalysisResult};
use crate::pipeline::features::FeatureMatrix;

/// Smallest hessian used for the logistic loss
const MIN_HESSIAN: f64 = 1e-16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    Squared,
    Logistic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    pub min_child_weight: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.1,
            max_depth: 6,
            lambda: 1.0,
            min_child_weight: 1.0,
            seed: 42,
        }
    }
}

/// Additive tree model: `margin = base_score + sum(tree outputs)`
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    loss: Loss,
    base_score: f64,
    trees: Vec<Tree>,
}

impl GradientBoosting {
    pub fn fit(x: &FeatureMatrix, y: &[f64], loss: Loss, params: &BoostingParams) -> AnalysisResult<Self> {
        check_fit_input("gradient boosting", x, y)?;
        if !(params.learning_rate > 0.0) {
            return Err(AnalysisError::invalid(
                "learning_rate",
                format!("must be positive, got {}", params.learning_rate),
            ));
        }

        let mean_y = y.iter().sum::<f64>() / y.len() as f64;
        let base_score = match loss {
            Loss::Squared => mean_y,
            Loss::Logistic => {
                let p = mean_y.clamp(1e-6, 1.0 - 1e-6);
                (p / (1.0 - p)).ln()
            }
        };

        let tree_params = TreeParams {
            max_depth: Some(params.max_depth),
            ..Default::default()
        };
        let objective = Objective::SecondOrder {
            lambda: params.lambda,
            min_child_weight: params.min_child_weight,
        };
        let mut rng = Pcg64::seed_from_u64(params.seed);

        let mut margins = vec![base_score; y.len()];
        let mut trees = Vec::with_capacity(params.n_rounds);

        for round in 0..params.n_rounds {
            let stats: Vec<RowStat> = margins
                .iter()
                .zip(y.iter())
                .map(|(&m, &t)| match loss {
                    Loss::Squared => (m - t, 1.0),
                    Loss::Logistic => {
                        let p = sigmoid(m);
                        (p - t, (p * (1.0 - p)).max(MIN_HESSIAN))
                    }
                })
                .collect();

            let mut tree = fit_tree(x, &stats, (0..y.len()).collect(), objective, tree_params, &mut rng);
            tree.scale(params.learning_rate);

            for (m, row) in margins.iter_mut().zip(x.rows()) {
                *m += tree.predict_row(row);
            }

            if tree.nodes().len() == 1 && tree.nodes()[0].value.abs() < 1e-12 {
                log::debug!("boosting stopped after {} rounds: no further gain", round);
                break;
            }
            trees.push(tree);
        }

        Ok(Self {
            loss,
            base_score,
            trees,
        })
    }

    pub fn loss(&self) -> Loss {
        self.loss
    }

    fn margin(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}

impl Regressor for GradientBoosting {
    fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        x.rows().map(|r| self.margin(r)).collect()
    }
}

impl Classifier for GradientBoosting {
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        x.rows().map(|r| sigmoid(self.margin(r))).collect()
    }
}

impl TreeEnsemble for GradientBoosting {
    fn trees(&self) -> &[Tree] {
        &self.trees
    }

    fn combine(&self, per_tree: f64) -> f64 {
        per_tree
    }

    fn base_value(&self) -> f64 {
        self.base_score
    }
}
