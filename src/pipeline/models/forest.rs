//! Random forests of CART trees

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{fit_tree, Objective, RowStat, Tree, TreeParams};
use super::{check_fit_input, Classifier, Regressor, TreeEnsemble};
use crate::pipeline::error::AnalysisResult;
use crate::pipeline::features::FeatureMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            seed: 42,
        }
    }
}

/// Bagged trees; predictions are the mean over trees
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<Tree>,
}

impl RandomForest {
    /// Classifier on 0/1 targets, sqrt(p) candidate features per split
    pub fn fit_classifier(x: &FeatureMatrix, y: &[f64], params: &ForestParams) -> AnalysisResult<Self> {
        check_fit_input("random forest", x, y)?;
        let max_features = ((x.n_cols() as f64).sqrt() as usize).max(1);
        Ok(Self::fit(x, y, Objective::Gini, Some(max_features), params))
    }

    /// Regressor, all features considered at every split
    pub fn fit_regressor(x: &FeatureMatrix, y: &[f64], params: &ForestParams) -> AnalysisResult<Self> {
        check_fit_input("random forest", x, y)?;
        Ok(Self::fit(x, y, Objective::Variance, None, params))
    }

    fn fit(
        x: &FeatureMatrix,
        y: &[f64],
        objective: Objective,
        max_features: Option<usize>,
        params: &ForestParams,
    ) -> Self {
        let stats: Vec<RowStat> = y.iter().map(|&v| Objective::row_stat(v)).collect();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            max_features,
            ..Default::default()
        };

        // Per-tree seeds drawn up front so results do not depend on scheduling
        let mut seeder = Pcg64::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators.max(1)).map(|_| seeder.gen()).collect();
        let n = x.n_rows();

        let trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = Pcg64::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                fit_tree(x, &stats, bootstrap, objective, tree_params, &mut rng)
            })
            .collect();

        Self { trees }
    }

    fn mean_prediction(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / self.trees.len() as f64
    }
}

impl Regressor for RandomForest {
    fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        x.rows().map(|r| self.mean_prediction(r)).collect()
    }
}

impl Classifier for RandomForest {
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        x.rows().map(|r| self.mean_prediction(r)).collect()
    }
}

impl TreeEnsemble for RandomForest {
    fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Average of the trees
    fn combine(&self, per_tree: f64) -> f64 {
        per_tree / self.trees.len() as f64
    }

    fn base_value(&self) -> f64 {
        0.0
    }
}
