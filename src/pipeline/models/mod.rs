//! Claim models: linear and logistic regression, random forests and
//! gradient-boosted trees

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod logistic;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoosting, Loss};
pub use forest::{ForestParams, RandomForest};
pub use linear::LinearRegression;
pub use logistic::{LogisticParams, LogisticRegression};
pub use tree::{Node, Tree};

use crate::pipeline::error::{AnalysisError, AnalysisResult};
use crate::pipeline::features::FeatureMatrix;

// Display names used in reports
pub const LOGISTIC_REGRESSION: &str = "Logistic Regression";
pub const LINEAR_REGRESSION: &str = "Linear Regression";
pub const RANDOM_FOREST: &str = "Random Forest";
pub const GRADIENT_BOOSTING: &str = "Gradient Boosting";

/// A fitted model predicting a continuous target
pub trait Regressor: Send + Sync {
    fn predict(&self, x: &FeatureMatrix) -> Vec<f64>;
}

/// A fitted binary classifier
pub trait Classifier: Send + Sync {
    /// Probability of the positive class per row
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64>;

    /// Hard 0/1 labels at the 0.5 threshold
    fn predict_labels(&self, x: &FeatureMatrix) -> Vec<f64> {
        self.predict_proba(x)
            .into_iter()
            .map(|p| if p >= 0.5 { 1.0 } else { 0.0 })
            .collect()
    }
}

/// A model whose output is a linear combination of tree outputs, which is
/// what TreeSHAP explains.
pub trait TreeEnsemble: Send + Sync {
    fn trees(&self) -> &[Tree];

    /// Map a sum over trees to the model output (e.g. averaging for forests)
    fn combine(&self, per_tree: f64) -> f64;

    /// Constant added to the combined tree output
    fn base_value(&self) -> f64;

    /// Raw model output (margin for boosted classifiers)
    fn raw_output(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees().iter().map(|t| t.predict_row(row)).sum();
        self.base_value() + self.combine(sum)
    }

    /// Expected raw output over the training distribution
    fn expected_value(&self) -> f64 {
        let sum: f64 = self.trees().iter().map(Tree::expected_value).sum();
        self.base_value() + self.combine(sum)
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Shape and value checks shared by every model's `fit`
pub(crate) fn check_fit_input(model: &'static str, x: &FeatureMatrix, y: &[f64]) -> AnalysisResult<()> {
    if x.n_rows() != y.len() {
        return Err(AnalysisError::ShapeMismatch(format!(
            "{}: {} feature rows for {} targets",
            model,
            x.n_rows(),
            y.len()
        )));
    }
    if y.is_empty() {
        return Err(AnalysisError::ModelFit {
            model,
            reason: "no training rows".to_string(),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::ModelFit {
            model,
            reason: "target contains non-finite values".to_string(),
        });
    }
    Ok(())
}

/// Split and hyperparameters shared by the classification and severity runs
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSettings {
    pub test_size: f64,
    pub seed: u64,
    pub logistic: LogisticParams,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            logistic: LogisticParams::default(),
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
        }
    }
}
