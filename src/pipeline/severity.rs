//! Claim severity regression (how large is a claim, given one was made?)

use polars::prelude::*;
use serde::Serialize;

use super::columns::{f64_values, filter_rows, TOTAL_CLAIMS};
use super::error::{AnalysisError, AnalysisResult};
use super::evaluation::regression_metrics;
use super::features::{target_values, DataSplit, FeatureMatrix, LEAKAGE_COLUMNS};
use super::models::{
    BoostingParams, ForestParams, GradientBoosting, LinearRegression, Loss, ModelSettings,
    RandomForest, Regressor, GRADIENT_BOOSTING, LINEAR_REGRESSION, RANDOM_FOREST,
};

/// Test-set performance of one regressor
#[derive(Debug, Clone, Serialize)]
pub struct RegressionEvaluation {
    pub rmse: f64,
    pub r2: f64,
    #[serde(skip)]
    pub predictions: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressorScore {
    pub model: String,
    #[serde(flatten)]
    pub evaluation: RegressionEvaluation,
}

#[derive(Debug, Clone)]
pub struct SeverityModels {
    pub linear: LinearRegression,
    pub random_forest: RandomForest,
    pub gradient_boosting: GradientBoosting,
}

#[derive(Debug, Clone)]
pub struct SeverityRun {
    pub scores: Vec<RegressorScore>,
    pub models: SeverityModels,
    pub x_test: FeatureMatrix,
    pub y_test: Vec<f64>,
}

/// Policies with a positive claim, split into train and test parts.
///
/// Features exclude the target and every premium/claims-derived column.
pub fn split_claim_severity_data(
    df: &DataFrame,
    target: &str,
    test_size: f64,
    seed: u64,
) -> AnalysisResult<DataSplit> {
    let claims = f64_values(df, TOTAL_CLAIMS)?;
    let keep: Vec<bool> = claims.iter().map(|c| c.is_some_and(|c| c > 0.0)).collect();
    let claimed = filter_rows(df, &keep)?;
    if claimed.height() == 0 {
        return Err(AnalysisError::EmptyData {
            step: "claim severity",
        });
    }

    let mut exclude: Vec<&str> = LEAKAGE_COLUMNS.to_vec();
    exclude.push(target);
    let x = FeatureMatrix::from_frame(&claimed, &exclude)?;
    let y = target_values(&claimed, target)?;

    DataSplit::new(&x, &y, test_size, seed)
}

pub fn train_linear_regression(split: &DataSplit) -> AnalysisResult<LinearRegression> {
    LinearRegression::fit(&split.x_train, &split.y_train)
}

pub fn train_random_forest(split: &DataSplit, params: &ForestParams) -> AnalysisResult<RandomForest> {
    RandomForest::fit_regressor(&split.x_train, &split.y_train, params)
}

pub fn train_gradient_boosting(
    split: &DataSplit,
    params: &BoostingParams,
) -> AnalysisResult<GradientBoosting> {
    GradientBoosting::fit(&split.x_train, &split.y_train, Loss::Squared, params)
}

/// RMSE, R² and the test predictions of a fitted regressor
pub fn evaluate_model(
    model: &dyn Regressor,
    x_test: &FeatureMatrix,
    y_test: &[f64],
) -> AnalysisResult<RegressionEvaluation> {
    let predictions = model.predict(x_test);
    let metrics = regression_metrics(y_test, &predictions)?;
    Ok(RegressionEvaluation {
        rmse: metrics.rmse,
        r2: metrics.r2,
        predictions,
    })
}

/// Fit and evaluate the three severity models on `TotalClaims`
pub fn run_severity_models(df: &DataFrame, settings: &ModelSettings) -> AnalysisResult<SeverityRun> {
    let split = split_claim_severity_data(df, TOTAL_CLAIMS, settings.test_size, settings.seed)?;
    log::info!(
        "severity: {} train / {} test claims, {} features",
        split.x_train.n_rows(),
        split.x_test.n_rows(),
        split.x_train.n_cols()
    );

    let linear = train_linear_regression(&split)?;
    let random_forest = train_random_forest(&split, &settings.forest)?;
    let gradient_boosting = train_gradient_boosting(&split, &settings.boosting)?;

    let fitted: [(&str, &dyn Regressor); 3] = [
        (LINEAR_REGRESSION, &linear),
        (RANDOM_FOREST, &random_forest),
        (GRADIENT_BOOSTING, &gradient_boosting),
    ];

    let mut scores = Vec::with_capacity(fitted.len());
    for (name, model) in fitted {
        let evaluation = evaluate_model(model, &split.x_test, &split.y_test)?;
        log::info!("{}: rmse {:.2}, r2 {:.4}", name, evaluation.rmse, evaluation.r2);
        scores.push(RegressorScore {
            model: name.to_string(),
            evaluation,
        });
    }

    Ok(SeverityRun {
        scores,
        models: SeverityModels {
            linear,
            random_forest,
            gradient_boosting,
        },
        x_test: split.x_test,
        y_test: split.y_test,
    })
}
