//! Claim occurrence classification (does a policy claim at all?)

use polars::prelude::*;
use serde::Serialize;

use super::columns::HAS_CLAIM;
use super::error::{AnalysisError, AnalysisResult};
use super::evaluation::{evaluate_classifier, ClassificationMetrics};
use super::features::{target_values, DataSplit, FeatureMatrix, LEAKAGE_COLUMNS};
use super::models::{
    Classifier, GradientBoosting, LogisticRegression, Loss, ModelSettings, RandomForest,
    GRADIENT_BOOSTING, LOGISTIC_REGRESSION, RANDOM_FOREST,
};

/// Metrics of one fitted classifier on the test split
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierScore {
    pub model: String,
    pub metrics: ClassificationMetrics,
}

/// The three fitted classifiers
#[derive(Debug, Clone)]
pub struct ClassificationModels {
    pub logistic: LogisticRegression,
    pub random_forest: RandomForest,
    pub gradient_boosting: GradientBoosting,
}

/// Everything a classification run produces
#[derive(Debug, Clone)]
pub struct ClassificationRun {
    pub scores: Vec<ClassifierScore>,
    pub models: ClassificationModels,
    pub x_test: FeatureMatrix,
    pub y_test: Vec<f64>,
}

/// Train logistic regression, random forest and gradient-boosted trees to
/// predict `target` (normally `has_claim`) and score them on a held-out split.
///
/// The target and every column derived from premium or claims are excluded
/// from the features.
pub fn train_classification_models(
    df: &DataFrame,
    target: &str,
    settings: &ModelSettings,
) -> AnalysisResult<ClassificationRun> {
    let mut exclude: Vec<&str> = LEAKAGE_COLUMNS.to_vec();
    exclude.push(target);

    let x = FeatureMatrix::from_frame(df, &exclude)?;
    let y = target_values(df, target)?;
    if y.iter().any(|v| *v != 0.0 && *v != 1.0) {
        return Err(AnalysisError::invalid(
            "target",
            format!("'{}' must contain only 0 and 1", target),
        ));
    }

    let split = DataSplit::new(&x, &y, settings.test_size, settings.seed)?;
    log::info!(
        "classification: {} train / {} test rows, {} features",
        split.x_train.n_rows(),
        split.x_test.n_rows(),
        x.n_cols()
    );

    let logistic = LogisticRegression::fit(&split.x_train, &split.y_train, &settings.logistic)?;
    let random_forest = RandomForest::fit_classifier(&split.x_train, &split.y_train, &settings.forest)?;
    let gradient_boosting =
        GradientBoosting::fit(&split.x_train, &split.y_train, Loss::Logistic, &settings.boosting)?;

    let fitted: [(&str, &dyn Classifier); 3] = [
        (LOGISTIC_REGRESSION, &logistic),
        (RANDOM_FOREST, &random_forest),
        (GRADIENT_BOOSTING, &gradient_boosting),
    ];

    let mut scores = Vec::with_capacity(fitted.len());
    for (name, model) in fitted {
        let proba = model.predict_proba(&split.x_test);
        let labels = model.predict_labels(&split.x_test);
        let metrics = evaluate_classifier(&split.y_test, &labels, Some(&proba))?;
        log::info!("{}: accuracy {:.4}, f1 {:.4}", name, metrics.accuracy, metrics.f1);
        scores.push(ClassifierScore {
            model: name.to_string(),
            metrics,
        });
    }

    Ok(ClassificationRun {
        scores,
        models: ClassificationModels {
            logistic,
            random_forest,
            gradient_boosting,
        },
        x_test: split.x_test,
        y_test: split.y_test,
    })
}

/// [`train_classification_models`] on `has_claim`
pub fn train_claim_classifiers(df: &DataFrame, settings: &ModelSettings) -> AnalysisResult<ClassificationRun> {
    train_classification_models(df, HAS_CLAIM, settings)
}
