//! L2-regularized logistic regression

use faer::prelude::*;
use faer::Mat;
use serde::{Deserialize, Serialize};

use super::{check_fit_input, sigmoid, Classifier};
use crate::pipeline::error::{AnalysisError, AnalysisResult};
use crate::pipeline::features::FeatureMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the largest Newton step component falls below this
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
        }
    }
}

/// Smallest IRLS weight, keeps the Hessian solvable once probabilities saturate
const MIN_WEIGHT: f64 = 1e-10;

/// Diagonal jitter on the unpenalized intercept term
const INTERCEPT_JITTER: f64 = 1e-10;

/// Logistic regression fitted by Newton's method (IRLS) on standardized
/// features.
///
/// Minimizes `sum log-loss + ||w||^2 / (2 C)`; the intercept is not
/// penalized. Each iteration solves `(A^T W A + R) d = g` with faer, where
/// `A` is the design matrix with a leading column of ones.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    intercept: f64,
    iterations: usize,
}

impl LogisticRegression {
    pub fn fit(x: &FeatureMatrix, y: &[f64], params: &LogisticParams) -> AnalysisResult<Self> {
        check_fit_input("logistic regression", x, y)?;
        if !(params.c > 0.0) {
            return Err(AnalysisError::invalid("c", format!("must be positive, got {}", params.c)));
        }

        let (n, p) = (x.n_rows(), x.n_cols());
        let nf = n as f64;
        let k = p + 1;

        let means: Vec<f64> = (0..p).map(|j| x.rows().map(|r| r[j]).sum::<f64>() / nf).collect();
        let scales: Vec<f64> = (0..p)
            .map(|j| {
                let var = x.rows().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / nf;
                if var > 0.0 {
                    var.sqrt()
                } else {
                    1.0
                }
            })
            .collect();

        let mut design = Mat::<f64>::zeros(n, k);
        for (i, row) in x.rows().enumerate() {
            design[(i, 0)] = 1.0;
            for j in 0..p {
                design[(i, j + 1)] = (row[j] - means[j]) / scales[j];
            }
        }

        let penalty = 1.0 / params.c;
        let mut beta = Mat::<f64>::zeros(k, 1);
        let mut weighted = Mat::<f64>::zeros(n, k);
        let mut residual = Mat::<f64>::zeros(n, 1);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < params.max_iter {
            iterations += 1;
            let margins = &design * &beta;
            for i in 0..n {
                let mu = sigmoid(margins[(i, 0)]);
                let w = (mu * (1.0 - mu)).max(MIN_WEIGHT);
                residual[(i, 0)] = mu - y[i];
                for j in 0..k {
                    weighted[(i, j)] = design[(i, j)] * w;
                }
            }

            // H = A^T W A + R, g = A^T (mu - y) + R beta
            let mut hessian = design.transpose() * &weighted;
            let mut gradient = design.transpose() * &residual;
            hessian[(0, 0)] += INTERCEPT_JITTER * nf;
            for j in 1..k {
                hessian[(j, j)] += penalty;
                gradient[(j, 0)] += penalty * beta[(j, 0)];
            }

            let step = hessian.partial_piv_lu().solve(&gradient);
            let mut max_step = 0.0f64;
            for j in 0..k {
                let d = step[(j, 0)];
                if !d.is_finite() {
                    return Err(AnalysisError::ModelFit {
                        model: "logistic regression",
                        reason: "Newton system is singular".to_string(),
                    });
                }
                beta[(j, 0)] -= d;
                max_step = max_step.max(d.abs());
            }

            if max_step < params.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            log::warn!(
                "logistic regression did not converge in {} iterations",
                params.max_iter
            );
        }

        Ok(Self {
            means,
            scales,
            weights: (1..k).map(|j| beta[(j, 0)]).collect(),
            intercept: beta[(0, 0)],
            iterations,
        })
    }

    /// Newton iterations taken before convergence
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Coefficients on the original feature scale
    pub fn coefficients(&self) -> Vec<f64> {
        self.weights
            .iter()
            .zip(self.scales.iter())
            .map(|(w, s)| w / s)
            .collect()
    }
}

impl Classifier for LogisticRegression {
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        x.rows()
            .map(|r| {
                let margin = self.intercept
                    + r.iter()
                        .enumerate()
                        .map(|(j, v)| (v - self.means[j]) / self.scales[j] * self.weights[j])
                        .sum::<f64>();
                sigmoid(margin)
            })
            .collect()
    }
}
