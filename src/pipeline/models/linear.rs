//! Ordinary least squares regression

use faer::prelude::*;
use faer::Mat;

use super::{check_fit_input, Regressor};
use crate::pipeline::error::{AnalysisError, AnalysisResult};
use crate::pipeline::features::FeatureMatrix;

/// Diagonal jitter keeping the normal equations solvable with collinear dummies
const RIDGE_JITTER: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct LinearRegression {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegression {
    /// Least squares with intercept, solved from the normal equations.
    ///
    /// Features are centered first so the intercept is not penalized by the
    /// jitter.
    pub fn fit(x: &FeatureMatrix, y: &[f64]) -> AnalysisResult<Self> {
        check_fit_input("linear regression", x, y)?;
        let (n, p) = (x.n_rows(), x.n_cols());

        let x_means: Vec<f64> = (0..p)
            .map(|j| x.rows().map(|r| r[j]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n as f64;

        let mut z = Mat::<f64>::zeros(n, p);
        for (i, row) in x.rows().enumerate() {
            for j in 0..p {
                z[(i, j)] = row[j] - x_means[j];
            }
        }
        let mut yc = Mat::<f64>::zeros(n, 1);
        for (i, &v) in y.iter().enumerate() {
            yc[(i, 0)] = v - y_mean;
        }

        // (Z^T Z + eps I) b = Z^T y
        let mut xtx = z.transpose() * &z;
        let scale = (0..p).map(|j| xtx[(j, j)]).fold(0.0f64, f64::max).max(1.0);
        for j in 0..p {
            xtx[(j, j)] += RIDGE_JITTER * scale;
        }
        let xty = z.transpose() * &yc;
        let beta = xtx.partial_piv_lu().solve(&xty);

        let coefficients: Vec<f64> = (0..p).map(|j| beta[(j, 0)]).collect();
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(AnalysisError::ModelFit {
                model: "linear regression",
                reason: "normal equations are singular".to_string(),
            });
        }

        let intercept = y_mean
            - coefficients
                .iter()
                .zip(x_means.iter())
                .map(|(c, m)| c * m)
                .sum::<f64>();

        Ok(Self {
            intercept,
            coefficients,
        })
    }
}

impl Regressor for LinearRegression {
    fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        x.rows()
            .map(|r| {
                self.intercept
                    + r.iter()
                        .zip(self.coefficients.iter())
                        .map(|(v, c)| v * c)
                        .sum::<f64>()
            })
            .collect()
    }
}
