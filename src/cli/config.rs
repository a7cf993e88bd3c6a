//! Analysis configuration: defaults, an optional TOML file and CLI overrides

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::args::Cli;
use crate::pipeline::models::{BoostingParams, ForestParams, LogisticParams};
use crate::pipeline::{GroupPair, HypothesisPlan, ModelSettings, PrepareOptions, DEFAULT_MISSING_THRESHOLD};

/// Every tunable of an analysis run.
///
/// Loaded as defaults, then the TOML file (if any), then command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub missing_threshold: f64,
    pub test_size: f64,
    pub seed: u64,
    pub n_estimators: usize,
    /// Random forest depth limit
    pub max_depth: Option<usize>,
    pub boosting_rounds: usize,
    pub learning_rate: f64,
    pub boosting_depth: usize,
    pub min_category_samples: usize,
    pub shap_sample_size: usize,
    pub shap_max_display: usize,
    pub top_n: usize,
    pub alpha: f64,
    pub province_pair: GroupPair,
    pub gender_pair: GroupPair,
    pub tier_columns: Vec<String>,
    pub tier_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let plan = HypothesisPlan::default();
        let forest = ForestParams::default();
        let boosting = BoostingParams::default();
        let settings = ModelSettings::default();
        Self {
            missing_threshold: DEFAULT_MISSING_THRESHOLD,
            test_size: settings.test_size,
            seed: settings.seed,
            n_estimators: forest.n_estimators,
            max_depth: forest.max_depth,
            boosting_rounds: boosting.n_rounds,
            learning_rate: boosting.learning_rate,
            boosting_depth: boosting.max_depth,
            min_category_samples: PrepareOptions::default().min_category_samples,
            shap_sample_size: 500,
            shap_max_display: 10,
            top_n: 10,
            alpha: plan.alpha,
            province_pair: plan.province_pair,
            gender_pair: plan.gender_pair,
            tier_columns: plan.tier_columns,
            tier_size: plan.tier_size,
        }
    }
}

impl AnalysisConfig {
    /// Read a TOML config file; keys it omits keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Defaults, then `cli.config`, then the flags set on the command line
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        fn set<T: Copy>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut self.missing_threshold, cli.missing_threshold);
        set(&mut self.test_size, cli.test_size);
        set(&mut self.seed, cli.seed);
        set(&mut self.n_estimators, cli.n_estimators);
        set(&mut self.boosting_rounds, cli.boosting_rounds);
        set(&mut self.learning_rate, cli.learning_rate);
        set(&mut self.min_category_samples, cli.min_category_samples);
        set(&mut self.shap_sample_size, cli.shap_sample_size);
        set(&mut self.top_n, cli.top_n);
        set(&mut self.alpha, cli.alpha);
        if cli.max_depth.is_some() {
            self.max_depth = cli.max_depth;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.missing_threshold) {
            anyhow::bail!(
                "missing_threshold must be between 0.0 and 1.0, got {}",
                self.missing_threshold
            );
        }
        if self.test_size <= 0.0 || self.test_size >= 1.0 {
            anyhow::bail!("test_size must be between 0 and 1 (exclusive), got {}", self.test_size);
        }
        if self.alpha <= 0.0 || self.alpha >= 1.0 {
            anyhow::bail!("alpha must be between 0 and 1 (exclusive), got {}", self.alpha);
        }
        if self.n_estimators == 0 || self.boosting_rounds == 0 {
            anyhow::bail!("n_estimators and boosting_rounds must be at least 1");
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            anyhow::bail!("learning_rate must be in (0, 1], got {}", self.learning_rate);
        }
        if self.tier_size == 0 {
            anyhow::bail!("tier_size must be at least 1");
        }
        Ok(())
    }

    pub fn hypothesis_plan(&self) -> HypothesisPlan {
        HypothesisPlan {
            province_pair: self.province_pair.clone(),
            gender_pair: self.gender_pair.clone(),
            tier_columns: self.tier_columns.clone(),
            tier_size: self.tier_size,
            alpha: self.alpha,
        }
    }

    /// Model hyperparameters; every model shares the run seed
    pub fn model_settings(&self) -> ModelSettings {
        let boosting = BoostingParams::default();
        ModelSettings {
            test_size: self.test_size,
            seed: self.seed,
            logistic: LogisticParams::default(),
            forest: ForestParams {
                n_estimators: self.n_estimators,
                max_depth: self.max_depth,
                seed: self.seed,
            },
            boosting: BoostingParams {
                n_rounds: self.boosting_rounds,
                learning_rate: self.learning_rate,
                max_depth: self.boosting_depth,
                seed: self.seed,
                ..boosting
            },
        }
    }

    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions {
            min_category_samples: self.min_category_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AnalysisConfig::default();
        assert_eq!(config.missing_threshold, 0.90);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.max_depth, None);
        assert_eq!(config.boosting_rounds, 100);
        assert_eq!(config.boosting_depth, 6);
        assert_eq!(config.shap_sample_size, 500);
        assert_eq!(config.province_pair, GroupPair::new("Gauteng", "KwaZulu-Natal"));
        assert_eq!(config.tier_columns, vec!["MainCrestaZone".to_string()]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
            alpha = 0.01
            tier_columns = ["PostalCode"]

            [province_pair]
            a = "Western Cape"
            b = "Gauteng"
            "#,
        )
        .unwrap();
        assert_eq!(config.alpha, 0.01);
        assert_eq!(config.tier_columns, vec!["PostalCode".to_string()]);
        assert_eq!(config.province_pair.a, "Western Cape");
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(AnalysisConfig::from_toml("n_trees = 5").is_err());
    }

    #[test]
    fn test_cli_flags_override_file_values() {
        let mut config = AnalysisConfig::from_toml("seed = 7\ntop_n = 3").unwrap();
        let cli = Cli::try_parse_from(["claimlens", "-i", "x.csv", "--seed", "11"]).unwrap();
        config.apply_overrides(&cli);
        assert_eq!(config.seed, 11);
        assert_eq!(config.top_n, 3);

        let settings = config.model_settings();
        assert_eq!(settings.forest.seed, 11);
        assert_eq!(settings.boosting.seed, 11);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = AnalysisConfig {
            test_size: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(AnalysisConfig::default().validate().is_ok());
    }
}
