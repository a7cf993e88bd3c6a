//! Command-line argument definitions using clap

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Claimlens - Loss-ratio analysis, segment hypothesis tests and claim models
/// for insurance portfolios
#[derive(Parser, Debug)]
#[command(name = "claimlens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory for the analysis outputs.
    /// Defaults to '<input stem>_analysis' next to the input file.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// TOML file with thresholds, the hypothesis plan and model parameters.
    /// Flags given on the command line take precedence over the file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Drop columns whose missing ratio exceeds this value (0.0 to 1.0)
    #[arg(long, value_parser = validate_ratio)]
    pub missing_threshold: Option<f64>,

    /// Fraction of rows held out for model evaluation (between 0 and 1, exclusive)
    #[arg(long, value_parser = validate_open_unit)]
    pub test_size: Option<f64>,

    /// Seed for splits, bootstraps and SHAP row sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Trees in each random forest
    #[arg(long)]
    pub n_estimators: Option<usize>,

    /// Maximum depth of random forest trees (unlimited when not set)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Boosting rounds
    #[arg(long)]
    pub boosting_rounds: Option<usize>,

    /// Boosting learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Categories with fewer rows are merged into "OTHER" before one-hot encoding
    #[arg(long)]
    pub min_category_samples: Option<usize>,

    /// Maximum number of test rows explained with SHAP
    #[arg(long)]
    pub shap_sample_size: Option<usize>,

    /// Number of vehicle make/models listed at each end of the claims ranking
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Significance level for the BH-adjusted hypothesis tests (between 0 and 1, exclusive)
    #[arg(long, value_parser = validate_open_unit)]
    pub alpha: Option<f64>,

    /// Stop after the hypothesis tests (no models, no SHAP)
    #[arg(long, default_value = "false")]
    pub skip_modeling: bool,

    /// Do not write cleaned.csv
    #[arg(long, default_value = "false")]
    pub no_cleaned: bool,

    /// Package the outputs into a single zip archive
    #[arg(long, default_value = "false")]
    pub bundle: bool,

    /// Overwrite an existing output directory without asking
    #[arg(long, default_value = "false")]
    pub no_confirm: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan (very slow for large files).
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a delimited text extract (pipe-delimited by default) to CSV
    Convert {
        /// Input text file
        input: PathBuf,

        /// Output CSV path (optional, defaults to input with .csv extension)
        output: Option<PathBuf>,

        /// Field delimiter of the input (single ASCII character)
        #[arg(long, default_value = "|", value_parser = validate_delimiter)]
        delimiter: u8,

        /// Text encoding of the input (e.g. utf-8, windows-1252, latin1)
        #[arg(long, default_value = "utf-8")]
        encoding: String,
    },

    /// Print column info, descriptive statistics and missing values of a dataset
    Summarize {
        /// Input file path (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Number of rows to use for schema inference (CSV only)
        #[arg(long, default_value = "10000")]
        infer_schema_length: usize,
    },
}

impl Cli {
    /// Get the output directory, deriving it from the input if not explicitly provided.
    pub fn output_dir(&self) -> Option<PathBuf> {
        let input = self.input.as_ref()?;
        Some(
            self.output_dir
                .clone()
                .unwrap_or_else(|| default_output_dir(input)),
        )
    }
}

/// `<stem>_analysis` in the input's directory
pub fn default_output_dir(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    parent.join(format!("{}_analysis", stem))
}

fn parse_f64(s: &str) -> Result<f64, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for ratios in [0, 1]
fn validate_ratio(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!("value must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}

/// Validator for fractions strictly between 0 and 1
fn validate_open_unit(s: &str) -> Result<f64, String> {
    let value = parse_f64(s)?;
    if value <= 0.0 || value >= 1.0 {
        Err(format!("value must be between 0 and 1 (exclusive), got {}", value))
    } else {
        Ok(value)
    }
}

fn validate_delimiter(s: &str) -> Result<u8, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '\n' && c != '\r' => Ok(c as u8),
        _ => Err(format!(
            "delimiter must be a single ASCII character, got '{}'",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_dir() {
        let dir = default_output_dir(Path::new("/data/MachineLearningRating_v3.csv"));
        assert_eq!(dir, PathBuf::from("/data/MachineLearningRating_v3_analysis"));
    }

    #[test]
    fn test_validators() {
        assert_eq!(validate_ratio("0.9"), Ok(0.9));
        assert!(validate_ratio("1.5").is_err());
        assert!(validate_open_unit("0").is_err());
        assert!(validate_open_unit("abc").is_err());
        assert_eq!(validate_delimiter("|"), Ok(b'|'));
        assert_eq!(validate_delimiter("\t"), Ok(b'\t'));
        assert!(validate_delimiter("||").is_err());
        assert!(validate_delimiter("é").is_err());
    }

    #[test]
    fn test_parse_convert_subcommand() {
        let cli = Cli::try_parse_from(["claimlens", "convert", "raw.txt", "--delimiter", ";"]).unwrap();
        match cli.command {
            Some(Commands::Convert { delimiter, output, encoding, .. }) => {
                assert_eq!(delimiter, b';');
                assert!(output.is_none());
                assert_eq!(encoding, "utf-8");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_overrides_are_optional() {
        let cli = Cli::try_parse_from(["claimlens", "-i", "data.csv", "-vv"]).unwrap();
        assert!(cli.missing_threshold.is_none());
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output_dir(), Some(PathBuf::from("data_analysis")));
    }
}
