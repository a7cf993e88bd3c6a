//! Dataset overview command: info, descriptive statistics and missing values

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::pipeline::{check_missing_values, load_dataset_with_stats, summarize_data};
use crate::report::{print_dataset_summary, print_missing_values};
use crate::utils::{create_spinner, finish_with_success};

pub fn run_summarize(input: &Path, infer_schema_length: usize) -> Result<()> {
    println!(
        "\n {} Summarizing {}",
        style("◆").cyan().bold(),
        style(input.display()).dim()
    );

    let spinner = create_spinner("Loading dataset...");
    let (df, rows, _, _) = load_dataset_with_stats(input, infer_schema_length)?;
    finish_with_success(&spinner, "Dataset loaded");

    let summary = summarize_data(&df).context("Failed to summarize dataset")?;
    print_dataset_summary(&summary);
    print_missing_values(&check_missing_values(&df), rows);
    println!();

    Ok(())
}
