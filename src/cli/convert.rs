//! Delimited text to CSV conversion command

use std::path::Path;

use anyhow::Result;
use console::style;

use crate::pipeline::{convert_delimited_to_csv, default_csv_path};
use crate::utils::create_spinner;

fn file_size_mb(path: &Path) -> f64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0) as f64 / (1024.0 * 1024.0)
}

/// Convert a delimited extract to CSV
///
/// # Arguments
/// * `input` - Path to the delimited text file
/// * `output` - Optional output path. If not provided, uses input path with .csv extension
/// * `delimiter` - Field delimiter of the input
/// * `encoding` - Text encoding label of the input
pub fn run_convert(input: &Path, output: Option<&Path>, delimiter: u8, encoding: &str) -> Result<()> {
    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => default_csv_path(input),
    };
    if output_path == input {
        anyhow::bail!(
            "Output path is the same as the input: {}",
            input.display()
        );
    }

    println!(
        "\n {} Converting delimited text to CSV",
        style("◆").cyan().bold()
    );
    println!("   Input:     {}", style(input.display()).dim());
    println!("   Output:    {}", style(output_path.display()).dim());
    println!("   Delimiter: {}", style(format!("{:?}", delimiter as char)).dim());
    println!("   Encoding:  {}", style(encoding).dim());
    println!();

    let spinner = create_spinner("Converting rows...");
    let stats = convert_delimited_to_csv(input, &output_path, delimiter, encoding)?;
    spinner.finish_with_message(format!("{} CSV written", style("✓").green()));

    println!();
    println!(
        "   {} rows × {} columns",
        style(stats.rows.saturating_sub(1)).yellow(),
        style(stats.columns).yellow()
    );
    println!("   {} File sizes:", style("✧").cyan());
    println!("      Text: {:.2} MB", file_size_mb(input));
    println!("      CSV:  {:.2} MB", file_size_mb(&output_path));

    if stats.had_decode_errors {
        println!(
            "   {}",
            style(format!(
                "⚠ Some bytes were not valid {} and were replaced",
                encoding
            ))
            .yellow()
        );
    }

    println!();
    println!(" {} Conversion complete!", style("✓").green().bold());

    Ok(())
}
