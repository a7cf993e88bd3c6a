//! Terminal styling for the analysis run

use console::{style, Emoji};
use std::path::Path;
use std::time::Duration;

use crate::cli::AnalysisConfig;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static DICE: Emoji<'_, '_> = Emoji("🎲 ", "");
pub static SCALES: Emoji<'_, '_> = Emoji("⚖️  ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
      ___ _      _   ___ __  __ _    ___ _  _ ___
     / __| |    /_\ |_ _|  \/  | |  | __| \| / __|
    | (__| |__ / _ \ | || |\/| | |__| _|| .` \__ \
     \___|____/_/ \_\___|_|  |_|____|___|_|\_|___/
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {} {}",
        style("◎").magenta().bold(),
        style("Loss ratios, segment tests and claim models").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print configuration card
pub fn print_config(input: &Path, output_dir: &Path, config: &AnalysisConfig) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(box_width - 20)
    );
    println!("    ├{}┤", line);
    println!("    │  {} Input:  {:<39}│", FOLDER, truncate_path(input, 38));
    println!("    │  {} Output: {:<39}│", SAVE, truncate_path(output_dir, 38));
    println!("    ├{}┤", line);
    println!(
        "    │  {} Missing threshold: {:<28}│",
        CHART,
        style(format!("{:.1}%", config.missing_threshold * 100.0)).yellow()
    );
    println!(
        "    │  {} Alpha (BH):        {:<28}│",
        SCALES,
        style(format!("{}", config.alpha)).yellow()
    );
    println!(
        "    │  {} Test size / seed:  {:<28}│",
        DICE,
        style(format!("{} / {}", config.test_size, config.seed)).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

pub fn print_step_time(elapsed: Duration) {
    println!(
        "      {}",
        style(format!("⏱ {:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Print the final completion message
pub fn print_completion(output_dir: &Path) {
    println!();
    println!(
        "    {} {} {}",
        ROCKET,
        style("Analysis complete!").green().bold(),
        style(format!("Outputs in {}", output_dir.display())).dim()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    if let Some(info) = detail {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(info).dim()
        );
    } else {
        println!("      Found {} {}", style(count).yellow().bold(), description);
    }
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    let path_str = path.display().to_string();
    truncate_string(&path_str, max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(len - max_len + 3).collect();
        format!("...{}", tail)
    }
}
