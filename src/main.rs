//! Claimlens: Insurance Portfolio Analysis CLI
//!
//! Cleans a policy extract, explores loss ratios, tests segment hypotheses,
//! trains claim occurrence and severity models and explains them with SHAP.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use polars::prelude::DataFrame;

use claimlens::cli::{self, AnalysisConfig, Cli, Commands};
use claimlens::pipeline::columns::{has_column, GENDER, MAKE, MODEL, PROVINCE, VEHICLE_TYPE};
use claimlens::pipeline::{
    build_chart_data, check_missing_values, clean_insurance_data, claims_by_make_model,
    load_dataset_with_stats, loss_ratio_by_group, overall_loss_ratio, prepare_hypothesis_data,
    prepare_model_data, run_all_hypothesis_tests, run_severity_models, run_shap_analysis,
    save_dataset, summarize_data, train_claim_classifiers, GroupLossRatio,
};
use claimlens::report::{
    export_analysis_report, export_chart_data, export_hypothesis_csv, package_analysis_outputs,
    print_charts, print_classification_scores, print_dataset_summary, print_hypothesis_results,
    print_loss_ratios, print_make_models, print_missing_values, print_portfolio,
    print_severity_scores, AnalysisReportBuilder, AnalysisSummary, LossRatioSection,
    ReportBuilderParams, CHARTS_FILE, CLEANED_FILE, HYPOTHESIS_CSV_FILE, REPORT_FILE,
};
use claimlens::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
    print_warning,
};

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Handle subcommands
    if let Some(command) = &cli.command {
        return match command {
            Commands::Convert {
                input,
                output,
                delimiter,
                encoding,
            } => cli::run_convert(input, output.as_deref(), *delimiter, encoding),
            Commands::Summarize {
                input,
                infer_schema_length,
            } => cli::run_summarize(input, *infer_schema_length),
        };
    }

    // Main analysis pipeline - require input
    let input = cli.input.clone().ok_or_else(|| {
        anyhow::anyhow!("Input file is required. Use -i/--input to specify a file.")
    })?;
    let output_dir = cli.output_dir().unwrap_or_else(|| PathBuf::from("analysis"));
    let config = AnalysisConfig::resolve(&cli)?;

    if output_dir.exists()
        && !cli.no_confirm
        && console::user_attended()
        && !cli::confirm_overwrite(&output_dir)?
    {
        println!("Cancelled by user.");
        return Ok(());
    }
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&input, &output_dir, &config);

    run_analysis(&cli, &config, &input, &output_dir)?;

    print_completion(&output_dir);
    Ok(())
}

fn run_analysis(cli: &Cli, config: &AnalysisConfig, input: &Path, output_dir: &Path) -> Result<()> {
    let mut builder = AnalysisReportBuilder::new(ReportBuilderParams {
        input_file: input.display().to_string(),
        output_dir: output_dir.display().to_string(),
        settings: serde_json::to_value(config).context("Failed to serialize configuration")?,
    });

    // Step 1: Load
    print_step_header(1, "Load & Summarize");
    let step_start = Instant::now();
    let spinner = create_spinner("Loading dataset...");
    let (df, rows, _, _) = load_dataset_with_stats(input, cli.infer_schema_length)?;
    finish_with_success(&spinner, "Dataset loaded");

    let dataset = summarize_data(&df).context("Failed to summarize dataset")?;
    print_dataset_summary(&dataset);
    print_missing_values(&check_missing_values(&df), rows);
    builder.set_dataset(dataset);

    let mut summary = AnalysisSummary::new(rows);
    summary.load_time = step_start.elapsed();
    print_step_time(summary.load_time);

    // Step 2: Cleaning
    print_step_header(2, "Data Cleaning");
    let step_start = Instant::now();
    let (mut cleaned, cleaning) =
        clean_insurance_data(&df, config.missing_threshold, cli.verbose > 0)
            .context("Failed to clean dataset")?;
    drop(df);

    if cleaning.dropped_columns.is_empty() {
        print_info("No columns exceed the missing value threshold");
    } else {
        print_count(
            "column(s) with high missing values",
            cleaning.dropped_columns.len(),
            Some(&format!("(>{:.1}%)", config.missing_threshold * 100.0)),
        );
    }
    if cleaning.removed_negative_rows > 0 {
        print_count(
            "row(s) with negative or missing amounts",
            cleaning.removed_negative_rows,
            Some("(removed)"),
        );
    }
    if cleaning.unparseable_dates > 0 {
        print_warning(&format!(
            "{} TransactionMonth value(s) could not be parsed",
            cleaning.unparseable_dates
        ));
    }
    print_success(&format!("{} rows ready for analysis", cleaning.rows_after));
    summary.add_cleaning(&cleaning);
    builder.set_cleaning(cleaning);
    summary.cleaning_time = step_start.elapsed();
    print_step_time(summary.cleaning_time);

    // Step 3: EDA
    print_step_header(3, "Loss Ratio Analysis");
    let step_start = Instant::now();
    let loss_ratios = explore_loss_ratios(&cleaned, config.top_n)?;
    if let Some(portfolio) = &loss_ratios.portfolio {
        print_portfolio(portfolio);
        summary.add_portfolio(portfolio);
    }
    print_loss_ratios(PROVINCE, &loss_ratios.by_province);
    print_loss_ratios(VEHICLE_TYPE, &loss_ratios.by_vehicle_type);
    print_loss_ratios(GENDER, &loss_ratios.by_gender);
    print_make_models("Top Make/Models by Total Claims", &loss_ratios.top_make_models);
    print_make_models("Bottom Make/Models by Total Claims", &loss_ratios.bottom_make_models);
    builder.set_loss_ratios(loss_ratios);

    let charts = build_chart_data(&cleaned).context("Failed to compute chart data")?;
    print_charts(&charts);
    summary.eda_time = step_start.elapsed();
    print_step_time(summary.eda_time);

    // Step 4: Hypothesis tests
    print_step_header(4, "Hypothesis Testing");
    let step_start = Instant::now();
    let spinner = create_spinner("Running segment tests...");
    let prepared = prepare_hypothesis_data(&cleaned).context("Failed to prepare hypothesis data")?;
    let hypothesis = run_all_hypothesis_tests(&prepared, &config.hypothesis_plan())
        .context("Failed to run hypothesis tests")?;
    drop(prepared);
    finish_with_success(&spinner, "Hypothesis tests complete");

    let rejected = hypothesis.rejected().count();
    print_hypothesis_results(&hypothesis);
    print_count(
        "test(s) rejecting the null hypothesis",
        rejected,
        Some(&format!("of {} tests", hypothesis.results.len())),
    );
    summary.add_hypothesis_results(hypothesis.results.len(), rejected);
    summary.hypothesis_time = step_start.elapsed();
    print_step_time(summary.hypothesis_time);

    let hypothesis_csv = output_dir.join(HYPOTHESIS_CSV_FILE);
    export_hypothesis_csv(&hypothesis, &hypothesis_csv)?;
    builder.set_hypothesis(hypothesis);

    // Steps 5 and 6: Models and SHAP
    if cli.skip_modeling {
        print_info("Modeling skipped (--skip-modeling)");
    } else {
        run_models(config, &cleaned, &mut builder, &mut summary)?;
    }

    // Step 7: Save
    print_step_header(7, "Save Results");
    let step_start = Instant::now();
    let spinner = create_spinner("Writing outputs...");
    let mut files = vec![hypothesis_csv];

    if !cli.no_cleaned {
        let path = output_dir.join(CLEANED_FILE);
        save_dataset(&mut cleaned, &path)?;
        files.push(path);
    }

    let charts_path = output_dir.join(CHARTS_FILE);
    export_chart_data(&charts, &charts_path)?;
    files.push(charts_path);

    summary.save_time = step_start.elapsed();
    builder.set_timing(&summary);
    let report_path = output_dir.join(REPORT_FILE);
    export_analysis_report(&builder.build(), &report_path)?;
    files.push(report_path);

    if cli.bundle {
        let stem = output_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("claimlens_analysis");
        let zip_path = output_dir.join(format!("{}.zip", stem));
        package_analysis_outputs(&files, &zip_path)?;
        finish_with_success(&spinner, &format!("Bundled to {}", zip_path.display()));
    } else {
        finish_with_success(&spinner, &format!("Saved to {}", output_dir.display()));
        for file in &files {
            println!("      {} {}", style("•").dim(), file.display());
        }
    }
    summary.save_time = step_start.elapsed();
    print_step_time(summary.save_time);

    summary.display();
    Ok(())
}

/// Portfolio loss ratio and its breakdowns, for the columns that are present
fn explore_loss_ratios(df: &DataFrame, top_n: usize) -> Result<LossRatioSection> {
    let mut section = LossRatioSection {
        portfolio: Some(overall_loss_ratio(df).context("Failed to compute portfolio loss ratio")?),
        ..Default::default()
    };

    let by_group = |column: &str| -> Result<Vec<GroupLossRatio>> {
        if has_column(df, column) {
            Ok(loss_ratio_by_group(df, column)
                .with_context(|| format!("Failed to compute loss ratio by {}", column))?)
        } else {
            log::warn!("column '{}' not present, skipping its loss ratio breakdown", column);
            Ok(Vec::new())
        }
    };
    section.by_province = by_group(PROVINCE)?;
    section.by_vehicle_type = by_group(VEHICLE_TYPE)?;
    section.by_gender = by_group(GENDER)?;

    if has_column(df, MAKE) && has_column(df, MODEL) {
        let (top, bottom) = claims_by_make_model(df, top_n)?;
        section.top_make_models = top;
        section.bottom_make_models = bottom;
    }
    Ok(section)
}

/// Train the claim models and explain the tree ensembles.
///
/// A model family that cannot be fitted on this data is reported and skipped.
fn run_models(
    config: &AnalysisConfig,
    cleaned: &DataFrame,
    builder: &mut AnalysisReportBuilder,
    summary: &mut AnalysisSummary,
) -> Result<()> {
    let settings = config.model_settings();

    print_step_header(5, "Claim Models");
    let step_start = Instant::now();
    let model_df = prepare_model_data(cleaned, &config.prepare_options())
        .context("Failed to prepare model data")?;
    print_info(&format!(
        "{} policies × {} columns after encoding",
        model_df.height(),
        model_df.width()
    ));

    let spinner = create_spinner("Training claim classifiers...");
    let classification = match train_claim_classifiers(&model_df, &settings) {
        Ok(run) => {
            finish_with_success(&spinner, "Claim classifiers trained");
            print_classification_scores(&run.scores);
            summary.models_trained += run.scores.len();
            builder.set_classification(run.scores.clone());
            Some(run)
        }
        Err(e) => {
            finish_with_warning(&spinner, &format!("Classification skipped: {}", e));
            log::warn!("classification failed: {}", e);
            None
        }
    };

    let spinner = create_spinner("Training severity models...");
    match run_severity_models(&model_df, &settings) {
        Ok(run) => {
            finish_with_success(&spinner, "Severity models trained");
            print_severity_scores(&run.scores);
            summary.models_trained += run.scores.len();
            builder.set_severity(run.scores);
        }
        Err(e) => {
            finish_with_warning(&spinner, &format!("Severity modeling skipped: {}", e));
            log::warn!("severity modeling failed: {}", e);
        }
    }
    summary.modeling_time = step_start.elapsed();
    print_step_time(summary.modeling_time);

    print_step_header(6, "SHAP Explanations");
    let step_start = Instant::now();
    match &classification {
        Some(run) => {
            let analyses = run_shap_analysis(
                &run.models.random_forest,
                &run.models.gradient_boosting,
                &run.x_test,
                config.shap_sample_size,
                config.shap_max_display,
                config.seed,
            );
            if analyses.is_empty() {
                print_warning("No SHAP values could be computed");
            }
            builder.set_shap(analyses);
        }
        None => print_info("No fitted classifiers to explain"),
    }
    summary.shap_time = step_start.elapsed();
    print_step_time(summary.shap_time);

    Ok(())
}
