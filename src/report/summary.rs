//! Run summary with step timings

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{CleaningReport, PortfolioMetrics};

/// What the analysis run did and how long each step took
#[derive(Debug, Default)]
pub struct AnalysisSummary {
    pub rows_loaded: usize,
    pub rows_analyzed: usize,
    pub dropped_columns: Vec<String>,
    pub loss_ratio: Option<f64>,
    pub tests_run: usize,
    pub tests_rejected: usize,
    pub models_trained: usize,
    pub load_time: Duration,
    pub cleaning_time: Duration,
    pub eda_time: Duration,
    pub hypothesis_time: Duration,
    pub modeling_time: Duration,
    pub shap_time: Duration,
    pub save_time: Duration,
}

impl AnalysisSummary {
    pub fn new(rows_loaded: usize) -> Self {
        Self {
            rows_loaded,
            rows_analyzed: rows_loaded,
            ..Default::default()
        }
    }

    pub fn add_cleaning(&mut self, report: &CleaningReport) {
        self.rows_analyzed = report.rows_after;
        self.dropped_columns = report.dropped_columns.clone();
    }

    pub fn add_portfolio(&mut self, metrics: &PortfolioMetrics) {
        self.loss_ratio = Some(metrics.loss_ratio);
    }

    pub fn add_hypothesis_results(&mut self, run: usize, rejected: usize) {
        self.tests_run = run;
        self.tests_rejected = rejected;
    }

    pub fn total_time(&self) -> Duration {
        self.load_time
            + self.cleaning_time
            + self.eda_time
            + self.hypothesis_time
            + self.modeling_time
            + self.shap_time
            + self.save_time
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("ANALYSIS SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![Cell::new("📁 Rows Loaded"), Cell::new(self.rows_loaded)]);
        table.add_row(vec![
            Cell::new("🧹 Rows After Cleaning"),
            Cell::new(self.rows_analyzed).fg(if self.rows_analyzed < self.rows_loaded {
                Color::Yellow
            } else {
                Color::White
            }),
        ]);
        table.add_row(vec![
            Cell::new("🗑️  Sparse Columns Dropped"),
            Cell::new(self.dropped_columns.len()).fg(if self.dropped_columns.is_empty() {
                Color::White
            } else {
                Color::Red
            }),
        ]);

        if let Some(lr) = self.loss_ratio {
            let color = if lr > 1.0 { Color::Red } else { Color::Green };
            table.add_row(vec![
                Cell::new("💰 Portfolio Loss Ratio"),
                Cell::new(format!("{:.4}", lr))
                    .fg(color)
                    .add_attribute(Attribute::Bold),
            ]);
        }

        table.add_row(vec![
            Cell::new("🧪 Hypotheses Rejected"),
            Cell::new(format!("{} / {}", self.tests_rejected, self.tests_run)).fg(Color::Cyan),
        ]);
        table.add_row(vec![Cell::new("🤖 Models Trained"), Cell::new(self.models_trained)]);

        // Indent the table
        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        println!();
        println!("    {} {}", style("⏱").cyan(), style("TIMINGS").white().bold());
        println!("    {}", style("─".repeat(50)).dim());

        let steps = [
            ("Load", self.load_time),
            ("Cleaning", self.cleaning_time),
            ("EDA & charts", self.eda_time),
            ("Hypothesis tests", self.hypothesis_time),
            ("Modeling", self.modeling_time),
            ("SHAP", self.shap_time),
            ("Save", self.save_time),
        ];
        for (name, elapsed) in steps {
            println!(
                "      {} {:<18} {}",
                style("•").dim(),
                name,
                style(format!("{:.2}s", elapsed.as_secs_f64())).dim()
            );
        }
        println!(
            "      {} {:<18} {}",
            style("•").dim(),
            style("Total").bold(),
            style(format!("{:.2}s", self.total_time().as_secs_f64())).green()
        );

        if !self.dropped_columns.is_empty() {
            println!();
            println!(
                "      {} {}:",
                style("Dropped for missingness").yellow(),
                style(format!("({})", self.dropped_columns.len())).dim()
            );
            for column in &self.dropped_columns {
                println!("        {} {}", style("•").dim(), column);
            }
        }
    }
}
