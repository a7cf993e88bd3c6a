//! Terminal tables for the analysis steps

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::pipeline::{
    ClassifierScore, DatasetSummary, GroupLossRatio, HypothesisReport, MakeModelClaims,
    PortfolioMetrics, RegressorScore,
};

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn number(value: f64, decimals: usize) -> Cell {
    Cell::new(format!("{:.*}", decimals, value)).set_alignment(CellAlignment::Right)
}

fn optional(value: Option<f64>, decimals: usize) -> Cell {
    match value {
        Some(v) => number(v, decimals),
        None => Cell::new("-").set_alignment(CellAlignment::Right),
    }
}

fn print_indented(title: &str, table: &Table) {
    println!();
    println!("      {}", style(title).white().bold());
    for line in table.to_string().lines() {
        println!("      {}", line);
    }
}

/// Column types and non-null counts followed by descriptive statistics
pub fn dataset_summary_table(summary: &DatasetSummary) -> (Table, Table) {
    let mut info = new_table(&["Column", "Type", "Non-Null"]);
    for column in &summary.column_info {
        let color = if column.non_null < summary.rows {
            Color::Yellow
        } else {
            Color::White
        };
        info.add_row(vec![
            Cell::new(&column.name),
            Cell::new(&column.dtype).fg(Color::DarkGrey),
            Cell::new(column.non_null).fg(color).set_alignment(CellAlignment::Right),
        ]);
    }

    let mut describe = new_table(&["Column", "Count", "Mean", "Std", "Min", "25%", "50%", "75%", "Max"]);
    for s in &summary.describe {
        describe.add_row(vec![
            Cell::new(&s.column),
            Cell::new(s.count).set_alignment(CellAlignment::Right),
            optional(s.mean, 2),
            optional(s.std, 2),
            optional(s.min, 2),
            optional(s.q25, 2),
            optional(s.median, 2),
            optional(s.q75, 2),
            optional(s.max, 2),
        ]);
    }
    (info, describe)
}

pub fn print_dataset_summary(summary: &DatasetSummary) {
    let (info, describe) = dataset_summary_table(summary);
    println!(
        "      {} rows × {} columns ({:.2} MB)",
        style(summary.rows).yellow(),
        style(summary.columns).yellow(),
        summary.memory_mb
    );
    print_indented("Data Info", &info);
    print_indented("Descriptive Stats", &describe);
}

/// Missing counts per column, largest first
pub fn missing_values_table(missing: &[(String, usize)], rows: usize) -> Table {
    let mut sorted: Vec<&(String, usize)> = missing.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut table = new_table(&["Column", "Missing", "Ratio"]);
    for (column, count) in sorted {
        let ratio = if rows > 0 {
            *count as f64 / rows as f64
        } else {
            0.0
        };
        table.add_row(vec![
            Cell::new(column),
            Cell::new(count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}%", ratio * 100.0))
                .fg(if ratio > 0.5 { Color::Red } else { Color::Yellow })
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn print_missing_values(missing: &[(String, usize)], rows: usize) {
    if missing.is_empty() {
        println!("      {}", style("No missing values").dim());
        return;
    }
    print_indented("Missing Values", &missing_values_table(missing, rows));
}

pub fn print_portfolio(metrics: &PortfolioMetrics) {
    let mut table = new_table(&["Metric", "Value"]);
    table.add_row(vec![Cell::new("Policies"), Cell::new(metrics.policies)]);
    table.add_row(vec![Cell::new("Total Premium"), number(metrics.total_premium, 2)]);
    table.add_row(vec![Cell::new("Total Claims"), number(metrics.total_claims, 2)]);
    table.add_row(vec![
        Cell::new("Loss Ratio"),
        number(metrics.loss_ratio, 4)
            .fg(if metrics.loss_ratio > 1.0 { Color::Red } else { Color::Green })
            .add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("Claim Frequency"), number(metrics.claim_frequency, 4)]);
    table.add_row(vec![Cell::new("Claim Severity"), optional(metrics.claim_severity, 2)]);
    print_indented("Portfolio", &table);
}

pub fn loss_ratio_table(group_name: &str, groups: &[GroupLossRatio]) -> Table {
    let mut table = new_table(&[group_name, "Total Claims", "Total Premium", "Loss Ratio"]);
    for g in groups {
        let color = if !g.loss_ratio.is_finite() {
            Color::DarkGrey
        } else if g.loss_ratio > 1.0 {
            Color::Red
        } else {
            Color::Green
        };
        table.add_row(vec![
            Cell::new(&g.group),
            number(g.total_claims, 2),
            number(g.total_premium, 2),
            number(g.loss_ratio, 4).fg(color),
        ]);
    }
    table
}

pub fn print_loss_ratios(group_name: &str, groups: &[GroupLossRatio]) {
    if groups.is_empty() {
        return;
    }
    print_indented(
        &format!("Loss Ratio by {}", group_name),
        &loss_ratio_table(group_name, groups),
    );
}

pub fn print_make_models(title: &str, rows: &[MakeModelClaims]) {
    if rows.is_empty() {
        return;
    }
    let mut table = new_table(&["Make", "Model", "Total Claims"]);
    for r in rows {
        table.add_row(vec![Cell::new(&r.make), Cell::new(&r.model), number(r.total_claims, 2)]);
    }
    print_indented(title, &table);
}

pub fn hypothesis_table(report: &HypothesisReport) -> Table {
    let mut table = new_table(&[
        "Test", "Metric", "Segment", "Groups", "Statistic", "p-value", "Adjusted", "Decision",
    ]);
    for r in &report.results {
        let decision = match r.reject_null {
            Some(true) => Cell::new("Reject H0").fg(Color::Red).add_attribute(Attribute::Bold),
            Some(false) => Cell::new("Fail to reject").fg(Color::Green),
            None => Cell::new("-"),
        };
        table.add_row(vec![
            Cell::new(r.test.to_string()),
            Cell::new(r.metric.to_string()),
            Cell::new(&r.segment),
            Cell::new(format!("{} vs {}", r.group_a, r.group_b)),
            number(r.statistic, 3),
            Cell::new(format!("{:.4e}", r.p_value)).set_alignment(CellAlignment::Right),
            match r.p_value_adjusted {
                Some(p) => Cell::new(format!("{:.4e}", p)).set_alignment(CellAlignment::Right),
                None => Cell::new("-"),
            },
            decision,
        ]);
    }
    table
}

pub fn print_hypothesis_results(report: &HypothesisReport) {
    for tiers in &report.tiers {
        println!(
            "      {} {}: high = [{}], low = [{}]",
            style("Risk tiers").cyan(),
            tiers.column,
            tiers.high.join(", "),
            tiers.low.join(", ")
        );
    }
    if report.results.is_empty() {
        println!("      {}", style("No test had enough data").yellow());
        return;
    }
    print_indented(
        &format!("Hypothesis Tests (BH-adjusted, alpha = {})", report.alpha),
        &hypothesis_table(report),
    );
}

pub fn classification_table(scores: &[ClassifierScore]) -> Table {
    let mut table = new_table(&["Model", "Accuracy", "Precision", "Recall", "F1", "ROC-AUC"]);
    for s in scores {
        let m = &s.metrics;
        table.add_row(vec![
            Cell::new(&s.model).add_attribute(Attribute::Bold),
            number(m.accuracy, 4),
            number(m.precision, 4),
            number(m.recall, 4),
            number(m.f1, 4),
            optional(m.roc_auc, 4),
        ]);
    }
    table
}

pub fn print_classification_scores(scores: &[ClassifierScore]) {
    print_indented("Claim Classification", &classification_table(scores));
    for s in scores {
        let [[tn, fp], [fn_, tp]] = s.metrics.confusion_matrix;
        println!(
            "      {} {:<20} TN {:>6}  FP {:>6}  FN {:>6}  TP {:>6}",
            style("•").dim(),
            s.model,
            tn,
            fp,
            fn_,
            tp
        );
    }
}

pub fn severity_table(scores: &[RegressorScore]) -> Table {
    let mut table = new_table(&["Model", "RMSE", "R²"]);
    for s in scores {
        table.add_row(vec![
            Cell::new(&s.model).add_attribute(Attribute::Bold),
            number(s.evaluation.rmse, 2),
            number(s.evaluation.r2, 4).fg(if s.evaluation.r2 < 0.0 {
                Color::Red
            } else {
                Color::White
            }),
        ]);
    }
    table
}

pub fn print_severity_scores(scores: &[RegressorScore]) {
    print_indented("Claim Severity", &severity_table(scores));
}
