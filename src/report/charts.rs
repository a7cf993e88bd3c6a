//! Terminal rendering of the exploratory charts

use console::style;

use crate::pipeline::{BoxStats, ChartData, CorrelationMatrix, Histogram, MonthlyTotal};

const BAR_WIDTH: usize = 40;
/// Histogram bins are merged into this many rows for display
const DISPLAY_ROWS: usize = 10;

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round().clamp(0.0, BAR_WIDTH as f64) as usize;
    "█".repeat(len)
}

/// Histogram as horizontal bars, adjacent bins merged to keep it short
pub fn render_histogram(h: &Histogram) -> String {
    let chunk = h.bins.len().div_ceil(DISPLAY_ROWS).max(1);
    let rows: Vec<(f64, f64, usize)> = h
        .bins
        .chunks(chunk)
        .map(|c| (c[0].start, c[c.len() - 1].end, c.iter().map(|b| b.count).sum()))
        .collect();
    let max = rows.iter().map(|r| r.2).max().unwrap_or(0) as f64;

    let mut out = format!("      {}\n", style(format!("Distribution of {}", h.column)).white().bold());
    for (start, end, count) in rows {
        out.push_str(&format!(
            "      {:>12.1} – {:<12.1} {} {}\n",
            start,
            end,
            style(bar(count as f64, max)).cyan(),
            style(count).dim()
        ));
    }
    out
}

pub fn render_box_stats(b: &BoxStats) -> String {
    format!(
        "      {}\n      whiskers [{:.1}, {:.1}]  Q1 {:.1}  median {:.1}  Q3 {:.1}  range [{:.1}, {:.1}]  {} outlier(s)\n",
        style(format!("Outliers in {}", b.column)).white().bold(),
        b.lower_whisker,
        b.upper_whisker,
        b.q1,
        b.median,
        b.q3,
        b.min,
        b.max,
        style(b.outlier_count).yellow()
    )
}

pub fn render_monthly_claims(months: &[MonthlyTotal]) -> String {
    let max = months.iter().map(|m| m.total_claims).fold(0.0, f64::max);
    let mut out = format!("      {}\n", style("Total Claims Over Time").white().bold());
    for m in months {
        out.push_str(&format!(
            "      {} {} {:.0}\n",
            m.month,
            style(bar(m.total_claims, max)).magenta(),
            m.total_claims
        ));
    }
    out
}

/// Correlation grid with colored coefficients
pub fn render_correlation(m: &CorrelationMatrix) -> String {
    let width = m.columns.iter().map(|c| c.len()).max().unwrap_or(0).max(7);
    let mut out = format!("      {}\n", style("Correlation Matrix").white().bold());
    out.push_str(&format!("      {:width$}", "", width = width));
    for c in &m.columns {
        out.push_str(&format!(" {:>width$}", c, width = width));
    }
    out.push('\n');

    for (i, row) in m.values.iter().enumerate() {
        out.push_str(&format!("      {:<width$}", m.columns[i], width = width));
        for value in row {
            let cell = match value {
                Some(r) => {
                    let text = format!("{:>width$.2}", r, width = width);
                    if r.abs() >= 0.7 {
                        style(text).red().bold().to_string()
                    } else if r.abs() >= 0.3 {
                        style(text).yellow().to_string()
                    } else {
                        style(text).dim().to_string()
                    }
                }
                None => format!("{:>width$}", "-", width = width),
            };
            out.push(' ');
            out.push_str(&cell);
        }
        out.push('\n');
    }
    out
}

/// Print every chart present in `charts`
pub fn print_charts(charts: &ChartData) {
    for h in [&charts.claim_distribution, &charts.premium_distribution]
        .into_iter()
        .flatten()
    {
        println!();
        print!("{}", render_histogram(h));
    }

    if let Some(b) = &charts.custom_value_outliers {
        println!();
        print!("{}", render_box_stats(b));
    }

    if !charts.loss_ratio_by_province.is_empty() {
        let max = charts
            .loss_ratio_by_province
            .iter()
            .map(|g| g.loss_ratio)
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max);
        println!();
        println!("      {}", style("Loss Ratio by Province").white().bold());
        for g in &charts.loss_ratio_by_province {
            println!(
                "      {:<16} {} {:.3}",
                g.group,
                style(bar(g.loss_ratio, max)).green(),
                g.loss_ratio
            );
        }
    }

    if !charts.claims_by_month.is_empty() {
        println!();
        print!("{}", render_monthly_claims(&charts.claims_by_month));
    }

    if let Some(m) = &charts.correlation {
        println!();
        print!("{}", render_correlation(m));
    }

    if !charts.claims_vs_premium_by_postal_code.is_empty() {
        println!();
        println!(
            "      {} {} postal codes (exported to charts.json)",
            style("Claims vs Premium:").white().bold(),
            charts.claims_vs_premium_by_postal_code.len()
        );
    }
}
