//! Analysis report export: JSON report, chart data, hypothesis CSV and zip bundle

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::summary::AnalysisSummary;
use crate::pipeline::{
    ChartData, ClassifierScore, CleaningReport, DatasetSummary, GroupLossRatio, HypothesisReport,
    MakeModelClaims, PortfolioMetrics, RegressorScore, ShapAnalysis,
};

pub const REPORT_FILE: &str = "analysis_report.json";
pub const CHARTS_FILE: &str = "charts.json";
pub const HYPOTHESIS_CSV_FILE: &str = "hypothesis_results.csv";
pub const CLEANED_FILE: &str = "cleaned.csv";

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub claimlens_version: String,
    pub input_file: String,
    pub output_dir: String,
    /// Effective configuration of the run
    pub settings: serde_json::Value,
}

/// Timing information in milliseconds
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingInfo {
    pub load_ms: u64,
    pub cleaning_ms: u64,
    pub eda_ms: u64,
    pub hypothesis_ms: u64,
    pub modeling_ms: u64,
    pub shap_ms: u64,
    pub save_ms: u64,
    pub total_ms: u64,
}

/// Loss-ratio breakdowns of the cleaned portfolio
#[derive(Debug, Clone, Default, Serialize)]
pub struct LossRatioSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<PortfolioMetrics>,
    pub by_province: Vec<GroupLossRatio>,
    pub by_vehicle_type: Vec<GroupLossRatio>,
    pub by_gender: Vec<GroupLossRatio>,
    pub top_make_models: Vec<MakeModelClaims>,
    pub bottom_make_models: Vec<MakeModelClaims>,
}

/// Claim models and their explanations
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelingSection {
    pub classification: Vec<ClassifierScore>,
    pub severity: Vec<RegressorScore>,
    pub shap: Vec<ShapAnalysis>,
}

/// Complete analysis report
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaning: Option<CleaningReport>,
    pub loss_ratios: LossRatioSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<HypothesisReport>,
    pub modeling: ModelingSection,
    pub timing: TimingInfo,
}

/// Parameters for creating an AnalysisReportBuilder
pub struct ReportBuilderParams {
    pub input_file: String,
    pub output_dir: String,
    pub settings: serde_json::Value,
}

/// Builder for constructing the analysis report during pipeline execution
pub struct AnalysisReportBuilder {
    params: ReportBuilderParams,
    dataset: Option<DatasetSummary>,
    cleaning: Option<CleaningReport>,
    loss_ratios: LossRatioSection,
    hypothesis: Option<HypothesisReport>,
    modeling: ModelingSection,
    timing: TimingInfo,
}

impl AnalysisReportBuilder {
    pub fn new(params: ReportBuilderParams) -> Self {
        Self {
            params,
            dataset: None,
            cleaning: None,
            loss_ratios: LossRatioSection::default(),
            hypothesis: None,
            modeling: ModelingSection::default(),
            timing: TimingInfo::default(),
        }
    }

    pub fn set_dataset(&mut self, summary: DatasetSummary) {
        self.dataset = Some(summary);
    }

    pub fn set_cleaning(&mut self, report: CleaningReport) {
        self.cleaning = Some(report);
    }

    pub fn set_loss_ratios(&mut self, section: LossRatioSection) {
        self.loss_ratios = section;
    }

    pub fn set_hypothesis(&mut self, report: HypothesisReport) {
        self.hypothesis = Some(report);
    }

    pub fn set_classification(&mut self, scores: Vec<ClassifierScore>) {
        self.modeling.classification = scores;
    }

    pub fn set_severity(&mut self, scores: Vec<RegressorScore>) {
        self.modeling.severity = scores;
    }

    pub fn set_shap(&mut self, analyses: Vec<ShapAnalysis>) {
        self.modeling.shap = analyses;
    }

    /// Set timing information from the AnalysisSummary
    pub fn set_timing(&mut self, summary: &AnalysisSummary) {
        self.timing = TimingInfo {
            load_ms: summary.load_time.as_millis() as u64,
            cleaning_ms: summary.cleaning_time.as_millis() as u64,
            eda_ms: summary.eda_time.as_millis() as u64,
            hypothesis_ms: summary.hypothesis_time.as_millis() as u64,
            modeling_ms: summary.modeling_time.as_millis() as u64,
            shap_ms: summary.shap_time.as_millis() as u64,
            save_ms: summary.save_time.as_millis() as u64,
            total_ms: summary.total_time().as_millis() as u64,
        };
    }

    pub fn build(self) -> AnalysisReport {
        AnalysisReport {
            metadata: ReportMetadata {
                timestamp: Utc::now().to_rfc3339(),
                claimlens_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: self.params.input_file,
                output_dir: self.params.output_dir,
                settings: self.params.settings,
            },
            dataset: self.dataset,
            cleaning: self.cleaning,
            loss_ratios: self.loss_ratios,
            hypothesis: self.hypothesis,
            modeling: self.modeling,
            timing: self.timing,
        }
    }
}

/// Export the analysis report to a JSON file
pub fn export_analysis_report(report: &AnalysisReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize analysis report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write analysis report to {}", output_path.display()))?;

    Ok(())
}

/// Export the chart data to a JSON file
pub fn export_chart_data(charts: &ChartData, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(charts).context("Failed to serialize chart data to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write chart data to {}", output_path.display()))?;

    Ok(())
}

/// Export one row per hypothesis test, adjusted p-value and decision included
pub fn export_hypothesis_csv(report: &HypothesisReport, output_path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(output_path)
        .with_context(|| format!("Failed to create CSV file: {}", output_path.display()))?;

    writeln!(
        file,
        "test,metric,segment,group_a,group_b,n_a,n_b,statistic,dof,p_value,p_value_adjusted,reject_null"
    )?;

    for r in &report.results {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{:.6},{:.4},{:.6},{},{}",
            r.test,
            r.metric,
            escape_csv_field(&r.segment),
            escape_csv_field(&r.group_a),
            escape_csv_field(&r.group_b),
            r.n_a,
            r.n_b,
            r.statistic,
            r.dof,
            r.p_value,
            r.p_value_adjusted.map(|p| format!("{:.6}", p)).unwrap_or_default(),
            r.reject_null.map(|b| b.to_string()).unwrap_or_default()
        )?;
    }

    Ok(())
}

/// Escape a field for CSV (handle commas and quotes)
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Package output files into a zip archive and remove the originals
pub fn package_analysis_outputs(files: &[PathBuf], zip_path: &Path) -> Result<()> {
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let zip_file = std::fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file: {}", zip_path.display()))?;

    let mut zip = ZipWriter::new(zip_file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?;
        zip.start_file(filename, options)
            .with_context(|| format!("Failed to add {} to zip", filename))?;
        let mut content = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .read_to_end(&mut content)?;
        zip.write_all(&content)?;
    }

    zip.finish().context("Failed to finalize zip file")?;

    // Remove the individual files after packaging
    for path in files {
        std::fs::remove_file(path).ok();
    }

    Ok(())
}
