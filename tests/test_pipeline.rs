//! End-to-end tests of the claimlens binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn claimlens() -> Command {
    Command::cargo_bin("claimlens").unwrap()
}

/// Small model settings so a full run stays quick
const FAST_MODELS: [&str; 6] = ["--n-estimators", "5", "--boosting-rounds", "10", "--max-depth", "4"];

fn read_report(dir: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(dir.join("analysis_report.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    claimlens()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("summarize"))
        .stdout(predicate::str::contains("--skip-modeling"));
}

#[test]
fn test_missing_input_fails() {
    claimlens()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file is required"));
}

#[test]
fn test_convert_subcommand() {
    let (dir, txt) = create_temp_text(
        "policies.txt",
        b"PostalCode|Province|TotalPremium\n0122|Gauteng|10.5\n7100|Western Cape|3\n",
    );

    claimlens()
        .args(["convert", txt.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Conversion complete"));

    let csv = std::fs::read_to_string(dir.path().join("policies.csv")).unwrap();
    assert!(csv.starts_with("PostalCode,Province,TotalPremium"));
    assert!(csv.contains("0122,Gauteng,10.5"));
}

#[test]
fn test_summarize_subcommand() {
    let mut df = create_small_policy_dataframe();
    let (_dir, csv) = create_temp_csv(&mut df);

    claimlens()
        .args(["summarize", "-i", csv.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("TotalPremium"))
        .stdout(predicate::str::contains("NumberOfVehiclesInFleet"));
}

#[test]
fn test_full_analysis_writes_outputs() {
    let mut df = create_policy_dataframe(300, 9);
    let (dir, csv) = create_temp_csv(&mut df);
    let out = dir.path().join("run");

    claimlens()
        .args(["-i", csv.to_str().unwrap(), "-o", out.to_str().unwrap(), "--no-confirm"])
        .args(FAST_MODELS)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hypothesis Testing"))
        .stdout(predicate::str::contains("SHAP"));

    for file in ["analysis_report.json", "charts.json", "cleaned.csv", "hypothesis_results.csv"] {
        assert!(out.join(file).exists(), "{} was not written", file);
    }

    let report = read_report(&out);
    assert_eq!(report["dataset"]["rows"], 300);
    assert_eq!(report["loss_ratios"]["by_province"].as_array().unwrap().len(), 3);
    assert!(!report["hypothesis"]["results"].as_array().unwrap().is_empty());
    assert_eq!(report["modeling"]["classification"].as_array().unwrap().len(), 3);
    assert_eq!(report["modeling"]["severity"].as_array().unwrap().len(), 3);
    assert_eq!(report["modeling"]["shap"].as_array().unwrap().len(), 2);
    assert_eq!(report["metadata"]["settings"]["n_estimators"], 5);

    let charts: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("charts.json")).unwrap()).unwrap();
    assert_eq!(charts["claims_by_month"].as_array().unwrap().len(), 12);
}

#[test]
fn test_skip_modeling_and_no_cleaned() {
    let mut df = create_policy_dataframe(200, 4);
    let (dir, csv) = create_temp_csv(&mut df);
    let out = dir.path().join("eda_only");

    claimlens()
        .args(["-i", csv.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .args(["--no-confirm", "--skip-modeling", "--no-cleaned"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Modeling skipped"));

    assert!(!out.join("cleaned.csv").exists());
    let report = read_report(&out);
    assert!(report["modeling"]["classification"].as_array().unwrap().is_empty());
    assert!(report["modeling"]["shap"].as_array().unwrap().is_empty());
}

#[test]
fn test_bundle_packages_outputs() {
    let mut df = create_policy_dataframe(200, 6);
    let (dir, csv) = create_temp_csv(&mut df);
    let out = dir.path().join("bundled");

    claimlens()
        .args(["-i", csv.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .args(["--no-confirm", "--skip-modeling", "--bundle"])
        .assert()
        .success();

    assert!(out.join("bundled.zip").exists());
    assert!(!out.join("analysis_report.json").exists(), "bundled files are removed");
    assert!(!out.join("charts.json").exists());
}

#[test]
fn test_invalid_config_is_reported() {
    let mut df = create_small_policy_dataframe();
    let (dir, csv) = create_temp_csv(&mut df);
    let config = dir.path().join("claimlens.toml");
    std::fs::write(&config, "not_a_setting = 1\n").unwrap();

    claimlens()
        .args(["-i", csv.to_str().unwrap(), "-c", config.to_str().unwrap(), "--no-confirm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
}
