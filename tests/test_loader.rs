//! Tests for dataset loading and saving

mod common;

use claimlens::pipeline::{
    clean_insurance_data, get_column_names, load_dataset, load_dataset_with_stats, save_dataset,
    DEFAULT_MISSING_THRESHOLD,
};
use common::{create_small_policy_dataframe, create_temp_csv, create_temp_parquet};
use polars::prelude::*;
use tempfile::TempDir;

#[test]
fn test_load_csv() {
    let mut df = create_small_policy_dataframe();
    let (_temp_dir, path) = create_temp_csv(&mut df);

    let loaded = load_dataset(&path, 1000).unwrap();
    assert_eq!(loaded.shape(), df.shape());
    assert_eq!(
        loaded.column("TotalPremium").unwrap().dtype(),
        &DataType::Float64
    );
}

#[test]
fn test_load_parquet() {
    let mut df = create_small_policy_dataframe();
    let (_temp_dir, path) = create_temp_parquet(&mut df);

    let (loaded, rows, cols, memory_mb) = load_dataset_with_stats(&path, 1000).unwrap();
    assert_eq!((rows, cols), (6, 9));
    assert!(memory_mb > 0.0);
    assert!(loaded.equals_missing(&df));
}

#[test]
fn test_decimal_claims_after_inference_window_are_kept() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("claims.csv");
    let mut content = String::from("TotalPremium,TotalClaims\n");
    content.push_str(&"100,0\n".repeat(10_000));
    content.push_str("100,512.75\n");
    std::fs::write(&path, content).unwrap();

    let df = load_dataset(&path, 10_000).unwrap();
    let claims = df.column("TotalClaims").unwrap();
    assert_eq!(claims.dtype(), &DataType::Float64);
    assert_eq!(claims.null_count(), 0);
    assert_eq!(claims.f64().unwrap().get(10_000), Some(512.75));

    let (cleaned, report) = clean_insurance_data(&df, DEFAULT_MISSING_THRESHOLD, false).unwrap();
    assert_eq!(report.removed_negative_rows, 0);
    assert_eq!(cleaned.height(), 10_001);
}

#[test]
fn test_late_type_change_rereads_full_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("postal.csv");
    std::fs::write(
        &path,
        "PostalCode,TotalPremium\n1000,1.5\n2000,2.5\n3000,3\nX12,4\n",
    )
    .unwrap();

    // the first two rows suggest an integer column
    let df = load_dataset(&path, 2).unwrap();
    let postal = df.column("PostalCode").unwrap();
    assert_eq!(postal.dtype(), &DataType::String);
    assert_eq!(postal.null_count(), 0);
    assert_eq!(df.column("TotalPremium").unwrap().dtype(), &DataType::Float64);
}

#[test]
fn test_malformed_amount_fails_to_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dirty.csv");
    std::fs::write(&path, "TotalPremium,TotalClaims\n1.5,0\n2.5,0\nabc,1\n").unwrap();

    let err = load_dataset(&path, 2).unwrap_err();
    assert!(err.to_string().contains("dirty.csv"));
}

#[test]
fn test_get_column_names_reads_schema() {
    let mut df = create_small_policy_dataframe();
    let (_temp_dir, path) = create_temp_csv(&mut df);

    let names = get_column_names(&path).unwrap();
    assert_eq!(names.first().map(String::as_str), Some("UnderwrittenCoverID"));
    assert!(names.contains(&"TotalClaims".to_string()));
}

#[test]
fn test_unsupported_format_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.xlsx");
    std::fs::write(&path, "x").unwrap();

    let err = load_dataset(&path, 100).unwrap_err();
    assert!(err.to_string().contains("Unsupported file format"));
}

#[test]
fn test_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    assert!(load_dataset(&temp_dir.path().join("absent.csv"), 100).is_err());
}

#[test]
fn test_save_then_load_csv() {
    let mut df = create_small_policy_dataframe();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cleaned.csv");

    save_dataset(&mut df, &path).unwrap();
    let loaded = load_dataset(&path, 1000).unwrap();
    assert_eq!(loaded.shape(), df.shape());

    let err = save_dataset(&mut df, &temp_dir.path().join("cleaned.json")).unwrap_err();
    assert!(err.to_string().contains("Unsupported output format"));
}
