//! Tests for cleaning and loss-ratio exploration

mod common;

use claimlens::pipeline::columns::{f64_values, LOSS_RATIO};
use claimlens::pipeline::{
    build_chart_data, calculate_loss_ratio, claims_by_make_model, clean_insurance_data,
    loss_ratio_by_group, overall_loss_ratio, summarize_data, DEFAULT_MISSING_THRESHOLD,
};
use common::{assert_has_columns, assert_missing_columns, create_policy_dataframe, create_small_policy_dataframe};
use polars::prelude::*;

fn cleaned_small() -> DataFrame {
    let df = create_small_policy_dataframe();
    clean_insurance_data(&df, DEFAULT_MISSING_THRESHOLD, false)
        .unwrap()
        .0
}

#[test]
fn test_cleaning_report() {
    let df = create_small_policy_dataframe();
    let (cleaned, report) = clean_insurance_data(&df, DEFAULT_MISSING_THRESHOLD, true).unwrap();

    assert_eq!(report.rows_before, 6);
    assert_eq!(report.rows_after, 5);
    assert_eq!(report.removed_negative_rows, 1);
    assert_eq!(report.unparseable_dates, 1);
    assert_eq!(report.dropped_columns, vec!["NumberOfVehiclesInFleet".to_string()]);
    assert_eq!(
        report.remaining_missing,
        vec![("TransactionMonth".to_string(), 1)]
    );

    assert_missing_columns(&cleaned, &["NumberOfVehiclesInFleet"]);
    assert_has_columns(&cleaned, &[LOSS_RATIO, "TotalPremium", "TotalClaims"]);
}

#[test]
fn test_lower_threshold_drops_more_columns() {
    let df = create_policy_dataframe(60, 1);
    let (_, report) = clean_insurance_data(&df, 0.5, false).unwrap();
    // CustomValueEstimate is present on every third row only
    assert!(report.dropped_columns.contains(&"CustomValueEstimate".to_string()));
    assert!(report.dropped_columns.contains(&"NumberOfVehiclesInFleet".to_string()));
}

#[test]
fn test_row_loss_ratio_after_cleaning() {
    let cleaned = cleaned_small();
    let ratios = f64_values(&cleaned, LOSS_RATIO).unwrap();
    assert_eq!(
        ratios,
        vec![Some(0.0), Some(1.5), Some(0.0), Some(4.0), Some(0.0)]
    );
}

#[test]
fn test_raw_loss_ratio_is_unguarded() {
    let df = df! {
        "TotalPremium" => [0.0f64, 10.0],
        "TotalClaims" => [5.0f64, 5.0],
    }
    .unwrap();
    let with_ratio = calculate_loss_ratio(&df).unwrap();
    let ratios = f64_values(&with_ratio, LOSS_RATIO).unwrap();
    assert!(ratios[0].unwrap().is_infinite());
    assert_eq!(ratios[1], Some(0.5));
}

#[test]
fn test_portfolio_metrics() {
    let metrics = overall_loss_ratio(&cleaned_small()).unwrap();
    assert_eq!(metrics.policies, 5);
    assert_eq!(metrics.total_premium, 400.0);
    assert_eq!(metrics.total_claims, 350.0);
    assert!((metrics.loss_ratio - 0.875).abs() < 1e-12);
    assert!((metrics.claim_frequency - 0.4).abs() < 1e-12);
    assert_eq!(metrics.claim_severity, Some(175.0));
}

#[test]
fn test_loss_ratio_by_province_sorted_descending() {
    let groups = loss_ratio_by_group(&cleaned_small(), "Province").unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].group, "Western Cape");
    assert!((groups[0].loss_ratio - 2.0).abs() < 1e-12);
    assert_eq!(groups[1].group, "Gauteng");
    assert!((groups[1].loss_ratio - 0.5).abs() < 1e-12);
}

#[test]
fn test_loss_ratio_by_missing_column_fails() {
    let err = loss_ratio_by_group(&cleaned_small(), "VehicleType").unwrap_err();
    assert!(err.to_string().contains("VehicleType"));
}

#[test]
fn test_claims_by_make_model() {
    let (top, bottom) = claims_by_make_model(&cleaned_small(), 2).unwrap();

    assert_eq!(top.len(), 2);
    assert_eq!((top[0].make.as_str(), top[0].total_claims), ("NISSAN", 200.0));
    assert_eq!((top[1].make.as_str(), top[1].total_claims), ("TOYOTA", 150.0));

    assert_eq!(bottom.len(), 2);
    assert_eq!((bottom[0].make.as_str(), bottom[0].total_claims), ("AUDI", 0.0));
    assert_eq!(bottom[1].make, "TOYOTA");
}

#[test]
fn test_summarize_data_describes_numeric_columns() {
    let summary = summarize_data(&create_small_policy_dataframe()).unwrap();
    assert_eq!(summary.rows, 6);
    assert_eq!(summary.columns, 9);
    assert_eq!(summary.column_info.len(), 9);

    let premium = summary
        .describe
        .iter()
        .find(|s| s.column == "TotalPremium")
        .unwrap();
    assert_eq!(premium.count, 6);
    assert_eq!(premium.min, Some(-10.0));
    assert_eq!(premium.max, Some(100.0));
    assert!(summary.describe.iter().all(|s| s.column != "Province"));
}

#[test]
fn test_chart_data_for_synthetic_portfolio() {
    let df = create_policy_dataframe(240, 3);
    let (cleaned, _) = clean_insurance_data(&df, DEFAULT_MISSING_THRESHOLD, false).unwrap();
    let charts = build_chart_data(&cleaned).unwrap();

    let claims = charts.claim_distribution.as_ref().unwrap();
    assert_eq!(claims.bins.len(), 50);
    assert_eq!(
        claims.bins.iter().map(|b| b.count).sum::<usize>(),
        cleaned.height()
    );

    assert_eq!(charts.loss_ratio_by_province.len(), 3);
    for pair in charts.loss_ratio_by_province.windows(2) {
        assert!(pair[0].loss_ratio <= pair[1].loss_ratio, "ascending for the bar chart");
    }

    assert_eq!(charts.claims_by_month.len(), 12);
    assert_eq!(charts.claims_vs_premium_by_postal_code.len(), 8);
    assert!(charts.custom_value_outliers.is_some());

    let corr = charts.correlation.as_ref().unwrap();
    assert_eq!(corr.columns.len(), 4);
    let premium_vs_insured = corr.get("TotalPremium", "SumInsured").unwrap();
    assert!(premium_vs_insured > 0.8, "premium is derived from the sum insured");
}
