//! Shared test utilities and fixture generators
#![allow(dead_code)]

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

pub const PROVINCES: [&str; 3] = ["Gauteng", "KwaZulu-Natal", "Western Cape"];
pub const ZONES: [&str; 5] = ["Zone 1", "Zone 2", "Zone 3", "Zone 4", "Zone 5"];
pub const MAKES: [(&str, &str); 4] = [
    ("TOYOTA", "QUANTUM"),
    ("MERCEDES-BENZ", "E 240"),
    ("NISSAN", "NP200"),
    ("VOLKSWAGEN", "POLO"),
];

/// Create a small policy frame with hand-checkable loss ratios
///
/// - Gauteng: premium 300, claims 150 (loss ratio 0.5)
/// - Western Cape: premium 100, claims 200 (loss ratio 2.0)
/// - one row with a negative premium, removed by cleaning
/// - `NumberOfVehiclesInFleet` is entirely missing
pub fn create_small_policy_dataframe() -> DataFrame {
    df! {
        "UnderwrittenCoverID" => [1i64, 2, 3, 4, 5, 6],
        "TransactionMonth" => ["2015-03-01 00:00:00", "2015-03-01 00:00:00", "2015-04-01 00:00:00",
                               "2015-05-01 00:00:00", "not a date", "2015-05-01 00:00:00"],
        "Province" => ["Gauteng", "Gauteng", "Gauteng", "Western Cape", "Western Cape", "Western Cape"],
        "Gender" => ["Male", "Female", "Male", "Female", "Male", "Not specified"],
        "make" => ["TOYOTA", "TOYOTA", "NISSAN", "NISSAN", "AUDI", "AUDI"],
        "Model" => ["QUANTUM", "QUANTUM", "NP200", "NP200", "A4", "A4"],
        "NumberOfVehiclesInFleet" => [None::<f64>, None, None, None, None, None],
        "TotalPremium" => [100.0f64, 100.0, 100.0, 50.0, 50.0, -10.0],
        "TotalClaims" => [0.0f64, 150.0, 0.0, 200.0, 0.0, 0.0],
    }
    .unwrap()
}

/// Create a deterministic synthetic portfolio large enough for tests and models
///
/// Claim probability depends on `SumInsured` and on the cresta zone, so the
/// claim models have signal to find and the zones split into risk tiers.
pub fn create_policy_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut cover_id = Vec::with_capacity(rows);
    let mut month = Vec::with_capacity(rows);
    let mut province = Vec::with_capacity(rows);
    let mut gender = Vec::with_capacity(rows);
    let mut postal_code = Vec::with_capacity(rows);
    let mut zone = Vec::with_capacity(rows);
    let mut vehicle_type = Vec::with_capacity(rows);
    let mut make = Vec::with_capacity(rows);
    let mut model = Vec::with_capacity(rows);
    let mut custom_value = Vec::with_capacity(rows);
    let mut sum_insured = Vec::with_capacity(rows);
    let mut fleet = Vec::with_capacity(rows);
    let mut premium = Vec::with_capacity(rows);
    let mut claims = Vec::with_capacity(rows);

    for i in 0..rows {
        let zone_idx = i % ZONES.len();
        let insured = rng.gen_range(50_000.0..500_000.0f64);
        let (mk, md) = MAKES[rng.gen_range(0..MAKES.len())];

        cover_id.push(i as i64);
        month.push(format!("2015-{:02}-01 00:00:00", i % 12 + 1));
        province.push(PROVINCES[i % PROVINCES.len()]);
        gender.push(if i % 23 == 0 {
            "Not specified"
        } else if i % 2 == 0 {
            "Male"
        } else {
            "Female"
        });
        postal_code.push(1000 + (i % 8) as i64);
        zone.push(ZONES[zone_idx]);
        vehicle_type.push(if i % 7 == 0 { "Medium Commercial" } else { "Passenger Vehicle" });
        make.push(mk);
        model.push(md);
        custom_value.push(if i % 3 == 0 { Some(insured * 0.8) } else { None });
        sum_insured.push(insured);
        fleet.push(None::<f64>);

        let p = 50.0 + insured / 2_000.0;
        premium.push(if i % 50 == 7 { 0.0 } else { p });

        let risk = 0.05 + 0.12 * zone_idx as f64 + 0.2 * (insured / 500_000.0);
        let claim = rng.gen_bool(risk.min(0.95));
        claims.push(if claim {
            insured * rng.gen_range(0.01..0.05)
        } else {
            0.0
        });
    }

    DataFrame::new(vec![
        Column::new("UnderwrittenCoverID".into(), cover_id),
        Column::new("TransactionMonth".into(), month),
        Column::new("Province".into(), province),
        Column::new("Gender".into(), gender),
        Column::new("PostalCode".into(), postal_code),
        Column::new("MainCrestaZone".into(), zone),
        Column::new("VehicleType".into(), vehicle_type),
        Column::new("make".into(), make),
        Column::new("Model".into(), model),
        Column::new("CustomValueEstimate".into(), custom_value),
        Column::new("SumInsured".into(), sum_insured),
        Column::new("NumberOfVehiclesInFleet".into(), fleet),
        Column::new("TotalPremium".into(), premium),
        Column::new("TotalClaims".into(), claims),
    ])
    .unwrap()
}

/// Create a DataFrame with specific missing value patterns
pub fn create_missing_test_dataframe() -> DataFrame {
    df! {
        "col_complete" => [1.0f64, 2.0, 3.0, 4.0, 5.0],
        "col_20pct_missing" => [Some(1.0f64), None, Some(3.0), Some(4.0), Some(5.0)], // 20% missing
        "col_40pct_missing" => [Some(1.0f64), Some(2.0), None, None, Some(5.0)], // 40% missing
        "col_all_missing" => [None::<f64>, None, None, None, None], // 100% missing
        "TotalPremium" => [10.0f64, 20.0, 30.0, 40.0, 50.0],
    }
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Write `content` to a file in a fresh temporary directory
pub fn create_temp_text(name: &str, content: &[u8]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (temp_dir, path)
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Assert that a DataFrame does NOT contain specific columns
pub fn assert_missing_columns(df: &DataFrame, unexpected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in unexpected_cols {
        assert!(
            !actual_cols.contains(&col.to_string()),
            "Unexpected column still present: '{}'",
            col
        );
    }
}
