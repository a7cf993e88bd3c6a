//! Dataset loading, saving and delimited-text conversion

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use polars::prelude::*;

use super::columns::{CUSTOM_VALUE_ESTIMATE, SUM_INSURED, TOTAL_CLAIMS, TOTAL_PREMIUM};

/// Default delimiter of the raw insurance extracts
pub const DEFAULT_DELIMITER: u8 = b'|';

/// Outcome of a delimited-text to CSV conversion
#[derive(Debug, Clone)]
pub struct ConversionStats {
    pub output_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    /// True when the input contained byte sequences invalid in its encoding
    pub had_decode_errors: bool,
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Monetary columns always read as Float64; a run of whole-number values at
/// the top of the file must not fix them to an integer type
pub const AMOUNT_COLUMNS: &[&str] = &[TOTAL_PREMIUM, TOTAL_CLAIMS, SUM_INSURED, CUSTOM_VALUE_ESTIMATE];

/// Float64 overrides for the amount columns present in a CSV header
fn amount_schema(path: &Path) -> Result<Option<SchemaRef>> {
    let header = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(0))
        .finish()
        .with_context(|| format!("Failed to load CSV file: {}", path.display()))?
        .collect_schema()
        .with_context(|| format!("Failed to read CSV header: {}", path.display()))?;

    let mut schema = Schema::default();
    for name in AMOUNT_COLUMNS {
        if header.contains(name) {
            schema.with_column((*name).into(), DataType::Float64);
        }
    }
    Ok((!schema.is_empty()).then(|| Arc::new(schema)))
}

/// Scan a dataset lazily (CSV or Parquet based on extension)
pub fn scan_dataset(path: &Path, infer_schema_length: usize) -> Result<LazyFrame> {
    let extension = file_extension(path);

    // 0 means full table scan
    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .with_dtype_overwrite(amount_schema(path)?)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    Ok(lf)
}

/// Load a dataset fully into memory.
///
/// A CSV whose later rows do not fit the schema inferred from the first
/// `infer_schema_length` rows is read again with inference over the whole file.
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    match scan_dataset(path, infer_schema_length)?.collect() {
        Ok(df) => Ok(df),
        Err(e) if infer_schema_length != 0 && file_extension(path) == "csv" => {
            log::warn!(
                "schema inferred from the first {} rows does not fit {} ({}); inferring over the full file",
                infer_schema_length,
                path.display(),
                e
            );
            scan_dataset(path, 0)?
                .collect()
                .with_context(|| format!("Failed to read dataset: {}", path.display()))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read dataset: {}", path.display())),
    }
}

/// Load a dataset and report its shape and estimated memory footprint
///
/// Returns `(df, rows, cols, memory_mb)`.
pub fn load_dataset_with_stats(
    path: &Path,
    infer_schema_length: usize,
) -> Result<(DataFrame, usize, usize, f64)> {
    let df = load_dataset(path, infer_schema_length)?;
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    log::info!(
        "loaded {}: {} rows x {} columns ({:.2} MB)",
        path.display(),
        rows,
        cols,
        memory_mb
    );
    Ok((df, rows, cols, memory_mb))
}

/// Column names from the dataset schema without reading the data
pub fn get_column_names(path: &Path) -> Result<Vec<String>> {
    let schema = scan_dataset(path, 1000)?
        .collect_schema()
        .with_context(|| format!("Failed to read schema: {}", path.display()))?;
    Ok(schema.iter_names().map(|n| n.to_string()).collect())
}

/// Save dataset to file (CSV or Parquet based on extension)
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = file_extension(path);

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}

/// Default CSV path for a delimited text input (same directory, `.csv` extension)
pub fn default_csv_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    parent.join(format!("{}.csv", stem))
}

/// Convert a delimited text file to a comma-separated CSV.
///
/// Every row (header included) is copied as text; no type inference happens,
/// so values such as postal codes keep their leading zeros. Inputs in a
/// non-UTF-8 encoding are transcoded first (`encoding` is a WHATWG label such
/// as `utf-8`, `windows-1252` or `latin1`). Rows shorter or longer than the
/// header are padded or truncated.
pub fn convert_delimited_to_csv(
    input: &Path,
    output: &Path,
    delimiter: u8,
    encoding: &str,
) -> Result<ConversionStats> {
    let encoding = Encoding::for_label(encoding.as_bytes())
        .ok_or_else(|| anyhow::anyhow!("Unknown text encoding: '{}'", encoding))?;

    let raw = std::fs::read(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;

    let (text, _, had_decode_errors) = encoding.decode(&raw);
    if had_decode_errors {
        log::warn!(
            "{} contains bytes invalid in {}; they were replaced",
            input.display(),
            encoding.name()
        );
    }

    let bytes = text.into_owned().into_bytes();
    let mut df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| {
            opts.with_separator(delimiter)
                .with_truncate_ragged_lines(true)
        })
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .with_context(|| format!("Failed to parse delimited file: {}", input.display()))?;

    let mut file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    CsvWriter::new(&mut file)
        .include_header(false)
        .finish(&mut df)
        .with_context(|| format!("Failed to write CSV file: {}", output.display()))?;

    let (rows, columns) = df.shape();
    log::info!(
        "converted {} -> {} ({} rows incl. header, {} columns)",
        input.display(),
        output.display(),
        rows,
        columns
    );

    Ok(ConversionStats {
        output_path: output.to_path_buf(),
        rows,
        columns,
        had_decode_errors,
    })
}
