use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float32Array, Float64Array};
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{DetectedPeak, DriftRecord};
use super::timestamp::{format_yyyymmdd, parse_yyyymmdd};
use crate::error::{DriftError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the detected peaks of one snapshot.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – whitespace-delimited like plain text, unless the first data
///   row contains a comma, in which case `position,uncertainty` rows with an
///   optional header
/// * `.json`    – `[{ "position": ..., "uncertainty": ... }, ...]`
/// * `.parquet` – `position` and `uncertainty` float columns
/// * anything else – whitespace-delimited `<position> <uncertainty>` text
///
/// An empty snapshot is not an error; a malformed row is.
pub fn load_snapshot(path: &Path) -> Result<Vec<DetectedPeak>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let peaks = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "csv" => {
            let text = read_text(path)?;
            if first_data_row_has_comma(&text) {
                parse_csv(path, &text)?
            } else {
                parse_whitespace(path, &text)?
            }
        }
        "" | "txt" | "dat" | "mask" | "tsv" => parse_whitespace(path, &read_text(path)?)?,
        other => return Err(DriftError::UnsupportedExtension(other.to_string())),
    };

    debug!("Loaded {} peaks from {}", peaks.len(), path.display());
    Ok(peaks)
}

/// Read a drift cache: `<YYYYMMDD> <wavelength> <uncertainty>` per line.
///
/// A stored uncertainty of exactly `0` means "unknown" and is read as NaN.
pub fn read_drift_cache(path: &Path) -> Result<Vec<DriftRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| DriftError::io(path, e))?;

    let mut records = Vec::new();
    for (line_no, fields) in data_rows(&text) {
        if fields.len() != 3 {
            return Err(DriftError::malformed(
                path,
                line_no,
                format!("expected 3 columns, found {}", fields.len()),
            ));
        }
        let date = parse_yyyymmdd(fields[0]).map_err(|_| {
            DriftError::malformed(path, line_no, format!("'{}' is not a YYYYMMDD date", fields[0]))
        })?;
        let wavelength = parse_float(fields[1], path, line_no)?;
        let mut sigma = parse_float(fields[2], path, line_no)?;
        if sigma == 0.0 {
            sigma = f64::NAN;
        }
        records.push(DriftRecord {
            date,
            wavelength,
            sigma,
        });
    }

    Ok(records)
}

/// Write a drift cache, creating parent directories as needed.
pub fn write_drift_cache(path: &Path, records: &[DriftRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| DriftError::io(parent, e))?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_path(path)?;

    for rec in records {
        writer.write_record([
            format_yyyymmdd(rec.date),
            rec.wavelength.to_string(),
            rec.sigma.to_string(),
        ])?;
    }
    writer.flush().map_err(|e| DriftError::io(path, e))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Whitespace text loader
// ---------------------------------------------------------------------------

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| DriftError::io(path, e))
}

fn parse_whitespace(path: &Path, text: &str) -> Result<Vec<DetectedPeak>> {
    data_rows(text)
        .map(|(line_no, fields)| {
            if fields.len() != 2 {
                return Err(DriftError::malformed(
                    path,
                    line_no,
                    format!("expected 2 columns, found {}", fields.len()),
                ));
            }
            Ok(DetectedPeak::new(
                parse_float(fields[0], path, line_no)?,
                parse_float(fields[1], path, line_no)?,
            ))
        })
        .collect()
}

/// Non-blank, non-comment lines split on whitespace, with 1-based line numbers.
fn data_rows(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            None
        } else {
            Some((i + 1, line.split_whitespace().collect()))
        }
    })
}

fn parse_float(tok: &str, path: &Path, line: usize) -> Result<f64> {
    tok.parse::<f64>()
        .map_err(|_| DriftError::malformed(path, line, format!("'{tok}' is not a number")))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn first_data_row_has_comma(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .is_some_and(|line| line.contains(','))
}

/// CSV layout: two columns, position then uncertainty.  A first row that does
/// not parse as numbers is taken to be a header.
fn parse_csv(path: &Path, text: &str) -> Result<Vec<DetectedPeak>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());

    let mut peaks = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let line = record.position().map_or(row_no + 1, |p| p.line() as usize);

        if record.len() != 2 {
            return Err(DriftError::malformed(
                path,
                line,
                format!("expected 2 columns, found {}", record.len()),
            ));
        }

        let position = record[0].parse::<f64>();
        let uncertainty = record[1].parse::<f64>();
        match (position, uncertainty) {
            (Ok(p), Ok(u)) => peaks.push(DetectedPeak::new(p, u)),
            _ if row_no == 0 => continue,
            _ => {
                return Err(DriftError::malformed(
                    path,
                    line,
                    format!("'{}' / '{}' are not numbers", &record[0], &record[1]),
                ))
            }
        }
    }

    Ok(peaks)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<Vec<DetectedPeak>> {
    let text = std::fs::read_to_string(path).map_err(|e| DriftError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Expected schema: `position` and `uncertainty`, each Float64 or Float32.
/// Nulls are read as NaN.
fn load_parquet(path: &Path) -> Result<Vec<DetectedPeak>> {
    let file = std::fs::File::open(path).map_err(|e| DriftError::io(path, e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut peaks = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();

        let column = |name: &str| -> Result<Vec<f64>> {
            let idx = schema.index_of(name).map_err(|_| DriftError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })?;
            float_column(batch.column(idx), path, name)
        };

        let positions = column("position")?;
        let uncertainties = column("uncertainty")?;

        peaks.extend(
            positions
                .into_iter()
                .zip(uncertainties)
                .map(|(p, u)| DetectedPeak::new(p, u)),
        );
    }

    Ok(peaks)
}

fn float_column(col: &Arc<dyn Array>, path: &Path, name: &str) -> Result<Vec<f64>> {
    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        Ok(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else {
        Err(DriftError::malformed(
            path,
            0,
            format!("column '{name}' is {:?}, expected Float64 or Float32", col.data_type()),
        ))
    }
}
