use std::path::Path;

use chrono::NaiveDate;

use super::model::{SnapshotStamp, TimeOfDay};
use crate::error::{DriftError, Result};

/// Derives a snapshot's date (and time of day, when known) from its identity.
///
/// Implementations must be pure: the same identity always yields the same
/// stamp, and trackers for different peaks share one parser across threads.
pub trait TimestampParser: Send + Sync {
    fn parse(&self, identity: &str) -> Result<SnapshotStamp>;

    fn parse_path(&self, path: &Path) -> Result<SnapshotStamp> {
        self.parse(&path.to_string_lossy())
    }
}

/// Parses names like `20240215_morn_SCI2_etalon_wavelengths.csv`.
///
/// Only the file stem is inspected. It is split on `_`, `-` and `.`; the first
/// token of exactly eight digits is read as `YYYYMMDD` and the first token
/// naming a calibration sequence (`morn`, `eve`, `night`, `midnight`) becomes
/// the time of day.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilenameStampParser;

impl TimestampParser for FilenameStampParser {
    fn parse(&self, identity: &str) -> Result<SnapshotStamp> {
        let stem = Path::new(identity)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(identity);

        let tokens: Vec<&str> = stem.split(['_', '-', '.']).collect();

        let date = tokens
            .iter()
            .filter(|t| t.len() == 8 && t.bytes().all(|b| b.is_ascii_digit()))
            .find_map(|t| parse_yyyymmdd(t).ok())
            .ok_or_else(|| DriftError::Timestamp(identity.to_string()))?;

        let time_of_day = tokens.iter().find_map(|t| TimeOfDay::from_token(t));

        Ok(SnapshotStamp { date, time_of_day })
    }
}

/// Parse a compact `YYYYMMDD` date.
pub fn parse_yyyymmdd(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y%m%d").map_err(|_| DriftError::Timestamp(s.to_string()))
}

pub fn format_yyyymmdd(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
