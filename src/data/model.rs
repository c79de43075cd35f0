use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DetectedPeak – one row of a detection snapshot
// ---------------------------------------------------------------------------

/// A single detected peak: fitted centre and its 1σ uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedPeak {
    pub position: f64,
    pub uncertainty: f64,
}

impl DetectedPeak {
    pub fn new(position: f64, uncertainty: f64) -> Self {
        Self {
            position,
            uncertainty,
        }
    }
}

// ---------------------------------------------------------------------------
// TimeOfDay / SnapshotStamp – what a snapshot's identity tells us
// ---------------------------------------------------------------------------

/// Calibration sequence a snapshot was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeOfDay {
    Morning,
    Evening,
    Night,
    Midnight,
}

impl TimeOfDay {
    /// Match a filename token such as `morn` or `eve`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "morn" | "morning" => Some(TimeOfDay::Morning),
            "eve" | "evening" => Some(TimeOfDay::Evening),
            "night" => Some(TimeOfDay::Night),
            "midnight" => Some(TimeOfDay::Midnight),
            _ => None,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            TimeOfDay::Morning => "morn",
            TimeOfDay::Evening => "eve",
            TimeOfDay::Night => "night",
            TimeOfDay::Midnight => "midnight",
        };
        write!(f, "{token}")
    }
}

/// Timestamp derived from a snapshot's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStamp {
    pub date: NaiveDate,
    pub time_of_day: Option<TimeOfDay>,
}

// ---------------------------------------------------------------------------
// DriftRecord – one row of a persisted drift cache
// ---------------------------------------------------------------------------

/// A matched point as stored in a drift cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftRecord {
    pub date: NaiveDate,
    pub wavelength: f64,
    /// NaN when the stored uncertainty was unknown (written as `0`).
    pub sigma: f64,
}

impl DriftRecord {
    pub fn is_valid(&self) -> bool {
        !self.wavelength.is_nan() && !self.sigma.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_tokens_round_trip() {
        for tod in [
            TimeOfDay::Morning,
            TimeOfDay::Evening,
            TimeOfDay::Night,
            TimeOfDay::Midnight,
        ] {
            assert_eq!(TimeOfDay::from_token(&tod.to_string()), Some(tod));
        }
        assert_eq!(TimeOfDay::from_token("EVE"), Some(TimeOfDay::Evening));
        assert_eq!(TimeOfDay::from_token("noon"), None);
    }

    #[test]
    fn record_validity_requires_both_values() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert!(DriftRecord { date, wavelength: 5000.0, sigma: 0.01 }.is_valid());
        assert!(!DriftRecord { date, wavelength: f64::NAN, sigma: 0.01 }.is_valid());
        assert!(!DriftRecord { date, wavelength: 5000.0, sigma: f64::NAN }.is_valid());
    }
}
