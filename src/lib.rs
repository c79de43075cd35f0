//! Tracks the drift of etalon calibration peaks across a time-ordered series of
//! peak-detection snapshots, and fits linear drift rates to single peaks and to
//! groups of peaks.

pub mod config;
pub mod data;
pub mod drift;
pub mod error;
pub mod synthetic;

pub use config::DriftConfig;
pub use data::timestamp::{FilenameStampParser, TimestampParser};
pub use drift::{GroupTracker, SinglePeakTracker, TrackerOptions, TrackerSpec};
pub use error::{DriftError, Result};
