//! Drift tracking and fitting.
//!
//! ```text
//!  snapshots ──► tracking (fold) ──► SinglePeakTracker ──► fit / residuals
//!                                          │                    ▲
//!                                          ▼                    │
//!                                    drift cache ───────────────┘
//!
//!  SinglePeakTracker × N ──► GroupTracker ──► pooled fractional fit
//! ```

pub mod batch;
pub mod fit;
pub mod group;
pub mod peak;
pub mod smoothing;
pub mod tracking;

pub use batch::{build_trackers, reference_peaks_from_snapshot};
pub use fit::LinearModel;
pub use group::GroupTracker;
pub use peak::{
    choose_source, DriftFit, SeriesSource, SinglePeakTracker, TrackerOptions, TrackerSpec,
};
pub use smoothing::{SavitzkyGolay, Smoother};
