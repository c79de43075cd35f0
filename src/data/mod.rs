//! Data layer: core types, snapshot and cache I/O, snapshot timestamps.
//!
//! Architecture:
//! ```text
//!  snapshot .txt / .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐     ┌───────────┐
//!   │  loader   │     │ timestamp │  identity → date, time of day
//!   └──────────┘     └───────────┘
//!        │                 │
//!        ▼                 ▼
//!   ┌─────────────────────────────┐
//!   │ model: DetectedPeak,         │
//!   │        SnapshotStamp,        │
//!   │        DriftRecord           │
//!   └─────────────────────────────┘
//!        │
//!        ▼
//!   drift cache  <YYYYMMDD> <wavelength> <sigma>
//! ```

pub mod loader;
pub mod model;
pub mod timestamp;
