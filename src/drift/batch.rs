use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use rayon::prelude::*;

use super::peak::{SinglePeakTracker, TrackerOptions, TrackerSpec};
use crate::data::loader::load_snapshot;
use crate::data::timestamp::TimestampParser;
use crate::error::Result;

/// Build one tracker per spec, in parallel.
///
/// Trackers share nothing but the read-only snapshot list and parser, so they
/// are constructed independently; the result keeps the order of `specs`.  Cache
/// paths must be distinct, since concurrent writes to one cache are not safe.
pub fn build_trackers(
    reference_identity: &str,
    snapshots: &[PathBuf],
    specs: Vec<TrackerSpec>,
    options: &TrackerOptions,
    parser: Arc<dyn TimestampParser>,
) -> Result<Vec<SinglePeakTracker>> {
    info!(
        "Building {} trackers over {} snapshots",
        specs.len(),
        snapshots.len()
    );

    specs
        .into_par_iter()
        .map(|spec| {
            SinglePeakTracker::new(
                reference_identity,
                spec,
                snapshots.to_vec(),
                options,
                Arc::clone(&parser),
            )
        })
        .collect()
}

/// One [`TrackerSpec`] per peak of a reference snapshot.
///
/// Peaks are taken in ascending position.  The local spacing of each is the
/// distance to its nearest neighbour; peaks with NaN positions are skipped and
/// repeated positions are tracked once.
/// `cache_dir`, when given, receives one cache per peak named by its
/// wavelength to two decimals.
pub fn reference_peaks_from_snapshot(
    path: &Path,
    cache_dir: Option<&Path>,
) -> Result<Vec<TrackerSpec>> {
    let mut positions: Vec<f64> = load_snapshot(path)?
        .into_iter()
        .map(|p| p.position)
        .filter(|p| !p.is_nan())
        .collect();
    positions.sort_by(f64::total_cmp);
    positions.dedup();

    let specs = positions
        .iter()
        .enumerate()
        .filter_map(|(i, &position)| {
            let left = i.checked_sub(1).map(|j| position - positions[j]);
            let right = positions.get(i + 1).map(|next| next - position);
            let spacing = match (left, right) {
                (Some(l), Some(r)) => l.min(r),
                (Some(d), None) | (None, Some(d)) => d,
                (None, None) => return None,
            };
            Some(TrackerSpec {
                reference_wavelength: position,
                local_spacing: spacing,
                cache_path: cache_dir.map(|dir| dir.join(format!("{position:.2}.txt"))),
            })
        })
        .collect();

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::timestamp::FilenameStampParser;

    #[test]
    fn spacing_is_distance_to_nearest_neighbour() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240215_morn.txt");
        std::fs::write(&path, "5100.0 0.01\n5000.0 0.01\nnan 0.01\n5030.0 0.01\n").unwrap();

        let specs = reference_peaks_from_snapshot(&path, Some(Path::new("/tmp/drift"))).unwrap();
        let summary: Vec<(f64, f64)> = specs
            .iter()
            .map(|s| (s.reference_wavelength, s.local_spacing))
            .collect();
        assert_eq!(summary, vec![(5000.0, 30.0), (5030.0, 30.0), (5100.0, 70.0)]);
        assert_eq!(
            specs[0].cache_path.as_deref(),
            Some(Path::new("/tmp/drift/5000.00.txt"))
        );
    }

    #[test]
    fn repeated_reference_positions_are_tracked_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240215_morn.txt");
        std::fs::write(&path, "5000.0 0.01\n5040.0 0.01\n5000.0 0.02\n").unwrap();

        let specs = reference_peaks_from_snapshot(&path, None).unwrap();
        let summary: Vec<(f64, f64)> = specs
            .iter()
            .map(|s| (s.reference_wavelength, s.local_spacing))
            .collect();
        assert_eq!(summary, vec![(5000.0, 40.0), (5040.0, 40.0)]);

        let trackers = build_trackers(
            "20240215_morn.txt",
            &[path],
            specs,
            &TrackerOptions::default(),
            Arc::new(FilenameStampParser),
        )
        .unwrap();
        assert_eq!(trackers.len(), 2);
    }

    #[test]
    fn lone_peak_has_no_spacing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20240215_morn.txt");
        std::fs::write(&path, "5000.0 0.01\n").unwrap();
        assert!(reference_peaks_from_snapshot(&path, None).unwrap().is_empty());
    }

    #[test]
    fn builds_trackers_in_spec_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshots = Vec::new();
        for day in 15..20 {
            let shift = 0.02 * (day - 15) as f64;
            let path = dir.path().join(format!("202402{day}_eve.txt"));
            std::fs::write(
                &path,
                format!(
                    "{} 0.01\n{} 0.01\n{} 0.01\n",
                    5000.0 + shift,
                    5050.0 + shift,
                    5100.0 + shift
                ),
            )
            .unwrap();
            snapshots.push(path);
        }

        let cache_dir = dir.path().join("cache");
        let specs = reference_peaks_from_snapshot(&snapshots[0], Some(&cache_dir)).unwrap();
        let options = TrackerOptions {
            auto_fit: true,
            ..Default::default()
        };
        let reference = snapshots[0].to_string_lossy().into_owned();
        let trackers = build_trackers(
            &reference,
            &snapshots,
            specs,
            &options,
            Arc::new(FilenameStampParser),
        )
        .unwrap();

        let wavelengths: Vec<f64> = trackers.iter().map(|t| t.reference_wavelength()).collect();
        assert_eq!(wavelengths, vec![5000.0, 5050.0, 5100.0]);
        for tracker in &trackers {
            assert_eq!(tracker.valid_count(), 5);
            assert!((tracker.slope() - 0.02).abs() < 1e-9);
        }
    }

    #[test]
    fn first_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("20240215.txt");
        std::fs::write(&bad, "not a number\n").unwrap();
        let specs = vec![TrackerSpec {
            reference_wavelength: 5000.0,
            local_spacing: 50.0,
            cache_path: None,
        }];
        let result = build_trackers(
            "20240215.txt",
            &[bad],
            specs,
            &TrackerOptions::default(),
            Arc::new(FilenameStampParser),
        );
        assert!(result.is_err());
    }
}
