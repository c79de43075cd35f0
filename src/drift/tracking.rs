//! Sequential matching of one reference peak through a series of snapshots.
//!
//! Matching is a fold over the snapshots with a single piece of state, the
//! cursor: the last wavelength at which the peak was confirmed. Each step picks
//! the detected peak closest to the cursor and accepts it only if it lies within
//! the match window, in which case the cursor moves to it. A miss leaves the
//! cursor where it was, so the next snapshot is searched around the last
//! confirmed position.

use std::path::PathBuf;

use log::{debug, info};

use crate::data::loader::load_snapshot;
use crate::data::model::{DetectedPeak, SnapshotStamp};
use crate::data::timestamp::TimestampParser;
use crate::error::Result;

/// Outcome of matching a whole snapshot sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSeries {
    /// One entry per snapshot; `None` where no peak was accepted.
    pub matches: Vec<Option<DetectedPeak>>,
    /// Last confirmed wavelength after the final snapshot.
    pub cursor: f64,
}

/// Detected peak nearest to `cursor`, ignoring NaN positions.  Ties go to the
/// earlier row.
pub fn closest_peak(peaks: &[DetectedPeak], cursor: f64) -> Option<DetectedPeak> {
    let mut best: Option<(f64, DetectedPeak)> = None;
    for &peak in peaks {
        let distance = (peak.position - cursor).abs();
        if distance.is_nan() {
            continue;
        }
        match best {
            Some((best_distance, _)) if distance >= best_distance => {}
            _ => best = Some((distance, peak)),
        }
    }
    best.map(|(_, peak)| peak)
}

/// One matching step: returns the accepted peak (if any) and the new cursor.
pub fn match_step(cursor: f64, peaks: &[DetectedPeak], window: f64) -> (Option<DetectedPeak>, f64) {
    match closest_peak(peaks, cursor) {
        Some(peak) if (peak.position - cursor).abs() <= window => (Some(peak), peak.position),
        Some(peak) => {
            debug!(
                "Closest peak {:.4} is {:.4} from {:.4}, outside window {:.4}",
                peak.position,
                (peak.position - cursor).abs(),
                cursor,
                window
            );
            (None, cursor)
        }
        None => (None, cursor),
    }
}

/// Fold [`match_step`] over already-loaded snapshots, starting at `reference`.
pub fn fold_matches<I, S>(reference: f64, window: f64, snapshots: I) -> TrackedSeries
where
    I: IntoIterator<Item = S>,
    S: AsRef<[DetectedPeak]>,
{
    let init = TrackedSeries {
        matches: Vec::new(),
        cursor: reference,
    };
    snapshots.into_iter().fold(init, |mut series, peaks| {
        let (matched, cursor) = match_step(series.cursor, peaks.as_ref(), window);
        series.matches.push(matched);
        series.cursor = cursor;
        series
    })
}

/// Snapshot stamps plus the matched series, read from disk.
#[derive(Debug, Clone)]
pub struct TrackedSnapshots {
    pub stamps: Vec<SnapshotStamp>,
    pub series: TrackedSeries,
}

/// Load each snapshot in order, then track the peak through them with
/// [`fold_matches`].
///
/// Every snapshot contributes a stamp, matched or not. Unreadable or malformed
/// snapshots and unparseable identities abort tracking.
pub fn track_snapshots(
    reference: f64,
    window: f64,
    snapshots: &[PathBuf],
    parser: &dyn TimestampParser,
) -> Result<TrackedSnapshots> {
    info!("Tracking drift for λ={reference:.2} across {} snapshots", snapshots.len());

    let (stamps, loaded): (Vec<SnapshotStamp>, Vec<Vec<DetectedPeak>>) = snapshots
        .iter()
        .map(|path| Ok((parser.parse_path(path)?, load_snapshot(path)?)))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .unzip();

    Ok(TrackedSnapshots {
        stamps,
        series: fold_matches(reference, window, &loaded),
    })
}
