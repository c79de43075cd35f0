use std::sync::Arc;

use etalon_drift::drift::{build_trackers, reference_peaks_from_snapshot};
use etalon_drift::synthetic::SyntheticCampaign;
use etalon_drift::{FilenameStampParser, GroupTracker, TrackerOptions};

#[test]
fn recovers_campaign_drift_per_peak_and_jointly() {
    let dir = tempfile::tempdir().unwrap();
    let campaign = SyntheticCampaign::default();
    let snapshots = campaign.write(&dir.path().join("masks")).unwrap();

    let cache_dir = dir.path().join("drifts");
    let specs = reference_peaks_from_snapshot(&snapshots[0], Some(&cache_dir)).unwrap();
    assert_eq!(specs.len(), campaign.comb.len());

    let reference = snapshots[0].to_string_lossy().into_owned();
    let mut trackers = build_trackers(
        &reference,
        &snapshots,
        specs.clone(),
        &TrackerOptions::default(),
        Arc::new(FilenameStampParser),
    )
    .unwrap();

    for tracker in &mut trackers {
        assert_eq!(tracker.len(), campaign.days);
        assert_eq!(tracker.dates().len(), tracker.validity().len());
        assert!(tracker.valid_count() > campaign.days / 2);

        let fit = *tracker.fit(true).unwrap();
        assert!(
            (fit.slope - campaign.fractional_rate).abs() < 5.0 * fit.slope_err,
            "λ={}: slope {} ± {}",
            tracker.reference_wavelength(),
            fit.slope,
            fit.slope_err
        );
        assert!(tracker.save(None).unwrap());
    }

    let mut group = GroupTracker::new(trackers);
    let fit = *group.fit_group_drift().unwrap();
    assert!((fit.slope - campaign.fractional_rate).abs() < 5.0 * fit.slope_err);
    assert_eq!(group.reference_date(), Some(campaign.date(0)));

    // Second pass trusts the caches that were just written.
    let reloaded = build_trackers(
        &reference,
        &snapshots,
        specs,
        &TrackerOptions::default(),
        Arc::new(FilenameStampParser),
    )
    .unwrap();
    for (cached, tracked) in reloaded.iter().zip(group.members()) {
        assert!(!cached.is_recomputed());
        assert_eq!(cached.valid_dates(), tracked.valid_dates());
        assert_eq!(cached.valid_wavelengths(), tracked.valid_wavelengths());
    }

    let mut regrouped = GroupTracker::new(reloaded);
    let refit = *regrouped.fit_group_drift().unwrap();
    assert!((refit.slope - fit.slope).abs() < 1e-15);
}
