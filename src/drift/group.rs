use chrono::NaiveDate;
use log::{info, warn};

use super::peak::{DriftFit, SinglePeakTracker};

/// A set of peaks whose drift is fitted jointly, e.g. a wavelength bin or the
/// same bin across several orderlets.
///
/// Members are held sorted by reference wavelength.  All pooled series below
/// concatenate the members' valid points in that order.
#[derive(Debug, Clone)]
pub struct GroupTracker {
    members: Vec<SinglePeakTracker>,
    fit: Option<DriftFit>,
}

impl GroupTracker {
    pub fn new(mut members: Vec<SinglePeakTracker>) -> Self {
        members.sort_by(|a, b| a.reference_wavelength().total_cmp(&b.reference_wavelength()));
        Self { members, fit: None }
    }

    pub fn members(&self) -> &[SinglePeakTracker] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    // -- wavelength summary --

    /// Mean reference wavelength; NaN for an empty group.
    pub fn mean_wavelength(&self) -> f64 {
        let sum: f64 = self.members.iter().map(|m| m.reference_wavelength()).sum();
        sum / self.members.len() as f64
    }

    pub fn min_wavelength(&self) -> Option<f64> {
        self.members.first().map(|m| m.reference_wavelength())
    }

    pub fn max_wavelength(&self) -> Option<f64> {
        self.members.last().map(|m| m.reference_wavelength())
    }

    // -- pooled series --

    /// Every member's valid dates, concatenated; neither sorted nor deduplicated.
    pub fn all_dates(&self) -> Vec<NaiveDate> {
        self.members.iter().flat_map(|m| m.valid_dates()).collect()
    }

    /// Earliest valid date over all members, the shared time origin.
    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.all_dates().into_iter().min()
    }

    pub fn all_days_since_reference_date(&self) -> Vec<f64> {
        let dates = self.all_dates();
        let Some(origin) = dates.iter().min().copied() else {
            return Vec::new();
        };
        dates
            .iter()
            .map(|d| (*d - origin).num_days() as f64)
            .collect()
    }

    pub fn unique_dates(&self) -> Vec<NaiveDate> {
        let mut dates = self.all_dates();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// Fractional deltas of every member, concatenated.
    pub fn all_fractional_deltas(&self) -> Vec<f64> {
        self.members.iter().flat_map(|m| m.fractional_deltas()).collect()
    }

    /// Absolute uncertainties of every member, concatenated.
    pub fn all_sigmas(&self) -> Vec<f64> {
        self.members.iter().flat_map(|m| m.valid_sigmas()).collect()
    }

    /// Each member's uncertainties divided by that member's own reference
    /// wavelength, so members far apart in wavelength weigh in comparably.
    pub fn all_relative_sigmas(&self) -> Vec<f64> {
        self.members
            .iter()
            .flat_map(|m| {
                let reference = m.reference_wavelength();
                m.valid_sigmas().into_iter().map(move |s| s / reference)
            })
            .collect()
    }

    /// Mean absolute delta of each member; NaN for a member with no valid points.
    pub fn mean_deltas(&self) -> Vec<f64> {
        self.members
            .iter()
            .map(|m| {
                let deltas = m.deltas();
                deltas.iter().sum::<f64>() / deltas.len() as f64
            })
            .collect()
    }

    // -- fitting --

    /// Fit one fractional drift slope to the pooled points of all members.
    ///
    /// Returns `None`, and leaves the group fit unset, when the pooled data
    /// admit no fit.
    pub fn fit_group_drift(&mut self) -> Option<&DriftFit> {
        let x = self.all_days_since_reference_date();
        let y = self.all_fractional_deltas();
        let sigma = self.all_relative_sigmas();

        self.fit = DriftFit::weighted(&x, &y, &sigma, true);
        match &self.fit {
            Some(fit) => info!(
                "Group of {} peaks ({} points): slope {:.3e} ± {:.3e} /day",
                self.members.len(),
                x.len(),
                fit.slope,
                fit.slope_err
            ),
            None => warn!(
                "Group fit failed for {} peaks ({} points); group fit left unset",
                self.members.len(),
                x.len()
            ),
        }
        self.fit.as_ref()
    }

    /// The group fit, or `None` if unfitted or the fit failed.
    pub fn group_fit(&self) -> Option<&DriftFit> {
        self.fit.as_ref()
    }

    /// Pooled fractional delta minus the group model at each pooled point.
    pub fn residuals(&self) -> Option<Vec<f64>> {
        let fit = self.fit.as_ref()?;
        Some(
            self.all_fractional_deltas()
                .iter()
                .zip(self.all_days_since_reference_date())
                .map(|(y, x)| y - fit.model.eval(x))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::*;
    use crate::data::timestamp::FilenameStampParser;
    use crate::drift::peak::{TrackerOptions, TrackerSpec};

    /// Write a drift cache for one peak and load a tracker from it.  The
    /// reference snapshot is dated `reference`.
    fn cached_tracker(
        dir: &Path,
        reference: &str,
        wavelength: f64,
        rows: &[(&str, f64, f64)],
    ) -> SinglePeakTracker {
        let cache = dir.join(format!("{wavelength:.2}.txt"));
        let body: String = rows
            .iter()
            .map(|(date, wl, sigma)| format!("{date} {wl} {sigma}\n"))
            .collect();
        std::fs::write(&cache, body).unwrap();

        SinglePeakTracker::new(
            format!("{reference}_morn_SCI2.txt"),
            TrackerSpec {
                reference_wavelength: wavelength,
                local_spacing: 50.0,
                cache_path: Some(cache),
            },
            vec![PathBuf::from(format!("{reference}_morn_SCI2.txt"))],
            &TrackerOptions::default(),
            Arc::new(FilenameStampParser),
        )
        .unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn members_are_sorted_by_reference_wavelength() {
        let dir = tempfile::tempdir().unwrap();
        let red = cached_tracker(dir.path(), "20240210", 8000.0, &[("20240210", 8000.0, 0.01)]);
        let blue = cached_tracker(dir.path(), "20240210", 4000.0, &[("20240210", 4000.0, 0.01)]);
        let group = GroupTracker::new(vec![red, blue]);

        assert_eq!(group.min_wavelength(), Some(4000.0));
        assert_eq!(group.max_wavelength(), Some(8000.0));
        assert_eq!(group.mean_wavelength(), 6000.0);
        assert_eq!(group.members()[0].reference_wavelength(), 4000.0);
    }

    #[test]
    fn group_reference_date_is_earliest_member_date() {
        let dir = tempfile::tempdir().unwrap();
        let a = cached_tracker(
            dir.path(),
            "20240212",
            5000.0,
            &[("20240212", 5000.0, 0.01), ("20240214", 5000.1, 0.01)],
        );
        let b = cached_tracker(
            dir.path(),
            "20240210",
            6000.0,
            &[("20240210", 6000.0, 0.01), ("20240212", 6000.12, 0.01)],
        );
        let group = GroupTracker::new(vec![a, b]);

        assert_eq!(group.reference_date(), Some(ymd(2024, 2, 10)));
        assert_eq!(
            group.all_dates(),
            vec![ymd(2024, 2, 12), ymd(2024, 2, 14), ymd(2024, 2, 10), ymd(2024, 2, 12)]
        );
        assert_eq!(group.all_days_since_reference_date(), vec![2.0, 4.0, 0.0, 2.0]);
        assert_eq!(
            group.unique_dates(),
            vec![ymd(2024, 2, 10), ymd(2024, 2, 12), ymd(2024, 2, 14)]
        );
    }

    #[test]
    fn relative_sigmas_use_each_members_wavelength() {
        let dir = tempfile::tempdir().unwrap();
        let a = cached_tracker(dir.path(), "20240210", 4000.0, &[("20240210", 4000.0, 0.04)]);
        let b = cached_tracker(dir.path(), "20240210", 8000.0, &[("20240211", 8000.4, 0.04)]);
        let group = GroupTracker::new(vec![b, a]);

        assert_eq!(group.all_sigmas(), vec![0.04, 0.04]);
        assert_eq!(group.all_relative_sigmas(), vec![0.04 / 4000.0, 0.04 / 8000.0]);
        let deltas = group.all_fractional_deltas();
        assert_eq!(deltas[0], 0.0);
        assert!((deltas[1] - 0.4 / 8000.0).abs() < 1e-15);
    }

    #[test]
    fn invalid_points_are_left_out_of_the_pool() {
        let dir = tempfile::tempdir().unwrap();
        let a = cached_tracker(
            dir.path(),
            "20240210",
            5000.0,
            &[
                ("20240210", 5000.0, 0.01),
                ("20240211", 5000.1, 0.0),
                ("20240212", 5000.2, 0.01),
            ],
        );
        let group = GroupTracker::new(vec![a]);
        assert_eq!(group.all_dates().len(), 2);
        assert_eq!(group.all_relative_sigmas().len(), 2);
        assert_eq!(group.all_fractional_deltas().len(), 2);
    }

    #[test]
    fn joint_fit_recovers_shared_fractional_rate() {
        let dir = tempfile::tempdir().unwrap();
        let rate = 2e-6;
        let rows = |reference: f64| -> Vec<(String, f64, f64)> {
            (0..8)
                .map(|d| {
                    let date = format!("202402{:02}", 10 + d);
                    (date, reference * (1.0 + rate * d as f64), 0.002)
                })
                .collect()
        };
        let members: Vec<_> = [4500.0, 6500.0, 8500.0]
            .into_iter()
            .map(|reference| {
                let owned = rows(reference);
                let borrowed: Vec<(&str, f64, f64)> =
                    owned.iter().map(|(d, w, s)| (d.as_str(), *w, *s)).collect();
                cached_tracker(dir.path(), "20240210", reference, &borrowed)
            })
            .collect();

        let mut group = GroupTracker::new(members);
        let fit = *group.fit_group_drift().unwrap();
        assert!(fit.fractional);
        assert!((fit.slope - rate).abs() < 1e-12, "slope {}", fit.slope);
        assert!(fit.slope_err > 0.0 && fit.slope_err.is_finite());
        assert!(group.residuals().unwrap().iter().all(|r| r.abs() < 1e-12));

        let means = group.mean_deltas();
        assert_eq!(means.len(), 3);
        assert!((means[0] - 4500.0 * rate * 3.5).abs() < 1e-9);
    }

    #[test]
    fn degenerate_group_fit_is_unset() {
        let mut empty = GroupTracker::new(Vec::new());
        assert!(empty.fit_group_drift().is_none());
        assert!(empty.group_fit().is_none());
        assert!(empty.residuals().is_none());
        assert_eq!(empty.reference_date(), None);
        assert!(empty.mean_wavelength().is_nan());

        let dir = tempfile::tempdir().unwrap();
        let only_origin =
            cached_tracker(dir.path(), "20240210", 5000.0, &[("20240210", 5000.1, 0.01)]);
        let mut group = GroupTracker::new(vec![only_origin]);
        assert!(group.fit_group_drift().is_none());
        assert!(group.group_fit().is_none());
    }
}
