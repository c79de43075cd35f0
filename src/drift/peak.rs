use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info, warn};

use super::fit::{fit_proportional, LinearModel};
use super::smoothing::Smoother;
use super::tracking::track_snapshots;
use crate::config::DriftConfig;
use crate::data::loader::{read_drift_cache, write_drift_cache};
use crate::data::model::{DriftRecord, TimeOfDay};
use crate::data::timestamp::TimestampParser;
use crate::error::{DriftError, Result};

// ---------------------------------------------------------------------------
// Construction inputs
// ---------------------------------------------------------------------------

/// One reference peak to track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSpec {
    pub reference_wavelength: f64,
    /// Distance to the nearest distinguishable neighbour; sizes the match window.
    pub local_spacing: f64,
    /// Where the tracked series is cached, if anywhere.
    pub cache_path: Option<PathBuf>,
}

/// How trackers are built.
#[derive(Debug, Clone, Default)]
pub struct TrackerOptions {
    /// Track from snapshots even when a cache exists.
    pub force_recompute: bool,
    /// Fit an absolute-units drift model straight after construction.
    pub auto_fit: bool,
    pub config: DriftConfig,
}

/// Where a tracker's series comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesSource {
    Cache,
    Snapshots,
}

/// A cache is trusted unless it is missing or recomputation is forced.
pub fn choose_source(cache_exists: bool, force_recompute: bool) -> SeriesSource {
    if cache_exists && !force_recompute {
        SeriesSource::Cache
    } else {
        SeriesSource::Snapshots
    }
}

// ---------------------------------------------------------------------------
// DriftFit – fitted linear drift
// ---------------------------------------------------------------------------

/// A fitted drift model.  Slopes are per day.
///
/// A failed single-peak fit is represented by [`DriftFit::nan`], whose every
/// number is NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftFit {
    pub model: LinearModel,
    /// Variance of the slope.
    pub covariance: f64,
    pub slope: f64,
    pub slope_err: f64,
    /// Whether `y` was the fractional delta rather than the absolute one.
    pub fractional: bool,
}

impl DriftFit {
    pub fn nan(fractional: bool) -> Self {
        Self {
            model: LinearModel::nan(),
            covariance: f64::NAN,
            slope: f64::NAN,
            slope_err: f64::NAN,
            fractional,
        }
    }

    pub fn is_nan(&self) -> bool {
        self.slope.is_nan()
    }

    /// Fit `y = slope * x`, or `None` when the data admit no fit.
    pub(crate) fn weighted(x: &[f64], y: &[f64], sigma: &[f64], fractional: bool) -> Option<Self> {
        match fit_proportional(x, y, sigma) {
            Ok(fit) => Some(Self {
                model: fit.model,
                covariance: fit.covariance,
                slope: fit.model.slope,
                slope_err: fit.slope_err(),
                fractional,
            }),
            Err(reason) => {
                debug!("Linear drift fit failed: {reason}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SinglePeakTracker
// ---------------------------------------------------------------------------

/// The drift of one reference peak across an ordered snapshot sequence.
///
/// The per-index series `dates`, `wavelengths`, `sigmas` and `validity` always
/// have the same length: one entry per snapshot when tracked, one per row when
/// loaded from a cache.
#[derive(Clone)]
pub struct SinglePeakTracker {
    reference_identity: String,
    reference_date: NaiveDate,
    reference_wavelength: f64,
    local_spacing: f64,
    snapshots: Vec<PathBuf>,
    cache_path: Option<PathBuf>,
    config: DriftConfig,
    parser: Arc<dyn TimestampParser>,

    dates: Vec<NaiveDate>,
    wavelengths: Vec<Option<f64>>,
    sigmas: Vec<Option<f64>>,
    validity: Vec<bool>,
    times_of_day: Vec<Option<TimeOfDay>>,

    fit: Option<DriftFit>,
    recomputed: bool,
    out_of_sync: bool,
}

impl std::fmt::Debug for SinglePeakTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinglePeakTracker")
            .field("reference_identity", &self.reference_identity)
            .field("reference_wavelength", &self.reference_wavelength)
            .field("local_spacing", &self.local_spacing)
            .field("points", &self.len())
            .field("valid", &self.valid_count())
            .field("fit", &self.fit)
            .field("recomputed", &self.recomputed)
            .finish()
    }
}

impl SinglePeakTracker {
    /// Build a tracker, loading its cache when one exists and recomputation is
    /// not forced, otherwise tracking from the snapshots.  Fits afterwards if
    /// `options.auto_fit` is set.
    ///
    /// `reference_identity` names the snapshot the reference peak was taken
    /// from; its date is the origin of the day offsets.
    pub fn new(
        reference_identity: impl Into<String>,
        spec: TrackerSpec,
        snapshots: Vec<PathBuf>,
        options: &TrackerOptions,
        parser: Arc<dyn TimestampParser>,
    ) -> Result<Self> {
        let cache_exists = spec.cache_path.as_deref().is_some_and(Path::exists);

        let mut tracker = match choose_source(cache_exists, options.force_recompute) {
            SeriesSource::Cache => {
                Self::from_cache(reference_identity, spec, snapshots, options, parser)?
            }
            SeriesSource::Snapshots => {
                Self::from_snapshots(reference_identity, spec, snapshots, options, parser)?
            }
        };

        if options.auto_fit {
            tracker.fit(false)?;
        }
        Ok(tracker)
    }

    /// Build by loading `spec.cache_path`.
    pub fn from_cache(
        reference_identity: impl Into<String>,
        spec: TrackerSpec,
        snapshots: Vec<PathBuf>,
        options: &TrackerOptions,
        parser: Arc<dyn TimestampParser>,
    ) -> Result<Self> {
        let path = spec.cache_path.clone().ok_or(DriftError::NoCachePath)?;
        let mut tracker = Self::empty(reference_identity.into(), spec, snapshots, options, parser)?;
        tracker.load(&path)?;
        Ok(tracker)
    }

    /// Build by tracking the peak through `snapshots`.
    pub fn from_snapshots(
        reference_identity: impl Into<String>,
        spec: TrackerSpec,
        snapshots: Vec<PathBuf>,
        options: &TrackerOptions,
        parser: Arc<dyn TimestampParser>,
    ) -> Result<Self> {
        let mut tracker = Self::empty(reference_identity.into(), spec, snapshots, options, parser)?;
        tracker.track()?;
        Ok(tracker)
    }

    fn empty(
        reference_identity: String,
        spec: TrackerSpec,
        snapshots: Vec<PathBuf>,
        options: &TrackerOptions,
        parser: Arc<dyn TimestampParser>,
    ) -> Result<Self> {
        let invalid = |reason: &str| DriftError::InvalidTracker {
            wavelength: spec.reference_wavelength,
            reason: reason.to_string(),
        };
        if !spec.reference_wavelength.is_finite() || spec.reference_wavelength <= 0.0 {
            return Err(invalid("reference wavelength must be positive"));
        }
        if !spec.local_spacing.is_finite() || spec.local_spacing <= 0.0 {
            return Err(invalid("local spacing must be positive"));
        }
        if snapshots.is_empty() {
            return Err(invalid("no snapshots to track through"));
        }
        options.config.validate()?;

        let reference_date = parser.parse(&reference_identity)?.date;

        Ok(Self {
            reference_identity,
            reference_date,
            reference_wavelength: spec.reference_wavelength,
            local_spacing: spec.local_spacing,
            snapshots,
            cache_path: spec.cache_path,
            config: options.config.clone(),
            parser,
            dates: Vec::new(),
            wavelengths: Vec::new(),
            sigmas: Vec::new(),
            validity: Vec::new(),
            times_of_day: Vec::new(),
            fit: None,
            recomputed: false,
            out_of_sync: false,
        })
    }

    // -- series construction --

    /// Track the reference peak through every snapshot, replacing the series.
    pub fn track(&mut self) -> Result<()> {
        let window = self.config.match_window(self.local_spacing);
        let tracked = track_snapshots(
            self.reference_wavelength,
            window,
            &self.snapshots,
            self.parser.as_ref(),
        )?;

        self.dates = tracked.stamps.iter().map(|s| s.date).collect();
        self.times_of_day = tracked.stamps.iter().map(|s| s.time_of_day).collect();
        self.wavelengths = tracked.series.matches.iter().map(|m| m.map(|p| p.position)).collect();
        self.sigmas = tracked.series.matches.iter().map(|m| m.map(|p| p.uncertainty)).collect();
        self.refresh_validity();

        self.recomputed = true;
        self.out_of_sync = true;

        info!(
            "λ={:.2}: matched {} of {} snapshots",
            self.reference_wavelength,
            self.valid_count(),
            self.len()
        );
        Ok(())
    }

    /// Replace the series with the contents of a drift cache.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let records = read_drift_cache(path)?;
        info!(
            "λ={:.2}: loaded {} points from {}",
            self.reference_wavelength,
            records.len(),
            path.display()
        );

        self.dates = records.iter().map(|r| r.date).collect();
        self.wavelengths = records.iter().map(|r| Some(r.wavelength)).collect();
        self.sigmas = records.iter().map(|r| Some(r.sigma)).collect();
        self.times_of_day = vec![None; records.len()];
        self.refresh_validity();

        self.recomputed = false;
        self.out_of_sync = false;

        if self.valid_count() < self.config.min_valid_points {
            warn!(
                "Too few located peaks for λ={:.2} ({} valid of {})",
                self.reference_wavelength,
                self.valid_count(),
                self.len()
            );
        }
        Ok(())
    }

    fn refresh_validity(&mut self) {
        self.validity = self
            .wavelengths
            .iter()
            .zip(&self.sigmas)
            .map(|(w, s)| matches!((w, s), (Some(w), Some(s)) if !w.is_nan() && !s.is_nan()))
            .collect();
    }

    // -- fitting --

    /// Fit `delta = slope * days` to the valid points, weighting by `1/σ²`.
    ///
    /// With `fit_fractional` the deltas (and uncertainties) are divided by the
    /// reference wavelength.  If there are no valid points the snapshots are
    /// tracked once first.  A fit that cannot be made yields [`DriftFit::nan`];
    /// only I/O failures while re-tracking are returned as errors.
    pub fn fit(&mut self, fit_fractional: bool) -> Result<&DriftFit> {
        if self.valid_count() == 0 {
            warn!(
                "No valid wavelengths found for λ={:.2}, tracking drift first",
                self.reference_wavelength
            );
            self.track()?;
        }

        let x = self.days_since_reference_date();
        let (y, sigma) = if fit_fractional {
            let scale = self.reference_wavelength;
            (
                self.fractional_deltas(),
                self.valid_sigmas().iter().map(|s| s / scale).collect(),
            )
        } else {
            (self.deltas(), self.valid_sigmas())
        };

        let fit = DriftFit::weighted(&x, &y, &sigma, fit_fractional).unwrap_or_else(|| {
            warn!("λ={:.2}: drift fit failed, slope set to NaN", self.reference_wavelength);
            DriftFit::nan(fit_fractional)
        });
        Ok(&*self.fit.insert(fit))
    }

    /// Observed minus fitted delta at each valid point, or `None` before any fit.
    ///
    /// The residuals are in fractional units when `fractional` is set and in
    /// wavelength units otherwise, whichever units the model was fitted in.
    pub fn residuals(&self, fractional: bool) -> Option<Vec<f64>> {
        let fit = self.fit.as_ref()?;
        let scale = match (fit.fractional, fractional) {
            (true, false) => self.reference_wavelength,
            (false, true) => 1.0 / self.reference_wavelength,
            _ => 1.0,
        };
        let observed = if fractional {
            self.fractional_deltas()
        } else {
            self.deltas()
        };

        Some(
            observed
                .iter()
                .zip(self.days_since_reference_date())
                .map(|(y, x)| y - fit.model.eval(x) * scale)
                .collect(),
        )
    }

    // -- persistence --

    /// Write the valid points to `path` (or the configured cache path).
    ///
    /// Returns `false` without writing when the target exists and this tracker
    /// was loaded rather than recomputed.
    pub fn save(&mut self, path: Option<&Path>) -> Result<bool> {
        let path = match path.or(self.cache_path.as_deref()) {
            Some(p) => p.to_path_buf(),
            None => return Err(DriftError::NoCachePath),
        };

        if path.exists() && !self.recomputed {
            return Ok(false);
        }

        let records: Vec<DriftRecord> = self
            .valid_indices()
            .map(|i| DriftRecord {
                date: self.dates[i],
                wavelength: self.wavelengths[i].unwrap_or(f64::NAN),
                sigma: self.sigmas[i].unwrap_or(f64::NAN),
            })
            .collect();

        write_drift_cache(&path, &records)?;
        self.out_of_sync = false;
        info!(
            "λ={:.2}: saved {} points to {}",
            self.reference_wavelength,
            records.len(),
            path.display()
        );
        Ok(true)
    }

    // -- accessors --

    pub fn reference_identity(&self) -> &str {
        &self.reference_identity
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn reference_wavelength(&self) -> f64 {
        self.reference_wavelength
    }

    pub fn local_spacing(&self) -> f64 {
        self.local_spacing
    }

    pub fn snapshots(&self) -> &[PathBuf] {
        &self.snapshots
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn wavelengths(&self) -> &[Option<f64>] {
        &self.wavelengths
    }

    pub fn sigmas(&self) -> &[Option<f64>] {
        &self.sigmas
    }

    pub fn validity(&self) -> &[bool] {
        &self.validity
    }

    /// The last fit, if `fit` has been called.
    pub fn drift_fit(&self) -> Option<&DriftFit> {
        self.fit.as_ref()
    }

    /// Fitted slope per day; NaN when unfitted or the fit failed.
    pub fn slope(&self) -> f64 {
        self.fit.map_or(f64::NAN, |f| f.slope)
    }

    pub fn slope_err(&self) -> f64 {
        self.fit.map_or(f64::NAN, |f| f.slope_err)
    }

    /// Whether the series came from the snapshots rather than a cache.
    pub fn is_recomputed(&self) -> bool {
        self.recomputed
    }

    /// Whether the series has been recomputed but not yet saved.
    pub fn is_out_of_sync(&self) -> bool {
        self.out_of_sync
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.validity.iter().filter(|v| **v).count()
    }

    // -- derived views over the valid points --

    fn valid_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.validity
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.then_some(i))
    }

    pub fn valid_dates(&self) -> Vec<NaiveDate> {
        self.valid_indices().map(|i| self.dates[i]).collect()
    }

    pub fn valid_wavelengths(&self) -> Vec<f64> {
        self.valid_indices()
            .filter_map(|i| self.wavelengths[i])
            .collect()
    }

    pub fn valid_sigmas(&self) -> Vec<f64> {
        self.valid_indices().filter_map(|i| self.sigmas[i]).collect()
    }

    /// Time of day of each valid point; all `None` for a series loaded from a
    /// cache, which does not store it.
    pub fn times_of_day(&self) -> Vec<Option<TimeOfDay>> {
        self.valid_indices().map(|i| self.times_of_day[i]).collect()
    }

    /// Whole days from the reference date to each valid point.
    pub fn days_since_reference_date(&self) -> Vec<f64> {
        self.valid_indices()
            .map(|i| (self.dates[i] - self.reference_date).num_days() as f64)
            .collect()
    }

    /// Matched wavelength minus reference wavelength, per valid point.
    pub fn deltas(&self) -> Vec<f64> {
        self.valid_wavelengths()
            .iter()
            .map(|w| w - self.reference_wavelength)
            .collect()
    }

    /// [`deltas`](Self::deltas) as a fraction of the reference wavelength.
    pub fn fractional_deltas(&self) -> Vec<f64> {
        self.deltas()
            .iter()
            .map(|d| d / self.reference_wavelength)
            .collect()
    }

    /// Delta of the first valid point on `date`, or NaN if there is none.
    pub fn delta_at_date(&self, date: NaiveDate) -> f64 {
        self.valid_indices()
            .find(|&i| self.dates[i] == date)
            .and_then(|i| self.wavelengths[i])
            .map_or(f64::NAN, |w| w - self.reference_wavelength)
    }

    pub fn fractional_delta_at_date(&self, date: NaiveDate) -> f64 {
        self.delta_at_date(date) / self.reference_wavelength
    }

    pub fn smoothed_wavelengths(&self, smoother: &dyn Smoother) -> Result<Vec<f64>> {
        smoother.smooth(&self.valid_wavelengths())
    }

    pub fn smoothed_deltas(&self, smoother: &dyn Smoother) -> Result<Vec<f64>> {
        smoother.smooth(&self.deltas())
    }
}
