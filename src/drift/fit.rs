//! Weighted least-squares fit of a line through the origin.
//!
//! Both single-peak and group drift use the one-parameter model
//! `y = slope * x`, where `x` is a day offset and `y` a (fractional) delta.
//! Uncertainties are absolute: the weight of each point is `1 / sigma²` and
//! the slope variance is `1 / Σ(w x²)`, with no rescaling by the reduced χ².

/// Proportional model `y = slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    pub slope: f64,
}

impl LinearModel {
    /// The constant-NaN model that stands in for a failed fit.
    pub fn nan() -> Self {
        Self { slope: f64::NAN }
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x
    }

    pub fn is_nan(&self) -> bool {
        self.slope.is_nan()
    }
}

/// Result of a successful weighted fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedFit {
    pub model: LinearModel,
    /// Variance of the slope (the 1×1 covariance matrix).
    pub covariance: f64,
}

impl WeightedFit {
    /// 1σ uncertainty on the slope.
    pub fn slope_err(&self) -> f64 {
        self.covariance.sqrt()
    }
}

/// Why a fit could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitFailure {
    /// No points to fit.
    NoPoints,
    /// `x`, `y` and `sigma` have different lengths.
    LengthMismatch,
    /// A value is NaN/infinite or an uncertainty is not positive.
    NonFiniteInput,
    /// Every `x` is zero, so the slope is unconstrained.
    Singular,
}

impl std::fmt::Display for FitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            FitFailure::NoPoints => "no points to fit",
            FitFailure::LengthMismatch => "x, y and sigma lengths differ",
            FitFailure::NonFiniteInput => "non-finite value or non-positive uncertainty",
            FitFailure::Singular => "all day offsets are zero",
        };
        write!(f, "{msg}")
    }
}

/// Fit `y = slope * x` weighting each point by `1 / sigma²`.
pub fn fit_proportional(x: &[f64], y: &[f64], sigma: &[f64]) -> Result<WeightedFit, FitFailure> {
    if x.len() != y.len() || x.len() != sigma.len() {
        return Err(FitFailure::LengthMismatch);
    }
    if x.is_empty() {
        return Err(FitFailure::NoPoints);
    }

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for ((&xi, &yi), &si) in x.iter().zip(y).zip(sigma) {
        if !xi.is_finite() || !yi.is_finite() || !si.is_finite() || si <= 0.0 {
            return Err(FitFailure::NonFiniteInput);
        }
        let w = 1.0 / (si * si);
        sxx += w * xi * xi;
        sxy += w * xi * yi;
    }

    if sxx == 0.0 || !sxx.is_finite() {
        return Err(FitFailure::Singular);
    }

    let slope = sxy / sxx;
    if !slope.is_finite() {
        return Err(FitFailure::NonFiniteInput);
    }

    Ok(WeightedFit {
        model: LinearModel { slope },
        covariance: 1.0 / sxx,
    })
}
