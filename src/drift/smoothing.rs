use nalgebra::{DMatrix, DVector};

use crate::config::SmoothingConfig;
use crate::error::{DriftError, Result};

/// Smooths an evenly indexed series.  Output has the same length as input.
///
/// Smoothed series are for inspection only; they never feed back into
/// matching or fitting.
pub trait Smoother: Send + Sync {
    fn smooth(&self, y: &[f64]) -> Result<Vec<f64>>;
}

/// Savitzky-Golay filter: a least-squares polynomial of `order` fitted in a
/// sliding window of `window` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavitzkyGolay {
    pub window: usize,
    pub order: usize,
}

impl Default for SavitzkyGolay {
    fn default() -> Self {
        SmoothingConfig::default().into()
    }
}

impl From<SmoothingConfig> for SavitzkyGolay {
    fn from(config: SmoothingConfig) -> Self {
        Self {
            window: config.window,
            order: config.order,
        }
    }
}

impl SavitzkyGolay {
    /// Convolution weights for the window centre.
    ///
    /// Row 0 of the pseudo-inverse of the Vandermonde matrix `A[i][j] = (i-h)^j`,
    /// computed as `A · (AᵀA)⁻¹ e₀`.
    pub fn coefficients(&self) -> Result<Vec<f64>> {
        SmoothingConfig {
            window: self.window,
            order: self.order,
        }
        .validate()?;

        let half = (self.window / 2) as i64;
        let n = self.order + 1;
        let offsets: Vec<f64> = (-half..=half).map(|k| k as f64).collect();

        // Normal matrix AᵀA: entry (r, c) = Σ k^(r+c).
        let normal = DMatrix::<f64>::from_fn(n, n, |r, c| {
            offsets.iter().map(|k| k.powi((r + c) as i32)).sum()
        });
        let rhs = DVector::<f64>::from_fn(n, |r, _| if r == 0 { 1.0 } else { 0.0 });
        let solution = normal
            .lu()
            .solve(&rhs)
            .ok_or_else(|| DriftError::Config("singular Savitzky-Golay normal matrix".into()))?;

        Ok(offsets
            .iter()
            .map(|k| {
                solution
                    .iter()
                    .enumerate()
                    .map(|(j, c)| c * k.powi(j as i32))
                    .sum()
            })
            .collect())
    }
}

impl Smoother for SavitzkyGolay {
    fn smooth(&self, y: &[f64]) -> Result<Vec<f64>> {
        let coeffs = self.coefficients()?;
        let half = self.window / 2;

        if y.len() < half + 1 {
            return Err(DriftError::TooShortToSmooth {
                len: y.len(),
                window: self.window,
            });
        }

        // Pad each end with values mirrored about the end point.
        let first = y[0];
        let last = y[y.len() - 1];
        let mut padded = Vec::with_capacity(y.len() + 2 * half);
        padded.extend(y[1..=half].iter().rev().map(|v| first - (v - first).abs()));
        padded.extend_from_slice(y);
        padded.extend(
            y[y.len() - 1 - half..y.len() - 1]
                .iter()
                .rev()
                .map(|v| last + (v - last).abs()),
        );

        Ok(padded
            .windows(self.window)
            .map(|w| w.iter().zip(&coeffs).map(|(v, c)| v * c).sum())
            .collect())
    }
}
