//! Synthetic detection snapshots with a known drift, for demos and tests.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use log::info;

use crate::data::model::{DetectedPeak, TimeOfDay};
use crate::error::{DriftError, Result};

/// Minimal deterministic PRNG (xoshiro256**)
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    pub fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// A run of daily calibration snapshots of an etalon comb drifting at a
/// constant fractional rate.
///
/// Day 0 is the reference snapshot: exact positions, nothing dropped.  Later
/// days add Gaussian position noise and may lose individual peaks.
#[derive(Debug, Clone)]
pub struct SyntheticCampaign {
    pub start: NaiveDate,
    pub days: usize,
    /// Reference peak positions on day 0.
    pub comb: Vec<f64>,
    /// Fractional drift per day; peak `p` sits at `p * (1 + rate * day)`.
    pub fractional_rate: f64,
    /// Standard deviation of the position noise.
    pub noise: f64,
    /// Uncertainty written next to each position.
    pub uncertainty: f64,
    /// Probability that a peak is missing from a snapshot.
    pub dropout: f64,
    pub time_of_day: TimeOfDay,
    pub orderlet: String,
    pub seed: u64,
}

impl Default for SyntheticCampaign {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap_or_default(),
            days: 30,
            comb: Self::evenly_spaced_comb(5000.0, 40.0, 12),
            fractional_rate: 1e-7,
            noise: 5e-4,
            uncertainty: 5e-4,
            dropout: 0.05,
            time_of_day: TimeOfDay::Morning,
            orderlet: "SCI2".to_string(),
            seed: 42,
        }
    }
}

impl SyntheticCampaign {
    pub fn evenly_spaced_comb(first: f64, spacing: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| first + spacing * i as f64).collect()
    }

    pub fn date(&self, day: usize) -> NaiveDate {
        self.start + Duration::days(day as i64)
    }

    /// `<YYYYMMDD>_<timeofday>_<orderlet>_etalon_wavelengths.txt`
    pub fn file_name(&self, day: usize) -> String {
        format!(
            "{}_{}_{}_etalon_wavelengths.txt",
            self.date(day).format("%Y%m%d"),
            self.time_of_day,
            self.orderlet
        )
    }

    /// Noise-free position of a reference peak on `day`.
    pub fn true_position(&self, reference: f64, day: usize) -> f64 {
        reference * (1.0 + self.fractional_rate * day as f64)
    }

    /// All snapshots, in day order.
    pub fn snapshots(&self) -> Vec<Vec<DetectedPeak>> {
        let mut rng = SimpleRng::new(self.seed);
        (0..self.days)
            .map(|day| {
                self.comb
                    .iter()
                    .filter_map(|&reference| {
                        let exact = self.true_position(reference, day);
                        if day == 0 {
                            return Some(DetectedPeak::new(exact, self.uncertainty));
                        }
                        let position = rng.gauss(exact, self.noise);
                        (rng.next_f64() >= self.dropout)
                            .then(|| DetectedPeak::new(position, self.uncertainty))
                    })
                    .collect()
            })
            .collect()
    }

    /// Write every snapshot as whitespace text under `dir`; returns the paths
    /// in day order.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|e| DriftError::io(dir, e))?;

        let paths = self
            .snapshots()
            .iter()
            .enumerate()
            .map(|(day, peaks)| {
                let path = dir.join(self.file_name(day));
                let body: String = peaks
                    .iter()
                    .map(|p| format!("{} {}\n", p.position, p.uncertainty))
                    .collect();
                std::fs::write(&path, body).map_err(|e| DriftError::io(&path, e))?;
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Wrote {} synthetic snapshots of {} peaks to {}",
            paths.len(),
            self.comb.len(),
            dir.display()
        );
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_is_deterministic_and_uniform() {
        let mut a = SimpleRng::new(7);
        let mut b = SimpleRng::new(7);
        let xs: Vec<f64> = (0..1000).map(|_| a.next_f64()).collect();
        let ys: Vec<f64> = (0..1000).map(|_| b.next_f64()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (0.0..1.0).contains(x)));
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        assert!((mean - 0.5).abs() < 0.05);
    }

    #[test]
    fn reference_day_is_exact_and_complete() {
        let campaign = SyntheticCampaign {
            dropout: 0.5,
            ..Default::default()
        };
        let snapshots = campaign.snapshots();
        assert_eq!(snapshots.len(), 30);
        let day0: Vec<f64> = snapshots[0].iter().map(|p| p.position).collect();
        assert_eq!(day0, campaign.comb);
        assert!(snapshots[1..].iter().any(|s| s.len() < campaign.comb.len()));
    }

    #[test]
    fn file_names_parse_back_to_their_dates() {
        use crate::data::timestamp::{FilenameStampParser, TimestampParser};

        let campaign = SyntheticCampaign::default();
        assert_eq!(campaign.file_name(3), "20240204_morn_SCI2_etalon_wavelengths.txt");
        let stamp = FilenameStampParser.parse(&campaign.file_name(3)).unwrap();
        assert_eq!(stamp.date, campaign.date(3));
        assert_eq!(stamp.time_of_day, Some(TimeOfDay::Morning));
    }
}
