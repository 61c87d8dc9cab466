//! Shared logarithmic wavelength grid.
//!
//! Bin `i` spans `[min_wave * exp(i * dlog), min_wave * exp((i + 1) * dlog)]`
//! with `dlog = ln(max_wave / min_wave) / num_points`. A shift of `k` bins
//! corresponds to a wavelength stretch of `exp(k * dlog)`, i.e. a redshift
//! of `exp(k * dlog) - 1`.

use super::within_tolerance;

pub const MIN_GRID_POINTS: usize = 16;

const GRID_MATCH_REL_TOL: f64 = 1.0e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("grid needs at least {minimum} points, got {actual}")]
    TooFewPoints { minimum: usize, actual: usize },
    #[error("grid bounds must be finite and > 0, got [{min_wave}, {max_wave}]")]
    NonPositiveBounds { min_wave: f64, max_wave: f64 },
    #[error("grid bounds out of order: min_wave={min_wave} must be < max_wave={max_wave}")]
    BoundsOutOfOrder { min_wave: f64, max_wave: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogWavelengthGrid {
    num_points: usize,
    min_wave: f64,
    max_wave: f64,
    dlog: f64,
}

impl LogWavelengthGrid {
    pub fn new(num_points: usize, min_wave: f64, max_wave: f64) -> Result<Self, GridError> {
        if num_points < MIN_GRID_POINTS {
            return Err(GridError::TooFewPoints {
                minimum: MIN_GRID_POINTS,
                actual: num_points,
            });
        }

        if !min_wave.is_finite() || !max_wave.is_finite() || min_wave <= 0.0 || max_wave <= 0.0
        {
            return Err(GridError::NonPositiveBounds { min_wave, max_wave });
        }

        if min_wave >= max_wave {
            return Err(GridError::BoundsOutOfOrder { min_wave, max_wave });
        }

        let dlog = (max_wave / min_wave).ln() / num_points as f64;
        Ok(Self {
            num_points,
            min_wave,
            max_wave,
            dlog,
        })
    }

    pub const fn num_points(&self) -> usize {
        self.num_points
    }

    pub const fn min_wave(&self) -> f64 {
        self.min_wave
    }

    pub const fn max_wave(&self) -> f64 {
        self.max_wave
    }

    pub const fn dlog(&self) -> f64 {
        self.dlog
    }

    pub fn edge(&self, index: usize) -> f64 {
        self.min_wave * (index as f64 * self.dlog).exp()
    }

    pub fn center(&self, index: usize) -> f64 {
        self.min_wave * ((index as f64 + 0.5) * self.dlog).exp()
    }

    pub fn bin_width(&self, index: usize) -> f64 {
        self.edge(index + 1) - self.edge(index)
    }

    pub fn centers(&self) -> Vec<f64> {
        (0..self.num_points).map(|index| self.center(index)).collect()
    }

    /// Fractional edge coordinate of `wavelength`: 0.0 at `min_wave`,
    /// `num_points` at `max_wave`.
    pub fn position(&self, wavelength: f64) -> f64 {
        (wavelength / self.min_wave).ln() / self.dlog
    }

    pub fn lag_to_redshift(&self, lag: f64) -> f64 {
        (lag * self.dlog).exp() - 1.0
    }

    pub fn redshift_to_lag(&self, redshift: f64) -> f64 {
        (1.0 + redshift).ln() / self.dlog
    }

    /// Same length and (up to rounding) the same log step and origin.
    pub fn matches(&self, other: &Self) -> bool {
        self.num_points == other.num_points
            && within_tolerance(self.min_wave, other.min_wave, 0.0, GRID_MATCH_REL_TOL, 1.0)
            && within_tolerance(self.dlog, other.dlog, 0.0, GRID_MATCH_REL_TOL, 1.0e-12)
    }
}
