//! FFT cross-correlation of a canonical spectrum against templates.
//!
//! For input `x` and template `t` on the same log grid the engine computes
//! `c[m] = sum_n x[n] t[n - m]` through `IFFT(X * conj(T))`, bandpass
//! filtered and normalised by the filtered power of both spectra so that a
//! spectrum correlated with itself peaks at exactly 1.0 at lag 0. A peak at
//! lag `m` means the input is the template stretched by `exp(m * dlog)`.

pub mod bandpass;
pub mod peaks;

use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::common::config::CorrelationConfig;
use crate::domain::{CanonicalSpectrum, MatchRecord, MatchStatus, Template};
use crate::numerics::LogWavelengthGrid;

use peaks::RefinedPeak;

/// Floor on the redshift error, in bins.
const MIN_ERROR_BINS: f64 = 0.5;

/// Forward transform of a canonical spectrum with the bandpass applied.
#[derive(Debug, Clone)]
pub struct PreparedSpectrum {
    transform: Vec<Complex64>,
    power: f64,
    valid: Vec<bool>,
    valid_count: usize,
}

impl PreparedSpectrum {
    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn valid_count(&self) -> usize {
        self.valid_count
    }
}

/// Inclusive lag range searched for peaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagWindow {
    pub min: isize,
    pub max: isize,
}

/// Plans are built once and shared; the engine is `Send + Sync` and is
/// used concurrently by the per-template workers.
pub struct CorrelationEngine {
    grid: LogWavelengthGrid,
    config: CorrelationConfig,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    weights: Vec<f64>,
}

impl std::fmt::Debug for CorrelationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationEngine")
            .field("grid", &self.grid)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CorrelationEngine {
    pub fn new(grid: LogWavelengthGrid, config: CorrelationConfig) -> Self {
        let len = grid.num_points();
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let weights = bandpass::bandpass_weights(len, &config.bandpass);
        tracing::debug!(
            len,
            dlog = grid.dlog(),
            bandpass = config.bandpass.enabled,
            "correlation engine ready"
        );

        Self {
            grid,
            config,
            forward,
            inverse,
            weights,
        }
    }

    pub const fn grid(&self) -> &LogWavelengthGrid {
        &self.grid
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Lags whose redshift lies in `[z_min, z_max]`, clipped to less than
    /// half the grid. `None` when nothing remains.
    pub fn lag_window(&self) -> Option<LagWindow> {
        let limit = (self.grid.num_points() / 2) as isize - 1;
        let min = (self.grid.redshift_to_lag(self.config.z_min).ceil() as isize).max(-limit);
        let max = (self.grid.redshift_to_lag(self.config.z_max).floor() as isize).min(limit);
        (min <= max).then_some(LagWindow { min, max })
    }

    pub fn prepare(&self, spectrum: &CanonicalSpectrum) -> PreparedSpectrum {
        let mut transform: Vec<Complex64> = spectrum
            .flux()
            .iter()
            .map(|value| Complex64::new(*value, 0.0))
            .collect();
        self.forward.process(&mut transform);

        let mut power = 0.0;
        for (value, weight) in transform.iter_mut().zip(&self.weights) {
            *value *= *weight;
            power += value.norm_sqr();
        }

        PreparedSpectrum {
            transform,
            power,
            valid: spectrum.valid().to_vec(),
            valid_count: spectrum.valid_count(),
        }
    }

    /// Normalised circular cross-correlation, indexed by lag modulo `N`.
    /// `None` when either spectrum carries no power in the passband.
    pub fn correlate(
        &self,
        input: &PreparedSpectrum,
        template: &PreparedSpectrum,
    ) -> Option<Vec<f64>> {
        let norm = (input.power * template.power).sqrt();
        if !(norm > 0.0) {
            return None;
        }

        let mut product: Vec<Complex64> = input
            .transform
            .iter()
            .zip(&template.transform)
            .map(|(x, t)| x * t.conj())
            .collect();
        self.inverse.process(&mut product);
        Some(product.iter().map(|value| value.re / norm).collect())
    }

    /// Match records for every accepted peak of `template`, strongest first.
    pub fn match_template(&self, input: &PreparedSpectrum, template: &Template) -> Vec<MatchRecord> {
        let prepared = self.prepare(&template.spectrum);
        let Some(correlation) = self.correlate(input, &prepared) else {
            tracing::debug!(template = %template.id, "no passband power, skipping");
            return Vec::new();
        };

        let records: Vec<MatchRecord> = match self.config.forced_redshift {
            Some(redshift) => self
                .forced_peak(&correlation, redshift)
                .map(|peak| self.record(input, &prepared, template, &correlation, peak, 0))
                .into_iter()
                .collect(),
            None => {
                let Some(window) = self.lag_window() else {
                    return Vec::new();
                };
                peaks::find_peaks(
                    &correlation,
                    window.min,
                    window.max,
                    self.config.peak_window,
                    self.config.max_peaks,
                )
                .into_iter()
                .enumerate()
                .map(|(rank, candidate)| {
                    let peak = peaks::refine_peak(&correlation, candidate.lag);
                    self.record(input, &prepared, template, &correlation, peak, rank)
                })
                .collect()
            }
        };

        tracing::debug!(
            template = %template.id,
            peaks = records.len(),
            best_quality = records.first().map(|record| record.quality),
            "correlated template"
        );
        records
    }

    /// Peak evaluated at the lag implied by a fixed redshift.
    fn forced_peak(&self, correlation: &[f64], redshift: f64) -> Option<RefinedPeak> {
        let lag = self.grid.redshift_to_lag(redshift);
        let limit = (self.grid.num_points() / 2) as f64 - 1.0;
        if !lag.is_finite() || lag.abs() > limit {
            return None;
        }

        let lower = lag.floor() as isize;
        let fraction = lag - lower as f64;
        let height = (1.0 - fraction) * peaks::at_lag(correlation, lower)
            + fraction * peaks::at_lag(correlation, lower + 1);
        let shape = peaks::refine_peak(correlation, lag.round() as isize);
        Some(RefinedPeak {
            lag,
            height,
            width: shape.width,
        })
    }

    fn record(
        &self,
        input: &PreparedSpectrum,
        template: &PreparedSpectrum,
        source: &Template,
        correlation: &[f64],
        peak: RefinedPeak,
        peak_rank: usize,
    ) -> MatchRecord {
        let sigma = peaks::antisymmetric_sigma(correlation, peak.lag.round() as isize);
        let r_value = peak.height / (std::f64::consts::SQRT_2 * sigma);
        let overlap = overlap_fraction(&input.valid, input.valid_count, &template.valid, peak.lag);
        let redshift = self.grid.lag_to_redshift(peak.lag);
        let error_bins = (3.0 * peak.width / (8.0 * (1.0 + r_value.max(0.0)))).max(MIN_ERROR_BINS);
        let status = if overlap < self.config.min_overlap {
            MatchStatus::InsufficientOverlap
        } else {
            MatchStatus::Valid
        };

        MatchRecord {
            template_id: source.id.clone(),
            type_name: source.type_name.clone(),
            subtype: source.subtype.clone(),
            age: source.age,
            redshift,
            redshift_error: (1.0 + redshift) * self.grid.dlog() * error_bins,
            quality: r_value * overlap,
            r_value,
            overlap,
            peak_height: peak.height,
            peak_width: peak.width,
            lag: peak.lag,
            peak_rank,
            status,
        }
    }
}

/// Fraction of the input's valid bins whose counterpart in the template,
/// shifted by `lag`, is valid too.
pub fn overlap_fraction(
    input_valid: &[bool],
    input_valid_count: usize,
    template_valid: &[bool],
    lag: f64,
) -> f64 {
    if input_valid_count == 0 {
        return 0.0;
    }

    let shift = lag.round() as isize;
    let len = template_valid.len() as isize;
    let shared = input_valid
        .iter()
        .enumerate()
        .filter(|(index, valid)| {
            let source = *index as isize - shift;
            **valid && (0..len).contains(&source) && template_valid[source as usize]
        })
        .count();
    shared as f64 / input_valid_count as f64
}
