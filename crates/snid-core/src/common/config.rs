//! Run configuration: a fixed, validated structure loaded from JSON.
//!
//! Every section has defaults, so `{}` is a complete configuration. Unknown
//! keys and out-of-range values are rejected by [`load_config`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::numerics::{GridError, LogWavelengthGrid};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationConfig {
    pub grid: GridConfig,
    pub preprocess: PreprocessConfig,
    pub correlation: CorrelationConfig,
    pub filter: FilterConfig,
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub num_points: usize,
    pub min_wave: f64,
    pub max_wave: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            num_points: 1024,
            min_wave: 2500.0,
            max_wave: 10000.0,
        }
    }
}

impl GridConfig {
    pub fn to_grid(&self) -> Result<LogWavelengthGrid, GridError> {
        LogWavelengthGrid::new(self.num_points, self.min_wave, self.max_wave)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ContinuumMethod {
    /// Natural cubic spline through block-averaged log flux.
    Spline { knots: usize },
    /// Gaussian low-pass in log-wavelength bins; `None` picks sigma from the
    /// grid size and the spectrum's noise level.
    Gaussian {
        #[serde(default)]
        sigma: Option<f64>,
    },
}

impl Default for ContinuumMethod {
    fn default() -> Self {
        Self::Spline { knots: 13 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SmoothingConfig {
    #[default]
    None,
    Pixels {
        window: usize,
        order: usize,
    },
    Angstrom {
        fwhm: f64,
        order: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessConfig {
    pub apodize_percent: f64,
    pub continuum: ContinuumMethod,
    pub outlier_sigma: Option<f64>,
    pub smoothing: SmoothingConfig,
    pub wavelength_masks: Vec<[f64; 2]>,
    pub remove_telluric_a_band: bool,
    pub clip_sky_lines: bool,
    pub host_emission_redshift: Option<f64>,
    pub emission_clip_width: f64,
    pub min_valid_points: usize,
    pub min_span_angstrom: f64,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            apodize_percent: 10.0,
            continuum: ContinuumMethod::default(),
            outlier_sigma: Some(5.0),
            smoothing: SmoothingConfig::None,
            wavelength_masks: Vec::new(),
            remove_telluric_a_band: false,
            clip_sky_lines: false,
            host_emission_redshift: None,
            emission_clip_width: 40.0,
            min_valid_points: 64,
            min_span_angstrom: 500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BandpassConfig {
    pub enabled: bool,
    pub low_cut: usize,
    pub low_full: usize,
    pub high_full_fraction: f64,
    pub high_cut_fraction: f64,
}

impl Default for BandpassConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            low_cut: 1,
            low_full: 4,
            high_full_fraction: 1.0 / 12.0,
            high_cut_fraction: 1.0 / 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorrelationConfig {
    pub z_min: f64,
    pub z_max: f64,
    pub max_peaks: usize,
    pub peak_window: usize,
    pub min_overlap: f64,
    pub bandpass: BandpassConfig,
    pub forced_redshift: Option<f64>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            z_min: -0.01,
            z_max: 1.0,
            max_peaks: 3,
            peak_window: 10,
            min_overlap: 0.3,
            bandpass: BandpassConfig::default(),
            forced_redshift: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub min_quality: f64,
    pub min_overlap: f64,
    pub z_min: f64,
    pub z_max: f64,
    /// Caps the ranked list carried in the report; consensus always sees
    /// every survivor.
    pub max_matches: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_quality: 5.0,
            min_overlap: 0.3,
            z_min: -0.01,
            z_max: 1.0,
            max_matches: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsensusConfig {
    pub redshift_tolerance: f64,
    pub sigma_multiplier: f64,
    pub top_n: usize,
    pub small_cluster_penalty: f64,
    pub high_quality_score: f64,
    pub medium_quality_score: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            redshift_tolerance: 0.02,
            sigma_multiplier: 3.0,
            top_n: 5,
            small_cluster_penalty: 0.95,
            high_quality_score: 10.0,
            medium_quality_score: 5.0,
        }
    }
}

impl ClassificationConfig {
    pub fn from_json_str(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid
            .to_grid()
            .map_err(|error| ConfigError::invalid("grid", error.to_string()))?;
        self.validate_preprocess()?;
        self.validate_correlation()?;
        self.validate_filter()?;
        self.validate_consensus()
    }

    fn validate_preprocess(&self) -> Result<(), ConfigError> {
        let preprocess = &self.preprocess;
        if !(0.0..=50.0).contains(&preprocess.apodize_percent) {
            return Err(ConfigError::invalid(
                "preprocess.apodize_percent",
                format!("{} is outside [0, 50]", preprocess.apodize_percent),
            ));
        }

        match preprocess.continuum {
            ContinuumMethod::Spline { knots } if knots < 3 => {
                return Err(ConfigError::invalid(
                    "preprocess.continuum.knots",
                    format!("need at least 3 knots, got {knots}"),
                ));
            }
            ContinuumMethod::Gaussian { sigma: Some(sigma) } if !(sigma > 0.0) => {
                return Err(ConfigError::invalid(
                    "preprocess.continuum.sigma",
                    format!("{sigma} must be > 0"),
                ));
            }
            _ => {}
        }

        if let Some(sigma) = preprocess.outlier_sigma
            && !(sigma > 0.0)
        {
            return Err(ConfigError::invalid(
                "preprocess.outlier_sigma",
                format!("{sigma} must be > 0"),
            ));
        }

        match preprocess.smoothing {
            SmoothingConfig::Pixels { window, order } => {
                if window < 3 || window % 2 == 0 {
                    return Err(ConfigError::invalid(
                        "preprocess.smoothing.window",
                        format!("{window} must be odd and >= 3"),
                    ));
                }
                if order >= window {
                    return Err(ConfigError::invalid(
                        "preprocess.smoothing.order",
                        format!("{order} must be smaller than the window {window}"),
                    ));
                }
            }
            SmoothingConfig::Angstrom { fwhm, .. } if !(fwhm > 0.0) => {
                return Err(ConfigError::invalid(
                    "preprocess.smoothing.fwhm",
                    format!("{fwhm} must be > 0"),
                ));
            }
            _ => {}
        }

        if preprocess
            .wavelength_masks
            .iter()
            .flatten()
            .any(|value| !value.is_finite())
        {
            return Err(ConfigError::invalid(
                "preprocess.wavelength_masks",
                "mask bounds must be finite",
            ));
        }

        if let Some(redshift) = preprocess.host_emission_redshift
            && !(redshift > -1.0)
        {
            return Err(ConfigError::invalid(
                "preprocess.host_emission_redshift",
                format!("{redshift} must be > -1"),
            ));
        }

        if !(preprocess.emission_clip_width > 0.0) {
            return Err(ConfigError::invalid(
                "preprocess.emission_clip_width",
                format!("{} must be > 0", preprocess.emission_clip_width),
            ));
        }

        if preprocess.min_valid_points == 0 {
            return Err(ConfigError::invalid(
                "preprocess.min_valid_points",
                "must be at least 1",
            ));
        }

        if !(preprocess.min_span_angstrom >= 0.0) {
            return Err(ConfigError::invalid(
                "preprocess.min_span_angstrom",
                format!("{} must be >= 0", preprocess.min_span_angstrom),
            ));
        }

        Ok(())
    }

    fn validate_correlation(&self) -> Result<(), ConfigError> {
        let correlation = &self.correlation;
        validate_redshift_range("correlation.z_min", correlation.z_min, correlation.z_max)?;

        if correlation.max_peaks == 0 {
            return Err(ConfigError::invalid(
                "correlation.max_peaks",
                "must be at least 1",
            ));
        }

        if correlation.peak_window == 0 {
            return Err(ConfigError::invalid(
                "correlation.peak_window",
                "must be at least 1",
            ));
        }

        validate_fraction("correlation.min_overlap", correlation.min_overlap)?;

        let bandpass = correlation.bandpass;
        if bandpass.low_cut > bandpass.low_full {
            return Err(ConfigError::invalid(
                "correlation.bandpass.low_cut",
                format!(
                    "{} must not exceed low_full {}",
                    bandpass.low_cut, bandpass.low_full
                ),
            ));
        }

        for (field, fraction) in [
            (
                "correlation.bandpass.high_full_fraction",
                bandpass.high_full_fraction,
            ),
            (
                "correlation.bandpass.high_cut_fraction",
                bandpass.high_cut_fraction,
            ),
        ] {
            if !(fraction > 0.0 && fraction <= 0.5) {
                return Err(ConfigError::invalid(
                    field,
                    format!("{fraction} is outside (0, 0.5]"),
                ));
            }
        }

        if bandpass.high_full_fraction > bandpass.high_cut_fraction {
            return Err(ConfigError::invalid(
                "correlation.bandpass.high_full_fraction",
                "must not exceed high_cut_fraction",
            ));
        }

        if let Some(redshift) = correlation.forced_redshift
            && !(redshift > -1.0 && redshift.is_finite())
        {
            return Err(ConfigError::invalid(
                "correlation.forced_redshift",
                format!("{redshift} must be finite and > -1"),
            ));
        }

        Ok(())
    }

    fn validate_filter(&self) -> Result<(), ConfigError> {
        let filter = &self.filter;
        if !(filter.min_quality >= 0.0) {
            return Err(ConfigError::invalid(
                "filter.min_quality",
                format!("{} must be >= 0", filter.min_quality),
            ));
        }

        validate_fraction("filter.min_overlap", filter.min_overlap)?;
        validate_redshift_range("filter.z_min", filter.z_min, filter.z_max)?;

        if filter.max_matches == Some(0) {
            return Err(ConfigError::invalid(
                "filter.max_matches",
                "must be at least 1 when set",
            ));
        }

        Ok(())
    }

    fn validate_consensus(&self) -> Result<(), ConfigError> {
        let consensus = &self.consensus;
        if !(consensus.redshift_tolerance > 0.0) {
            return Err(ConfigError::invalid(
                "consensus.redshift_tolerance",
                format!("{} must be > 0", consensus.redshift_tolerance),
            ));
        }

        if !(consensus.sigma_multiplier >= 0.0) {
            return Err(ConfigError::invalid(
                "consensus.sigma_multiplier",
                format!("{} must be >= 0", consensus.sigma_multiplier),
            ));
        }

        if consensus.top_n == 0 {
            return Err(ConfigError::invalid("consensus.top_n", "must be at least 1"));
        }

        if !(consensus.small_cluster_penalty > 0.0 && consensus.small_cluster_penalty <= 1.0) {
            return Err(ConfigError::invalid(
                "consensus.small_cluster_penalty",
                format!("{} is outside (0, 1]", consensus.small_cluster_penalty),
            ));
        }

        if !(consensus.medium_quality_score >= 0.0
            && consensus.high_quality_score >= consensus.medium_quality_score)
        {
            return Err(ConfigError::invalid(
                "consensus.high_quality_score",
                "quality thresholds must satisfy 0 <= medium <= high",
            ));
        }

        Ok(())
    }
}

fn validate_redshift_range(field: &'static str, z_min: f64, z_max: f64) -> Result<(), ConfigError> {
    if !(z_min > -1.0 && z_min.is_finite() && z_max.is_finite() && z_min < z_max) {
        return Err(ConfigError::invalid(
            field,
            format!("redshift range [{z_min}, {z_max}] must satisfy -1 < z_min < z_max"),
        ));
    }
    Ok(())
}

fn validate_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{value} is outside [0, 1]"),
        ));
    }
    Ok(())
}

pub fn load_config(config_path: impl AsRef<Path>) -> Result<ClassificationConfig, ConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    let config =
        ClassificationConfig::from_json_str(&source).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    Ok(config)
}
