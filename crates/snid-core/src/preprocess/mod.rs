//! Raw spectrum to canonical spectrum.
//!
//! Order of operations: drop unusable samples, apply wavelength masks,
//! variance-based clipping, optional smoothing, flux-conserving rebin,
//! robust clipping on the grid, continuum removal, apodization.

pub mod apodize;
pub mod clipping;
pub mod continuum;
pub mod rebin;

use crate::common::config::{ContinuumMethod, GridConfig, PreprocessConfig, SmoothingConfig};
use crate::domain::{
    CanonicalSpectrum, CanonicalSpectrumError, Spectrum, SpectrumError, Template, ValidRange,
};
use crate::numerics::{
    GridError, LogWavelengthGrid, SmoothingError, savitzky_golay, savitzky_golay_fwhm,
};

pub use clipping::WavelengthMask;
pub use rebin::Rebinned;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreprocessError {
    #[error(
        "insufficient data: {valid_points} valid bins spanning {span_angstrom:.1} A \
         (need {minimum_points} bins and {minimum_span_angstrom:.1} A)"
    )]
    InsufficientData {
        valid_points: usize,
        minimum_points: usize,
        span_angstrom: f64,
        minimum_span_angstrom: f64,
    },
    #[error("invalid grid: {0}")]
    InvalidGrid(#[from] GridError),
    #[error("invalid spectrum: {0}")]
    InvalidSpectrum(#[from] SpectrumError),
    #[error("invalid wavelength mask [{start}, {end}]")]
    InvalidMask { start: f64, end: f64 },
    #[error("smoothing failed: {0}")]
    Smoothing(#[from] SmoothingError),
    #[error("invalid canonical spectrum: {0}")]
    Canonical(#[from] CanonicalSpectrumError),
}

/// Metadata attached when a processed spectrum is turned into a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMetadata {
    pub id: String,
    pub type_name: String,
    pub subtype: String,
    pub age: Option<f64>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    grid: LogWavelengthGrid,
    config: PreprocessConfig,
    masks: Vec<WavelengthMask>,
}

impl Preprocessor {
    pub fn new(grid: &GridConfig, config: PreprocessConfig) -> Result<Self, PreprocessError> {
        Self::with_grid(grid.to_grid()?, config)
    }

    pub fn with_grid(
        grid: LogWavelengthGrid,
        config: PreprocessConfig,
    ) -> Result<Self, PreprocessError> {
        let masks = clipping::build_masks(&config)?;
        Ok(Self {
            grid,
            config,
            masks,
        })
    }

    pub const fn grid(&self) -> &LogWavelengthGrid {
        &self.grid
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn process(&self, spectrum: &Spectrum) -> Result<CanonicalSpectrum, PreprocessError> {
        let (wavelength, mut flux, variance) = self.usable_samples(spectrum);
        tracing::debug!(
            raw = spectrum.len(),
            usable = wavelength.len(),
            masks = self.masks.len(),
            "selected raw samples"
        );

        if let (Some(variance), Some(sigma)) = (variance.as_deref(), self.config.outlier_sigma) {
            let clipped = clipping::clip_with_variance(&mut flux, variance, sigma);
            tracing::debug!(clipped, "variance-based outlier clipping");
        }

        let flux = self.smooth(&wavelength, flux)?;

        let rebinned = rebin::rebin_flux_conserving(&wavelength, &flux, &self.grid);
        let mut valid = rebinned.valid_mask();
        let mut binned = rebinned.flux;
        self.check_coverage(&valid)?;

        if variance.is_none()
            && let Some(sigma) = self.config.outlier_sigma
        {
            let clipped = clipping::clip_outliers(&mut binned, &valid, sigma);
            tracing::debug!(clipped, "robust outlier clipping");
        }

        let level = match self.config.continuum {
            ContinuumMethod::Spline { knots } => {
                continuum::spline_continuum(&binned, &valid, knots)
            }
            ContinuumMethod::Gaussian { sigma } => {
                let sigma =
                    sigma.unwrap_or_else(|| continuum::auto_gaussian_sigma(&binned, &valid));
                tracing::debug!(sigma, "gaussian continuum");
                continuum::gaussian_continuum(&binned, &valid, sigma)
            }
        }
        .ok_or_else(|| self.insufficient(&valid))?;

        let mut flat = continuum::flatten(&binned, &level, &mut valid);
        self.check_coverage(&valid)?;

        if let Some(range) = ValidRange::of(&valid) {
            let taper = apodize::apodize(&mut flat, range, self.config.apodize_percent);
            if taper == 0 && self.config.apodize_percent > 0.0 {
                tracing::warn!(valid_bins = range.len(), "valid range too short to apodize");
            }
        }

        Ok(CanonicalSpectrum::new(self.grid, flat, valid)?)
    }

    /// Preprocesses `spectrum` and tags it as a library template.
    pub fn build_template(
        &self,
        spectrum: &Spectrum,
        metadata: TemplateMetadata,
    ) -> Result<Template, PreprocessError> {
        let canonical = self.process(spectrum)?;
        Ok(Template {
            id: metadata.id,
            type_name: metadata.type_name,
            subtype: metadata.subtype,
            age: metadata.age,
            source: metadata.source,
            spectrum: canonical,
        })
    }

    /// Drops non-finite flux, unusable variances and masked wavelengths.
    fn usable_samples(&self, spectrum: &Spectrum) -> (Vec<f64>, Vec<f64>, Option<Vec<f64>>) {
        let keep: Vec<usize> = (0..spectrum.len())
            .filter(|index| {
                let flux_ok = spectrum.flux()[*index].is_finite();
                let variance_ok = spectrum
                    .variance()
                    .is_none_or(|variance| variance[*index].is_finite() && variance[*index] > 0.0);
                flux_ok
                    && variance_ok
                    && !clipping::is_masked(&self.masks, spectrum.wavelength()[*index])
            })
            .collect();

        let pick = |values: &[f64]| keep.iter().map(|index| values[*index]).collect::<Vec<_>>();
        (
            pick(spectrum.wavelength()),
            pick(spectrum.flux()),
            spectrum.variance().map(pick),
        )
    }

    fn smooth(&self, wavelength: &[f64], flux: Vec<f64>) -> Result<Vec<f64>, PreprocessError> {
        match self.config.smoothing {
            SmoothingConfig::None => Ok(flux),
            SmoothingConfig::Pixels { window, order } => {
                Ok(savitzky_golay(&flux, window, order)?)
            }
            SmoothingConfig::Angstrom { fwhm, order } => {
                Ok(savitzky_golay_fwhm(wavelength, &flux, fwhm, order)?)
            }
        }
    }

    fn check_coverage(&self, valid: &[bool]) -> Result<(), PreprocessError> {
        let (count, span) = self.coverage(valid);
        if count < self.config.min_valid_points || span < self.config.min_span_angstrom {
            return Err(self.insufficient(valid));
        }
        Ok(())
    }

    fn insufficient(&self, valid: &[bool]) -> PreprocessError {
        let (valid_points, span_angstrom) = self.coverage(valid);
        PreprocessError::InsufficientData {
            valid_points,
            minimum_points: self.config.min_valid_points,
            span_angstrom,
            minimum_span_angstrom: self.config.min_span_angstrom,
        }
    }

    fn coverage(&self, valid: &[bool]) -> (usize, f64) {
        let count = valid.iter().filter(|flag| **flag).count();
        let span = match (
            valid.iter().position(|flag| *flag),
            valid.iter().rposition(|flag| *flag),
        ) {
            (Some(first), Some(last)) => self.grid.edge(last + 1) - self.grid.edge(first),
            _ => 0.0,
        };
        (count, span)
    }
}
