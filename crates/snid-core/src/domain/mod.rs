pub mod errors;

pub use errors::{SnidError, SnidErrorCategory, SnidResult};

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::numerics::LogWavelengthGrid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpectrumError {
    #[error("spectrum has no samples")]
    Empty,
    #[error("wavelength/flux length mismatch: wavelength={wavelength}, flux={flux}")]
    LengthMismatch { wavelength: usize, flux: usize },
    #[error("variance length {variance} does not match flux length {flux}")]
    VarianceLengthMismatch { variance: usize, flux: usize },
    #[error("wavelength at index {index} is not finite")]
    NonFiniteWavelength { index: usize },
    #[error("wavelengths must be strictly increasing (index {index}: {previous} -> {current})")]
    NotIncreasing {
        index: usize,
        previous: f64,
        current: f64,
    },
}

/// Raw observed spectrum: strictly increasing wavelengths in Angstrom, flux
/// in arbitrary units and an optional per-sample variance.
///
/// Flux and variance may still contain non-finite samples; the preprocessor
/// drops those before rebinning.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    wavelength: Vec<f64>,
    flux: Vec<f64>,
    variance: Option<Vec<f64>>,
}

impl Spectrum {
    pub fn new(wavelength: Vec<f64>, flux: Vec<f64>) -> Result<Self, SpectrumError> {
        if wavelength.is_empty() {
            return Err(SpectrumError::Empty);
        }

        if wavelength.len() != flux.len() {
            return Err(SpectrumError::LengthMismatch {
                wavelength: wavelength.len(),
                flux: flux.len(),
            });
        }

        if let Some(index) = wavelength.iter().position(|value| !value.is_finite()) {
            return Err(SpectrumError::NonFiniteWavelength { index });
        }

        if let Some(offset) = wavelength.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(SpectrumError::NotIncreasing {
                index: offset + 1,
                previous: wavelength[offset],
                current: wavelength[offset + 1],
            });
        }

        Ok(Self {
            wavelength,
            flux,
            variance: None,
        })
    }

    pub fn with_variance(mut self, variance: Vec<f64>) -> Result<Self, SpectrumError> {
        if variance.len() != self.flux.len() {
            return Err(SpectrumError::VarianceLengthMismatch {
                variance: variance.len(),
                flux: self.flux.len(),
            });
        }
        self.variance = Some(variance);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    pub fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn variance(&self) -> Option<&[f64]> {
        self.variance.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CanonicalSpectrumError {
    #[error("canonical arrays must have {expected} points, got flux={flux}, valid={valid}")]
    LengthMismatch {
        expected: usize,
        flux: usize,
        valid: usize,
    },
    #[error("canonical flux at bin {index} is not finite")]
    NonFinite { index: usize },
}

/// Half-open span `[start, end)` of grid bins between the first and last
/// valid bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidRange {
    pub start: usize,
    pub end: usize,
}

impl ValidRange {
    /// Span from the first to the last set flag, if any.
    pub fn of(valid: &[bool]) -> Option<Self> {
        let start = valid.iter().position(|flag| *flag)?;
        let last = valid.iter().rposition(|flag| *flag)?;
        Some(Self {
            start,
            end: last + 1,
        })
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Flattened, apodized flux on the shared log grid with its validity mask.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalSpectrum {
    grid: LogWavelengthGrid,
    flux: Vec<f64>,
    valid: Vec<bool>,
    valid_count: usize,
    valid_range: Option<ValidRange>,
}

impl CanonicalSpectrum {
    pub fn new(
        grid: LogWavelengthGrid,
        flux: Vec<f64>,
        valid: Vec<bool>,
    ) -> Result<Self, CanonicalSpectrumError> {
        let expected = grid.num_points();
        if flux.len() != expected || valid.len() != expected {
            return Err(CanonicalSpectrumError::LengthMismatch {
                expected,
                flux: flux.len(),
                valid: valid.len(),
            });
        }

        if let Some(index) = flux.iter().position(|value| !value.is_finite()) {
            return Err(CanonicalSpectrumError::NonFinite { index });
        }

        let valid_count = valid.iter().filter(|flag| **flag).count();
        let valid_range = ValidRange::of(&valid);

        Ok(Self {
            grid,
            flux,
            valid,
            valid_count,
            valid_range,
        })
    }

    pub const fn grid(&self) -> &LogWavelengthGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }

    pub fn flux(&self) -> &[f64] {
        &self.flux
    }

    pub fn valid(&self) -> &[bool] {
        &self.valid
    }

    pub const fn valid_count(&self) -> usize {
        self.valid_count
    }

    pub const fn valid_range(&self) -> Option<ValidRange> {
        self.valid_range
    }
}

/// Library entry: a canonical spectrum plus classification metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: String,
    pub type_name: String,
    pub subtype: String,
    /// Days relative to maximum light, when known.
    pub age: Option<f64>,
    pub source: String,
    pub spectrum: CanonicalSpectrum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Valid,
    InsufficientOverlap,
}

impl MatchStatus {
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// One correlation peak of one template against the input spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub template_id: String,
    pub type_name: String,
    pub subtype: String,
    pub age: Option<f64>,
    pub redshift: f64,
    pub redshift_error: f64,
    /// `r * lap`.
    pub quality: f64,
    pub r_value: f64,
    pub overlap: f64,
    pub peak_height: f64,
    pub peak_width: f64,
    pub lag: f64,
    /// 0 for the strongest peak of this template.
    pub peak_rank: usize,
    pub status: MatchStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::VeryLow => "very_low",
        }
    }
}

impl Display for ConfidenceLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    High,
    Medium,
    Low,
}

impl QualityLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl Display for QualityLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedshiftSpanQuality {
    Tight,
    Moderate,
    Loose,
    VeryLoose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub type_name: String,
    pub redshift: f64,
    pub score: f64,
    pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub best_type: String,
    /// Winning group score over the sum of all group scores.
    pub type_confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub best_subtype: Option<String>,
    pub subtype_confidence: f64,
    pub redshift: f64,
    pub redshift_error: f64,
    pub age: Option<f64>,
    pub group_score: f64,
    pub quality_level: QualityLevel,
    pub redshift_span: f64,
    pub redshift_span_quality: RedshiftSpanQuality,
    pub low_confidence: bool,
    pub members: Vec<MatchRecord>,
    pub runner_up: Option<GroupSummary>,
}

#[cfg(test)]
mod tests {
    use super::{CanonicalSpectrum, CanonicalSpectrumError, Spectrum, SpectrumError, ValidRange};
    use crate::numerics::LogWavelengthGrid;

    #[test]
    fn spectrum_requires_strictly_increasing_wavelengths() {
        assert_eq!(Spectrum::new(vec![], vec![]), Err(SpectrumError::Empty));
        assert!(matches!(
            Spectrum::new(vec![1.0, 2.0], vec![1.0]),
            Err(SpectrumError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Spectrum::new(vec![1.0, 2.0, 2.0], vec![1.0, 1.0, 1.0]),
            Err(SpectrumError::NotIncreasing { index: 2, .. })
        ));
        assert!(matches!(
            Spectrum::new(vec![1.0, f64::NAN], vec![1.0, 1.0]),
            Err(SpectrumError::NonFiniteWavelength { index: 1 })
        ));

        let spectrum = Spectrum::new(vec![1.0, 2.0], vec![f64::NAN, 1.0]).expect("spectrum");
        assert_eq!(spectrum.len(), 2);
        assert!(spectrum.variance().is_none());
        assert!(spectrum.clone().with_variance(vec![1.0]).is_err());
    }

    #[test]
    fn canonical_spectrum_tracks_valid_range() {
        let grid = LogWavelengthGrid::new(16, 4000.0, 8000.0).expect("grid");
        let mut valid = vec![false; 16];
        for flag in &mut valid[3..9] {
            *flag = true;
        }
        valid[5] = false;

        let spectrum = CanonicalSpectrum::new(grid, vec![0.0; 16], valid).expect("canonical");
        assert_eq!(spectrum.valid_count(), 5);
        assert_eq!(spectrum.valid_range(), Some(ValidRange { start: 3, end: 9 }));

        let empty = CanonicalSpectrum::new(grid, vec![0.0; 16], vec![false; 16]).expect("empty");
        assert_eq!(empty.valid_range(), None);

        assert!(matches!(
            CanonicalSpectrum::new(grid, vec![0.0; 15], vec![true; 16]),
            Err(CanonicalSpectrumError::LengthMismatch { .. })
        ));
        let mut flux = vec![0.0; 16];
        flux[4] = f64::INFINITY;
        assert_eq!(
            CanonicalSpectrum::new(grid, flux, vec![true; 16]),
            Err(CanonicalSpectrumError::NonFinite { index: 4 })
        );
    }
}
