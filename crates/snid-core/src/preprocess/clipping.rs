use crate::common::config::PreprocessConfig;
use crate::common::constants::{
    HOST_EMISSION_LINES, SKY_LINE_HALF_WIDTH, SKY_LINES, TELLURIC_A_BAND,
};
use crate::numerics::{MAD_TO_SIGMA, median_absolute_deviation, running_median};

use super::PreprocessError;

/// Half-width of the running median used for outlier residuals (7 bins).
pub const OUTLIER_MEDIAN_HALF_WINDOW: usize = 3;

/// Closed wavelength interval removed from the raw spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavelengthMask {
    pub start: f64,
    pub end: f64,
}

impl WavelengthMask {
    pub fn new(start: f64, end: f64) -> Result<Self, PreprocessError> {
        if !start.is_finite() || !end.is_finite() || end < start {
            return Err(PreprocessError::InvalidMask { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            start: center - half_width,
            end: center + half_width,
        }
    }

    pub fn contains(&self, wavelength: f64) -> bool {
        (self.start..=self.end).contains(&wavelength)
    }
}

/// Collects user masks and the optional telluric, sky and host-line regions.
pub fn build_masks(config: &PreprocessConfig) -> Result<Vec<WavelengthMask>, PreprocessError> {
    let mut masks = config
        .wavelength_masks
        .iter()
        .map(|[start, end]| WavelengthMask::new(*start, *end))
        .collect::<Result<Vec<_>, _>>()?;

    if config.remove_telluric_a_band {
        masks.push(WavelengthMask {
            start: TELLURIC_A_BAND.0,
            end: TELLURIC_A_BAND.1,
        });
    }

    if config.clip_sky_lines {
        masks.extend(
            SKY_LINES
                .iter()
                .map(|line| WavelengthMask::around(*line, SKY_LINE_HALF_WIDTH)),
        );
    }

    if let Some(redshift) = config.host_emission_redshift {
        let stretch = 1.0 + redshift;
        masks.extend(
            HOST_EMISSION_LINES
                .iter()
                .map(|line| WavelengthMask::around(line * stretch, config.emission_clip_width)),
        );
    }

    Ok(masks)
}

pub fn is_masked(masks: &[WavelengthMask], wavelength: f64) -> bool {
    masks.iter().any(|mask| mask.contains(wavelength))
}

/// Replaces samples further than `sigma` standard deviations (from the
/// per-sample variance) from the local running median. Returns the number of
/// replaced samples.
pub fn clip_with_variance(flux: &mut [f64], variance: &[f64], sigma: f64) -> usize {
    let local = running_median(flux, OUTLIER_MEDIAN_HALF_WINDOW);
    let mut clipped = 0;
    for ((value, local), variance) in flux.iter_mut().zip(&local).zip(variance) {
        if (*value - local).abs() > sigma * variance.sqrt() {
            *value = *local;
            clipped += 1;
        }
    }
    clipped
}

/// Robust clipping of valid bins against a running median, with the noise
/// scale taken from the MAD of the residuals. Invalid bins are neither used
/// nor modified. A zero MAD leaves the data untouched.
pub fn clip_outliers(flux: &mut [f64], valid: &[bool], sigma: f64) -> usize {
    let indices: Vec<usize> = (0..flux.len()).filter(|index| valid[*index]).collect();
    if indices.len() < 2 * OUTLIER_MEDIAN_HALF_WINDOW + 1 {
        return 0;
    }

    let values: Vec<f64> = indices.iter().map(|index| flux[*index]).collect();
    let local = running_median(&values, OUTLIER_MEDIAN_HALF_WINDOW);
    let residuals: Vec<f64> = values.iter().zip(&local).map(|(v, m)| v - m).collect();
    let Some(mad) = median_absolute_deviation(&residuals) else {
        return 0;
    };
    if mad <= 0.0 {
        return 0;
    }

    let threshold = sigma * MAD_TO_SIGMA * mad;
    let mut clipped = 0;
    for ((index, residual), local) in indices.iter().zip(&residuals).zip(&local) {
        if residual.abs() > threshold {
            flux[*index] = *local;
            clipped += 1;
        }
    }
    clipped
}

#[cfg(test)]
mod tests {
    use super::{WavelengthMask, build_masks, clip_outliers, clip_with_variance, is_masked};
    use crate::common::config::PreprocessConfig;
    use crate::preprocess::PreprocessError;

    #[test]
    fn masks_reject_reversed_bounds() {
        assert_eq!(
            WavelengthMask::new(5100.0, 5000.0),
            Err(PreprocessError::InvalidMask {
                start: 5100.0,
                end: 5000.0
            })
        );

        let config = PreprocessConfig {
            wavelength_masks: vec![[6000.0, 5000.0]],
            ..PreprocessConfig::default()
        };
        assert!(build_masks(&config).is_err());
    }

    #[test]
    fn optional_regions_are_added_on_request() {
        let config = PreprocessConfig {
            wavelength_masks: vec![[4000.0, 4010.0]],
            remove_telluric_a_band: true,
            clip_sky_lines: true,
            host_emission_redshift: Some(0.01),
            emission_clip_width: 10.0,
            ..PreprocessConfig::default()
        };
        let masks = build_masks(&config).expect("masks");
        assert_eq!(masks.len(), 1 + 1 + 3 + 9);

        assert!(is_masked(&masks, 4005.0));
        assert!(is_masked(&masks, 7600.0));
        assert!(is_masked(&masks, 5590.0));
        assert!(is_masked(&masks, 6562.8 * 1.01 + 5.0));
        assert!(!is_masked(&masks, 6562.8 + 5.0));
        assert!(!is_masked(&masks, 5000.0 - 100.0));

        assert!(build_masks(&PreprocessConfig::default()).expect("masks").is_empty());
    }

    #[test]
    fn canonical_clipping_replaces_spikes_only() {
        let mut flux: Vec<f64> = (0..60)
            .map(|index| 1.0 + 0.01 * ((index * 7919) % 13) as f64)
            .collect();
        let mut valid = vec![true; 60];
        valid[0] = false;
        flux[30] = 25.0;
        let before = flux.clone();

        let clipped = clip_outliers(&mut flux, &valid, 5.0);
        assert_eq!(clipped, 1);
        assert!(flux[30] < 1.2);
        for index in (0..60).filter(|index| *index != 30) {
            assert_eq!(flux[index], before[index]);
        }
    }

    #[test]
    fn canonical_clipping_skips_zero_mad() {
        let mut flux = vec![1.0; 20];
        flux[10] = 50.0;
        assert_eq!(clip_outliers(&mut flux, &vec![true; 20], 5.0), 0);
        assert_eq!(flux[10], 50.0);
    }

    #[test]
    fn variance_clipping_uses_per_sample_sigma() {
        let mut flux = vec![1.0, 1.1, 0.9, 9.0, 1.0, 1.05, 0.95];
        let variance = vec![0.01; 7];
        let clipped = clip_with_variance(&mut flux, &variance, 5.0);
        assert_eq!(clipped, 1);
        assert!((flux[3] - 1.0).abs() < 0.11);
    }
}
