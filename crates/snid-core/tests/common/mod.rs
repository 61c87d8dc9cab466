#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use snid_core::preprocess::{Preprocessor, TemplateMetadata};
use snid_core::{ClassificationConfig, Spectrum, Template};

pub const REST_MIN: f64 = 3000.0;
pub const REST_MAX: f64 = 9400.0;
pub const STEP: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Ia,
    II,
    Ib,
}

impl Family {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Ia => "Ia",
            Self::II => "II",
            Self::Ib => "Ib",
        }
    }

    pub fn subtype(self) -> &'static str {
        match self {
            Self::Ia => "Ia-norm",
            Self::II => "IIP",
            Self::Ib => "Ib-norm",
        }
    }

    /// (center, sigma, depth) in the rest frame; negative depth is emission.
    fn lines(self) -> &'static [(f64, f64, f64)] {
        match self {
            Self::Ia => &[
                (3750.0, 80.0, 0.50),
                (4100.0, 60.0, 0.30),
                (4350.0, 70.0, 0.35),
                (4900.0, 80.0, 0.40),
                (5400.0, 50.0, 0.25),
                (5650.0, 50.0, 0.30),
                (6150.0, 70.0, 0.60),
                (7500.0, 120.0, 0.45),
                (8300.0, 150.0, 0.40),
            ],
            Self::II => &[
                (4750.0, 40.0, 0.25),
                (4861.0, 40.0, -0.60),
                (5890.0, 60.0, 0.30),
                (6420.0, 50.0, 0.40),
                (6563.0, 60.0, -1.50),
                (8600.0, 120.0, 0.30),
            ],
            Self::Ib => &[
                (4471.0, 50.0, 0.30),
                (5000.0, 80.0, 0.25),
                (5876.0, 60.0, 0.50),
                (6678.0, 60.0, 0.35),
                (7065.0, 70.0, 0.35),
                (7774.0, 80.0, 0.30),
            ],
        }
    }

    /// Rest-frame flux density at `wavelength` for a given epoch.
    pub fn flux(self, wavelength: f64, age: f64) -> f64 {
        let continuum = 1.0 + 0.8 * (-0.5 * ((wavelength - 4500.0) / 2500.0).powi(2)).exp();
        let strength = 1.0 + 0.02 * age;
        let profile: f64 = self
            .lines()
            .iter()
            .map(|(center, sigma, depth)| {
                strength * depth * (-0.5 * ((wavelength - center) / sigma).powi(2)).exp()
            })
            .sum();
        continuum * (1.0 - profile)
    }
}

/// Noise-free spectrum of `family` observed at `redshift`.
pub fn observed(family: Family, age: f64, redshift: f64) -> Spectrum {
    let rest: Vec<f64> = (0..)
        .map(|index| REST_MIN + STEP * index as f64)
        .take_while(|wavelength| *wavelength <= REST_MAX)
        .collect();
    let flux = rest.iter().map(|wavelength| family.flux(*wavelength, age)).collect();
    let wavelength = rest.iter().map(|wavelength| wavelength * (1.0 + redshift)).collect();
    Spectrum::new(wavelength, flux).expect("synthetic spectrum")
}

/// Featureless continuum with deterministic uniform noise.
pub fn noise(seed: u64, amplitude: f64) -> Spectrum {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let wavelength: Vec<f64> = (0..)
        .map(|index| REST_MIN + STEP * index as f64)
        .take_while(|wavelength| *wavelength <= REST_MAX)
        .collect();
    let flux = wavelength
        .iter()
        .map(|_| 1.0 + amplitude * rng.gen_range(-1.0..1.0))
        .collect();
    Spectrum::new(wavelength, flux).expect("noise spectrum")
}

pub fn template_id(family: Family, age: f64) -> String {
    format!("{}-age{}", family.type_name(), age)
}

pub fn build_template(config: &ClassificationConfig, family: Family, age: f64) -> Template {
    let preprocessor =
        Preprocessor::new(&config.grid, config.preprocess.clone()).expect("preprocessor");
    preprocessor
        .build_template(
            &observed(family, age, 0.0),
            TemplateMetadata {
                id: template_id(family, age),
                type_name: family.type_name().to_string(),
                subtype: family.subtype().to_string(),
                age: Some(age),
                source: "synthetic".to_string(),
            },
        )
        .expect("template")
}

pub fn library(config: &ClassificationConfig) -> Vec<Template> {
    [
        (Family::Ia, 0.0),
        (Family::Ia, 10.0),
        (Family::II, 5.0),
        (Family::Ib, 0.0),
    ]
    .into_iter()
    .map(|(family, age)| build_template(config, family, age))
    .collect()
}
