//! Supernova spectrum identification core.
//!
//! An observed spectrum is rebinned onto a shared logarithmic wavelength
//! grid, flattened, and cross-correlated against a library of reference
//! templates. Per-template correlation peaks become [`domain::MatchRecord`]s,
//! which are filtered, ranked and finally clustered into a single
//! [`domain::ClassificationResult`].
//!
//! The stages, leaf-first:
//! - [`preprocess`]: raw spectrum to [`domain::CanonicalSpectrum`].
//! - [`templates`]: loading and filtering the template library.
//! - [`correlation`]: FFT cross-correlation, peak search, redshift estimates.
//! - [`ranking`]: quality thresholds and deterministic ordering.
//! - [`consensus`]: redshift clustering and the final type call.
//!
//! [`pipeline::Classifier`] wires them together and runs the per-template
//! correlations in parallel.

pub mod common;
pub mod consensus;
pub mod correlation;
pub mod domain;
pub mod numerics;
pub mod pipeline;
pub mod preprocess;
pub mod ranking;
pub mod serialization;
pub mod templates;

pub use common::config::{ClassificationConfig, load_config};
pub use domain::{
    CanonicalSpectrum, ClassificationResult, MatchRecord, SnidError, SnidErrorCategory,
    SnidResult, Spectrum, Template,
};
pub use pipeline::{
    CancellationToken, ClassificationReport, Classifier, RunOutcome, TemplateProgress,
};
pub use templates::{TemplateFilter, TemplateStore};
