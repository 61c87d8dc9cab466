//! One classification run: preprocessing, per-template correlation on the
//! rayon pool, ranking and consensus.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::common::config::{ClassificationConfig, ConfigError};
use crate::consensus::classify_matches;
use crate::correlation::CorrelationEngine;
use crate::domain::{CanonicalSpectrum, ClassificationResult, MatchRecord, Spectrum, Template};
use crate::numerics::LogWavelengthGrid;
use crate::preprocess::{PreprocessError, Preprocessor};
use crate::ranking::{rank_matches, truncate};
use crate::templates::format::GridDocument;
use crate::templates::{TemplateFilter, TemplateStore};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("no match survived filtering ({survivors} of {candidates} candidate records)")]
    NoMatch { candidates: usize, survivors: usize },
    #[error("spectrum grid {actual} does not match the configured grid {expected}")]
    GridMismatch { expected: String, actual: String },
    #[error("invalid configuration value for '{field}': {reason}")]
    Config { field: &'static str, reason: String },
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
}

impl From<ConfigError> for ClassifyError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Invalid { field, reason } => Self::Config { field, reason },
            other => Self::Config {
                field: "config",
                reason: other.to_string(),
            },
        }
    }
}

impl ClassifyError {
    fn grid_mismatch(expected: &LogWavelengthGrid, actual: &LogWavelengthGrid) -> Self {
        Self::GridMismatch {
            expected: GridDocument::from_grid(expected).to_string(),
            actual: GridDocument::from_grid(actual).to_string(),
        }
    }
}

/// Shared stop flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub result: ClassificationResult,
    /// Ranked survivors, limited to the configured report length.
    pub matches: Vec<MatchRecord>,
    pub templates_correlated: usize,
    pub candidate_count: usize,
    pub survivor_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbortedRun {
    /// Templates whose correlation was started before cancellation.
    pub dispatched: usize,
    pub total: usize,
}

/// Reported once per correlated template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateProgress<'a> {
    pub template_id: &'a str,
    pub finished: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Complete(ClassificationReport),
    Aborted(AbortedRun),
}

impl RunOutcome {
    pub fn report(&self) -> Option<&ClassificationReport> {
        match self {
            Self::Complete(report) => Some(report),
            Self::Aborted(_) => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// Classifies spectra against a shared, read-only template store.
#[derive(Debug)]
pub struct Classifier {
    config: ClassificationConfig,
    store: Arc<TemplateStore>,
    preprocessor: Preprocessor,
    engine: CorrelationEngine,
}

impl Classifier {
    pub fn new(
        config: ClassificationConfig,
        store: Arc<TemplateStore>,
    ) -> Result<Self, ClassifyError> {
        let preprocessor = Preprocessor::new(&config.grid, config.preprocess.clone())?;
        config.validate()?;
        let grid = *preprocessor.grid();
        if !store.grid().matches(&grid) {
            return Err(ClassifyError::grid_mismatch(&grid, store.grid()));
        }
        let engine = CorrelationEngine::new(grid, config.correlation);

        Ok(Self {
            config,
            store,
            preprocessor,
            engine,
        })
    }

    pub fn config(&self) -> &ClassificationConfig {
        &self.config
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn engine(&self) -> &CorrelationEngine {
        &self.engine
    }

    pub fn classify_raw(
        &self,
        spectrum: &Spectrum,
        filter: &TemplateFilter,
        token: &CancellationToken,
    ) -> Result<RunOutcome, ClassifyError> {
        let canonical = self.preprocessor.process(spectrum)?;
        tracing::info!(
            raw_points = spectrum.len(),
            valid_bins = canonical.valid_count(),
            "spectrum preprocessed"
        );
        self.classify(&canonical, filter, token)
    }

    /// Correlates `spectrum` with every template `filter` accepts.
    ///
    /// The token is checked before each template; templates already being
    /// correlated finish, the rest are skipped and the run is reported as
    /// aborted.
    pub fn classify(
        &self,
        spectrum: &CanonicalSpectrum,
        filter: &TemplateFilter,
        token: &CancellationToken,
    ) -> Result<RunOutcome, ClassifyError> {
        self.classify_with_progress(spectrum, filter, token, |_| {})
    }

    /// [`Classifier::classify`], calling `progress` from the worker thread
    /// each time a template finishes.
    pub fn classify_with_progress<F>(
        &self,
        spectrum: &CanonicalSpectrum,
        filter: &TemplateFilter,
        token: &CancellationToken,
        progress: F,
    ) -> Result<RunOutcome, ClassifyError>
    where
        F: Fn(TemplateProgress<'_>) + Sync,
    {
        let grid = self.engine.grid();
        if !spectrum.grid().matches(grid) {
            return Err(ClassifyError::grid_mismatch(grid, spectrum.grid()));
        }

        let templates: Vec<&Template> = self.store.iterate(filter).collect();
        let total = templates.len();
        tracing::info!(templates = total, library = self.store.len(), "correlating");

        let input = self.engine.prepare(spectrum);
        let dispatched = AtomicUsize::new(0);
        let finished = AtomicUsize::new(0);
        let slots: Vec<Option<Vec<MatchRecord>>> = templates
            .par_iter()
            .map(|template| {
                if token.is_cancelled() {
                    return None;
                }
                dispatched.fetch_add(1, Ordering::Relaxed);
                let records = self.engine.match_template(&input, template);
                progress(TemplateProgress {
                    template_id: &template.id,
                    finished: finished.fetch_add(1, Ordering::Relaxed) + 1,
                    total,
                });
                Some(records)
            })
            .collect();

        let dispatched = dispatched.into_inner();
        if slots.iter().any(Option::is_none) {
            tracing::warn!(dispatched, total, "classification cancelled");
            return Ok(RunOutcome::Aborted(AbortedRun { dispatched, total }));
        }

        let candidates: Vec<MatchRecord> = slots.into_iter().flatten().flatten().collect();
        let ranked = rank_matches(&candidates, &self.config.filter);
        tracing::info!(
            candidates = candidates.len(),
            survivors = ranked.len(),
            "ranked matches"
        );

        let Some(result) = classify_matches(&ranked, &self.config.consensus) else {
            return Err(ClassifyError::NoMatch {
                candidates: candidates.len(),
                survivors: ranked.len(),
            });
        };
        if result.low_confidence {
            tracing::warn!(
                best_type = %result.best_type,
                confidence = %result.confidence_level,
                quality = %result.quality_level,
                "low-confidence classification"
            );
        } else {
            tracing::info!(
                best_type = %result.best_type,
                redshift = result.redshift,
                redshift_error = result.redshift_error,
                "classified"
            );
        }

        Ok(RunOutcome::Complete(ClassificationReport {
            result,
            matches: truncate(&ranked, self.config.filter.max_matches),
            templates_correlated: total,
            candidate_count: candidates.len(),
            survivor_count: ranked.len(),
        }))
    }
}
