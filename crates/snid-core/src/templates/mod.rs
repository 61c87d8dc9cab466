//! Template library: loading, validation and filtered iteration.
//!
//! A store is built once per process from one library file or a directory
//! of `*.json` library files, then shared read-only (see
//! [`TemplateStore::into_shared`]). Every template is checked against the
//! expected canonical grid while loading, so correlation never sees a
//! mismatched template.

pub mod format;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobMatcher};

use crate::domain::{CanonicalSpectrum, Template};
use crate::numerics::LogWavelengthGrid;
use crate::serialization::to_json_text;

use format::{
    GridDocument, LIBRARY_FORMAT_VERSION, LibraryDocument, TemplateDocument, default_valid_mask,
};

const LIBRARY_FILE_PATTERN: &str = "*.json";
const DOCUMENT_SCOPE: &str = "(document)";

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("failed to read template library '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write template library '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed template library '{}' [{template}]: {reason}", path.display())]
    Format {
        path: PathBuf,
        template: String,
        reason: String,
    },
    #[error(
        "grid mismatch in '{}' [{template}]: expected {expected}, found {actual}",
        path.display()
    )]
    GridMismatch {
        path: PathBuf,
        template: String,
        expected: String,
        actual: String,
    },
    #[error("invalid library file pattern: {0}")]
    Pattern(#[from] globset::Error),
}

impl LibraryError {
    fn format(path: &Path, template: &str, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}

/// Selection applied by [`TemplateStore::iterate`]. Empty lists select
/// everything; templates without an age never pass an age bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateFilter {
    pub types: Vec<String>,
    pub subtypes: Vec<String>,
    pub age_min: Option<f64>,
    pub age_max: Option<f64>,
    pub include_ids: Vec<String>,
    pub exclude_ids: Vec<String>,
}

impl TemplateFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_age_range(mut self, age_min: Option<f64>, age_max: Option<f64>) -> Self {
        self.age_min = age_min;
        self.age_max = age_max;
        self
    }

    pub fn excluding<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn accepts(&self, template: &Template) -> bool {
        if !self.include_ids.is_empty() && !self.include_ids.contains(&template.id) {
            return false;
        }

        if self.exclude_ids.contains(&template.id) {
            return false;
        }

        if !self.types.is_empty() && !self.types.contains(&template.type_name) {
            return false;
        }

        if !self.subtypes.is_empty() && !self.subtypes.contains(&template.subtype) {
            return false;
        }

        if self.age_min.is_none() && self.age_max.is_none() {
            return true;
        }

        template.age.is_some_and(|age| {
            self.age_min.is_none_or(|min| age >= min) && self.age_max.is_none_or(|max| age <= max)
        })
    }
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    grid: LogWavelengthGrid,
    templates: Vec<Template>,
    index: BTreeMap<String, usize>,
}

impl TemplateStore {
    /// Loads a library file, or every `*.json` file of a directory in sorted
    /// path order.
    pub fn load(path: impl AsRef<Path>, expected: &LogWavelengthGrid) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        let files = library_files(path)?;
        if files.is_empty() {
            return Err(LibraryError::format(
                path,
                DOCUMENT_SCOPE,
                "no template library files found",
            ));
        }

        let mut templates = Vec::new();
        for file in &files {
            let document = read_library_document(file)?;
            let loaded = templates_from_document(file, &document, expected)?;
            tracing::debug!(
                file = %file.display(),
                templates = loaded.len(),
                "loaded template library file"
            );
            templates.extend(loaded);
        }

        let store = Self::from_templates(*expected, templates).map_err(|error| match error {
            StoreBuildError::Duplicate(id) => {
                LibraryError::format(path, &id, "duplicate template id")
            }
            StoreBuildError::Grid { id, actual } => LibraryError::GridMismatch {
                path: path.to_path_buf(),
                template: id,
                expected: GridDocument::from_grid(expected).to_string(),
                actual,
            },
        })?;
        tracing::info!(
            templates = store.len(),
            files = files.len(),
            "template library ready"
        );
        Ok(store)
    }

    /// Builds a store from already-constructed templates.
    pub fn from_templates(
        grid: LogWavelengthGrid,
        templates: Vec<Template>,
    ) -> Result<Self, StoreBuildError> {
        let mut index = BTreeMap::new();
        for (position, template) in templates.iter().enumerate() {
            if !template.spectrum.grid().matches(&grid) {
                return Err(StoreBuildError::Grid {
                    id: template.id.clone(),
                    actual: GridDocument::from_grid(template.spectrum.grid()).to_string(),
                });
            }
            if index.insert(template.id.clone(), position).is_some() {
                return Err(StoreBuildError::Duplicate(template.id.clone()));
            }
        }

        Ok(Self {
            grid,
            templates,
            index,
        })
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub const fn grid(&self) -> &LogWavelengthGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.index.get(id).map(|position| &self.templates[*position])
    }

    /// Fresh, finite iterator over the templates `filter` accepts, in load
    /// order. Each call starts from the beginning.
    pub fn iterate<'a>(
        &'a self,
        filter: &'a TemplateFilter,
    ) -> impl Iterator<Item = &'a Template> + 'a {
        self.templates
            .iter()
            .filter(move |template| filter.accepts(template))
    }

    /// Template count per type, ordered by type name.
    pub fn type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for template in &self.templates {
            *counts.entry(template.type_name.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn subtypes(&self) -> BTreeSet<(String, String)> {
        self.templates
            .iter()
            .map(|template| (template.type_name.clone(), template.subtype.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreBuildError {
    #[error("duplicate template id '{0}'")]
    Duplicate(String),
    #[error("template '{id}' is on a different grid ({actual})")]
    Grid { id: String, actual: String },
}

/// Library files behind `path`: the file itself, or the sorted `*.json`
/// entries of a directory.
pub fn library_files(path: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let metadata = fs::metadata(path).map_err(|source| LibraryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let matcher: GlobMatcher = Glob::new(LIBRARY_FILE_PATTERN)?.compile_matcher();
    let entries = fs::read_dir(path).map_err(|source| LibraryError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LibraryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let candidate = entry.path();
        let is_match = candidate
            .file_name()
            .is_some_and(|name| matcher.is_match(Path::new(name)));
        if is_match && candidate.is_file() {
            files.push(candidate);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_library_document(path: &Path) -> Result<LibraryDocument, LibraryError> {
    let source = fs::read_to_string(path).map_err(|source| LibraryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source)
        .map_err(|error| LibraryError::format(path, DOCUMENT_SCOPE, error.to_string()))
}

/// Validates one document against `expected` and converts its entries.
pub fn templates_from_document(
    path: &Path,
    document: &LibraryDocument,
    expected: &LogWavelengthGrid,
) -> Result<Vec<Template>, LibraryError> {
    if document.format_version != LIBRARY_FORMAT_VERSION {
        return Err(LibraryError::format(
            path,
            DOCUMENT_SCOPE,
            format!(
                "unsupported format_version {} (expected {LIBRARY_FORMAT_VERSION})",
                document.format_version
            ),
        ));
    }

    check_grid(path, DOCUMENT_SCOPE, &document.grid, expected)?;

    let source = path.display().to_string();
    document
        .templates
        .iter()
        .map(|entry| template_from_entry(path, &source, entry, expected))
        .collect()
}

fn template_from_entry(
    path: &Path,
    source: &str,
    entry: &TemplateDocument,
    expected: &LogWavelengthGrid,
) -> Result<Template, LibraryError> {
    let id = entry.id.trim();
    if id.is_empty() {
        return Err(LibraryError::format(path, DOCUMENT_SCOPE, "template with empty id"));
    }

    if entry.type_name.trim().is_empty() {
        return Err(LibraryError::format(path, id, "template type is empty"));
    }

    if let Some(grid) = &entry.grid {
        check_grid(path, id, grid, expected)?;
    }

    if entry.flux.len() != expected.num_points() {
        return Err(LibraryError::GridMismatch {
            path: path.to_path_buf(),
            template: id.to_string(),
            expected: format!("{} flux samples", expected.num_points()),
            actual: format!("{} flux samples", entry.flux.len()),
        });
    }

    if let Some(age) = entry.age
        && !age.is_finite()
    {
        return Err(LibraryError::format(path, id, "age is not finite"));
    }

    let valid = match &entry.valid {
        Some(valid) if valid.len() != entry.flux.len() => {
            return Err(LibraryError::format(
                path,
                id,
                format!(
                    "valid mask has {} entries for {} flux samples",
                    valid.len(),
                    entry.flux.len()
                ),
            ));
        }
        Some(valid) => valid.clone(),
        None => default_valid_mask(&entry.flux),
    };

    let spectrum = CanonicalSpectrum::new(*expected, entry.flux.clone(), valid)
        .map_err(|error| LibraryError::format(path, id, error.to_string()))?;

    Ok(Template {
        id: id.to_string(),
        type_name: entry.type_name.trim().to_string(),
        subtype: entry.subtype.trim().to_string(),
        age: entry.age,
        source: source.to_string(),
        spectrum,
    })
}

fn check_grid(
    path: &Path,
    template: &str,
    grid: &GridDocument,
    expected: &LogWavelengthGrid,
) -> Result<(), LibraryError> {
    let matches = grid
        .to_grid()
        .is_some_and(|grid| grid.matches(expected));
    if !matches {
        return Err(LibraryError::GridMismatch {
            path: path.to_path_buf(),
            template: template.to_string(),
            expected: GridDocument::from_grid(expected).to_string(),
            actual: grid.to_string(),
        });
    }
    Ok(())
}

pub fn library_document(grid: &LogWavelengthGrid, templates: &[Template]) -> LibraryDocument {
    LibraryDocument {
        format_version: LIBRARY_FORMAT_VERSION,
        grid: GridDocument::from_grid(grid),
        templates: templates
            .iter()
            .map(|template| TemplateDocument {
                id: template.id.clone(),
                type_name: template.type_name.clone(),
                subtype: template.subtype.clone(),
                age: template.age,
                flux: template.spectrum.flux().to_vec(),
                valid: Some(template.spectrum.valid().to_vec()),
                grid: None,
            })
            .collect(),
    }
}

/// Writes `templates` as a single library document.
pub fn save_library(
    path: impl AsRef<Path>,
    grid: &LogWavelengthGrid,
    templates: &[Template],
) -> Result<(), LibraryError> {
    let path = path.as_ref();
    let text = to_json_text(&library_document(grid, templates)).map_err(|source| {
        LibraryError::Write {
            path: path.to_path_buf(),
            source,
        }
    })?;
    fs::write(path, text).map_err(|source| LibraryError::Write {
        path: path.to_path_buf(),
        source,
    })
}
