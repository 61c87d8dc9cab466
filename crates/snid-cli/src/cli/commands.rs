use super::CliError;
use super::helpers::*;
use serde::Serialize;
use snid_core::preprocess::{Preprocessor, TemplateMetadata};
use snid_core::templates::format::GridDocument;
use snid_core::templates::save_library;
use snid_core::{
    CancellationToken, ClassificationConfig, Classifier, RunOutcome, SnidError, TemplateFilter,
    TemplateStore,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct IdentifyArgs {
    /// Spectrum JSON file
    spectrum: PathBuf,

    /// Template library file or directory
    library: PathBuf,

    /// Classification config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lowest redshift searched and accepted
    #[arg(long, allow_negative_numbers = true)]
    zmin: Option<f64>,

    /// Highest redshift searched and accepted
    #[arg(long, allow_negative_numbers = true)]
    zmax: Option<f64>,

    /// Minimum match quality (rlap)
    #[arg(long)]
    rlapmin: Option<f64>,

    /// Minimum overlap fraction
    #[arg(long)]
    lapmin: Option<f64>,

    /// Evaluate every template at this redshift only
    #[arg(long)]
    forced_redshift: Option<f64>,

    /// Only use templates of these types
    #[arg(long, value_delimiter = ',')]
    type_filter: Vec<String>,

    /// Lowest template age
    #[arg(long, allow_negative_numbers = true)]
    age_min: Option<f64>,

    /// Highest template age
    #[arg(long, allow_negative_numbers = true)]
    age_max: Option<f64>,

    /// Template ids to leave out
    #[arg(long, value_delimiter = ',')]
    exclude_templates: Vec<String>,

    /// Number of ranked matches written to the report
    #[arg(long)]
    max_output_templates: Option<usize>,

    /// Report path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

impl IdentifyArgs {
    fn apply_overrides(&self, config: &mut ClassificationConfig) {
        if let Some(zmin) = self.zmin {
            config.correlation.z_min = zmin;
            config.filter.z_min = zmin;
        }
        if let Some(zmax) = self.zmax {
            config.correlation.z_max = zmax;
            config.filter.z_max = zmax;
        }
        if let Some(rlapmin) = self.rlapmin {
            config.filter.min_quality = rlapmin;
        }
        if let Some(lapmin) = self.lapmin {
            config.correlation.min_overlap = lapmin;
            config.filter.min_overlap = lapmin;
        }
        if self.forced_redshift.is_some() {
            config.correlation.forced_redshift = self.forced_redshift;
        }
        if self.max_output_templates.is_some() {
            config.filter.max_matches = self.max_output_templates;
        }
    }

    fn filter(&self) -> TemplateFilter {
        let mut filter = TemplateFilter::all();
        if !self.type_filter.is_empty() {
            filter = filter.with_types(self.type_filter.iter().cloned());
        }
        filter
            .with_age_range(self.age_min, self.age_max)
            .excluding(self.exclude_templates.iter().cloned())
    }
}

#[derive(clap::Args)]
pub(super) struct LibraryArgs {
    /// Template library file or directory
    library: PathBuf,

    /// Classification config JSON (for the grid)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct TemplateArgs {
    /// Spectrum JSON file, in the rest frame
    spectrum: PathBuf,

    /// Template id
    #[arg(long)]
    id: String,

    /// Type label
    #[arg(long = "type")]
    type_name: String,

    /// Subtype label
    #[arg(long, default_value = "")]
    subtype: String,

    /// Epoch in days relative to maximum light
    #[arg(long, allow_negative_numbers = true)]
    age: Option<f64>,

    /// Library file to create or extend
    #[arg(long)]
    output: PathBuf,

    /// Classification config JSON
    #[arg(long)]
    config: Option<PathBuf>,
}

pub(super) fn run_identify_command(args: IdentifyArgs) -> Result<i32, CliError> {
    let mut config = load_configuration(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate().map_err(CliError::compute)?;

    let grid = configured_grid(&config)?;
    let store = TemplateStore::load(&args.library, &grid).map_err(CliError::compute)?;
    let spectrum = read_spectrum(&args.spectrum)?;
    let classifier = Classifier::new(config, store.into_shared()).map_err(CliError::compute)?;

    let outcome = classifier
        .classify_raw(&spectrum, &args.filter(), &CancellationToken::new())
        .map_err(CliError::compute)?;
    match outcome {
        RunOutcome::Complete(report) => {
            emit_json(&report, args.output.as_deref())?;
            if args.output.is_some() {
                eprintln!(
                    "{} z={:.5}+/-{:.5} ({} confidence)",
                    report.result.best_type,
                    report.result.redshift,
                    report.result.redshift_error,
                    report.result.confidence_level
                );
            }
            Ok(0)
        }
        RunOutcome::Aborted(aborted) => Err(CliError::Compute(SnidError::computation(
            "RUN.ABORTED",
            format!(
                "classification aborted after {} of {} templates",
                aborted.dispatched, aborted.total
            ),
        ))),
    }
}

#[derive(Debug, Serialize)]
struct LibrarySummary {
    templates: usize,
    grid: GridDocument,
    types: BTreeMap<String, usize>,
    subtypes: BTreeMap<String, Vec<String>>,
}

pub(super) fn run_library_command(args: LibraryArgs) -> Result<i32, CliError> {
    let config = load_configuration(args.config.as_deref())?;
    let grid = configured_grid(&config)?;
    let store = TemplateStore::load(&args.library, &grid).map_err(CliError::compute)?;

    let mut subtypes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (type_name, subtype) in store.subtypes() {
        subtypes.entry(type_name).or_default().push(subtype);
    }
    let summary = LibrarySummary {
        templates: store.len(),
        grid: GridDocument::from_grid(store.grid()),
        types: store.type_counts(),
        subtypes,
    };
    emit_json(&summary, None)?;
    Ok(0)
}

pub(super) fn run_template_command(args: TemplateArgs) -> Result<i32, CliError> {
    let config = load_configuration(args.config.as_deref())?;
    let grid = configured_grid(&config)?;
    let preprocessor =
        Preprocessor::with_grid(grid, config.preprocess.clone()).map_err(CliError::compute)?;

    let spectrum = read_spectrum(&args.spectrum)?;
    let template = preprocessor
        .build_template(
            &spectrum,
            TemplateMetadata {
                id: args.id.clone(),
                type_name: args.type_name.clone(),
                subtype: args.subtype.clone(),
                age: args.age,
                source: args.spectrum.display().to_string(),
            },
        )
        .map_err(CliError::compute)?;

    let mut templates = if args.output.is_file() {
        TemplateStore::load(&args.output, &grid)
            .map_err(CliError::compute)?
            .templates()
            .to_vec()
    } else {
        Vec::new()
    };
    if templates.iter().any(|existing| existing.id == template.id) {
        return Err(CliError::Compute(SnidError::library(
            "LIBRARY.FORMAT",
            format!(
                "template '{}' already exists in '{}'",
                template.id,
                args.output.display()
            ),
        )));
    }
    templates.push(template);
    save_library(&args.output, &grid, &templates).map_err(CliError::compute)?;
    tracing::info!(
        library = %args.output.display(),
        templates = templates.len(),
        "template written"
    );
    Ok(0)
}
