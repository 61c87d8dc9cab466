use super::CliError;
use anyhow::Context;
use serde::Deserialize;
use snid_core::numerics::LogWavelengthGrid;
use snid_core::serialization::to_json_text;
use snid_core::{ClassificationConfig, SnidError, Spectrum, load_config};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Spectrum input file: flux samples with optional per-sample variance.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SpectrumDocument {
    pub(super) wavelength: Vec<f64>,
    pub(super) flux: Vec<f64>,
    #[serde(default)]
    pub(super) variance: Option<Vec<f64>>,
}

pub(super) fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // A second init in the same process keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(super) fn load_configuration(path: Option<&Path>) -> Result<ClassificationConfig, CliError> {
    match path {
        Some(path) => load_config(path).map_err(CliError::compute),
        None => Ok(ClassificationConfig::default()),
    }
}

pub(super) fn configured_grid(config: &ClassificationConfig) -> Result<LogWavelengthGrid, CliError> {
    config.grid.to_grid().map_err(|error| {
        CliError::Compute(SnidError::input_validation(
            "INPUT.INVALID_GRID",
            error.to_string(),
        ))
    })
}

pub(super) fn read_spectrum(path: &Path) -> Result<Spectrum, CliError> {
    let content = fs::read_to_string(path).map_err(|source| {
        CliError::Compute(SnidError::io_system(
            "IO.SPECTRUM_READ",
            format!("failed to read spectrum '{}': {}", path.display(), source),
        ))
    })?;
    let document: SpectrumDocument = serde_json::from_str(&content).map_err(|source| {
        CliError::Compute(SnidError::input_validation(
            "INPUT.SPECTRUM_FORMAT",
            format!("failed to parse spectrum '{}': {}", path.display(), source),
        ))
    })?;

    let spectrum =
        Spectrum::new(document.wavelength, document.flux).map_err(CliError::compute)?;
    match document.variance {
        Some(variance) => spectrum.with_variance(variance).map_err(CliError::compute),
        None => Ok(spectrum),
    }
}

/// Writes JSON to `output`, or to stdout when no path is given.
pub(super) fn emit_json<T: serde::Serialize + ?Sized>(
    value: &T,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let text = to_json_text(value).context("failed to serialize output")?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create output directory '{}'", parent.display())
                })?;
            }
            fs::write(path, text)
                .with_context(|| format!("failed to write output '{}'", path.display()))?;
        }
        None => print!("{text}"),
    }
    Ok(())
}
