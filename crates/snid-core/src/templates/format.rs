//! On-disk template library documents.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::numerics::LogWavelengthGrid;

pub const LIBRARY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GridDocument {
    pub num_points: usize,
    pub min_wave: f64,
    pub max_wave: f64,
}

impl GridDocument {
    pub fn from_grid(grid: &LogWavelengthGrid) -> Self {
        Self {
            num_points: grid.num_points(),
            min_wave: grid.min_wave(),
            max_wave: grid.max_wave(),
        }
    }

    /// `None` when the stored parameters do not describe a usable grid.
    pub fn to_grid(&self) -> Option<LogWavelengthGrid> {
        LogWavelengthGrid::new(self.num_points, self.min_wave, self.max_wave).ok()
    }
}

impl Display for GridDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} points over [{}, {}] A",
            self.num_points, self.min_wave, self.max_wave
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub age: Option<f64>,
    pub flux: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridDocument>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LibraryDocument {
    pub format_version: u32,
    pub grid: GridDocument,
    #[serde(default)]
    pub templates: Vec<TemplateDocument>,
}

/// Bins between the first and last non-zero flux sample.
pub fn default_valid_mask(flux: &[f64]) -> Vec<bool> {
    let first = flux.iter().position(|value| *value != 0.0);
    let last = flux.iter().rposition(|value| *value != 0.0);
    match (first, last) {
        (Some(first), Some(last)) => (0..flux.len())
            .map(|bin| (first..=last).contains(&bin))
            .collect(),
        _ => vec![false; flux.len()],
    }
}
