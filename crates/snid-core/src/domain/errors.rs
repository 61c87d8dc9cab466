use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::common::config::ConfigError;
use crate::pipeline::ClassifyError;
use crate::preprocess::PreprocessError;
use crate::templates::LibraryError;

use super::{CanonicalSpectrumError, SpectrumError};

pub type SnidResult<T> = Result<T, SnidError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnidErrorCategory {
    InputValidationError,
    IoSystemError,
    LibraryError,
    ComputationError,
    InternalError,
}

impl SnidErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError | Self::LibraryError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::LibraryError => "LibraryError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }
}

/// Run-level error: which stage failed, a stable placeholder and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnidError {
    category: SnidErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl SnidError {
    pub fn new(
        category: SnidErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SnidErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SnidErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn library(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SnidErrorCategory::LibraryError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SnidErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(SnidErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> SnidErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn is_no_match(&self) -> bool {
        self.placeholder == "RUN.NO_MATCH"
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for SnidError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for SnidError {}

impl From<SpectrumError> for SnidError {
    fn from(error: SpectrumError) -> Self {
        Self::input_validation("INPUT.INVALID_SPECTRUM", error.to_string())
    }
}

impl From<CanonicalSpectrumError> for SnidError {
    fn from(error: CanonicalSpectrumError) -> Self {
        Self::input_validation("INPUT.INVALID_SPECTRUM", error.to_string())
    }
}

impl From<PreprocessError> for SnidError {
    fn from(error: PreprocessError) -> Self {
        let placeholder = match &error {
            PreprocessError::InsufficientData { .. } => "INPUT.INSUFFICIENT_DATA",
            PreprocessError::InvalidGrid(_) => "INPUT.INVALID_GRID",
            PreprocessError::InvalidSpectrum(_) | PreprocessError::Canonical(_) => {
                "INPUT.INVALID_SPECTRUM"
            }
            PreprocessError::InvalidMask { .. } => "INPUT.INVALID_MASK",
            PreprocessError::Smoothing(_) => "INPUT.INVALID_SMOOTHING",
        };
        Self::input_validation(placeholder, format!("preprocessing failed: {error}"))
    }
}

impl From<LibraryError> for SnidError {
    fn from(error: LibraryError) -> Self {
        match &error {
            LibraryError::Read { .. } | LibraryError::Write { .. } => {
                Self::io_system("IO.LIBRARY_READ", format!("template library: {error}"))
            }
            LibraryError::Format { .. } => {
                Self::library("LIBRARY.FORMAT", format!("template library: {error}"))
            }
            LibraryError::GridMismatch { .. } => {
                Self::library("LIBRARY.GRID_MISMATCH", format!("template library: {error}"))
            }
            LibraryError::Pattern(_) => {
                Self::internal("LIBRARY.PATTERN", format!("template library: {error}"))
            }
        }
    }
}

impl From<ConfigError> for SnidError {
    fn from(error: ConfigError) -> Self {
        match &error {
            ConfigError::Read { .. } => Self::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigError::Parse { .. } | ConfigError::Invalid { .. } => {
                Self::input_validation("INPUT.CONFIG", error.to_string())
            }
        }
    }
}

impl From<ClassifyError> for SnidError {
    fn from(error: ClassifyError) -> Self {
        match &error {
            ClassifyError::NoMatch { .. } => {
                Self::computation("RUN.NO_MATCH", format!("classification: {error}"))
            }
            ClassifyError::GridMismatch { .. } => {
                Self::library("LIBRARY.GRID_MISMATCH", format!("classification: {error}"))
            }
            ClassifyError::Config { .. } => {
                Self::input_validation("INPUT.CONFIG", error.to_string())
            }
            ClassifyError::Preprocess(inner) => Self::from(inner.clone()),
        }
    }
}
