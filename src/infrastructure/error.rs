//! Infrastructure-level errors

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::application::ApplicationError;
use crate::exitcode;

/// Failure reported by a collaborator (ontology, orthology, similarity or call source).
#[derive(Error, Debug)]
#[error("{provider} provider failed: {message}")]
pub struct ProviderError {
    pub provider: &'static str,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(provider: &'static str, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        provider: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            provider,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for collaborator calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Infrastructure errors wrap application errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot {path}: {message}")]
    Snapshot { path: PathBuf, message: String },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// sysexits-style code for callers that surface errors as process status.
    pub fn code(&self) -> i32 {
        match self {
            InfraError::Application(e) => e.code(),
            InfraError::Io { .. } => exitcode::IOERR,
            InfraError::Snapshot { .. } => exitcode::DATAERR,
        }
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;

/// Extension trait for converting `io::Result` to `InfraResult` with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    ///
    /// # Example
    /// ```ignore
    /// std::fs::read_to_string(path).with_path_context("read snapshot", path)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> InfraResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, action: &str, path: &Path) -> InfraResult<T> {
        self.map_err(|e| InfraError::io(format!("{}: {}", action, path.display()), e))
    }
}
