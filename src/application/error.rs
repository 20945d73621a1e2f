//! Application-level errors (wraps domain and provider errors)

use thiserror::Error;

use crate::domain::DomainError;
use crate::exitcode;
use crate::infrastructure::ProviderError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    /// True for broken collaborator data (inconsistent ontology, ambiguous groups).
    pub fn is_fatal_data_error(&self) -> bool {
        matches!(self, ApplicationError::Domain(e) if e.is_data_integrity())
    }

    /// sysexits-style code for callers that surface errors as process status.
    pub fn code(&self) -> i32 {
        match self {
            ApplicationError::Domain(DomainError::InvalidArgument { .. }) => exitcode::USAGE,
            ApplicationError::Domain(_) => exitcode::DATAERR,
            ApplicationError::Provider(_) => exitcode::UNAVAILABLE,
            ApplicationError::Config { .. } => exitcode::CONFIG,
            ApplicationError::OperationFailed { .. } => exitcode::SOFTWARE,
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
