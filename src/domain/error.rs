//! Domain-level errors (no external dependencies)

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::domain::{SpeciesId, TaxonId};

/// What kind of identifier failed to map to a single group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingKind {
    AnatEntity,
    DevStage,
    Gene,
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKind::AnatEntity => write!(f, "anatomical entity"),
            MappingKind::DevStage => write!(f, "developmental stage"),
            MappingKind::Gene => write!(f, "gene"),
        }
    }
}

/// Domain errors represent business rule violations.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error(
        "inconsistent taxonomy: parent taxon {taxon_id} of species {species_id} \
         not found in retrieved ontology"
    )]
    InconsistentOntology {
        taxon_id: TaxonId,
        species_id: SpeciesId,
    },

    #[error(
        "ambiguous mapping: {kind} {id} belongs to several groups: {}",
        .group_ids.iter().join(", ")
    )]
    AmbiguousMapping {
        kind: MappingKind,
        id: String,
        group_ids: Vec<String>,
    },

    #[error("invalid ontology: {message}")]
    InvalidOntology { message: String },
}

impl DomainError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_ontology(message: impl Into<String>) -> Self {
        Self::InvalidOntology {
            message: message.into(),
        }
    }

    /// True for failures caused by broken collaborator data rather than by the caller.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            DomainError::InconsistentOntology { .. }
                | DomainError::AmbiguousMapping { .. }
                | DomainError::InvalidOntology { .. }
        )
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
