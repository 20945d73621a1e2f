//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no providers, no config loading).

pub mod bucketing;
pub mod call_map;
pub mod entities;
pub mod error;
pub mod request;
pub mod taxonomy;

pub use bucketing::{CallBucketer, GroupingDiagnostics};
pub use call_map::TaxonCallMap;
pub use entities::*;
pub use error::{DomainError, DomainResult, MappingKind};
pub use request::{normalize_species_ids, validate_query_gene};
pub use taxonomy::{TaxonNode, TaxonTree};
