//! Application services
//!
//! Concrete services orchestrating domain logic. Services depend on the
//! collaborator boundary traits but are themselves concrete structs.

mod grouping;
mod multi_species;
mod scoring;
mod taxon_path;

pub use grouping::{GroupingEngine, TaxonGrouping};
pub use multi_species::{AggregationReport, MultiSpeciesCallService};
pub use scoring::{ConservationScorer, FnScorer, NoopScorer};
pub use taxon_path::{TaxonPath, TaxonPathResolver};
