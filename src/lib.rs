//! Multi-species expression call aggregation
//!
//! Given a gene, find its orthologs at each ancestral taxon of its species and
//! group their expression calls into multi-species calls: one bucket per
//! orthology group, anatomical similarity group and developmental stage
//! similarity group.
//!
//! Layers:
//! - [`domain`]: entities, taxonomy and bucketing, free of I/O
//! - [`application`]: the aggregation services
//! - [`infrastructure`]: collaborator traits, in-memory sources and wiring

pub mod application;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

pub use application::services::{
    AggregationReport, ConservationScorer, FnScorer, MultiSpeciesCallService, NoopScorer,
};
pub use application::{ApplicationError, ApplicationResult};
pub use config::Settings;
pub use domain::{DomainError, DomainResult, TaxonCallMap};
pub use infrastructure::di::ServiceContainer;
pub use infrastructure::traits::Collaborators;
