//! Service container for dependency injection
//!
//! Wires the aggregation service to its collaborators and settings.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::{ConservationScorer, MultiSpeciesCallService, NoopScorer};
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::snapshot::load_data_source;
use crate::infrastructure::traits::Collaborators;

/// Container holding settings, collaborators and the conservation scorer.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Ontology, orthology, similarity and call sources
    pub collaborators: Collaborators,

    pub scorer: Arc<dyn ConservationScorer>,
}

impl ServiceContainer {
    /// Create a container backed by the snapshot named in `settings`.
    pub fn from_settings(settings: Settings) -> InfraResult<Self> {
        let path = settings
            .snapshot
            .clone()
            .ok_or_else(|| ApplicationError::Config {
                message: "no data snapshot configured (set `snapshot` or MSCALLS_SNAPSHOT)".into(),
            })?;
        debug!("from_settings: snapshot={}", path.display());

        let source = load_data_source(&path)?;
        Ok(Self::with_deps(
            settings,
            Collaborators::from_source(Arc::new(source)),
            Arc::new(NoopScorer),
        ))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        collaborators: Collaborators,
        scorer: Arc<dyn ConservationScorer>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            collaborators,
            scorer,
        }
    }

    /// Build the aggregation service from the wired dependencies.
    pub fn service(&self) -> ApplicationResult<MultiSpeciesCallService> {
        MultiSpeciesCallService::new(
            &self.collaborators,
            Arc::clone(&self.scorer),
            &self.settings,
        )
    }
}
