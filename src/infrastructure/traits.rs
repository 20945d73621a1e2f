//! Collaborator boundary traits
//!
//! The aggregation engine consumes ontology, orthology, similarity and
//! expression data through these traits only, so services can be tested with
//! mock implementations and backed by any data store in production.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::domain::{
    AnatSimilarityGroup, CallFilter, CallOrdering, DevStageSimilarityGroup, ExpressionCall,
    OrthologMap, SpeciesId, TaxonId, TaxonTree,
};
use crate::infrastructure::error::ProviderResult;

/// One-shot lazy sequence of expression calls.
pub type CallStream<'a> = Box<dyn Iterator<Item = ProviderResult<ExpressionCall>> + Send + 'a>;

/// Source of taxonomic ontologies.
pub trait OntologyProvider: Send + Sync {
    /// Ontology of the taxa holding `species_ids` (every species when empty).
    ///
    /// `root_taxon_id` limits the result to that taxon's subtree when given.
    fn taxon_ontology(
        &self,
        species_ids: &BTreeSet<SpeciesId>,
        root_taxon_id: Option<TaxonId>,
        include_ancestors: bool,
        include_descendants: bool,
    ) -> ProviderResult<TaxonTree>;
}

/// Orthology groups per taxon.
pub trait OrthologyResolver: Send + Sync {
    /// Orthology groups valid at `taxon_id`, restricted to genes of `species_ids`
    /// (no restriction when empty).
    fn orthologs(
        &self,
        taxon_id: TaxonId,
        species_ids: &BTreeSet<SpeciesId>,
    ) -> ProviderResult<OrthologMap>;
}

/// Anatomical-entity similarity groups per taxon.
pub trait AnatSimilarityProvider: Send + Sync {
    fn anat_entity_similarities(
        &self,
        taxon_id: TaxonId,
        species_ids: &BTreeSet<SpeciesId>,
        trusted_only: bool,
    ) -> ProviderResult<HashSet<AnatSimilarityGroup>>;
}

/// Developmental-stage similarity groups per taxon.
pub trait DevStageSimilarityProvider: Send + Sync {
    fn dev_stage_similarities(
        &self,
        taxon_id: TaxonId,
        species_ids: &BTreeSet<SpeciesId>,
    ) -> ProviderResult<HashSet<DevStageSimilarityGroup>>;
}

/// Per-species expression calls.
pub trait ExpressionCallProvider: Send + Sync {
    /// Calls of `species_id` passing `filter`, in `ordering`.
    fn expression_calls(
        &self,
        species_id: SpeciesId,
        filter: &CallFilter,
        ordering: CallOrdering,
    ) -> ProviderResult<CallStream<'_>>;
}

/// The full set of collaborators the aggregation engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub ontology: Arc<dyn OntologyProvider>,
    pub orthology: Arc<dyn OrthologyResolver>,
    pub anat_similarity: Arc<dyn AnatSimilarityProvider>,
    pub dev_stage_similarity: Arc<dyn DevStageSimilarityProvider>,
    pub expression_calls: Arc<dyn ExpressionCallProvider>,
}

impl Collaborators {
    /// Use one source for every collaborator role.
    pub fn from_source<S>(source: Arc<S>) -> Self
    where
        S: OntologyProvider
            + OrthologyResolver
            + AnatSimilarityProvider
            + DevStageSimilarityProvider
            + ExpressionCallProvider
            + 'static,
    {
        Self {
            ontology: source.clone(),
            orthology: source.clone(),
            anat_similarity: source.clone(),
            dev_stage_similarity: source.clone(),
            expression_calls: source,
        }
    }
}
