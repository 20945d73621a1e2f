//! In-memory collaborator implementation
//!
//! Backs every provider trait with data held in memory. Used for snapshots,
//! embedding small datasets, and tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::domain::{
    AnatSimilarityGroup, CallFilter, CallOrdering, DevStageSimilarityGroup, ExpressionCall,
    GeneId, OrthologMap, OrthologyGroup, SpeciesId, TaxonId, TaxonTree,
};
use crate::infrastructure::error::{ProviderError, ProviderResult};
use crate::infrastructure::traits::{
    AnatSimilarityProvider, CallStream, DevStageSimilarityProvider, ExpressionCallProvider,
    OntologyProvider, OrthologyResolver,
};

/// Dataset answering all collaborator queries from memory.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    taxonomy: TaxonTree,
    gene_species: HashMap<GeneId, SpeciesId>,
    orthology: BTreeMap<TaxonId, Vec<OrthologyGroup>>,
    anat_similarities: BTreeMap<TaxonId, Vec<AnatSimilarityGroup>>,
    dev_stage_similarities: BTreeMap<TaxonId, Vec<DevStageSimilarityGroup>>,
    calls: BTreeMap<SpeciesId, Vec<ExpressionCall>>,
}

impl InMemoryDataSource {
    pub fn new(taxonomy: TaxonTree) -> Self {
        Self {
            taxonomy,
            ..Self::default()
        }
    }

    pub fn taxonomy(&self) -> &TaxonTree {
        &self.taxonomy
    }

    /// Register the species of a gene, used to restrict orthology groups.
    pub fn with_gene(mut self, gene_id: impl Into<GeneId>, species_id: SpeciesId) -> Self {
        self.gene_species.insert(gene_id.into(), species_id);
        self
    }

    pub fn with_orthology_group(mut self, taxon_id: TaxonId, group: OrthologyGroup) -> Self {
        self.orthology.entry(taxon_id).or_default().push(group);
        self
    }

    pub fn with_anat_similarity(mut self, taxon_id: TaxonId, group: AnatSimilarityGroup) -> Self {
        self.anat_similarities
            .entry(taxon_id)
            .or_default()
            .push(group);
        self
    }

    pub fn with_dev_stage_similarity(
        mut self,
        taxon_id: TaxonId,
        group: DevStageSimilarityGroup,
    ) -> Self {
        self.dev_stage_similarities
            .entry(taxon_id)
            .or_default()
            .push(group);
        self
    }

    pub fn with_call(mut self, call: ExpressionCall) -> Self {
        self.calls.entry(call.species_id).or_default().push(call);
        self
    }

    pub fn with_calls(self, calls: impl IntoIterator<Item = ExpressionCall>) -> Self {
        calls.into_iter().fold(self, Self::with_call)
    }

    /// True when `gene_id` belongs to one of `species_ids` (or no restriction applies).
    fn gene_in_scope(&self, gene_id: &str, species_ids: &BTreeSet<SpeciesId>) -> bool {
        species_ids.is_empty()
            || self
                .gene_species
                .get(gene_id)
                .is_some_and(|s| species_ids.contains(s))
    }
}

impl OntologyProvider for InMemoryDataSource {
    fn taxon_ontology(
        &self,
        species_ids: &BTreeSet<SpeciesId>,
        root_taxon_id: Option<TaxonId>,
        include_ancestors: bool,
        include_descendants: bool,
    ) -> ProviderResult<TaxonTree> {
        debug!(
            "taxon_ontology: species={:?}, root={:?}, ancestors={}, descendants={}",
            species_ids, root_taxon_id, include_ancestors, include_descendants
        );
        let restricted = self
            .taxonomy
            .restrict_to_species(species_ids, include_ancestors, include_descendants)
            .map_err(|e| ProviderError::with_source("ontology", "restrict taxonomy", e))?;
        match root_taxon_id {
            Some(root) => restricted
                .subtree(root)
                .map_err(|e| ProviderError::with_source("ontology", "select root taxon", e)),
            None => Ok(restricted),
        }
    }
}

impl OrthologyResolver for InMemoryDataSource {
    fn orthologs(
        &self,
        taxon_id: TaxonId,
        species_ids: &BTreeSet<SpeciesId>,
    ) -> ProviderResult<OrthologMap> {
        let groups = self.orthology.get(&taxon_id).map(Vec::as_slice).unwrap_or(&[]);
        let map: OrthologMap = groups
            .iter()
            .map(|g| {
                let genes: BTreeSet<GeneId> = g
                    .gene_ids
                    .iter()
                    .filter(|gene| self.gene_in_scope(gene, species_ids))
                    .cloned()
                    .collect();
                (g.id, genes)
            })
            .filter(|(_, genes)| !genes.is_empty())
            .collect();
        debug!("orthologs: taxon={} groups={}", taxon_id, map.len());
        Ok(map)
    }
}

impl AnatSimilarityProvider for InMemoryDataSource {
    /// Anatomical terms are shared across species, so `species_ids` does not narrow the groups.
    fn anat_entity_similarities(
        &self,
        taxon_id: TaxonId,
        _species_ids: &BTreeSet<SpeciesId>,
        trusted_only: bool,
    ) -> ProviderResult<HashSet<AnatSimilarityGroup>> {
        Ok(self
            .anat_similarities
            .get(&taxon_id)
            .into_iter()
            .flatten()
            .filter(|g| !trusted_only || g.trusted)
            .cloned()
            .collect())
    }
}

impl DevStageSimilarityProvider for InMemoryDataSource {
    fn dev_stage_similarities(
        &self,
        taxon_id: TaxonId,
        _species_ids: &BTreeSet<SpeciesId>,
    ) -> ProviderResult<HashSet<DevStageSimilarityGroup>> {
        Ok(self
            .dev_stage_similarities
            .get(&taxon_id)
            .into_iter()
            .flatten()
            .cloned()
            .collect())
    }
}

impl ExpressionCallProvider for InMemoryDataSource {
    fn expression_calls(
        &self,
        species_id: SpeciesId,
        filter: &CallFilter,
        ordering: CallOrdering,
    ) -> ProviderResult<CallStream<'_>> {
        let mut matching: Vec<&ExpressionCall> = self
            .calls
            .get(&species_id)
            .into_iter()
            .flatten()
            .filter(|c| filter.accepts(c))
            .collect();
        match ordering {
            CallOrdering::GeneIdAscending => matching.sort(),
        }
        debug!(
            "expression_calls: species={} matching={}",
            species_id,
            matching.len()
        );
        Ok(Box::new(
            matching.into_iter().cloned().map(Ok::<_, ProviderError>),
        ))
    }
}
