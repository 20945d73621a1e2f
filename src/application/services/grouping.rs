//! Per-taxon grouping of expression evidence into multi-species calls
//!
//! For one taxon: resolve orthology and similarity groups, fetch the expressed
//! calls of the orthologous genes in similar conditions, and bucket them.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::bucketing::{member_ids, orthologous_gene_ids};
use crate::domain::{
    CallBucketer, CallFilter, CallOrdering, ExpressionCall, Gene, GroupingDiagnostics,
    MultiSpeciesCall, OrthologyGroup, SpeciesId, TaxonId,
};
use crate::infrastructure::traits::{
    AnatSimilarityProvider, Collaborators, DevStageSimilarityProvider, ExpressionCallProvider,
    OrthologyResolver,
};

/// Buckets found for one taxon.
#[derive(Debug, Clone)]
pub struct TaxonGrouping {
    pub taxon_id: TaxonId,
    pub calls: BTreeSet<MultiSpeciesCall>,
    pub diagnostics: GroupingDiagnostics,
}

/// Groups the expression evidence of one taxon at a time.
pub struct GroupingEngine {
    orthology: Arc<dyn OrthologyResolver>,
    anat_similarity: Arc<dyn AnatSimilarityProvider>,
    dev_stage_similarity: Arc<dyn DevStageSimilarityProvider>,
    expression_calls: Arc<dyn ExpressionCallProvider>,
    trusted_only: bool,
    parallel: bool,
}

/// Drain a provider set into a sorted Vec so grouping is deterministic.
fn sorted<T: Ord>(set: HashSet<T>) -> Vec<T> {
    let mut items: Vec<T> = set.into_iter().collect();
    items.sort();
    items
}

impl GroupingEngine {
    pub fn new(collaborators: &Collaborators, trusted_only: bool, parallel: bool) -> Self {
        Self {
            orthology: Arc::clone(&collaborators.orthology),
            anat_similarity: Arc::clone(&collaborators.anat_similarity),
            dev_stage_similarity: Arc::clone(&collaborators.dev_stage_similarity),
            expression_calls: Arc::clone(&collaborators.expression_calls),
            trusted_only,
            parallel,
        }
    }

    /// Multi-species calls of `gene`'s orthologs at `taxon_id`.
    ///
    /// `species_ids` is the caller's species restriction (empty = unrestricted),
    /// passed as-is to the group providers. `query_species` are the species whose
    /// expression calls are fetched.
    pub fn group_for_taxon(
        &self,
        taxon_id: TaxonId,
        gene: &Gene,
        species_ids: &BTreeSet<SpeciesId>,
        query_species: &BTreeSet<SpeciesId>,
    ) -> ApplicationResult<TaxonGrouping> {
        debug!(
            "group_for_taxon: taxon={} gene={} query_species={:?}",
            taxon_id, gene.id, query_species
        );

        let orthology_groups =
            OrthologyGroup::from_map(self.orthology.orthologs(taxon_id, species_ids)?);
        let (gene_ids, matched) = orthologous_gene_ids(&gene.id, &orthology_groups);
        if matched > 1 {
            // Unioned here, but any call of such a gene fails bucketing below.
            warn!(
                "gene {} belongs to {} orthology groups at taxon {}; using the union of their genes",
                gene.id, matched, taxon_id
            );
        }

        let anat_groups = sorted(self.anat_similarity.anat_entity_similarities(
            taxon_id,
            species_ids,
            self.trusted_only,
        )?);
        let dev_stage_groups = sorted(
            self.dev_stage_similarity
                .dev_stage_similarities(taxon_id, species_ids)?,
        );

        let filter = CallFilter::expressed(
            gene_ids,
            member_ids(&anat_groups, |g| &g.anat_entity_ids),
            member_ids(&dev_stage_groups, |g| &g.dev_stage_ids),
        );

        let calls = if filter.is_unsatisfiable() {
            debug!(
                "group_for_taxon: taxon={} nothing to fetch (genes={}, anat entities={}, stages={})",
                taxon_id,
                filter.gene_ids.len(),
                filter.anat_entity_ids.len(),
                filter.dev_stage_ids.len()
            );
            BTreeSet::new()
        } else {
            self.fetch_calls(&filter, query_species)?
        };

        let bucketing = CallBucketer::new(taxon_id, &orthology_groups, &anat_groups, &dev_stage_groups)
            .bucket(calls)?;
        let mut diagnostics = bucketing.diagnostics;
        diagnostics.species_queried = if filter.is_unsatisfiable() {
            0
        } else {
            query_species.len()
        };
        debug!(
            "group_for_taxon: taxon={} buckets={} dropped={}",
            taxon_id,
            diagnostics.buckets,
            diagnostics.dropped()
        );

        Ok(TaxonGrouping {
            taxon_id,
            calls: bucketing.calls,
            diagnostics,
        })
    }

    /// Union of the filtered calls of every species.
    ///
    /// Per-species fetches run in parallel when enabled and stop at the first failure.
    fn fetch_calls(
        &self,
        filter: &CallFilter,
        species: &BTreeSet<SpeciesId>,
    ) -> ApplicationResult<BTreeSet<ExpressionCall>> {
        let fetch = |species_id: &SpeciesId| -> ApplicationResult<Vec<ExpressionCall>> {
            let stream = self.expression_calls.expression_calls(
                *species_id,
                filter,
                CallOrdering::GeneIdAscending,
            )?;
            stream
                .collect::<Result<Vec<_>, _>>()
                .map_err(ApplicationError::from)
        };

        let per_species: Vec<Vec<ExpressionCall>> = if self.parallel {
            species
                .par_iter()
                .map(fetch)
                .collect::<ApplicationResult<_>>()?
        } else {
            species
                .iter()
                .map(fetch)
                .collect::<ApplicationResult<_>>()?
        };

        let calls: BTreeSet<ExpressionCall> = per_species.into_iter().flatten().collect();
        Ok(calls)
    }
}
