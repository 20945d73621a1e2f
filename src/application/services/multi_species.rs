//! Multi-species expression call aggregation
//!
//! Entry point of the engine: for a query gene, walk the gene species' taxon
//! path and collect, per taxon, the expression evidence of its orthologs in
//! similar anatomical entities and developmental stages.

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, info_span};
use uuid::Uuid;

use super::grouping::{GroupingEngine, TaxonGrouping};
use super::scoring::ConservationScorer;
use super::taxon_path::{TaxonPath, TaxonPathResolver};
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::Settings;
use crate::domain::{
    normalize_species_ids, Gene, GroupingDiagnostics, SpeciesId, TaxonCallMap, TaxonId,
};
use crate::infrastructure::traits::Collaborators;

/// Per-taxon diagnostics of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationReport {
    pub run_id: Uuid,
    /// In taxon path order
    pub taxa: Vec<(TaxonId, GroupingDiagnostics)>,
}

impl AggregationReport {
    pub fn totals(&self) -> GroupingDiagnostics {
        let mut totals = GroupingDiagnostics::default();
        for (_, diagnostics) in &self.taxa {
            totals.accumulate(diagnostics);
        }
        totals
    }

    pub fn diagnostics_for(&self, taxon_id: TaxonId) -> Option<&GroupingDiagnostics> {
        self.taxa
            .iter()
            .find(|(id, _)| *id == taxon_id)
            .map(|(_, diagnostics)| diagnostics)
    }
}

pub struct MultiSpeciesCallService {
    resolver: TaxonPathResolver,
    engine: GroupingEngine,
    scorer: Arc<dyn ConservationScorer>,
    parallel: bool,
    /// Dedicated pool when `max_threads` is set, rayon's global pool otherwise
    pool: Option<ThreadPool>,
}

impl MultiSpeciesCallService {
    pub fn new(
        collaborators: &Collaborators,
        scorer: Arc<dyn ConservationScorer>,
        settings: &Settings,
    ) -> ApplicationResult<Self> {
        let pool = match (settings.parallel, settings.max_threads) {
            (true, Some(threads)) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("mscalls-{}", i))
                    .build()
                    .map_err(|e| ApplicationError::OperationFailed {
                        context: format!("build thread pool with {} threads", threads),
                        source: Box::new(e),
                    })?,
            ),
            _ => None,
        };

        Ok(Self {
            resolver: TaxonPathResolver::new(Arc::clone(&collaborators.ontology)),
            engine: GroupingEngine::new(
                collaborators,
                settings.trusted_similarities_only,
                settings.parallel,
            ),
            scorer,
            parallel: settings.parallel,
            pool,
        })
    }

    /// Multi-species calls of `gene` and its orthologs, per taxon.
    ///
    /// Keys follow the taxon path of the gene's species, nearest ancestor
    /// first; a taxon without any bucket maps to an empty set. `species_ids`
    /// restricts the species considered (None or empty: no restriction) and
    /// must contain the gene's species when non-empty.
    pub fn load_multi_species_expression_calls(
        &self,
        gene: &Gene,
        species_ids: Option<&[SpeciesId]>,
    ) -> ApplicationResult<TaxonCallMap> {
        self.load_with_report(gene, species_ids)
            .map(|(calls, _)| calls)
    }

    /// Like [`Self::load_multi_species_expression_calls`], with per-taxon diagnostics.
    pub fn load_with_report(
        &self,
        gene: &Gene,
        species_ids: Option<&[SpeciesId]>,
    ) -> ApplicationResult<(TaxonCallMap, AggregationReport)> {
        let run_id = Uuid::new_v4();
        let span = info_span!("load_multi_species_expression_calls", %run_id, gene = %gene.id);
        let _guard = span.enter();

        let species_ids = normalize_species_ids(species_ids);
        let path = self.resolver.resolve(gene, &species_ids)?;

        let groupings = self.group_taxa(gene, &species_ids, &path)?;

        let mut call_map = TaxonCallMap::new();
        let mut report = AggregationReport {
            run_id,
            taxa: Vec::with_capacity(groupings.len()),
        };
        for grouping in groupings {
            let TaxonGrouping {
                taxon_id,
                calls,
                diagnostics,
            } = grouping;
            let scored: BTreeSet<_> = calls
                .into_iter()
                .map(|call| self.scorer.score(call))
                .collect();
            call_map.insert(taxon_id, scored);
            report.taxa.push((taxon_id, diagnostics));
        }

        let totals = report.totals();
        info!(
            "aggregated {} calls in {} buckets over {} taxa ({} dropped)",
            totals.calls_examined,
            call_map.total_calls(),
            call_map.len(),
            totals.dropped()
        );
        Ok((call_map, report))
    }

    /// Group every taxon of the path, in path order.
    ///
    /// Stops at the first failure: sequentially no later taxon is started, in
    /// parallel rayon stops handing out remaining taxa. When several taxa fail
    /// concurrently, which error is returned is unspecified.
    fn group_taxa(
        &self,
        gene: &Gene,
        species_ids: &BTreeSet<SpeciesId>,
        path: &TaxonPath,
    ) -> ApplicationResult<Vec<TaxonGrouping>> {
        let group = |taxon_id: &TaxonId| -> ApplicationResult<TaxonGrouping> {
            // Unrestricted: only species under this taxon. Restricted: every requested species.
            let query_species = if species_ids.is_empty() {
                path.ontology.species_under(*taxon_id)
            } else {
                species_ids.clone()
            };
            self.engine
                .group_for_taxon(*taxon_id, gene, species_ids, &query_species)
        };

        let groupings: Vec<TaxonGrouping> = match (&self.pool, self.parallel) {
            (Some(pool), _) => pool.install(|| {
                path.taxon_ids
                    .par_iter()
                    .map(group)
                    .collect::<ApplicationResult<Vec<TaxonGrouping>>>()
            })?,
            (None, true) => path
                .taxon_ids
                .par_iter()
                .map(group)
                .collect::<ApplicationResult<Vec<TaxonGrouping>>>()?,
            (None, false) => path
                .taxon_ids
                .iter()
                .map(group)
                .collect::<ApplicationResult<Vec<TaxonGrouping>>>()?,
        };
        debug!("group_taxa: grouped {} taxa", groupings.len());

        Ok(groupings)
    }
}
