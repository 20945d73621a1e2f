//! Resolution of the ancestral taxa relevant to a query gene.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::application::ApplicationResult;
use crate::domain::{validate_query_gene, DomainError, Gene, SpeciesId, TaxonId, TaxonTree};
use crate::infrastructure::traits::OntologyProvider;

/// Taxa to examine for one request, nearest ancestor of the gene's species first.
#[derive(Debug)]
pub struct TaxonPath {
    pub taxon_ids: Vec<TaxonId>,
    /// Ontology the path was computed from, restricted to the requested species
    pub ontology: TaxonTree,
}

/// Walks the taxonomy from a gene's species to the root.
pub struct TaxonPathResolver {
    ontology: Arc<dyn OntologyProvider>,
}

impl TaxonPathResolver {
    pub fn new(ontology: Arc<dyn OntologyProvider>) -> Self {
        Self { ontology }
    }

    /// Ancestor chain of the gene species' parent taxon, inclusive, root last.
    ///
    /// Arguments are validated before the ontology provider is called.
    pub fn resolve(
        &self,
        gene: &Gene,
        species_ids: &BTreeSet<SpeciesId>,
    ) -> ApplicationResult<TaxonPath> {
        debug!("resolve: gene={} species={:?}", gene.id, species_ids);
        let species = validate_query_gene(gene, species_ids)?;

        let ontology = self
            .ontology
            .taxon_ontology(species_ids, None, true, false)?;

        let taxon_ids = ontology.ancestor_chain(species.parent_taxon_id).ok_or(
            DomainError::InconsistentOntology {
                taxon_id: species.parent_taxon_id,
                species_id: species.id,
            },
        )?;
        debug!("resolve: taxon path {:?}", taxon_ids);

        Ok(TaxonPath {
            taxon_ids,
            ontology,
        })
    }
}
