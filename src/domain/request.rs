//! Validation and normalization of aggregation requests.

use std::collections::BTreeSet;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::{Gene, Species, SpeciesId};

/// Normalize a requested species list into an owned set.
///
/// `None` and an empty slice both mean "unrestricted" and yield an empty set.
pub fn normalize_species_ids(species_ids: Option<&[SpeciesId]>) -> BTreeSet<SpeciesId> {
    species_ids
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default()
}

/// Check the query gene against the requested species.
///
/// The gene must carry both a species id and a species, they must agree, and a
/// non-empty species set must include the gene's species.
pub fn validate_query_gene<'g>(
    gene: &'g Gene,
    species_ids: &BTreeSet<SpeciesId>,
) -> DomainResult<&'g Species> {
    let species_id = gene.species_id.ok_or_else(|| {
        DomainError::invalid_argument(format!("gene {} has no species id", gene.id))
    })?;
    let species = gene.species.as_ref().ok_or_else(|| {
        DomainError::invalid_argument(format!("gene {} has no species", gene.id))
    })?;
    if species.id != species_id {
        return Err(DomainError::invalid_argument(format!(
            "gene {} has species id {} but species {}",
            gene.id, species_id, species.id
        )));
    }
    if !species_ids.is_empty() && !species_ids.contains(&species_id) {
        return Err(DomainError::invalid_argument(format!(
            "requested species {:?} do not include species {} of gene {}",
            species_ids, species_id, gene.id
        )));
    }
    Ok(species)
}
