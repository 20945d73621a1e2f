//! Order-preserving taxon -> multi-species calls mapping.

use std::collections::BTreeSet;

use crate::domain::{MultiSpeciesCall, TaxonId};

/// Multi-species calls per taxon, in insertion order.
///
/// The aggregator inserts taxa nearest ancestor first, so iteration order is the
/// taxonomic distance from the query species. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonCallMap {
    entries: Vec<(TaxonId, BTreeSet<MultiSpeciesCall>)>,
}

impl TaxonCallMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert calls for `taxon_id`; an existing key keeps its position and is replaced.
    pub fn insert(&mut self, taxon_id: TaxonId, calls: BTreeSet<MultiSpeciesCall>) {
        match self.entries.iter_mut().find(|(id, _)| *id == taxon_id) {
            Some((_, existing)) => *existing = calls,
            None => self.entries.push((taxon_id, calls)),
        }
    }

    pub fn get(&self, taxon_id: TaxonId) -> Option<&BTreeSet<MultiSpeciesCall>> {
        self.entries
            .iter()
            .find(|(id, _)| *id == taxon_id)
            .map(|(_, calls)| calls)
    }

    pub fn contains_key(&self, taxon_id: TaxonId) -> bool {
        self.get(taxon_id).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = TaxonId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaxonId, &BTreeSet<MultiSpeciesCall>)> {
        self.entries.iter().map(|(id, calls)| (*id, calls))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of multi-species calls across all taxa.
    pub fn total_calls(&self) -> usize {
        self.entries.iter().map(|(_, calls)| calls.len()).sum()
    }
}

impl IntoIterator for TaxonCallMap {
    type Item = (TaxonId, BTreeSet<MultiSpeciesCall>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
