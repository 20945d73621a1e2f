//! Arena-backed taxonomy with species attached to their parent taxa.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::{Species, SpeciesId, Taxon, TaxonId};

/// Tree node in the arena-based taxonomy.
#[derive(Debug)]
pub struct TaxonNode {
    pub taxon: Taxon,
    /// Index of parent node in the arena, None for roots
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena, in insertion order
    pub children: Vec<Index>,
}

/// Taxonomic ontology as consumed by the aggregation engine.
///
/// Usually a single tree; restricting a tree without its ancestors can leave a
/// forest, so several roots are allowed.
#[derive(Debug, Default)]
pub struct TaxonTree {
    arena: Arena<TaxonNode>,
    roots: Vec<Index>,
    by_id: HashMap<TaxonId, Index>,
    species: BTreeMap<SpeciesId, Species>,
}

impl TaxonTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a taxon below `parent`, or as a root when `parent` is None.
    ///
    /// Parents must be inserted before their children.
    #[instrument(level = "trace", skip(self))]
    pub fn insert_taxon(&mut self, taxon: Taxon, parent: Option<TaxonId>) -> DomainResult<Index> {
        if self.by_id.contains_key(&taxon.id) {
            return Err(DomainError::invalid_ontology(format!(
                "duplicate taxon {}",
                taxon.id
            )));
        }
        let parent_idx = match parent {
            Some(parent_id) => Some(self.index_of(parent_id).ok_or_else(|| {
                DomainError::invalid_ontology(format!(
                    "parent taxon {} of taxon {} not found",
                    parent_id, taxon.id
                ))
            })?),
            None => None,
        };

        let taxon_id = taxon.id;
        let node_idx = self.arena.insert(TaxonNode {
            taxon,
            parent: parent_idx,
            children: Vec::new(),
        });
        match parent_idx {
            Some(p) => {
                if let Some(parent_node) = self.arena.get_mut(p) {
                    parent_node.children.push(node_idx);
                }
            }
            None => self.roots.push(node_idx),
        }
        self.by_id.insert(taxon_id, node_idx);
        Ok(node_idx)
    }

    /// Attach a species to its parent taxon, which must already be present.
    pub fn add_species(&mut self, species: Species) -> DomainResult<()> {
        if !self.by_id.contains_key(&species.parent_taxon_id) {
            return Err(DomainError::invalid_ontology(format!(
                "parent taxon {} of species {} not found",
                species.parent_taxon_id, species.id
            )));
        }
        self.species.insert(species.id, species);
        Ok(())
    }

    fn index_of(&self, id: TaxonId) -> Option<Index> {
        self.by_id.get(&id).copied()
    }

    pub fn get_node(&self, idx: Index) -> Option<&TaxonNode> {
        self.arena.get(idx)
    }

    pub fn get_element(&self, id: TaxonId) -> Option<&Taxon> {
        self.index_of(id)
            .and_then(|idx| self.arena.get(idx))
            .map(|node| &node.taxon)
    }

    pub fn contains(&self, id: TaxonId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// The single root, if the ontology is a tree.
    pub fn root(&self) -> Option<&Taxon> {
        match self.roots.as_slice() {
            [only] => self.arena.get(*only).map(|n| &n.taxon),
            _ => None,
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = &Taxon> {
        self.roots
            .iter()
            .filter_map(|&idx| self.arena.get(idx))
            .map(|n| &n.taxon)
    }

    pub fn parent_of(&self, id: TaxonId) -> Option<&Taxon> {
        let node = self.arena.get(self.index_of(id)?)?;
        node.parent
            .and_then(|p| self.arena.get(p))
            .map(|n| &n.taxon)
    }

    /// Ancestors of `id`, nearest first, root last. Excludes `id` itself.
    ///
    /// Empty when `id` is a root or unknown.
    #[instrument(level = "trace", skip(self))]
    pub fn ordered_ancestors(&self, id: TaxonId) -> Vec<&Taxon> {
        let mut ancestors = Vec::new();
        let mut current = self
            .index_of(id)
            .and_then(|idx| self.arena.get(idx))
            .and_then(|n| n.parent);
        while let Some(idx) = current {
            match self.arena.get(idx) {
                Some(node) => {
                    ancestors.push(&node.taxon);
                    current = node.parent;
                }
                None => break,
            }
        }
        ancestors
    }

    /// `id` followed by its ancestors, nearest first.
    pub fn ancestor_chain(&self, id: TaxonId) -> Option<Vec<TaxonId>> {
        let taxon = self.get_element(id)?;
        let mut chain = vec![taxon.id];
        chain.extend(self.ordered_ancestors(id).into_iter().map(|t| t.id));
        Some(chain)
    }

    /// All taxa below `id` in pre-order. Excludes `id` itself.
    pub fn descendants(&self, id: TaxonId) -> Vec<&Taxon> {
        match self.index_of(id) {
            Some(idx) => self
                .preorder_from(vec![idx])
                .skip(1)
                .map(|(_, node)| &node.taxon)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn species(&self) -> impl Iterator<Item = &Species> {
        self.species.values()
    }

    pub fn get_species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(&id)
    }

    /// Species whose parent taxon is `id` or one of its descendants.
    pub fn species_under(&self, id: TaxonId) -> BTreeSet<SpeciesId> {
        let mut subtree: HashSet<TaxonId> = self.descendants(id).into_iter().map(|t| t.id).collect();
        if self.contains(id) {
            subtree.insert(id);
        }
        self.species
            .values()
            .filter(|s| subtree.contains(&s.parent_taxon_id))
            .map(|s| s.id)
            .collect()
    }

    /// Sub-ontology holding the parent taxa of the requested species.
    ///
    /// An empty `species_ids` selects every species. Ancestors and descendants of
    /// those parent taxa are kept on request; each kept taxon is re-attached to
    /// its nearest kept ancestor. Unknown species ids are ignored.
    #[instrument(level = "debug", skip(self))]
    pub fn restrict_to_species(
        &self,
        species_ids: &BTreeSet<SpeciesId>,
        include_ancestors: bool,
        include_descendants: bool,
    ) -> DomainResult<TaxonTree> {
        let selected: Vec<&Species> = self
            .species
            .values()
            .filter(|s| species_ids.is_empty() || species_ids.contains(&s.id))
            .collect();

        let mut kept: HashSet<Index> = HashSet::new();
        for species in &selected {
            let Some(idx) = self.index_of(species.parent_taxon_id) else {
                continue;
            };
            kept.insert(idx);
            if include_ancestors {
                let mut current = self.arena.get(idx).and_then(|n| n.parent);
                while let Some(p) = current {
                    if !kept.insert(p) {
                        break;
                    }
                    current = self.arena.get(p).and_then(|n| n.parent);
                }
            }
            if include_descendants {
                kept.extend(self.preorder_from(vec![idx]).map(|(i, _)| i));
            }
        }

        let mut restricted = TaxonTree::new();
        for (idx, node) in self.iter() {
            if !kept.contains(&idx) {
                continue;
            }
            let parent = self.nearest_kept_ancestor(idx, &kept);
            restricted.insert_taxon(node.taxon.clone(), parent)?;
        }
        for species in selected {
            if restricted.contains(species.parent_taxon_id) {
                restricted.add_species(species.clone())?;
            }
        }
        Ok(restricted)
    }

    /// Copy of the subtree rooted at `id`, with the species attached below it.
    pub fn subtree(&self, id: TaxonId) -> DomainResult<TaxonTree> {
        let start = self
            .index_of(id)
            .ok_or_else(|| DomainError::invalid_ontology(format!("taxon {} not found", id)))?;

        let mut subtree = TaxonTree::new();
        for (idx, node) in self.preorder_from(vec![start]) {
            let parent = if idx == start {
                None
            } else {
                node.parent
                    .and_then(|p| self.arena.get(p))
                    .map(|n| n.taxon.id)
            };
            subtree.insert_taxon(node.taxon.clone(), parent)?;
        }
        for species in self.species.values() {
            if subtree.contains(species.parent_taxon_id) {
                subtree.add_species(species.clone())?;
            }
        }
        Ok(subtree)
    }

    fn nearest_kept_ancestor(&self, idx: Index, kept: &HashSet<Index>) -> Option<TaxonId> {
        let mut current = self.arena.get(idx).and_then(|n| n.parent);
        while let Some(p) = current {
            let node = self.arena.get(p)?;
            if kept.contains(&p) {
                return Some(node.taxon.id);
            }
            current = node.parent;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Number of levels of the deepest branch.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.roots
            .iter()
            .map(|&root| self.calculate_depth(root))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Pre-order traversal over all roots, children left to right.
    pub fn iter(&self) -> PreOrderIterator<'_> {
        self.preorder_from(self.roots.clone())
    }

    fn preorder_from(&self, mut starts: Vec<Index>) -> PreOrderIterator<'_> {
        starts.reverse();
        PreOrderIterator {
            tree: self,
            stack: starts,
        }
    }
}

pub struct PreOrderIterator<'a> {
    tree: &'a TaxonTree,
    stack: Vec<Index>,
}

impl<'a> Iterator for PreOrderIterator<'a> {
    type Item = (Index, &'a TaxonNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}
