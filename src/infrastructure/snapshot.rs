//! TOML data snapshots
//!
//! A snapshot holds a complete collaborator dataset (taxonomy, genes, groups,
//! calls) in one file and loads into an [`InMemoryDataSource`].
//!
//! ```toml
//! [[taxa]]
//! id = 40674
//! name = "Mammalia"
//!
//! [[taxa]]
//! id = 9443
//! name = "Primates"
//! parent = 40674
//!
//! [[species]]
//! id = 9606
//! name = "human"
//! parent_taxon_id = 9443
//!
//! [[genes]]
//! id = "ENSG00000139618"
//! species_id = 9606
//!
//! [[groups]]
//! taxon_id = 40674
//! orthology = [{ id = 1, gene_ids = ["ENSG00000139618"] }]
//! anat_similarities = [{ id = "A1", anat_entity_ids = ["UBERON:0000955"] }]
//! dev_stage_similarities = [{ id = "D1", dev_stage_ids = ["UBERON:0000113"] }]
//!
//! [[calls]]
//! gene_id = "ENSG00000139618"
//! species_id = 9606
//! condition = { anat_entity_id = "UBERON:0000955", dev_stage_id = "UBERON:0000113" }
//! mean_rank = 1520.5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    AnatSimilarityGroup, DevStageSimilarityGroup, DomainError, DomainResult, ExpressionCall,
    GeneId, OrthologyGroup, Species, SpeciesId, Taxon, TaxonId, TaxonTree,
};
use crate::infrastructure::error::{InfraError, InfraResult, IoResultExt};
use crate::infrastructure::memory::InMemoryDataSource;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotTaxon {
    pub id: TaxonId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<TaxonId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotGene {
    pub id: GeneId,
    pub species_id: SpeciesId,
}

/// Groups valid at one taxon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaxonGroups {
    pub taxon_id: TaxonId,
    #[serde(default)]
    pub orthology: Vec<OrthologyGroup>,
    #[serde(default)]
    pub anat_similarities: Vec<AnatSimilarityGroup>,
    #[serde(default)]
    pub dev_stage_similarities: Vec<DevStageSimilarityGroup>,
}

/// Complete collaborator dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Snapshot {
    pub taxa: Vec<SnapshotTaxon>,
    pub species: Vec<Species>,
    pub genes: Vec<SnapshotGene>,
    pub groups: Vec<TaxonGroups>,
    pub calls: Vec<ExpressionCall>,
}

impl Snapshot {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read and parse a snapshot file.
    pub fn load(path: &Path) -> InfraResult<Self> {
        debug!("load snapshot: {}", path.display());
        let content = std::fs::read_to_string(path).with_path_context("read snapshot", path)?;
        Self::from_toml_str(&content).map_err(|e| InfraError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Build the taxonomy, inserting each taxon once its parent is present.
    ///
    /// Taxa may be listed in any order.
    fn build_taxonomy(&self) -> DomainResult<TaxonTree> {
        let mut tree = TaxonTree::new();
        let mut pending: Vec<&SnapshotTaxon> = self.taxa.iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for taxon in pending {
                match taxon.parent {
                    Some(parent) if !tree.contains(parent) => deferred.push(taxon),
                    parent => {
                        tree.insert_taxon(Taxon::new(taxon.id, taxon.name.clone()), parent)?;
                    }
                }
            }
            if deferred.len() == before {
                let ids: Vec<String> = deferred.iter().map(|t| t.id.to_string()).collect();
                return Err(DomainError::invalid_ontology(format!(
                    "taxa with unknown or cyclic parents: {}",
                    ids.join(", ")
                )));
            }
            pending = deferred;
        }

        for species in &self.species {
            tree.add_species(species.clone())?;
        }
        Ok(tree)
    }

    pub fn into_data_source(self) -> DomainResult<InMemoryDataSource> {
        let taxonomy = self.build_taxonomy()?;
        let mut source = InMemoryDataSource::new(taxonomy);
        for gene in self.genes {
            source = source.with_gene(gene.id, gene.species_id);
        }
        for groups in self.groups {
            let taxon_id = groups.taxon_id;
            for group in groups.orthology {
                source = source.with_orthology_group(taxon_id, group);
            }
            for group in groups.anat_similarities {
                source = source.with_anat_similarity(taxon_id, group);
            }
            for group in groups.dev_stage_similarities {
                source = source.with_dev_stage_similarity(taxon_id, group);
            }
        }
        Ok(source.with_calls(self.calls))
    }
}

/// Load a snapshot file straight into a data source.
pub fn load_data_source(path: &Path) -> InfraResult<InMemoryDataSource> {
    Snapshot::load(path)?
        .into_data_source()
        .map_err(|e| InfraError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallType, Rank};

    const SNAPSHOT: &str = r#"
[[taxa]]
id = 9443
name = "Primates"
parent = 40674

[[taxa]]
id = 40674
name = "Mammalia"

[[species]]
id = 9606
name = "human"
parent_taxon_id = 9443

[[genes]]
id = "g1"
species_id = 9606

[[groups]]
taxon_id = 40674
orthology = [{ id = 1, gene_ids = ["g1"] }]
anat_similarities = [{ id = "A1", anat_entity_ids = ["ae1"], trusted = false }]

[[calls]]
gene_id = "g1"
species_id = 9606
condition = { anat_entity_id = "ae1", dev_stage_id = "s1" }
mean_rank = 12.5
"#;

    #[test]
    fn given_toml_when_parsing_then_reads_all_sections() {
        let snapshot = Snapshot::from_toml_str(SNAPSHOT).unwrap();

        assert_eq!(snapshot.taxa.len(), 2);
        assert_eq!(snapshot.groups[0].orthology[0].id, 1);
        assert!(!snapshot.groups[0].anat_similarities[0].trusted);
        assert_eq!(snapshot.calls[0].call_type, CallType::Expressed);
        assert_eq!(snapshot.calls[0].mean_rank, Some(Rank(12.5)));
    }

    #[test]
    fn given_child_listed_before_parent_when_building_then_succeeds() {
        let source = Snapshot::from_toml_str(SNAPSHOT)
            .unwrap()
            .into_data_source()
            .unwrap();

        assert_eq!(source.taxonomy().root().map(|t| t.id), Some(40674));
        assert_eq!(source.taxonomy().len(), 2);
    }

    #[test]
    fn given_dangling_parent_when_building_then_invalid_ontology() {
        let snapshot = Snapshot {
            taxa: vec![SnapshotTaxon {
                id: 1,
                name: String::new(),
                parent: Some(99),
            }],
            ..Snapshot::default()
        };

        assert!(matches!(
            snapshot.into_data_source(),
            Err(DomainError::InvalidOntology { .. })
        ));
    }
}
