//! Domain entities: core data structures

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub type SpeciesId = u32;
pub type TaxonId = u32;
pub type GeneId = String;
pub type AnatEntityId = String;
pub type DevStageId = String;
/// Identifier of an orthology group ("OMA node").
pub type OmaNodeId = u64;

/// Orthology groups of one taxon as returned by an orthology resolver.
pub type OrthologMap = BTreeMap<OmaNodeId, BTreeSet<GeneId>>;

/// `f64` wrapper with a total order, so scores and ranks can live in ordered sets.
macro_rules! total_order_f64 {
    ($name:ident) => {
        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.0.total_cmp(&other.0) == Ordering::Equal
            }
        }

        impl Eq for $name {}

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.total_cmp(&other.0)
            }
        }

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.to_bits().hash(state);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<f64> for $name {
            fn from(value: f64) -> Self {
                Self(value)
            }
        }
    };
}

/// Evidence strength of an expression call (lower rank = stronger expression).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub f64);
total_order_f64!(Rank);

/// Conservation score attached to a multi-species call by a scorer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConservationScore(pub f64);
total_order_f64!(ConservationScore);

/// A node of the taxonomy above species level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Taxon {
    pub id: TaxonId,
    #[serde(default)]
    pub name: String,
}

impl Taxon {
    pub fn new(id: TaxonId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Taxon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}

/// A species, attached to the taxonomy through its immediate parent taxon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    #[serde(default)]
    pub name: String,
    pub parent_taxon_id: TaxonId,
}

impl Species {
    pub fn new(id: SpeciesId, name: impl Into<String>, parent_taxon_id: TaxonId) -> Self {
        Self {
            id,
            name: name.into(),
            parent_taxon_id,
        }
    }
}

/// Query gene.
///
/// Species information is optional on the type because genes arrive from
/// collaborators that may not have resolved it; the aggregator rejects such genes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub id: GeneId,
    pub species_id: Option<SpeciesId>,
    pub species: Option<Species>,
}

impl Gene {
    pub fn new(id: impl Into<GeneId>, species: Species) -> Self {
        Self {
            id: id.into(),
            species_id: Some(species.id),
            species: Some(species),
        }
    }
}

/// Genes believed orthologous within the scope of one taxon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrthologyGroup {
    pub id: OmaNodeId,
    pub gene_ids: BTreeSet<GeneId>,
}

impl OrthologyGroup {
    pub fn new<I, S>(id: OmaNodeId, gene_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<GeneId>,
    {
        Self {
            id,
            gene_ids: gene_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Convert a resolver mapping into groups, ordered by node id.
    pub fn from_map(map: OrthologMap) -> Vec<Self> {
        map.into_iter()
            .map(|(id, gene_ids)| Self { id, gene_ids })
            .collect()
    }
}

/// Anatomical entities considered evolutionarily equivalent within a taxon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnatSimilarityGroup {
    pub id: String,
    pub anat_entity_ids: BTreeSet<AnatEntityId>,
    /// Whether the similarity annotation is backed by trusted evidence
    #[serde(default = "default_trusted")]
    pub trusted: bool,
}

fn default_trusted() -> bool {
    true
}

impl AnatSimilarityGroup {
    pub fn new<I, S>(id: impl Into<String>, anat_entity_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AnatEntityId>,
    {
        Self {
            id: id.into(),
            anat_entity_ids: anat_entity_ids.into_iter().map(Into::into).collect(),
            trusted: true,
        }
    }

    pub fn untrusted(mut self) -> Self {
        self.trusted = false;
        self
    }
}

/// Developmental stages considered equivalent within a taxon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DevStageSimilarityGroup {
    pub id: String,
    pub dev_stage_ids: BTreeSet<DevStageId>,
}

impl DevStageSimilarityGroup {
    pub fn new<I, S>(id: impl Into<String>, dev_stage_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DevStageId>,
    {
        Self {
            id: id.into(),
            dev_stage_ids: dev_stage_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Anatomical entity plus developmental stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Condition {
    pub anat_entity_id: AnatEntityId,
    pub dev_stage_id: DevStageId,
}

impl Condition {
    pub fn new(anat_entity_id: impl Into<AnatEntityId>, dev_stage_id: impl Into<DevStageId>) -> Self {
        Self {
            anat_entity_id: anat_entity_id.into(),
            dev_stage_id: dev_stage_id.into(),
        }
    }
}

/// Summary call type of an expression observation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    #[default]
    Expressed,
    NotExpressed,
}

/// Expression observation for one gene in one condition of one species.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExpressionCall {
    pub gene_id: GeneId,
    pub species_id: SpeciesId,
    pub condition: Condition,
    #[serde(default)]
    pub call_type: CallType,
    #[serde(default)]
    pub mean_rank: Option<Rank>,
}

impl ExpressionCall {
    pub fn expressed(
        gene_id: impl Into<GeneId>,
        species_id: SpeciesId,
        condition: Condition,
        mean_rank: Option<f64>,
    ) -> Self {
        Self {
            gene_id: gene_id.into(),
            species_id,
            condition,
            call_type: CallType::Expressed,
            mean_rank: mean_rank.map(Rank),
        }
    }
}

/// Restriction applied by an expression-call provider.
///
/// Every set is a strict whitelist: an empty set matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFilter {
    pub gene_ids: BTreeSet<GeneId>,
    pub anat_entity_ids: BTreeSet<AnatEntityId>,
    pub dev_stage_ids: BTreeSet<DevStageId>,
    pub call_type: CallType,
}

impl CallFilter {
    /// Filter for EXPRESSED calls only; the only kind multi-species calls aggregate.
    pub fn expressed(
        gene_ids: BTreeSet<GeneId>,
        anat_entity_ids: BTreeSet<AnatEntityId>,
        dev_stage_ids: BTreeSet<DevStageId>,
    ) -> Self {
        Self {
            gene_ids,
            anat_entity_ids,
            dev_stage_ids,
            call_type: CallType::Expressed,
        }
    }

    pub fn accepts(&self, call: &ExpressionCall) -> bool {
        call.call_type == self.call_type
            && self.gene_ids.contains(&call.gene_id)
            && self.anat_entity_ids.contains(&call.condition.anat_entity_id)
            && self.dev_stage_ids.contains(&call.condition.dev_stage_id)
    }

    /// True when no call can possibly pass the filter.
    pub fn is_unsatisfiable(&self) -> bool {
        self.gene_ids.is_empty() || self.anat_entity_ids.is_empty() || self.dev_stage_ids.is_empty()
    }
}

/// Ordering requested from an expression-call provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallOrdering {
    #[default]
    GeneIdAscending,
}

/// Key identifying one multi-species call bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MultiSpeciesCallKey {
    pub taxon_id: TaxonId,
    pub orthology_group_id: OmaNodeId,
    pub anat_similarity_group_id: String,
    pub dev_stage_similarity_group_id: String,
}

impl fmt::Display for MultiSpeciesCallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.taxon_id,
            self.orthology_group_id,
            self.anat_similarity_group_id,
            self.dev_stage_similarity_group_id
        )
    }
}

/// Expression evidence of one orthology group, gathered across species in
/// similar conditions, for one taxon.
///
/// Values are immutable once built; [`MultiSpeciesCall::with_conservation_score`]
/// returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MultiSpeciesCall {
    taxon_id: TaxonId,
    orthology_group: OrthologyGroup,
    anat_similarity_group: AnatSimilarityGroup,
    dev_stage_similarity_group: DevStageSimilarityGroup,
    calls: BTreeSet<ExpressionCall>,
    conservation_score: Option<ConservationScore>,
}

impl MultiSpeciesCall {
    pub fn new(
        taxon_id: TaxonId,
        orthology_group: OrthologyGroup,
        anat_similarity_group: AnatSimilarityGroup,
        dev_stage_similarity_group: DevStageSimilarityGroup,
        calls: BTreeSet<ExpressionCall>,
    ) -> Self {
        Self {
            taxon_id,
            orthology_group,
            anat_similarity_group,
            dev_stage_similarity_group,
            calls,
            conservation_score: None,
        }
    }

    pub fn key(&self) -> MultiSpeciesCallKey {
        MultiSpeciesCallKey {
            taxon_id: self.taxon_id,
            orthology_group_id: self.orthology_group.id,
            anat_similarity_group_id: self.anat_similarity_group.id.clone(),
            dev_stage_similarity_group_id: self.dev_stage_similarity_group.id.clone(),
        }
    }

    pub fn taxon_id(&self) -> TaxonId {
        self.taxon_id
    }

    pub fn orthology_group(&self) -> &OrthologyGroup {
        &self.orthology_group
    }

    pub fn orthologous_gene_ids(&self) -> &BTreeSet<GeneId> {
        &self.orthology_group.gene_ids
    }

    pub fn anat_similarity_group(&self) -> &AnatSimilarityGroup {
        &self.anat_similarity_group
    }

    pub fn dev_stage_similarity_group(&self) -> &DevStageSimilarityGroup {
        &self.dev_stage_similarity_group
    }

    pub fn calls(&self) -> &BTreeSet<ExpressionCall> {
        &self.calls
    }

    pub fn conservation_score(&self) -> Option<ConservationScore> {
        self.conservation_score
    }

    /// Species contributing evidence to this call.
    pub fn species_ids(&self) -> BTreeSet<SpeciesId> {
        self.calls.iter().map(|c| c.species_id).collect()
    }

    pub fn with_conservation_score(self, score: Option<f64>) -> Self {
        Self {
            conservation_score: score.map(ConservationScore),
            ..self
        }
    }
}
