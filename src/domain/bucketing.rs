//! Partitioning of expression calls into multi-species call buckets.
//!
//! Pure logic: the groups and calls are resolved by the application layer and
//! handed in as plain values.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use crate::domain::error::{DomainError, DomainResult, MappingKind};
use crate::domain::{
    AnatSimilarityGroup, DevStageSimilarityGroup, ExpressionCall, GeneId, MultiSpeciesCall,
    MultiSpeciesCallKey, OrthologyGroup, TaxonId,
};

/// Counts collected while grouping one taxon.
///
/// Dropped calls are not errors; these counters are the only place they surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupingDiagnostics {
    pub species_queried: usize,
    pub calls_examined: usize,
    pub dropped_no_anat_group: usize,
    pub dropped_no_dev_stage_group: usize,
    pub dropped_no_orthology_group: usize,
    pub buckets: usize,
}

impl GroupingDiagnostics {
    pub fn dropped(&self) -> usize {
        self.dropped_no_anat_group + self.dropped_no_dev_stage_group + self.dropped_no_orthology_group
    }

    pub fn accumulate(&mut self, other: &GroupingDiagnostics) {
        self.species_queried += other.species_queried;
        self.calls_examined += other.calls_examined;
        self.dropped_no_anat_group += other.dropped_no_anat_group;
        self.dropped_no_dev_stage_group += other.dropped_no_dev_stage_group;
        self.dropped_no_orthology_group += other.dropped_no_orthology_group;
        self.buckets += other.buckets;
    }
}

/// Outcome of bucketing the calls of one taxon.
#[derive(Debug, Clone, Default)]
pub struct Bucketing {
    pub calls: BTreeSet<MultiSpeciesCall>,
    pub diagnostics: GroupingDiagnostics,
}

/// Union of the gene sets of every orthology group holding `gene_id`.
///
/// Returns the union together with the number of groups that matched; several
/// matches are unioned here, while [`CallBucketer`] rejects them.
pub fn orthologous_gene_ids(gene_id: &str, groups: &[OrthologyGroup]) -> (BTreeSet<GeneId>, usize) {
    let matching: Vec<&OrthologyGroup> = groups
        .iter()
        .filter(|g| g.gene_ids.contains(gene_id))
        .collect();
    let genes = matching
        .iter()
        .flat_map(|g| g.gene_ids.iter().cloned())
        .collect();
    (genes, matching.len())
}

/// Union of member ids across groups.
pub fn member_ids<'a, G, F, I>(groups: &'a [G], members: F) -> BTreeSet<String>
where
    F: Fn(&'a G) -> I,
    I: IntoIterator<Item = &'a String>,
{
    groups.iter().flat_map(members).cloned().collect()
}

/// Reverse index member id -> groups holding it.
fn index_members<'a, G, F>(groups: &'a [G], members: F) -> HashMap<&'a str, Vec<&'a G>>
where
    F: Fn(&'a G) -> &'a BTreeSet<String>,
{
    let mut index: HashMap<&str, Vec<&G>> = HashMap::new();
    for group in groups {
        for member in members(group) {
            index.entry(member.as_str()).or_default().push(group);
        }
    }
    index
}

/// Single group for `id`, None when unmapped, error when ambiguous.
fn single_group<'a, G>(
    index: &HashMap<&str, Vec<&'a G>>,
    kind: MappingKind,
    id: &str,
    group_id: impl Fn(&G) -> String,
) -> DomainResult<Option<&'a G>> {
    match index.get(id).map(Vec::as_slice) {
        None | Some([]) => Ok(None),
        Some([only]) => Ok(Some(*only)),
        Some(many) => Err(DomainError::AmbiguousMapping {
            kind,
            id: id.to_string(),
            group_ids: many.iter().map(|g| group_id(g)).collect(),
        }),
    }
}

struct Bucket<'a> {
    orthology_group: &'a OrthologyGroup,
    anat_group: &'a AnatSimilarityGroup,
    dev_stage_group: &'a DevStageSimilarityGroup,
    calls: BTreeSet<ExpressionCall>,
}

/// Assigns calls to (taxon, orthology group, anat group, dev-stage group) buckets.
pub struct CallBucketer<'a> {
    taxon_id: TaxonId,
    by_gene: HashMap<&'a str, Vec<&'a OrthologyGroup>>,
    by_anat_entity: HashMap<&'a str, Vec<&'a AnatSimilarityGroup>>,
    by_dev_stage: HashMap<&'a str, Vec<&'a DevStageSimilarityGroup>>,
}

impl<'a> CallBucketer<'a> {
    pub fn new(
        taxon_id: TaxonId,
        orthology_groups: &'a [OrthologyGroup],
        anat_groups: &'a [AnatSimilarityGroup],
        dev_stage_groups: &'a [DevStageSimilarityGroup],
    ) -> Self {
        Self {
            taxon_id,
            by_gene: index_members(orthology_groups, |g| &g.gene_ids),
            by_anat_entity: index_members(anat_groups, |g| &g.anat_entity_ids),
            by_dev_stage: index_members(dev_stage_groups, |g| &g.dev_stage_ids),
        }
    }

    /// Bucket every call, failing on the first ambiguous mapping.
    ///
    /// Mapping is checked anatomical entity first, then stage, then gene; a call
    /// dropped at an earlier step is never checked against the later ones.
    pub fn bucket<I>(&self, calls: I) -> DomainResult<Bucketing>
    where
        I: IntoIterator<Item = ExpressionCall>,
    {
        let mut diagnostics = GroupingDiagnostics::default();
        let mut buckets: BTreeMap<MultiSpeciesCallKey, Bucket<'a>> = BTreeMap::new();

        for call in calls {
            diagnostics.calls_examined += 1;

            let Some(anat_group) = single_group(
                &self.by_anat_entity,
                MappingKind::AnatEntity,
                &call.condition.anat_entity_id,
                |g| g.id.clone(),
            )?
            else {
                trace!("drop {:?}: no anatomical similarity group", call);
                diagnostics.dropped_no_anat_group += 1;
                continue;
            };

            let Some(dev_stage_group) = single_group(
                &self.by_dev_stage,
                MappingKind::DevStage,
                &call.condition.dev_stage_id,
                |g| g.id.clone(),
            )?
            else {
                trace!("drop {:?}: no stage similarity group", call);
                diagnostics.dropped_no_dev_stage_group += 1;
                continue;
            };

            let Some(orthology_group) =
                single_group(&self.by_gene, MappingKind::Gene, &call.gene_id, |g| {
                    g.id.to_string()
                })?
            else {
                trace!("drop {:?}: no orthology group", call);
                diagnostics.dropped_no_orthology_group += 1;
                continue;
            };

            let key = MultiSpeciesCallKey {
                taxon_id: self.taxon_id,
                orthology_group_id: orthology_group.id,
                anat_similarity_group_id: anat_group.id.clone(),
                dev_stage_similarity_group_id: dev_stage_group.id.clone(),
            };
            buckets
                .entry(key)
                .or_insert_with(|| Bucket {
                    orthology_group,
                    anat_group,
                    dev_stage_group,
                    calls: BTreeSet::new(),
                })
                .calls
                .insert(call);
        }

        let calls: BTreeSet<MultiSpeciesCall> = buckets
            .into_values()
            .map(|b| {
                MultiSpeciesCall::new(
                    self.taxon_id,
                    b.orthology_group.clone(),
                    b.anat_group.clone(),
                    b.dev_stage_group.clone(),
                    b.calls,
                )
            })
            .collect();
        diagnostics.buckets = calls.len();

        Ok(Bucketing { calls, diagnostics })
    }
}
