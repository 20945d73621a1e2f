//! Tests for MultiSpeciesCallService

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};

use mscalls::application::services::{FnScorer, MultiSpeciesCallService, NoopScorer};
use mscalls::config::Settings;
use mscalls::domain::{
    AnatSimilarityGroup, CallFilter, CallOrdering, CallType, Condition, ConservationScore,
    DevStageSimilarityGroup, DomainError, ExpressionCall, Gene, MappingKind, MultiSpeciesCall,
    MultiSpeciesCallKey, OrthologMap, OrthologyGroup, Species, SpeciesId, Taxon, TaxonId,
    TaxonTree,
};
use mscalls::infrastructure::memory::InMemoryDataSource;
use mscalls::infrastructure::traits::{
    AnatSimilarityProvider, CallStream, Collaborators, DevStageSimilarityProvider,
    ExpressionCallProvider, OntologyProvider, OrthologyResolver,
};
use mscalls::infrastructure::{ProviderError, ProviderResult};
use mscalls::util::testing;
use mscalls::ApplicationError;

const T1: TaxonId = 40674;
const T2: TaxonId = 117571;
const HUMAN: SpeciesId = 9606;
const MOUSE: SpeciesId = 10090;
const ZEBRAFISH: SpeciesId = 7955;

// ============================================================
// Recording collaborator
// ============================================================

/// Delegates to an in-memory dataset and records every request it receives.
struct RecordingSource {
    inner: InMemoryDataSource,
    fail: Option<&'static str>,
    /// Returned on top of the filtered calls, as a provider ignoring the filter would
    unfiltered: Vec<ExpressionCall>,
    ontology_requests: Mutex<usize>,
    orthology_requests: Mutex<Vec<TaxonId>>,
    call_requests: Mutex<Vec<(SpeciesId, CallFilter)>>,
}

impl RecordingSource {
    fn new(inner: InMemoryDataSource) -> Self {
        Self {
            inner,
            fail: None,
            unfiltered: Vec::new(),
            ontology_requests: Mutex::new(0),
            orthology_requests: Mutex::new(Vec::new()),
            call_requests: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, provider: &'static str) -> Self {
        self.fail = Some(provider);
        self
    }

    fn with_unfiltered(mut self, call: ExpressionCall) -> Self {
        self.unfiltered.push(call);
        self
    }

    fn check(&self, provider: &'static str) -> ProviderResult<()> {
        if self.fail == Some(provider) {
            return Err(ProviderError::new(provider, "backend unavailable"));
        }
        Ok(())
    }

    fn total_requests(&self) -> usize {
        *self.ontology_requests.lock().unwrap()
            + self.orthology_requests.lock().unwrap().len()
            + self.call_requests.lock().unwrap().len()
    }
}

impl OntologyProvider for RecordingSource {
    fn taxon_ontology(
        &self,
        species_ids: &BTreeSet<SpeciesId>,
        root_taxon_id: Option<TaxonId>,
        include_ancestors: bool,
        include_descendants: bool,
    ) -> ProviderResult<TaxonTree> {
        *self.ontology_requests.lock().unwrap() += 1;
        self.check("ontology")?;
        self.inner
            .taxon_ontology(species_ids, root_taxon_id, include_ancestors, include_descendants)
    }
}

impl OrthologyResolver for RecordingSource {
    fn orthologs(
        &self,
        taxon_id: TaxonId,
        species_ids: &BTreeSet<SpeciesId>,
    ) -> ProviderResult<OrthologMap> {
        self.orthology_requests.lock().unwrap().push(taxon_id);
        self.check("orthology")?;
        self.inner.orthologs(taxon_id, species_ids)
    }
}

impl AnatSimilarityProvider for RecordingSource {
    fn anat_entity_similarities(
        &self,
        taxon_id: TaxonId,
        species_ids: &BTreeSet<SpeciesId>,
        trusted_only: bool,
    ) -> ProviderResult<HashSet<AnatSimilarityGroup>> {
        self.check("anat similarity")?;
        self.inner
            .anat_entity_similarities(taxon_id, species_ids, trusted_only)
    }
}

impl DevStageSimilarityProvider for RecordingSource {
    fn dev_stage_similarities(
        &self,
        taxon_id: TaxonId,
        species_ids: &BTreeSet<SpeciesId>,
    ) -> ProviderResult<HashSet<DevStageSimilarityGroup>> {
        self.check("dev stage similarity")?;
        self.inner.dev_stage_similarities(taxon_id, species_ids)
    }
}

impl ExpressionCallProvider for RecordingSource {
    fn expression_calls(
        &self,
        species_id: SpeciesId,
        filter: &CallFilter,
        ordering: CallOrdering,
    ) -> ProviderResult<CallStream<'_>> {
        self.call_requests
            .lock()
            .unwrap()
            .push((species_id, filter.clone()));
        self.check("expression calls")?;
        let extra: Vec<ExpressionCall> = self
            .unfiltered
            .iter()
            .filter(|c| c.species_id == species_id)
            .cloned()
            .collect();
        let stream = self.inner.expression_calls(species_id, filter, ordering)?;
        Ok(Box::new(
            stream.chain(extra.into_iter().map(Ok::<_, ProviderError>)),
        ))
    }
}

// ============================================================
// Fixtures
// ============================================================

/// Euteleostomi (T2) > Mammalia (T1) > {human, mouse}; zebrafish directly under T2.
fn taxonomy() -> TaxonTree {
    let mut tree = TaxonTree::new();
    tree.insert_taxon(Taxon::new(T2, "Euteleostomi"), None).unwrap();
    tree.insert_taxon(Taxon::new(T1, "Mammalia"), Some(T2)).unwrap();
    tree.add_species(Species::new(HUMAN, "human", T1)).unwrap();
    tree.add_species(Species::new(MOUSE, "mouse", T1)).unwrap();
    tree.add_species(Species::new(ZEBRAFISH, "zebrafish", T2))
        .unwrap();
    tree
}

fn human_gene() -> Gene {
    Gene::new("g1", Species::new(HUMAN, "human", T1))
}

/// T1 has one group of each kind; T2 has none.
#[fixture]
fn dataset() -> InMemoryDataSource {
    testing::init_test_setup();
    InMemoryDataSource::new(taxonomy())
        .with_gene("g1", HUMAN)
        .with_gene("g2", MOUSE)
        .with_orthology_group(T1, OrthologyGroup::new(1, ["g1", "g2"]))
        .with_anat_similarity(T1, AnatSimilarityGroup::new("A1", ["ae1", "ae2"]))
        .with_dev_stage_similarity(T1, DevStageSimilarityGroup::new("D1", ["s1"]))
        .with_calls([
            ExpressionCall::expressed("g1", HUMAN, Condition::new("ae1", "s1"), Some(10.0)),
            ExpressionCall::expressed("g2", MOUSE, Condition::new("ae2", "s1"), Some(20.0)),
        ])
}

fn service_with(source: Arc<RecordingSource>, settings: &Settings) -> MultiSpeciesCallService {
    MultiSpeciesCallService::new(
        &Collaborators::from_source(source),
        Arc::new(NoopScorer),
        settings,
    )
    .unwrap()
}

fn sequential() -> Settings {
    Settings {
        parallel: false,
        ..Settings::default()
    }
}

fn bucket_keys(calls: &BTreeSet<MultiSpeciesCall>) -> Vec<MultiSpeciesCallKey> {
    calls.iter().map(MultiSpeciesCall::key).collect()
}

// ============================================================
// Aggregation
// ============================================================

#[rstest]
fn given_two_species_in_one_group_when_loading_then_single_bucket_at_nearest_taxon(
    dataset: InMemoryDataSource,
) {
    // Arrange
    let service = service_with(Arc::new(RecordingSource::new(dataset)), &sequential());

    // Act
    let result = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    // Assert
    assert_eq!(result.keys().collect::<Vec<_>>(), vec![T1, T2]);

    let t1 = result.get(T1).unwrap();
    assert_eq!(
        bucket_keys(t1),
        vec![MultiSpeciesCallKey {
            taxon_id: T1,
            orthology_group_id: 1,
            anat_similarity_group_id: "A1".into(),
            dev_stage_similarity_group_id: "D1".into(),
        }]
    );
    let bucket = t1.iter().next().unwrap();
    assert_eq!(bucket.calls().len(), 2);
    assert_eq!(bucket.species_ids(), BTreeSet::from([HUMAN, MOUSE]));
    assert_eq!(bucket.conservation_score(), None);

    assert!(result.get(T2).unwrap().is_empty());
}

#[rstest]
#[case(None)]
#[case(Some(vec![HUMAN, MOUSE]))]
#[case(Some(vec![HUMAN]))]
fn given_any_species_scope_when_loading_then_keys_follow_ancestor_chain(
    dataset: InMemoryDataSource,
    #[case] species: Option<Vec<SpeciesId>>,
) {
    let service = service_with(Arc::new(RecordingSource::new(dataset)), &sequential());

    let result = service
        .load_multi_species_expression_calls(&human_gene(), species.as_deref())
        .unwrap();

    assert_eq!(result.keys().collect::<Vec<_>>(), vec![T1, T2]);
}

#[rstest]
fn given_human_only_scope_when_loading_then_mouse_evidence_excluded(dataset: InMemoryDataSource) {
    let source = Arc::new(RecordingSource::new(dataset));
    let service = service_with(Arc::clone(&source), &sequential());

    let result = service
        .load_multi_species_expression_calls(&human_gene(), Some(&[HUMAN][..]))
        .unwrap();

    let bucket = result.get(T1).unwrap().iter().next().unwrap();
    assert_eq!(bucket.species_ids(), BTreeSet::from([HUMAN]));
    assert!(source
        .call_requests
        .lock()
        .unwrap()
        .iter()
        .all(|(species, _)| *species == HUMAN));
}

#[rstest]
fn given_same_inputs_when_loading_twice_then_results_equal(dataset: InMemoryDataSource) {
    let service = service_with(Arc::new(RecordingSource::new(dataset)), &sequential());

    let first = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();
    let second = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(second.get(T1).unwrap().iter().next().unwrap().calls().len(), 2);
}

#[rstest]
fn given_parallel_settings_when_loading_then_matches_sequential(dataset: InMemoryDataSource) {
    let source = Arc::new(RecordingSource::new(dataset));
    let parallel = Settings {
        parallel: true,
        max_threads: Some(2),
        ..Settings::default()
    };

    let expected = service_with(Arc::clone(&source), &sequential())
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();
    let actual = service_with(source, &parallel)
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    assert_eq!(actual, expected);
    assert_eq!(actual.keys().collect::<Vec<_>>(), vec![T1, T2]);
}

// ============================================================
// Filtering and drops
// ============================================================

#[rstest]
fn given_not_expressed_calls_when_loading_then_only_expressed_requested(
    dataset: InMemoryDataSource,
) {
    // Arrange
    let mut absent =
        ExpressionCall::expressed("g1", HUMAN, Condition::new("ae2", "s1"), None);
    absent.call_type = CallType::NotExpressed;
    let source = Arc::new(RecordingSource::new(dataset.with_call(absent)));
    let service = service_with(Arc::clone(&source), &sequential());

    // Act
    let result = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    // Assert
    let requests = source.call_requests.lock().unwrap();
    assert!(!requests.is_empty());
    assert!(requests
        .iter()
        .all(|(_, filter)| filter.call_type == CallType::Expressed));
    assert!(result
        .iter()
        .flat_map(|(_, calls)| calls.iter())
        .flat_map(|bucket| bucket.calls().iter())
        .all(|call| call.call_type == CallType::Expressed));
}

#[rstest]
fn given_filter_when_loading_then_restricted_to_orthologs_and_group_members(
    dataset: InMemoryDataSource,
) {
    let source = Arc::new(RecordingSource::new(dataset));
    let service = service_with(Arc::clone(&source), &sequential());

    service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    let requests = source.call_requests.lock().unwrap();
    let species: BTreeSet<_> = requests.iter().map(|(s, _)| *s).collect();
    assert_eq!(species, BTreeSet::from([HUMAN, MOUSE]));
    let (_, filter) = &requests[0];
    assert_eq!(filter.gene_ids, BTreeSet::from(["g1".into(), "g2".into()]));
    assert_eq!(
        filter.anat_entity_ids,
        BTreeSet::from(["ae1".into(), "ae2".into()])
    );
    assert_eq!(filter.dev_stage_ids, BTreeSet::from(["s1".into()]));
}

#[rstest]
fn given_taxon_without_groups_when_loading_then_no_calls_fetched_for_it(
    dataset: InMemoryDataSource,
) {
    let source = Arc::new(RecordingSource::new(dataset));
    let service = service_with(Arc::clone(&source), &sequential());

    let (_, report) = service.load_with_report(&human_gene(), None).unwrap();

    // T1 queries human and mouse; T2 has no orthologs so nothing is fetched
    assert_eq!(source.call_requests.lock().unwrap().len(), 2);
    assert_eq!(report.diagnostics_for(T2).unwrap().species_queried, 0);
    assert_eq!(report.diagnostics_for(T1).unwrap().species_queried, 2);
}

#[rstest]
fn given_call_outside_similarity_groups_when_loading_then_dropped_silently(
    dataset: InMemoryDataSource,
) {
    // Arrange
    let stray = ExpressionCall::expressed("g2", MOUSE, Condition::new("ae3", "s1"), None);
    let source = RecordingSource::new(dataset).with_unfiltered(stray.clone());
    let service = service_with(Arc::new(source), &sequential());

    // Act
    let (result, report) = service.load_with_report(&human_gene(), None).unwrap();

    // Assert
    let buckets = result.get(T1).unwrap();
    assert_eq!(buckets.len(), 1);
    assert!(buckets.iter().all(|b| !b.calls().contains(&stray)));
    let t1 = report.diagnostics_for(T1).unwrap();
    assert_eq!(t1.dropped_no_anat_group, 1);
    assert_eq!(t1.calls_examined, 3);
}

#[rstest]
fn given_untrusted_group_when_trusted_only_then_its_entities_not_requested(
    dataset: InMemoryDataSource,
) {
    let source = Arc::new(RecordingSource::new(
        dataset.with_anat_similarity(T1, AnatSimilarityGroup::new("A3", ["ae3"]).untrusted()),
    ));
    let service = service_with(Arc::clone(&source), &sequential());

    service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    let requests = source.call_requests.lock().unwrap();
    assert!(requests
        .iter()
        .all(|(_, filter)| !filter.anat_entity_ids.contains("ae3")));
}

#[test]
fn given_untrusted_similarities_allowed_when_loading_then_untrusted_group_used() {
    let source = InMemoryDataSource::new(taxonomy())
        .with_orthology_group(T1, OrthologyGroup::new(1, ["g1", "g2"]))
        .with_anat_similarity(T1, AnatSimilarityGroup::new("A3", ["ae3"]).untrusted())
        .with_dev_stage_similarity(T1, DevStageSimilarityGroup::new("D1", ["s1"]))
        .with_call(ExpressionCall::expressed(
            "g2",
            MOUSE,
            Condition::new("ae3", "s1"),
            None,
        ));
    let settings = Settings {
        parallel: false,
        trusted_similarities_only: false,
        ..Settings::default()
    };
    let service = service_with(Arc::new(RecordingSource::new(source)), &settings);

    let result = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    let bucket = result.get(T1).unwrap().iter().next().unwrap();
    assert_eq!(bucket.anat_similarity_group().id, "A3");
    assert!(!bucket.anat_similarity_group().trusted);
}

// ============================================================
// Failures
// ============================================================

#[test]
fn given_gene_in_two_orthology_groups_when_bucketing_then_ambiguous_mapping() {
    // Arrange
    let source = InMemoryDataSource::new(taxonomy())
        .with_orthology_group(T1, OrthologyGroup::new(1, ["g1", "g2"]))
        .with_orthology_group(T1, OrthologyGroup::new(2, ["g1", "g3"]))
        .with_anat_similarity(T1, AnatSimilarityGroup::new("A1", ["ae1"]))
        .with_dev_stage_similarity(T1, DevStageSimilarityGroup::new("D1", ["s1"]))
        .with_call(ExpressionCall::expressed(
            "g1",
            HUMAN,
            Condition::new("ae1", "s1"),
            None,
        ));
    let service = service_with(Arc::new(RecordingSource::new(source)), &sequential());

    // Act
    let err = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap_err();

    // Assert
    match err {
        ApplicationError::Domain(DomainError::AmbiguousMapping {
            kind,
            id,
            group_ids,
        }) => {
            assert_eq!(kind, MappingKind::Gene);
            assert_eq!(id, "g1");
            assert_eq!(group_ids, vec!["1".to_string(), "2".to_string()]);
        }
        other => panic!("expected AmbiguousMapping, got {other:?}"),
    }
}

#[rstest]
#[case::species_missing(Gene { id: "g1".into(), species_id: Some(HUMAN), species: None })]
#[case::species_id_missing(Gene { id: "g1".into(), species_id: None, species: Some(Species::new(HUMAN, "human", T1)) })]
fn given_gene_without_species_when_loading_then_invalid_argument_before_any_request(
    dataset: InMemoryDataSource,
    #[case] gene: Gene,
) {
    let source = Arc::new(RecordingSource::new(dataset));
    let service = service_with(Arc::clone(&source), &sequential());

    let err = service
        .load_multi_species_expression_calls(&gene, None)
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::InvalidArgument { .. })
    ));
    assert_eq!(source.total_requests(), 0);
}

#[rstest]
fn given_species_scope_excluding_gene_species_when_loading_then_invalid_argument(
    dataset: InMemoryDataSource,
) {
    let source = Arc::new(RecordingSource::new(dataset));
    let service = service_with(Arc::clone(&source), &sequential());

    let err = service
        .load_multi_species_expression_calls(&human_gene(), Some(&[MOUSE, ZEBRAFISH][..]))
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::InvalidArgument { .. })
    ));
    assert_eq!(err.code(), mscalls::exitcode::USAGE);
    assert_eq!(source.total_requests(), 0);
}

#[rstest]
fn given_parent_taxon_missing_from_ontology_when_loading_then_inconsistent_ontology(
    dataset: InMemoryDataSource,
) {
    let gene = Gene::new("g9", Species::new(9999, "unplaced", 12345));
    let service = service_with(Arc::new(RecordingSource::new(dataset)), &sequential());

    let err = service
        .load_multi_species_expression_calls(&gene, None)
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::InconsistentOntology {
            taxon_id: 12345,
            species_id: 9999
        })
    ));
    assert!(err.is_fatal_data_error());
}

#[rstest]
#[case("ontology")]
#[case("orthology")]
#[case("anat similarity")]
#[case("dev stage similarity")]
#[case("expression calls")]
fn given_failing_provider_when_loading_then_error_propagates(
    dataset: InMemoryDataSource,
    #[case] provider: &'static str,
) {
    let source = Arc::new(RecordingSource::new(dataset).failing(provider));
    let service = service_with(source, &Settings::default());

    let err = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap_err();

    match err {
        ApplicationError::Provider(e) => assert_eq!(e.provider, provider),
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[rstest]
fn given_failure_at_nearest_taxon_when_loading_sequentially_then_later_taxa_not_started(
    dataset: InMemoryDataSource,
) {
    let source = Arc::new(RecordingSource::new(dataset).failing("orthology"));
    let service = service_with(Arc::clone(&source), &sequential());

    let err = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Provider(_)));
    assert_eq!(*source.orthology_requests.lock().unwrap(), vec![T1]);
    assert!(source.call_requests.lock().unwrap().is_empty());
}

// ============================================================
// Scoring and reporting
// ============================================================

#[rstest]
fn given_fn_scorer_when_loading_then_every_bucket_scored(dataset: InMemoryDataSource) {
    let collaborators = Collaborators::from_source(Arc::new(RecordingSource::new(dataset)));
    let scorer = FnScorer::new(|call: &MultiSpeciesCall| Some(call.species_ids().len() as f64));
    let service =
        MultiSpeciesCallService::new(&collaborators, Arc::new(scorer), &sequential()).unwrap();

    let result = service
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    let bucket = result.get(T1).unwrap().iter().next().unwrap();
    assert_eq!(bucket.conservation_score(), Some(ConservationScore(2.0)));
}

#[rstest]
fn given_run_when_loading_with_report_then_diagnostics_per_taxon_in_order(
    dataset: InMemoryDataSource,
) {
    let service = service_with(Arc::new(RecordingSource::new(dataset)), &sequential());

    let (result, report) = service.load_with_report(&human_gene(), None).unwrap();

    let taxa: Vec<_> = report.taxa.iter().map(|(id, _)| *id).collect();
    assert_eq!(taxa, result.keys().collect::<Vec<_>>());
    let totals = report.totals();
    assert_eq!(totals.calls_examined, 2);
    assert_eq!(totals.buckets, 1);
    assert_eq!(totals.dropped(), 0);
}

#[rstest]
fn given_two_runs_when_loading_with_report_then_run_ids_differ(dataset: InMemoryDataSource) {
    let service = service_with(Arc::new(RecordingSource::new(dataset)), &sequential());

    let (_, first) = service.load_with_report(&human_gene(), None).unwrap();
    let (_, second) = service.load_with_report(&human_gene(), None).unwrap();

    assert_ne!(first.run_id, second.run_id);
}
