//! Tests for ServiceContainer wiring from settings and snapshots

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use mscalls::application::services::FnScorer;
use mscalls::config::Settings;
use mscalls::domain::{ConservationScore, Gene, MultiSpeciesCall, Species};
use mscalls::infrastructure::memory::InMemoryDataSource;
use mscalls::infrastructure::InfraError;
use mscalls::{ApplicationError, Collaborators, ServiceContainer};

const SNAPSHOT: &str = r#"
[[taxa]]
id = 40674
name = "Mammalia"
parent = 117571

[[taxa]]
id = 117571
name = "Euteleostomi"

[[species]]
id = 9606
name = "human"
parent_taxon_id = 40674

[[species]]
id = 10090
name = "mouse"
parent_taxon_id = 40674

[[genes]]
id = "g1"
species_id = 9606

[[genes]]
id = "g2"
species_id = 10090

[[groups]]
taxon_id = 40674
orthology = [{ id = 1, gene_ids = ["g1", "g2"] }]
anat_similarities = [{ id = "A1", anat_entity_ids = ["ae1", "ae2"] }]
dev_stage_similarities = [{ id = "D1", dev_stage_ids = ["s1"] }]

[[calls]]
gene_id = "g1"
species_id = 9606
condition = { anat_entity_id = "ae1", dev_stage_id = "s1" }

[[calls]]
gene_id = "g2"
species_id = 10090
condition = { anat_entity_id = "ae2", dev_stage_id = "s1" }
"#;

fn write_snapshot(dir: &Path, content: &str) -> Settings {
    let path = dir.join("snapshot.toml");
    fs::write(&path, content).unwrap();
    Settings {
        snapshot: Some(path),
        ..Settings::default()
    }
}

fn human_gene() -> Gene {
    Gene::new("g1", Species::new(9606, "human", 40674))
}

#[test]
fn given_snapshot_settings_when_building_service_then_aggregates_snapshot_data() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let container = ServiceContainer::from_settings(write_snapshot(dir.path(), SNAPSHOT)).unwrap();

    // Act
    let result = container
        .service()
        .unwrap()
        .load_multi_species_expression_calls(&human_gene(), None)
        .unwrap();

    // Assert
    assert_eq!(result.keys().collect::<Vec<_>>(), vec![40674, 117571]);
    assert_eq!(result.get(40674).unwrap().len(), 1);
    assert_eq!(result.total_calls(), 1);
}

#[test]
fn given_no_snapshot_configured_when_from_settings_then_config_error() {
    let err = ServiceContainer::from_settings(Settings::default())
        .err()
        .expect("missing snapshot must fail");

    assert!(matches!(
        err,
        InfraError::Application(ApplicationError::Config { .. })
    ));
    assert_eq!(err.code(), mscalls::exitcode::CONFIG);
}

#[test]
fn given_missing_snapshot_file_when_from_settings_then_io_error() {
    let dir = TempDir::new().unwrap();
    let settings = Settings {
        snapshot: Some(dir.path().join("absent.toml")),
        ..Settings::default()
    };

    let err = ServiceContainer::from_settings(settings)
        .err()
        .expect("absent snapshot must fail");

    assert!(matches!(err, InfraError::Io { .. }));
    assert_eq!(err.code(), mscalls::exitcode::IOERR);
}

#[test]
fn given_snapshot_with_dangling_parent_when_from_settings_then_snapshot_error() {
    let dir = TempDir::new().unwrap();
    let settings = write_snapshot(
        dir.path(),
        "[[taxa]]\nid = 1\nname = \"orphan\"\nparent = 2\n",
    );

    let err = ServiceContainer::from_settings(settings)
        .err()
        .expect("dangling parent must fail");

    assert!(matches!(err, InfraError::Snapshot { .. }));
}

#[test]
fn given_custom_scorer_when_with_deps_then_service_uses_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.toml");
    fs::write(&path, SNAPSHOT).unwrap();
    let source: InMemoryDataSource = mscalls::infrastructure::snapshot::load_data_source(&path).unwrap();
    let scorer = FnScorer::new(|call: &MultiSpeciesCall| Some(call.calls().len() as f64));

    let container = ServiceContainer::with_deps(
        Settings {
            parallel: false,
            ..Settings::default()
        },
        Collaborators::from_source(Arc::new(source)),
        Arc::new(scorer),
    );
    let result = container
        .service()
        .unwrap()
        .load_multi_species_expression_calls(&human_gene(), Some(&[9606, 10090][..]))
        .unwrap();

    let bucket = result.get(40674).unwrap().iter().next().unwrap();
    assert_eq!(bucket.conservation_score(), Some(ConservationScore(2.0)));
}
