use std::fs;

use assert_matches::assert_matches;

use kira_gene_vicinity::config::{
    Config, ConfigLoader, DatabaseList, MULTIPROCESS_WORKERS, RunConfig, normalize_extension,
    parse_separator,
};
use kira_gene_vicinity::domain::{ActionSet, Database};
use kira_gene_vicinity::error::KiraError;
use kira_gene_vicinity::table::OverwritePolicy;

#[test]
fn parse_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-gv.json");
    fs::write(
        &path,
        r#"{
  "schema_version": 1,
  "radius": 3,
  "fragment_size": 50,
  "separator": "\\t",
  "extension": "tsv",
  "overwrite": "prompt",
  "action": "de",
  "databases": ["UniProt", "KEGG"],
  "labels": "labels.json"
}"#,
    )
    .unwrap();

    let layer = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(
        layer.databases,
        Some(DatabaseList::Detailed(vec!["UniProt".to_string(), "KEGG".to_string()]))
    );

    let resolved = ConfigLoader::resolve_config(layer).unwrap();
    assert_eq!(resolved.radius, 3);
    assert_eq!(resolved.fragment_size, 50);
    assert_eq!(resolved.separator, b'\t');
    assert_eq!(resolved.extension, ".tsv");
    assert_eq!(resolved.overwrite, OverwritePolicy::Prompt);
    assert_eq!(
        resolved.actions,
        ActionSet {
            data: true,
            extract: true,
            ..ActionSet::default()
        }
    );
    assert_eq!(resolved.databases, vec![Database::Uniprot, Database::Kegg]);
    assert_eq!(resolved.labels.as_deref().map(|path| path.as_str()), Some("labels.json"));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let err = ConfigLoader::resolve(Some("does/not/exist.json")).unwrap_err();
    assert_matches!(err, KiraError::ConfigRead(_));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, "{ radius: 3 ").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, KiraError::ConfigParse(_));
}

#[test]
fn command_line_layer_overrides_file() {
    let file = Config {
        radius: Some(3),
        databases: Some(DatabaseList::Shorthand("kegg".to_string())),
        sample_size: Some(20),
        ..Config::default()
    };
    let cli = Config {
        radius: Some(8),
        databases: Some(DatabaseList::Shorthand("pdb;swissprot".to_string())),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(file.layer(cli)).unwrap();
    assert_eq!(resolved.radius, 8);
    assert_eq!(resolved.databases, vec![Database::Pdb, Database::Swissprot]);
    assert_eq!(resolved.sample_size, Some(20));
}

#[test]
fn zero_radius_and_fragment_size_are_rejected() {
    let err = ConfigLoader::resolve_config(Config {
        radius: Some(0),
        ..Config::default()
    })
    .unwrap_err();
    assert_matches!(err, KiraError::InvalidInput(_));

    let err = ConfigLoader::resolve_config(Config {
        fragment_size: Some(0),
        ..Config::default()
    })
    .unwrap_err();
    assert_matches!(err, KiraError::InvalidInput(_));
}

#[test]
fn worker_selection() {
    let pooled = ConfigLoader::resolve_config(Config {
        multiprocess: Some(true),
        ..Config::default()
    })
    .unwrap();
    assert_eq!(pooled.workers, Some(MULTIPROCESS_WORKERS));

    let explicit = ConfigLoader::resolve_config(Config {
        multiprocess: Some(true),
        workers: Some(3),
        ..Config::default()
    })
    .unwrap();
    assert_eq!(explicit.workers, Some(3));

    assert_eq!(RunConfig::default().workers, None);
}

#[test]
fn invalid_action_and_database() {
    let err = ConfigLoader::resolve_config(Config {
        action: Some("ix".to_string()),
        ..Config::default()
    })
    .unwrap_err();
    assert_matches!(err, KiraError::InvalidAction(_));

    let err = ConfigLoader::resolve_config(Config {
        databases: Some(DatabaseList::Shorthand("kegg;refseq".to_string())),
        ..Config::default()
    })
    .unwrap_err();
    assert_matches!(err, KiraError::InvalidDatabase(_));
}

#[test]
fn separators_and_extensions() {
    assert_eq!(parse_separator("tab").unwrap(), b'\t');
    assert_eq!(parse_separator(",").unwrap(), b',');
    assert_matches!(parse_separator(";;"), Err(KiraError::InvalidSeparator(_)));
    assert_eq!(normalize_extension("csv"), ".csv");
    assert_eq!(normalize_extension(".tsv"), ".tsv");
}

#[test]
fn sample_truncates() {
    let config = RunConfig {
        sample_size: Some(2),
        ..RunConfig::default()
    };
    assert_eq!(config.sample(vec![1, 2, 3]), vec![1, 2]);
    assert_eq!(RunConfig::default().sample(vec![1, 2, 3]), vec![1, 2, 3]);
}
