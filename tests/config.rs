use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use enatrieve_tx::config::{Config, ConfigLoader};
use enatrieve_tx::domain::OutputFormat;
use enatrieve_tx::error::EnaError;

#[test]
fn explicit_file_overrides_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("enatrieve.json");
    fs::write(
        &path,
        r#"{"strategy": "WGS", "limit": 25, "format": "json", "max_retries": 2, "backoff_factor_secs": 1.5}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.strategy, "WGS");
    assert_eq!(resolved.limit, 25);
    assert_eq!(resolved.format, OutputFormat::Json);
    assert_eq!(resolved.retry.max_retries, 2);
    assert_eq!(resolved.retry.backoff_factor, Duration::from_millis(1500));
    assert_eq!(resolved.retry.timeout, Duration::from_secs(30));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let err = ConfigLoader::resolve(Some("/definitely/not/here/enatrieve.json")).unwrap_err();
    assert_matches!(err, EnaError::ConfigRead(_));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("enatrieve.json");
    fs::write(&path, "{ limit: ").unwrap();
    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, EnaError::ConfigParse(_));
}

#[test]
fn negative_backoff_is_rejected() {
    let config = Config {
        backoff_factor_secs: Some(-1.0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(EnaError::ConfigParse(_))
    );
}
