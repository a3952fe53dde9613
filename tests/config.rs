use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use citeid::cache::CacheConfig;
use citeid::config::{Config, ConfigLoader};
use citeid::error::CiteIdError;

fn write_config(content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("citeid.json");
    fs::write(&path, content).unwrap();
    (dir, path.to_string_lossy().into_owned())
}

#[test]
fn full_config_is_resolved() {
    let (_dir, path) = write_config(
        r#"{
            "use_api_service": false,
            "cache": {"kind": "sqlite", "path": "/tmp/citeid/validation.sqlite"},
            "retry": {"max_attempts": 5, "connect_pause_secs": 1, "timeout_secs": 10},
            "doi_prefixes": [
                {"prefix": "doi:10.5281", "publisher": "zenodo", "priority": 1},
                {"prefix": "10.6084", "publisher": "figshare", "priority": 2}
            ]
        }"#,
    );
    let resolved = ConfigLoader::resolve(Some(&path)).unwrap();
    assert!(!resolved.use_api_service);
    assert_eq!(
        resolved.cache,
        CacheConfig::Sqlite {
            path: Some(Utf8PathBuf::from("/tmp/citeid/validation.sqlite"))
        }
    );
    assert_eq!(resolved.retry.max_attempts, 5);
    assert_eq!(resolved.retry.connect_pause, Duration::from_secs(1));
    assert_eq!(resolved.timeout, Duration::from_secs(10));
    assert_eq!(resolved.priorities.len(), 2);
    assert_eq!(resolved.priorities.rank_of("10.5281/zenodo.1"), Some(1));
    assert_eq!(resolved.priorities.max_rank(), 2);
}

#[test]
fn redis_cache_section() {
    let (_dir, path) = write_config(
        r#"{"cache": {"kind": "redis", "redis_url": "redis://localhost:6379", "meta_db": 4}}"#,
    );
    let resolved = ConfigLoader::resolve(Some(&path)).unwrap();
    assert_eq!(
        resolved.cache,
        CacheConfig::Redis {
            url: "redis://localhost:6379".to_string(),
            flags_db: 0,
            meta_db: 4,
        }
    );
}

#[test]
fn invalid_values_are_rejected() {
    let zero_attempts =
        serde_json::from_str::<Config>(r#"{"retry": {"max_attempts": 0}}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve_config(zero_attempts),
        Err(CiteIdError::InvalidConfig(_))
    );

    let zero_priority = serde_json::from_str::<Config>(
        r#"{"doi_prefixes": [{"prefix": "10.1", "publisher": "x", "priority": 0}]}"#,
    )
    .unwrap();
    assert_matches!(
        ConfigLoader::resolve_config(zero_priority),
        Err(CiteIdError::InvalidConfig(_))
    );
}

#[test]
fn unknown_cache_kind_fails_to_parse() {
    let (_dir, path) = write_config(r#"{"cache": {"kind": "mongo"}}"#);
    assert_matches!(
        ConfigLoader::resolve(Some(&path)),
        Err(CiteIdError::ConfigParse(_))
    );
}

#[test]
fn missing_explicit_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(Some(path.to_str().unwrap())),
        Err(CiteIdError::ConfigRead(_))
    );
}
