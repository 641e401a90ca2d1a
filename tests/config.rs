use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use sonuc_crawler::config::{Config, ConfigLoader, ConfigOverrides, FailurePolicy};
use sonuc_crawler::error::CrawlError;

#[test]
fn load_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sonuc.json");
    fs::write(
        &path,
        r#"{
            "api_base_url": "http://localhost:8080/api/v1/",
            "max_attempts": 5,
            "base_delay_ms": 250,
            "submission_delay_ms": 0,
            "failure_policy": "isolate",
            "output_dir": "out"
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.api_base_url, "http://localhost:8080/api/v1");
    assert_eq!(resolved.retry.max_attempts, 5);
    assert_eq!(resolved.retry.base_delay, Duration::from_millis(250));
    assert_eq!(resolved.submission_delay, Duration::ZERO);
    assert_eq!(resolved.failure_policy, FailurePolicy::Isolate);
    assert_eq!(resolved.output_dir, Utf8PathBuf::from("out"));
    assert_eq!(resolved.max_concurrent_requests, 16);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, CrawlError::ConfigRead(ref missing) if missing == &path);
}

#[test]
fn malformed_file_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sonuc.json");
    fs::write(&path, "{ not json").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(CrawlError::ConfigParse(_))
    );
}

#[test]
fn unknown_failure_policy_is_rejected() {
    let parsed = serde_json::from_str::<Config>(r#"{"failure_policy": "retry"}"#);
    assert!(parsed.is_err());
}

#[test]
fn invalid_values_are_rejected() {
    let relative = Config {
        api_base_url: Some("api.example/v1".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(relative),
        Err(CrawlError::InvalidConfig(_))
    );

    let jitter = Config {
        jitter: Some(1.5),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(jitter),
        Err(CrawlError::InvalidConfig(_))
    );
}

#[test]
fn zero_concurrency_override_is_rejected() {
    let err = ConfigLoader::resolve_config(Config::default())
        .unwrap()
        .apply(ConfigOverrides {
            max_concurrent_requests: Some(0),
            ..ConfigOverrides::default()
        })
        .unwrap_err();
    assert_matches!(err, CrawlError::InvalidConfig(_));
}
