// Tests for scan configuration

use quarry_core::config::{DEFAULT_USER_AGENT, ScanConfig};
use quarry_scanner::ScanError;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_default_config_values() {
    let config = ScanConfig::default();
    assert_eq!(config.timeout_secs, 10);
    assert_eq!(config.workers, 5);
    assert_eq!(config.max_redirects, 3);
    assert_eq!(config.scan_depth, 2);
    assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    assert!(config.user_agent.starts_with("quarry/"));
    assert!(config.proxy_urls.is_empty());
    assert!(!config.proxy_rotate);
    assert!(!config.insecure_tls);
}

#[test]
fn test_new_sets_base_url_only() {
    let config = ScanConfig::new("http://example.com");
    assert_eq!(config.base_url, "http://example.com");
    assert_eq!(config.workers, ScanConfig::default().workers);
}

#[test]
fn test_transport_options_mapping() {
    let mut config = ScanConfig::new("http://example.com");
    config.timeout_secs = 7;
    config.max_redirects = 0;
    config.insecure_tls = true;
    config.proxy_urls = vec!["http://127.0.0.1:8080".to_string()];
    config.proxy_rotate = true;
    config.headers.insert("X-Api-Key".to_string(), "secret".to_string());
    config.cookies.insert("session".to_string(), "abc".to_string());

    let options = config.transport_options();
    assert_eq!(options.timeout, Duration::from_secs(7));
    assert_eq!(options.max_redirects, 0);
    assert!(options.accept_invalid_certs);
    assert_eq!(options.proxies, config.proxy_urls);
    assert!(options.rotate_proxies);
    assert_eq!(options.headers.get("X-Api-Key").map(String::as_str), Some("secret"));
    assert_eq!(options.cookies.get("session").map(String::as_str), Some("abc"));
    assert_eq!(options.user_agent, config.user_agent);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validate_accepts_defaults_with_base_url() {
    assert!(ScanConfig::new("https://api.example.com:8443/v1").validate().is_ok());
}

#[test]
fn test_validate_rejects_missing_or_bad_base_url() {
    assert!(matches!(
        ScanConfig::default().validate(),
        Err(ScanError::InvalidUrl(_))
    ));
    assert!(matches!(
        ScanConfig::new("not a url").validate(),
        Err(ScanError::InvalidUrl(_))
    ));
    assert!(matches!(
        ScanConfig::new("ftp://example.com").validate(),
        Err(ScanError::InvalidUrl(_))
    ));
}

#[test]
fn test_validate_rejects_zero_workers() {
    let mut config = ScanConfig::new("http://example.com");
    config.workers = 0;
    assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));
}

#[test]
fn test_validate_rejects_zero_timeout_and_concurrency() {
    let mut config = ScanConfig::new("http://example.com");
    config.timeout_secs = 0;
    assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));

    let mut config = ScanConfig::new("http://example.com");
    config.crawl_concurrency = 0;
    assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));
}

#[test]
fn test_validate_rejects_bad_proxy() {
    let mut config = ScanConfig::new("http://example.com");
    config.proxy_urls = vec!["not a proxy".to_string()];
    assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));

    config.proxy_urls = vec!["ftp://127.0.0.1:21".to_string()];
    assert!(matches!(config.validate(), Err(ScanError::InvalidConfig(_))));
}

// ============================================================================
// Config files
// ============================================================================

#[test]
fn test_from_file_partial_config_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("quarry.json");
    fs::write(
        &path,
        r#"{
            "base_url": "http://target.local",
            "workers": 12,
            "headers": { "Authorization": "Bearer token" }
        }"#,
    )
    .unwrap();

    let config = ScanConfig::from_file(&path).unwrap();
    assert_eq!(config.base_url, "http://target.local");
    assert_eq!(config.workers, 12);
    assert_eq!(
        config.headers.get("Authorization").map(String::as_str),
        Some("Bearer token")
    );
    assert_eq!(config.timeout_secs, 10);
    assert_eq!(config.scan_depth, 2);
}

#[test]
fn test_from_file_invalid_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        ScanConfig::from_file(&path),
        Err(ScanError::InvalidConfig(_))
    ));
}

#[test]
fn test_from_file_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.json");
    assert!(matches!(ScanConfig::from_file(&path), Err(ScanError::IoError(_))));
}

#[test]
fn test_config_serializes_back_to_equal_value() {
    let mut config = ScanConfig::new("http://example.com");
    config.cookies.insert("a".to_string(), "b".to_string());
    let json = serde_json::to_string(&config).unwrap();
    let parsed: ScanConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}
