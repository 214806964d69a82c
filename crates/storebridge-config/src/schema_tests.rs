use super::*;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.version_cache.kind, CacheKind::None);
    assert!(!config.version_cache.strict);
    assert_eq!(config.session.ready_timeout_ms, 30_000);
    assert_eq!(config.session.generation, GenerationSetting::Auto);
    assert!(config.browser.launch);
}

#[test]
fn test_endpoint_derived_from_port() {
    let config = BrowserConfig {
        debug_port: 9444,
        ..Default::default()
    };
    assert_eq!(config.endpoint(), "http://127.0.0.1:9444");
}

#[test]
fn test_endpoint_explicit() {
    let config = BrowserConfig {
        endpoint: Some("http://10.0.0.2:9222".to_string()),
        ..Default::default()
    };
    assert_eq!(config.endpoint(), "http://10.0.0.2:9222");
}

#[test]
fn test_profile_dir_default() {
    let config = BrowserConfig::default();
    assert!(config.profile_dir().ends_with(".storebridge/profile"));
}

#[test]
fn test_local_dir_expands_tilde() {
    let config = VersionCacheConfig {
        path: Some("~/snapshots".to_string()),
        ..Default::default()
    };
    let dir = config.local_dir();
    assert!(!dir.to_string_lossy().starts_with('~'));
    assert!(dir.ends_with("snapshots"));
}

#[test]
fn test_cache_kind_deserialize() {
    let config: VersionCacheConfig = toml::from_str("kind = \"remote\"").unwrap();
    assert_eq!(config.kind, CacheKind::Remote);
}

#[test]
fn test_generation_deserialize() {
    let config: SessionConfig = toml::from_str("generation = \"legacy\"").unwrap();
    assert_eq!(config.generation, GenerationSetting::Legacy);
    assert_eq!(config.poll_interval_ms, 100);
}

#[test]
fn test_config_serialize_roundtrip_keys() {
    let config = Config::default();
    let text = toml::to_string(&config).unwrap();
    assert!(text.contains("[browser]"));
    assert!(text.contains("[session]"));
}
