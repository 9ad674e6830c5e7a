// Configuration loading tests

use std::io::Write;
use tempfile::NamedTempFile;

use image_handler::config::Config;

#[test]
fn test_config_can_be_loaded_from_file_path() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let config_yaml = r#"
source_buckets:
  - "images"
  - "assets"
enable_signature: true
secrets_manager: "image-handler/signing"
secret_key: "key"
auto_webp: true
fallback:
  enabled: true
  bucket: "assets"
  key: "fallback.png"
  status_code: 404
"#;
    temp_file.write_all(config_yaml.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).expect("config should load");
    assert_eq!(config.source_buckets, vec!["images", "assets"]);
    assert!(config.enable_signature);
    assert_eq!(config.secret_key.as_deref(), Some("key"));
    assert!(config.auto_webp);
    assert_eq!(config.fallback.status_code, Some(404));
    assert_eq!(config.fallback.cache_control, "no-store");
    assert_eq!(config.cache_control, "max-age=31536000,public");
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_config_file_fails_validation() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let invalid_config = r#"
source_buckets: ["images"]
fallback:
  enabled: true
  bucket: "elsewhere"
  key: "fallback.png"
"#;
    temp_file.write_all(invalid_config.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.contains("elsewhere"), "unexpected error: {}", err);
}

#[test]
fn test_missing_config_file() {
    let err = Config::from_file("/nonexistent/image-handler.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"));
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"source_buckets: {not: [a list").unwrap();
    temp_file.flush().unwrap();
    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_vars_and_yaml_agree() {
    let from_vars = Config::from_vars([
        ("SOURCE_BUCKETS", "images"),
        ("AUTO_WEBP", "Yes"),
        ("CACHE_CONTROL", "max-age=60"),
    ])
    .unwrap();
    let from_yaml = Config::from_yaml_with_env(
        "source_buckets: [images]\nauto_webp: true\ncache_control: max-age=60\n",
    )
    .unwrap();
    assert_eq!(from_vars.source_buckets, from_yaml.source_buckets);
    assert_eq!(from_vars.auto_webp, from_yaml.auto_webp);
    assert_eq!(from_vars.cache_control, from_yaml.cache_control);
}

#[test]
fn test_zero_secret_timeout_is_rejected() {
    let config = Config::from_vars([("SECRET_TIMEOUT_MS", "0")]).unwrap();
    assert!(config.validate().is_err());
}
