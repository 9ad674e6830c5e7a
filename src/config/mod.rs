// Configuration module
//
// The pipeline never reads process state: a `Config` is built once at startup
// (from YAML or from environment-style variables) and passed in explicitly.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CACHE_CONTROL, DEFAULT_FALLBACK_CACHE_CONTROL, DEFAULT_LOG_LEVEL,
    DEFAULT_SECRET_TIMEOUT_MS,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Buckets requests may read from; the first one is the default bucket
    #[serde(default)]
    pub source_buckets: Vec<String>,

    /// Require an HMAC signature on every request
    #[serde(default)]
    pub enable_signature: bool,

    /// Name of the secret holding the signing key
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub secrets_manager: Option<String>,

    /// Field of a JSON-object secret that holds the signing key
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub secret_key: Option<String>,

    /// Bound on the secret-store lookup (default: 3000 ms)
    #[serde(default = "default_secret_timeout_ms")]
    pub secret_timeout_ms: u64,

    /// Substitute image served when request processing fails
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Serve WebP when the Accept header allows it
    #[serde(default)]
    pub auto_webp: bool,

    /// Cache-Control for successfully resolved requests
    #[serde(default = "default_cache_control")]
    pub cache_control: String,

    /// Tracing filter level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bucket: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<String>,

    /// Status surfaced with the fallback image. When unset, the status of the
    /// absorbed error is used.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status_code: Option<u16>,

    #[serde(default = "default_fallback_cache_control")]
    pub cache_control: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket: None,
            key: None,
            status_code: None,
            cache_control: default_fallback_cache_control(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_buckets: Vec::new(),
            enable_signature: false,
            secrets_manager: None,
            secret_key: None,
            secret_timeout_ms: default_secret_timeout_ms(),
            fallback: FallbackConfig::default(),
            auto_webp: false,
            cache_control: default_cache_control(),
            log_level: default_log_level(),
        }
    }
}

fn default_secret_timeout_ms() -> u64 {
    DEFAULT_SECRET_TIMEOUT_MS
}

fn default_cache_control() -> String {
    DEFAULT_CACHE_CONTROL.to_string()
}

fn default_fallback_cache_control() -> String {
    DEFAULT_FALLBACK_CACHE_CONTROL.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        let mut missing = None;
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    missing.get_or_insert_with(|| var_name.to_string());
                    String::new()
                }
            }
        });

        if let Some(var_name) = missing {
            return Err(format!(
                "Environment variable '{}' is referenced but not set",
                var_name
            ));
        }

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Build from the process environment. Only meant for binaries; library
    /// code receives a `Config` value instead.
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(std::env::vars())
    }

    /// Build from environment-style variables (`SOURCE_BUCKETS`, `ENABLE_SIGNATURE`, ...)
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut config = Config::default();

        if let Some(buckets) = get("SOURCE_BUCKETS") {
            config.source_buckets = parse_bucket_list(&buckets);
        }
        if let Some(value) = get("ENABLE_SIGNATURE") {
            config.enable_signature = parse_flag("ENABLE_SIGNATURE", &value)?;
        }
        config.secrets_manager = get("SECRETS_MANAGER");
        config.secret_key = get("SECRET_KEY");
        if let Some(value) = get("SECRET_TIMEOUT_MS") {
            config.secret_timeout_ms = value
                .parse()
                .map_err(|_| format!("SECRET_TIMEOUT_MS must be an integer, got '{}'", value))?;
        }

        if let Some(value) = get("ENABLE_DEFAULT_FALLBACK_IMAGE") {
            config.fallback.enabled = parse_flag("ENABLE_DEFAULT_FALLBACK_IMAGE", &value)?;
        }
        config.fallback.bucket = get("FALLBACK_IMAGE_BUCKET");
        config.fallback.key = get("FALLBACK_IMAGE_KEY");
        if let Some(value) = get("FALLBACK_STATUS_CODE") {
            config.fallback.status_code = Some(value.parse().map_err(|_| {
                format!("FALLBACK_STATUS_CODE must be an integer, got '{}'", value)
            })?);
        }
        if let Some(value) = get("FALLBACK_CACHE_CONTROL") {
            config.fallback.cache_control = value;
        }

        if let Some(value) = get("AUTO_WEBP") {
            config.auto_webp = parse_flag("AUTO_WEBP", &value)?;
        }
        if let Some(value) = get("CACHE_CONTROL") {
            config.cache_control = value;
        }
        if let Some(value) = get("LOG_LEVEL") {
            config.log_level = value;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for bucket in &self.source_buckets {
            if bucket.is_empty() {
                return Err("Source bucket name cannot be empty".to_string());
            }
            if !seen.insert(bucket) {
                return Err(format!("Duplicate source bucket '{}'", bucket));
            }
        }

        if self.enable_signature && self.secrets_manager.is_none() {
            return Err(
                "Signature validation is enabled but no secret name (SECRETS_MANAGER) is configured"
                    .to_string(),
            );
        }

        if self.secret_timeout_ms == 0 {
            return Err("Secret timeout must be greater than 0".to_string());
        }

        if self.fallback.enabled {
            let bucket = self.fallback.bucket.as_deref().ok_or_else(|| {
                "Fallback image is enabled but FALLBACK_IMAGE_BUCKET is not set".to_string()
            })?;
            if self.fallback.key.is_none() {
                return Err(
                    "Fallback image is enabled but FALLBACK_IMAGE_KEY is not set".to_string(),
                );
            }
            if !self.is_bucket_allowed(bucket) {
                return Err(format!(
                    "Fallback bucket '{}' is not in the list of source buckets",
                    bucket
                ));
            }
        }

        if let Some(status) = self.fallback.status_code {
            if !(100..=599).contains(&status) {
                return Err(format!(
                    "Fallback status code {} is not a valid HTTP status",
                    status
                ));
            }
            if (200..=299).contains(&status) {
                return Err(format!(
                    "Fallback status code {} would report the fallback as a success",
                    status
                ));
            }
        }

        Ok(())
    }

    pub fn is_bucket_allowed(&self, bucket: &str) -> bool {
        self.source_buckets.iter().any(|b| b == bucket)
    }

    /// Bucket used when a request does not name one
    pub fn default_bucket(&self) -> Option<&str> {
        self.source_buckets.first().map(String::as_str)
    }

    pub fn secret_timeout(&self) -> Duration {
        Duration::from_millis(self.secret_timeout_ms)
    }
}

fn parse_bucket_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a `Yes`/`No` flag
fn parse_flag(name: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(format!("{} must be 'Yes' or 'No', got '{}'", name, value)),
    }
}
