// src/config.rs
use crate::error::{AppError, Result};
use crate::lookup::RetryPolicy;
use secrecy::SecretString;
use serde::Deserialize;
use std::{env, fs, io, path::Path, time::Duration};
use tracing::{error, info, warn};
use url::Url;

/// Environment variable holding the credential for key slot N (1-based), e.g.
/// `GSTIN_LOOKUP_KEY_1`. Unset slots still occupy their position in the trial
/// order and are attempted with an empty credential.
const KEY_ENV_PREFIX: &str = "GSTIN_LOOKUP_KEY_";

/// Root of the application configuration. Server and lookup settings come
/// from the optional YAML file; credentials come only from the environment.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    /// Ordered credential slots, loaded from `GSTIN_LOOKUP_KEY_1..N`.
    #[serde(skip)]
    pub api_keys: Vec<SecretString>,
}

/// Network address the service listens on.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

/// Registry endpoint and retry policy for the lookup client.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LookupConfig {
    /// Registry URL the GSTIN query is sent to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Number of credential slots read from the environment.
    #[serde(default = "default_key_slots")]
    pub key_slots: usize,
    /// Attempts per key before advancing to the next one.
    #[serde(default = "default_max_retries_per_key")]
    pub max_retries_per_key: u32,
    /// First backoff sleep in milliseconds; doubled after each retryable failure.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Per-attempt network timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            lookup: LookupConfig::default(),
            api_keys: Vec::new(),
        }
    }
}
impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}
impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            endpoint: default_endpoint(),
            key_slots: default_key_slots(),
            max_retries_per_key: default_max_retries_per_key(),
            initial_backoff_ms: default_initial_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    8080
}
fn default_endpoint() -> String {
    "https://www.knowyourgst.com/developers/gstincall/".to_string()
}
fn default_key_slots() -> usize {
    6
}
fn default_max_retries_per_key() -> u32 {
    2
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_timeout_secs() -> u64 {
    10
}

impl LookupConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries_per_key: self.max_retries_per_key,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Reads the ordered credential slots from the environment. A missing or
/// empty variable yields an empty credential that keeps its position.
fn load_keys_from_env(key_slots: usize) -> Vec<SecretString> {
    (1..=key_slots)
        .map(|slot| {
            let value = env::var(format!("{KEY_ENV_PREFIX}{slot}")).unwrap_or_default();
            SecretString::new(value.trim().to_string())
        })
        .collect()
}

/// Loads configuration from an optional YAML file plus environment variables
/// for credentials. A missing or unparseable file falls back to defaults.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let path_str = path.display().to_string();
    let mut config = AppConfig::default();

    match fs::read_to_string(path) {
        Ok(contents) => {
            if contents.trim().is_empty() {
                warn!("Config file '{}' is empty. Using defaults.", path_str);
            } else {
                match serde_yaml::from_str::<AppConfig>(&contents) {
                    Ok(file_config) => {
                        info!("Loaded configuration from '{}'.", path_str);
                        config = file_config;
                    }
                    Err(e) => warn!(
                        "Failed to parse YAML config file '{}': {}. Using defaults.",
                        path_str, e
                    ),
                }
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("Config file '{}' not found. Using defaults.", path_str);
        }
        Err(e) => {
            return Err(AppError::Io(io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path_str, e),
            )))
        }
    }

    config.api_keys = load_keys_from_env(config.lookup.key_slots);

    let populated = config
        .api_keys
        .iter()
        .filter(|k| !secrecy::ExposeSecret::expose_secret(*k).is_empty())
        .count();
    if populated == 0 {
        warn!(
            "No credentials set via {}1..{}. Lookups will be attempted with empty keys.",
            KEY_ENV_PREFIX, config.lookup.key_slots
        );
    } else {
        info!(
            slots = config.lookup.key_slots,
            populated, "Credential slots loaded from environment."
        );
    }

    if !validate_config(&config, &path_str) {
        return Err(AppError::Config("Validation failed".to_string()));
    }

    info!("Configuration loaded and validated successfully.");
    Ok(config)
}

/// Validation checks on the loaded configuration.
pub fn validate_config(cfg: &AppConfig, config_source: &str) -> bool {
    let mut has_errors = false;

    if cfg.server.host.trim().is_empty() || cfg.server.port == 0 {
        error!(
            "Invalid server configuration: host={}, port={} (source: {})",
            cfg.server.host, cfg.server.port, config_source
        );
        has_errors = true;
    }

    match Url::parse(&cfg.lookup.endpoint) {
        Ok(parsed) => {
            let scheme = parsed.scheme().to_lowercase();
            if !["http", "https"].contains(&scheme.as_str()) {
                error!(
                    "Lookup endpoint '{}' has unsupported scheme '{}'.",
                    cfg.lookup.endpoint, scheme
                );
                has_errors = true;
            }
            // The GSTIN is appended as a query parameter, so the configured
            // endpoint must not carry one already.
            if parsed.query().is_some() {
                error!(
                    "Lookup endpoint '{}' must not contain a query string.",
                    cfg.lookup.endpoint
                );
                has_errors = true;
            }
        }
        Err(e) => {
            error!(
                "Lookup endpoint '{}' is not a valid URL: {}",
                cfg.lookup.endpoint, e
            );
            has_errors = true;
        }
    }

    if cfg.lookup.max_retries_per_key == 0 {
        error!("lookup.max_retries_per_key must be at least 1.");
        has_errors = true;
    }
    if cfg.lookup.timeout_secs == 0 {
        error!("lookup.timeout_secs must be at least 1.");
        has_errors = true;
    }
    if cfg.lookup.key_slots == 0 {
        warn!("lookup.key_slots is 0; every lookup will fail immediately.");
    }

    !has_errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use secrecy::ExposeSecret;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn create_temp_config_file(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let file_path = dir.path().join("test_config.yaml");
        let mut file = File::create(&file_path).expect("Failed to create temp config file");
        writeln!(file, "{}", content).expect("Failed to write to temp config file");
        file_path
    }

    fn cleanup_test_env_vars() {
        for slot in 1..=8 {
            std::env::remove_var(format!("{KEY_ENV_PREFIX}{slot}"));
        }
    }

    #[test]
    fn defaults_apply_without_config_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        cleanup_test_env_vars();
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no_such_config.yaml");

        let config = load_config(&missing).expect("Load with defaults failed");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.lookup.endpoint,
            "https://www.knowyourgst.com/developers/gstincall/"
        );
        assert_eq!(config.lookup.key_slots, 6);
        assert_eq!(config.api_keys.len(), 6);
        assert!(config
            .api_keys
            .iter()
            .all(|k| k.expose_secret().is_empty()));
        cleanup_test_env_vars();
    }

    #[test]
    fn env_keys_fill_slots_in_order() {
        let _lock = ENV_MUTEX.lock().unwrap();
        cleanup_test_env_vars();
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no_such_config.yaml");

        std::env::set_var("GSTIN_LOOKUP_KEY_1", "alpha");
        std::env::set_var("GSTIN_LOOKUP_KEY_3", " charlie ");

        let config = load_config(&missing).expect("Load from env failed");

        assert_eq!(config.api_keys.len(), 6);
        assert_eq!(config.api_keys[0].expose_secret(), "alpha");
        assert_eq!(config.api_keys[1].expose_secret(), "");
        assert_eq!(config.api_keys[2].expose_secret(), "charlie");
        cleanup_test_env_vars();
    }

    #[test]
    fn yaml_overrides_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        cleanup_test_env_vars();
        let dir = tempdir().unwrap();
        let yaml_content = r#"
server: { host: "127.0.0.1", port: 9999 }
lookup:
  endpoint: "https://registry.example.com/gstincall/"
  key_slots: 2
  max_retries_per_key: 3
  initial_backoff_ms: 100
  timeout_secs: 5
"#;
        let config_path = create_temp_config_file(&dir, yaml_content);

        let config = load_config(&config_path).expect("Load from yaml failed");

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.lookup.key_slots, 2);
        assert_eq!(config.api_keys.len(), 2);
        let policy = config.lookup.retry_policy();
        assert_eq!(policy.max_retries_per_key, 3);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
        assert_eq!(policy.timeout, Duration::from_secs(5));
        cleanup_test_env_vars();
    }

    #[test]
    fn unparseable_yaml_falls_back_to_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        cleanup_test_env_vars();
        let dir = tempdir().unwrap();
        let config_path = create_temp_config_file(&dir, "lookup: [not, a, mapping");

        let config = load_config(&config_path).expect("Fallback load failed");
        assert_eq!(config.lookup.key_slots, 6);
        cleanup_test_env_vars();
    }

    #[test]
    fn validation_fails_on_invalid_endpoint() {
        let cfg = AppConfig {
            lookup: LookupConfig {
                endpoint: "::not a url::".to_string(),
                ..LookupConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(!validate_config(&cfg, "test"));
    }

    #[test]
    fn validation_fails_on_endpoint_with_query() {
        let cfg = AppConfig {
            lookup: LookupConfig {
                endpoint: "https://registry.example.com/call?gstin=x".to_string(),
                ..LookupConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(!validate_config(&cfg, "test"));
    }

    #[test]
    fn validation_fails_on_zero_retries() {
        let cfg = AppConfig {
            lookup: LookupConfig {
                max_retries_per_key: 0,
                ..LookupConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(!validate_config(&cfg, "test"));
    }

    #[test]
    fn validation_accepts_defaults() {
        assert!(validate_config(&AppConfig::default(), "test"));
    }
}
