//! `sustain.toml` configuration.
//!
//! Precedence, lowest to highest: built-in defaults, the config file,
//! `SUSTAIN_*` environment variables, command-line flags (applied by the
//! caller after `Config::load`).
//!
//! ```toml
//! state = "registry.json"
//! clock = "block"          # or "epoch"
//! caller = "ST1PQ..."      # default --caller
//!
//! [policy]
//! min_certification_level = 1
//! max_certification_level = 5
//!
//! [server]
//! port = 8080
//! rate_limit = 60
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sustain_registry::{ClockKind, RegistryPolicy};

/// Config file looked up in the working directory when `--config` is absent.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "sustain.toml";

/// Default registry state file.
pub(crate) const DEFAULT_STATE_FILE: &str = "registry.json";

/// Default rate limit: 60 requests per minute per IP.
pub(crate) const DEFAULT_RATE_LIMIT: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("error reading config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error parsing config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {name}: '{value}'")]
    Env { name: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) bind: String,
    pub(crate) port: u16,
    /// Requests per minute per client IP.
    pub(crate) rate_limit: u64,
    /// When set, every endpoint except /health requires this key.
    pub(crate) api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) state: PathBuf,
    pub(crate) clock: ClockKind,
    /// Identity used when a mutating command has no `--caller`.
    pub(crate) caller: Option<String>,
    pub(crate) policy: RegistryPolicy,
    pub(crate) server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state: PathBuf::from(DEFAULT_STATE_FILE),
            clock: ClockKind::default(),
            caller: None,
            policy: RegistryPolicy::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `sustain.toml` in the
    /// working directory is used if present, otherwise defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `SUSTAIN_*` overrides. Empty values are ignored.
    pub(crate) fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(state) = get("SUSTAIN_STATE") {
            self.state = PathBuf::from(state);
        }
        if let Some(clock) = get("SUSTAIN_CLOCK") {
            self.clock = clock.parse().map_err(|_| ConfigError::Env {
                name: "SUSTAIN_CLOCK",
                value: clock.clone(),
            })?;
        }
        if let Some(caller) = get("SUSTAIN_CALLER") {
            self.caller = Some(caller);
        }
        if let Some(port) = get("SUSTAIN_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Env {
                name: "SUSTAIN_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(limit) = get("SUSTAIN_RATE_LIMIT") {
            self.server.rate_limit = limit.parse().map_err(|_| ConfigError::Env {
                name: "SUSTAIN_RATE_LIMIT",
                value: limit.clone(),
            })?;
        }
        if let Some(key) = get("SUSTAIN_API_KEY") {
            self.server.api_key = Some(key);
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate().map_err(ConfigError::Invalid)?;
        if self.server.rate_limit == 0 {
            return Err(ConfigError::Invalid(
                "server.rate_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.state, PathBuf::from("registry.json"));
        assert_eq!(config.clock, ClockKind::Block);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.rate_limit, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_full_file() {
        let config: Config = toml::from_str(
            r#"
            state = "/var/lib/sustain/registry.json"
            clock = "epoch"
            caller = "ST1OWNER"

            [policy]
            max_certification_level = 3

            [server]
            port = 9090
            rate_limit = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.clock, ClockKind::Epoch);
        assert_eq!(config.caller.as_deref(), Some("ST1OWNER"));
        assert_eq!(config.policy.max_certification_level, 3);
        assert_eq!(config.policy.min_certification_level, 1);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind, "0.0.0.0");
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<Config>("stat = \"typo.json\"").is_err());
    }

    #[test]
    fn rejects_unknown_policy_keys() {
        let err = toml::from_str::<Config>("[policy]\nmax_level = 3\n").unwrap_err();
        assert!(err.to_string().contains("max_level"), "{}", err);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("SUSTAIN_STATE", "/tmp/other.json"),
                ("SUSTAIN_CLOCK", "epoch"),
                ("SUSTAIN_PORT", "7000"),
                ("SUSTAIN_API_KEY", "secret"),
                ("SUSTAIN_RATE_LIMIT", ""),
            ]))
            .unwrap();
        assert_eq!(config.state, PathBuf::from("/tmp/other.json"));
        assert_eq!(config.clock, ClockKind::Epoch);
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.api_key.as_deref(), Some("secret"));
        // Empty values are ignored.
        assert_eq!(config.server.rate_limit, DEFAULT_RATE_LIMIT);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("SUSTAIN_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("SUSTAIN_PORT"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/sustain.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn zero_rate_limit_is_invalid() {
        let mut config = Config::default();
        config.server.rate_limit = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
