//! Server configuration.
//!
//! Read from the TOML file named by `FULCRUM_CONFIG` when it is set,
//! otherwise built from defaults. A few environment variables override
//! individual values afterwards.

use std::path::PathBuf;

use fulcrum_auth::AuthConfig;
use fulcrum_db::DbConfig;
use fulcrum_domain::DomainConfig;
use serde::Deserialize;

pub const CONFIG_PATH_VAR: &str = "FULCRUM_CONFIG";
pub const LISTEN_ADDR_VAR: &str = "FULCRUM_LISTEN_ADDR";
pub const DB_URL_VAR: &str = "FULCRUM_DB_URL";
pub const ADMIN_TOKEN_VAR: &str = "FULCRUM_ADMIN_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database: DbConfig,
    pub auth: AuthConfig,
    pub domain: DomainConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database: DbConfig::default(),
            auth: AuthConfig::default(),
            domain: DomainConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::load`] with an explicit variable lookup.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match env(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };
        config.apply_overrides(env);
        Ok(config)
    }

    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
    }

    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = env(LISTEN_ADDR_VAR) {
            self.listen_addr = addr;
        }
        if let Some(url) = env(DB_URL_VAR) {
            self.database.url = url;
        }
        if let Some(token) = env(ADMIN_TOKEN_VAR).filter(|t| !t.is_empty()) {
            self.auth.bootstrap_admin_token = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ServerConfig::load_with(lookup(&[])).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.database.url, "mem://");
        assert!(config.auth.bootstrap_admin_token.is_none());
        assert_eq!(config.domain.job_timeout_secs, 600);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            listen_addr = "127.0.0.1:9000"

            [database]
            url = "ws://db:8000"

            [domain]
            job_timeout_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.database.url, "ws://db:8000");
        assert_eq!(config.database.namespace, "fulcrum");
        assert_eq!(config.domain.job_timeout_secs, 60);
        assert_eq!(config.domain.sweep_interval_secs, 30);
    }

    #[test]
    fn environment_overrides_win() {
        let config = ServerConfig::load_with(lookup(&[
            (LISTEN_ADDR_VAR, "127.0.0.1:1234"),
            (DB_URL_VAR, "ws://other:8000"),
            (ADMIN_TOKEN_VAR, "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:1234");
        assert_eq!(config.database.url, "ws://other:8000");
        assert_eq!(config.auth.bootstrap_admin_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn empty_admin_token_is_ignored() {
        let config = ServerConfig::load_with(lookup(&[(ADMIN_TOKEN_VAR, "")])).unwrap();
        assert!(config.auth.bootstrap_admin_token.is_none());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ServerConfig::load_with(lookup(&[(CONFIG_PATH_VAR, "/nonexistent/fulcrum.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
