//! Environment- and file-driven configuration (spec §4.9/§6 CLI surface).
//! Grounded on the Go original's `internal/config.Config` for field names
//! and defaults, and on the teacher's `services/forwarder/src/config.rs`
//! for the TOML-via-`toml`-crate loading/rendering shape.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub write_timeout: Duration,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MosConfig {
    pub id: String,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub mos: MosConfig,
    pub log_level: String,
    /// Accepted and stored but unused by the in-memory repository; an
    /// out-of-scope document store would consume it (spec §1/§9).
    pub mongodb_uri: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 10540,
                write_timeout: Duration::from_secs(5),
                shutdown_timeout: Duration::from_secs(30),
            },
            mos: MosConfig {
                id: "OpenMOS_Server".into(),
                heartbeat_interval: Duration::from_secs(30),
                client_timeout: Duration::from_secs(120),
            },
            log_level: "info".into(),
            mongodb_uri: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// TOML wire shape (all fields optional so a partial file only overrides
/// what it names), mirroring the teacher's `RawConfig`/`Raw*Config` split
/// between the on-disk representation and the domain `Config`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    mos: Option<TomlMosConfig>,
    logging: Option<TomlLoggingConfig>,
    mongodb_uri: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
    write_timeout_secs: Option<u64>,
    shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TomlMosConfig {
    id: Option<String>,
    heartbeat_interval_secs: Option<u64>,
    client_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TomlLoggingConfig {
    level: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults (spec §6's env var table).
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// Applies the spec §6 environment overrides on top of whatever is
    /// already set — used to let `SERVER_HOST`/etc. win over a `--config`
    /// file without re-deriving the rest of the file's values.
    pub fn apply_env_overrides(&mut self) {
        let cfg = self;
        if let Ok(v) = std::env::var("SERVER_HOST") {
            cfg.server.host = v;
        }
        if let Some(v) = env_parsed::<u16>("SERVER_PORT") {
            cfg.server.port = v;
        }
        if let Ok(v) = std::env::var("MONGODB_URI") {
            cfg.mongodb_uri = Some(v);
        }
        if let Ok(v) = std::env::var("MOS_ID") {
            cfg.mos.id = v;
        }
        if let Some(secs) = env_parsed::<u64>("MOS_HEARTBEAT_INTERVAL") {
            cfg.mos.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parsed::<u64>("MOS_CLIENT_TIMEOUT") {
            cfg.mos.client_timeout = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            cfg.log_level = v;
        }
    }

    /// Loads configuration from a TOML file (the `--config <path>` flag),
    /// layered on top of the defaults — a field absent from the file keeps
    /// its default. Environment overrides are applied separately, after
    /// this, by the caller.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: TomlConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        let mut cfg = Config::default();
        if let Some(server) = raw.server {
            if let Some(host) = server.host {
                cfg.server.host = host;
            }
            if let Some(port) = server.port {
                cfg.server.port = port;
            }
            if let Some(secs) = server.write_timeout_secs {
                cfg.server.write_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = server.shutdown_timeout_secs {
                cfg.server.shutdown_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(mos) = raw.mos {
            if let Some(id) = mos.id {
                cfg.mos.id = id;
            }
            if let Some(secs) = mos.heartbeat_interval_secs {
                cfg.mos.heartbeat_interval = Duration::from_secs(secs);
            }
            if let Some(secs) = mos.client_timeout_secs {
                cfg.mos.client_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(logging) = raw.logging
            && let Some(level) = logging.level
        {
            cfg.log_level = level;
        }
        if let Some(uri) = raw.mongodb_uri {
            cfg.mongodb_uri = Some(uri);
        }

        Ok(cfg)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Renders this configuration as TOML for the `generate-config` CLI
    /// subcommand, via the `toml` crate rather than hand-built strings.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let raw = TomlConfig {
            server: Some(TomlServerConfig {
                host: Some(self.server.host.clone()),
                port: Some(self.server.port),
                write_timeout_secs: Some(self.server.write_timeout.as_secs()),
                shutdown_timeout_secs: Some(self.server.shutdown_timeout.as_secs()),
            }),
            mos: Some(TomlMosConfig {
                id: Some(self.mos.id.clone()),
                heartbeat_interval_secs: Some(self.mos.heartbeat_interval.as_secs()),
                client_timeout_secs: Some(self.mos.client_timeout.as_secs()),
            }),
            logging: Some(TomlLoggingConfig {
                level: Some(self.log_level.clone()),
            }),
            mongodb_uri: self.mongodb_uri.clone(),
        };
        toml::to_string_pretty(&raw)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_mos_v4_port() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 10540);
        assert_eq!(cfg.mos.client_timeout, Duration::from_secs(120));
        assert_eq!(cfg.mongodb_uri, None);
    }

    #[test]
    fn to_toml_round_trips_through_from_file() {
        let cfg = Config {
            mongodb_uri: Some("mongodb://localhost:27017".into()),
            ..Config::default()
        };
        let rendered = cfg.to_toml().unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join(format!("mos-server-test-config-{}.toml", std::process::id()));
        std::fs::write(&path, &rendered).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.server.port, cfg.server.port);
        assert_eq!(loaded.mos.id, cfg.mos.id);
        assert_eq!(loaded.mongodb_uri, cfg.mongodb_uri);
    }

    #[test]
    fn partial_file_only_overrides_named_fields() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "mos-server-test-partial-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[mos]\nid = \"Custom_MOS\"\n").unwrap();
        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.mos.id, "Custom_MOS");
        assert_eq!(loaded.server.port, Config::default().server.port);
    }
}
