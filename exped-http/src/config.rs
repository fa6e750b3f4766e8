use std::{env, fs, net::SocketAddr, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use exped_store::postgrest::{default_cases_table, default_id_column, default_tokens_table};
use exped_store::PostgrestConfig;

pub const CONFIG_PATH_VAR: &str = "EXPED_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {message}")]
    Read { path: String, message: String },
    #[error("invalid config file: {0}")]
    Parse(String),
    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("{0} must be set for the postgrest store")]
    Missing(&'static str),
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process tables, optionally seeded from a fixture file.
    Memory {
        #[serde(default)]
        fixture: Option<PathBuf>,
    },
    Postgrest(PostgrestConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { fixture: None }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7000))
}

impl Config {
    /// YAML file named by `EXPED_CONFIG` if set, environment variables otherwise.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.is_empty() => {
                info!("Loading config from {path}");
                Self::from_path(&path)
            }
            _ => Self::from_env(|key| env::var(key).ok()),
        }
    }

    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_env(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = match var("EXPED_BIND") {
            Some(v) => v.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "EXPED_BIND",
                message: e.to_string(),
            })?,
            None => {
                let bind = default_bind();
                info!("EXPED_BIND not set, using default: {bind}");
                bind
            }
        };

        let kind = var("EXPED_STORE").unwrap_or_else(|| "memory".into());
        let store = match kind.as_str() {
            "memory" => StoreConfig::Memory {
                fixture: var("EXPED_FIXTURE").map(PathBuf::from),
            },
            "postgrest" => StoreConfig::Postgrest(PostgrestConfig {
                url: var("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                service_key: var("SUPABASE_SERVICE_ROLE_KEY")
                    .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
                tokens_table: var("EXPED_TOKENS_TABLE").unwrap_or_else(default_tokens_table),
                cases_table: var("EXPED_CASES_TABLE").unwrap_or_else(default_cases_table),
                case_id_column: var("EXPED_CASE_ID_COLUMN").unwrap_or_else(default_id_column),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "EXPED_STORE",
                    message: format!("unknown store kind {other:?}"),
                })
            }
        };

        Ok(Self { bind, store })
    }
}
