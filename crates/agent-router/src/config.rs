//! Service settings, read from the environment once at start-up.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use agent_router_core::tool::DEFAULT_TOOL_TIMEOUT;
use agent_router_core::{
    DEFAULT_MAX_ITERATIONS, OrchestratorConfig, OrchestratorConfigBuilder,
};
use agent_router_openai_model::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAIConfig, OpenAIConfigBuilder,
};
use thiserror::Error;

/// Address the HTTP server listens on unless configured otherwise.
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000);
/// Default location of the file store.
pub const DEFAULT_STORAGE_FILE: &str = "data/storage.json";
/// Default location of the SQLite database.
pub const DEFAULT_DATABASE_PATH: &str = "data/agent_router.db";
/// Default location of the knowledge base.
pub const DEFAULT_KB_PATH: &str = "data/kb.json";

const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;

/// A setting is missing or cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    /// A variable is set to something unusable.
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        /// The variable name.
        var: &'static str,
        /// The offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Where tickets and follow-ups are kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageConfig {
    /// In memory; lost on restart.
    Memory,
    /// In a JSON file at the given path.
    File(PathBuf),
    /// In a SQLite database at the given path.
    Sqlite(PathBuf),
}

/// Every setting of the service.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Provider settings.
    pub openai: OpenAIConfig,
    /// Loop settings.
    pub orchestrator: OrchestratorConfig,
    /// Deadline for each tool dispatch.
    pub tool_timeout: Duration,
    /// Address of the HTTP server.
    pub bind_addr: SocketAddr,
    /// Record store backend.
    pub storage: StorageConfig,
    /// Knowledge base file.
    pub kb_path: PathBuf,
}

impl AppConfig {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Reads the settings through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_key = var("OPENAI_API_KEY")
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let model_timeout = Duration::from_secs(parse_positive(
            "OPENAI_TIMEOUT_SECONDS",
            var("OPENAI_TIMEOUT_SECONDS"),
            DEFAULT_MODEL_TIMEOUT_SECS,
        )?);
        let openai = OpenAIConfigBuilder::with_api_key(api_key)
            .with_base_url(
                var("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            )
            .with_model(
                var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            )
            .with_request_timeout(model_timeout)
            .build();

        let max_iterations = parse_positive(
            "AGENT_MAX_ITERATIONS",
            var("AGENT_MAX_ITERATIONS"),
            DEFAULT_MAX_ITERATIONS.into(),
        )?;
        let max_iterations =
            u32::try_from(max_iterations).map_err(|err| ConfigError::Invalid {
                var: "AGENT_MAX_ITERATIONS",
                value: max_iterations.to_string(),
                reason: err.to_string(),
            })?;
        let orchestrator = OrchestratorConfigBuilder::default()
            .with_max_iterations(max_iterations)
            .with_model_timeout(model_timeout)
            .build();

        let tool_timeout = Duration::from_secs(parse_positive(
            "TOOL_TIMEOUT_SECONDS",
            var("TOOL_TIMEOUT_SECONDS"),
            DEFAULT_TOOL_TIMEOUT.as_secs(),
        )?);

        let bind_addr = parse_or(
            "AGENT_BIND_ADDR",
            var("AGENT_BIND_ADDR"),
            DEFAULT_BIND_ADDR,
        )?;

        let storage_type = var("STORAGE_TYPE")
            .unwrap_or_else(|| "memory".to_owned())
            .to_lowercase();
        let storage = match storage_type.as_str() {
            "memory" => StorageConfig::Memory,
            "file" => StorageConfig::File(
                var("STORAGE_FILE")
                    .unwrap_or_else(|| DEFAULT_STORAGE_FILE.to_owned())
                    .into(),
            ),
            "sqlite" => StorageConfig::Sqlite(
                var("DATABASE_PATH")
                    .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_owned())
                    .into(),
            ),
            _ => {
                return Err(ConfigError::Invalid {
                    var: "STORAGE_TYPE",
                    value: storage_type,
                    reason: "expected `memory`, `file` or `sqlite`".to_owned(),
                });
            }
        };

        let kb_path = var("KB_PATH")
            .unwrap_or_else(|| DEFAULT_KB_PATH.to_owned())
            .into();

        Ok(Self {
            openai,
            orchestrator,
            tool_timeout,
            bind_addr,
            storage,
            kb_path,
        })
    }
}

fn parse_or<T>(
    var: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => {
            value.parse().map_err(|err: T::Err| ConfigError::Invalid {
                var,
                reason: err.to_string(),
                value,
            })
        }
    }
}

/// Like [`parse_or`], for counts and durations where zero is unusable.
fn parse_positive(
    var: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<u64, ConfigError> {
    match parse_or(var, value, default)? {
        0 => Err(ConfigError::Invalid {
            var,
            value: "0".to_owned(),
            reason: "must be at least 1".to_owned(),
        }),
        n => Ok(n),
    }
}
