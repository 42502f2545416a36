//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Vote ledger configuration.
    #[serde(default)]
    pub voting: VotingConfig,
    /// Site configuration.
    #[serde(default)]
    pub site: SiteConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Vote ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    /// How many times a cast that lost a uniqueness race is re-run
    /// before the conflict is reported to the caller.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
        }
    }
}

/// Site configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SiteConfig {
    /// Prefix prepended to generated post URLs.
    #[serde(default)]
    pub base_path: String,
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_conflict_retries() -> u32 {
    1
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `READIT_ENV`)
    /// 4. Environment variables with `READIT__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("READIT_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("READIT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("READIT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
