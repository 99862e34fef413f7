//! Configuration for faktur-service.

use config::Config as Cfg;
use faktur_core::config::Config as CommonConfig;
use faktur_core::error::AppError;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct FakturConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// When set, spans are exported over OTLP; unset means local logs only.
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
}

fn default_service_name() -> String {
    "faktur-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FakturConfig {
    /// Load configuration from `FAKTUR__`-prefixed environment variables
    /// (e.g. `FAKTUR__DATABASE__URL`), with `.env` support for local runs.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(config::Environment::with_prefix("FAKTUR").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
