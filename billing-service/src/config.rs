use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;
use tariff_client::engine::{RateTableEngine, TariffCatalog};
use time::{macros::format_description, UtcOffset};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BILLING_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "billing-config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    /// Browser origins allowed to call the API. Empty disables CORS headers.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            cors_allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TariffConfig {
    /// Plan catalog to load instead of the built-in one.
    pub catalog_path: Option<PathBuf>,
    /// UTC offset of the tariff's wall clock, e.g. `+08:00`.
    pub local_offset: String,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            local_offset: "+08:00".to_string(),
        }
    }
}

impl TariffConfig {
    pub fn offset(&self) -> anyhow::Result<UtcOffset> {
        UtcOffset::parse(
            self.local_offset.trim(),
            format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
        )
        .with_context(|| format!("invalid tariff.local_offset '{}'", self.local_offset))
    }

    pub fn engine(&self) -> anyhow::Result<RateTableEngine> {
        let catalog = match &self.catalog_path {
            Some(path) => TariffCatalog::load(path)?,
            None => TariffCatalog::builtin()?,
        };
        tracing::info!(
            plans = catalog.plans.len(),
            source = %self.catalog_path.as_deref().map_or("built-in".into(), |p| p.display().to_string()),
            "plan catalog loaded"
        );
        Ok(RateTableEngine::new(catalog))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tariff: TariffConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Reads the file named by `BILLING_CONFIG`, else `billing-config.toml`.
    /// Only the default file may be absent, in which case defaults apply.
    pub fn load() -> anyhow::Result<Self> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
