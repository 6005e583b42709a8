// Configuration - reporting currency, cost basis method, forex precision

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cost_basis::CostBasisMethod;
use crate::error::Result;
use crate::journal::builder::{JournalBuilder, DEFAULT_FOREX_PRECISION};
use crate::models::Currency;

const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub reporting_currency: Currency,
    pub cost_basis: CostBasisMethod,
    /// Decimal places kept when inverting currency-pair prices
    pub forex_precision: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reporting_currency: Currency::EUR,
            cost_basis: CostBasisMethod::default(),
            forex_precision: DEFAULT_FOREX_PRECISION,
        }
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::config_home)
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(config_dir.join("folio"))
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing default file yields the defaults; a missing explicit path
    /// is an error.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(&path),
            None => {
                let path = get_config_dir()?.join(CONFIG_FILENAME);
                if !path.exists() {
                    debug!("No config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                Self::from_file(&path)
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn journal_builder(&self) -> JournalBuilder {
        JournalBuilder::new(self.reporting_currency).forex_precision(self.forex_precision)
    }
}
