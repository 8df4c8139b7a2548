//! Serializable merge and conversion configuration.
//!
//! Both configs load from TOML (`from_file`, `from_toml`) and fill every
//! missing field with the archive tool's defaults, so a file only needs to
//! name what differs. The CLI assembles the same structs from flags.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use bdms_core::data::ArchiveLayout;
use bdms_core::domain::{
    expand_keys, ConfigurationError, Interval, LogicalKey, MarketDataType, OutputFormat, Registry, StorageFormat,
    TradingType,
};
use bdms_core::merge::{BuildOptions, ContinuityPolicy, DateBounds};

use crate::executor::ExecutorOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

/// Earliest start date used when none is configured.
pub fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// One merge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Archive root holding `data/`.
    pub root: PathBuf,
    /// Where merged files go; `{root}/merged` when unset.
    pub merged_root: Option<PathBuf>,

    pub symbols: Vec<String>,
    pub trading_types: Vec<TradingType>,
    pub data_types: Vec<MarketDataType>,
    pub intervals: Vec<Interval>,

    /// First date to include.
    pub start: Option<NaiveDate>,
    /// First date to exclude; defaults to tomorrow so today is included.
    pub end: Option<NaiveDate>,

    pub source_format: StorageFormat,
    pub output_format: OutputFormat,
    pub continuity: ContinuityPolicy,
    /// Enforce gap-free identifiers across segment boundaries.
    pub strict_identifiers: bool,

    pub executor: ExecutorOptions,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            merged_root: None,
            symbols: Vec::new(),
            trading_types: vec![TradingType::Spot],
            data_types: Vec::new(),
            intervals: Vec::new(),
            start: None,
            end: None,
            source_format: StorageFormat::Zip,
            output_format: OutputFormat::Parquet,
            continuity: ContinuityPolicy::default(),
            strict_identifiers: false,
            executor: ExecutorOptions::default(),
        }
    }
}

impl MergeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Every valid key the request names.
    pub fn keys(&self, registry: &Registry) -> Result<Vec<LogicalKey>, ConfigurationError> {
        expand_keys(
            &self.symbols,
            &self.trading_types,
            &self.data_types,
            &self.intervals,
            registry,
        )
    }

    /// The `[start, end)` window, resolving defaults against `today`.
    pub fn bounds(&self, today: NaiveDate) -> Result<DateBounds, ConfigurationError> {
        let start = self.start.unwrap_or_else(default_start);
        let end = self.end.unwrap_or(today + Duration::days(1));
        DateBounds::new(start, end)
    }

    pub fn layout(&self) -> ArchiveLayout {
        let layout = ArchiveLayout::new(&self.root);
        match &self.merged_root {
            Some(merged) => layout.with_merged_root(merged),
            None => layout,
        }
    }

    pub fn build_options(&self, today: NaiveDate) -> Result<BuildOptions, ConfigurationError> {
        Ok(BuildOptions {
            source_format: self.source_format,
            output_format: self.output_format,
            bounds: self.bounds(today)?,
            continuity: self.continuity,
            strict_identifiers: self.strict_identifiers,
        })
    }
}

/// One bulk conversion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub input_dir: PathBuf,
    pub input_format: StorageFormat,
    pub output_format: OutputFormat,
    /// Descend into subdirectories.
    pub recursive: bool,
    pub delete_original: bool,
    /// Names headerless columns when both are set.
    pub trading_type: Option<TradingType>,
    pub data_type: Option<MarketDataType>,
    /// Fixes the processing order; random when unset.
    pub seed: Option<u64>,
    pub executor: ExecutorOptions,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_dir: default_root(),
            input_format: StorageFormat::Zip,
            output_format: OutputFormat::Parquet,
            recursive: true,
            delete_original: false,
            trading_type: None,
            data_type: None,
            seed: None,
            executor: ExecutorOptions::default(),
        }
    }
}

impl ConvertConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Registry column names for headerless inputs, when the data type is known.
    pub fn columns(&self, registry: &Registry) -> Result<Option<&'static [&'static str]>, ConfigurationError> {
        match (self.trading_type, self.data_type) {
            (Some(trading_type), Some(data_type)) => {
                if !registry.supports(trading_type, data_type) {
                    return Err(ConfigurationError::UnsupportedDataType {
                        trading_type,
                        data_type,
                    });
                }
                Ok(Some(registry.columns(trading_type, data_type)))
            }
            _ => Ok(None),
        }
    }
}
