//! Run configuration: optional TOML file, then `INGEST__*` environment
//! variables (e.g. `INGEST__STORE__URL`, `INGEST__BATCH_SIZE`).

use crate::pipeline::PipelineOptions;
use crate::store::RestStore;
use crate::writer::DEFAULT_BATCH_SIZE;
use crate::{IngestError, IngestResult};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "config/ingest";
pub const BATCH_SIZE_RANGE: RangeInclusive<usize> = 50..=100;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: default_table(),
        }
    }
}

impl StoreSettings {
    /// Client for the hosted table; both url and key must be set.
    pub fn rest_store(&self) -> IngestResult<RestStore> {
        let url = self.url.as_deref().filter(|u| !u.trim().is_empty());
        let key = self.api_key.as_deref().filter(|k| !k.trim().is_empty());
        match (url, key) {
            (Some(url), Some(key)) => RestStore::new(url, key)
                .map_err(|e| IngestError::InvalidConfig(e.to_string())),
            _ => Err(IngestError::InvalidConfig(
                "store.url and store.api_key are required (INGEST__STORE__URL, INGEST__STORE__API_KEY)"
                    .into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IngestConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_table() -> String {
    "inventory".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            batch_size: default_batch_size(),
            delimiter: default_delimiter(),
        }
    }
}

impl IngestConfig {
    /// Load from `path` (required) or `config/ingest.{toml,…}` (optional),
    /// with environment variables taking precedence.
    pub fn load(path: Option<&Path>) -> IngestResult<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("INGEST").separator("__"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IngestResult<()> {
        if !BATCH_SIZE_RANGE.contains(&self.batch_size) {
            return Err(IngestError::InvalidConfig(format!(
                "batch_size must be between {} and {}, got {}",
                BATCH_SIZE_RANGE.start(),
                BATCH_SIZE_RANGE.end(),
                self.batch_size
            )));
        }
        self.delimiter_byte().map(|_| ())
    }

    pub fn delimiter_byte(&self) -> IngestResult<u8> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ => Err(IngestError::InvalidConfig(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            ))),
        }
    }

    /// Pipeline options from this config; confirmation and category filter
    /// come from the operator, not the file.
    pub fn pipeline_options(&self) -> IngestResult<PipelineOptions> {
        Ok(PipelineOptions {
            table: self.store.table.clone(),
            batch_size: self.batch_size,
            delimiter: self.delimiter_byte()?,
            ..Default::default()
        })
    }
}
