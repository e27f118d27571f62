//! Inventory CSV ingestion: parse, validate, normalise and load stock lists.
//!
//! - Input path: local files, optionally gzip/zstd compressed, any charset
//!   `encoding_rs` knows about (transcoded to UTF-8 on the fly).
//! - Destination: any [`TableStore`]; [`RestStore`] talks to the hosted
//!   backend, [`MemoryStore`] keeps rows in process.
//!
//! One run walks `Parsing → Validating → Transforming → Clearing → Writing →
//! Reporting`. Fatal problems surface as [`IngestError`]; bad rows and failed
//! batches are collected into the [`IngestReport`].
//!
//! Data shape:
//! - Parsed rows: [`RawRow`] (`get(column) -> Option<&str>`, blank = absent)
//! - Cleaned rows: [`InventoryRecord`]
#![cfg_attr(docsrs, feature(doc_cfg))]
//
mod codec;
mod io;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod schema;
pub mod settings;
pub mod store;
pub mod transform;
pub mod writer;

pub use crate::io::{build_input_reader, charset_for_label, reader_from_path, InputMeta};
pub use crate::parser::{parse_all, ParsedInput, RawRow, RowReader};
pub use crate::pipeline::{Phase, Pipeline, PipelineOptions, RunOutput};
pub use crate::record::{InventoryRecord, RowIssue, RowProblem};
pub use crate::report::{export_csv, export_json, IngestReport, Spread};
pub use crate::schema::{
    validate_field, CategoryCorrection, FieldError, FieldKind, FieldRule, SchemaDefinition,
    StockSource,
};
pub use crate::settings::{IngestConfig, StoreSettings};
pub use crate::store::{
    Filter, FilterOp, MemoryStore, RestStore, Row, StoreError, StoreResult, TableStore,
};
pub use crate::transform::{title_case, Transformer};
pub use crate::writer::{clear_table, write_batches, BatchFailure, WriteOutcome};

use thiserror::Error;

/// Fatal errors: any of these stops the run before a report is produced.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingRequiredColumns(Vec<String>),
    #[error("Unknown charset label: {0}")]
    UnknownCharset(String),
    #[error("Invalid schema: {0}")]
    Schema(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Refusing to clear table `{0}` without operator confirmation")]
    ClearNotConfirmed(String),
    #[error("Failed to clear table `{table}`: {source}")]
    Clear {
        table: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Config(#[from] ::config::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv_async::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
