use crate::parser::parse_all;
use crate::record::{InventoryRecord, RowIssue, RowProblem};
use crate::report::IngestReport;
use crate::schema::SchemaDefinition;
use crate::store::TableStore;
use crate::transform::Transformer;
use crate::writer::{clear_table, write_batches, DEFAULT_BATCH_SIZE};
use crate::IngestResult;
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;
use tokio::io::AsyncRead;
use tracing::{info, info_span, warn, Instrument};

/// Stages of one run, in order. There is no way back to an earlier stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Parsing,
    Validating,
    Transforming,
    Clearing,
    Writing,
    Reporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parsing => "parsing",
            Self::Validating => "validating",
            Self::Transforming => "transforming",
            Self::Clearing => "clearing",
            Self::Writing => "writing",
            Self::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub table: String,
    pub batch_size: usize,
    pub delimiter: u8,
    /// Operator approved the destructive clear.
    pub confirmed: bool,
    /// Load only this category and clear only its rows.
    pub category: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            table: "inventory".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            delimiter: b',',
            confirmed: false,
            category: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub report: IngestReport,
    /// Records handed to the writer, in input order.
    pub records: Vec<InventoryRecord>,
}

/// Runs one import against `store`. Without an explicit schema the layout
/// is detected from the header line.
pub struct Pipeline<'a, S: ?Sized> {
    store: &'a S,
    schema: Option<SchemaDefinition>,
    options: PipelineOptions,
}

impl<'a, S> Pipeline<'a, S>
where
    S: TableStore + ?Sized,
{
    pub fn new(store: &'a S, options: PipelineOptions) -> Self {
        Self {
            store,
            schema: None,
            options,
        }
    }

    pub fn with_schema(mut self, schema: SchemaDefinition) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub async fn run<R>(&self, reader: R, source: &str) -> IngestResult<RunOutput>
    where
        R: AsyncRead + Unpin + Send,
    {
        let span = info_span!("ingest", source, table = %self.options.table);
        self.run_phases(reader, source).instrument(span).await
    }

    async fn run_phases<R>(&self, reader: R, source: &str) -> IngestResult<RunOutput>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();

        enter(Phase::Parsing);
        let parsed = parse_all(reader, self.options.delimiter).await?;
        let schema = match &self.schema {
            Some(schema) => {
                schema.check_columns(&parsed.headers)?;
                schema.clone()
            }
            None => SchemaDefinition::detect(&parsed.headers)?,
        };
        info!(
            schema = schema.name(),
            lines = parsed.data_lines(),
            rejected = parsed.rejected.len(),
            "parsed input"
        );

        let mut report = IngestReport::new(source, schema.name());
        report.rows_seen = parsed.data_lines();
        let mut invalid = parsed.rejected;

        enter(Phase::Validating);
        let mut valid_rows = Vec::with_capacity(parsed.rows.len());
        for row in parsed.rows {
            match schema.validate_row(&row) {
                Ok(()) => valid_rows.push(row),
                Err(issue) => {
                    warn!(line = issue.line, "{issue}");
                    invalid.push(issue);
                }
            }
        }

        enter(Phase::Transforming);
        let transformer = Transformer::new(&schema);
        let mut seen_ids = HashSet::new();
        let mut records = Vec::with_capacity(valid_rows.len());
        for row in &valid_rows {
            let outcome = transformer.transform(row).and_then(|record| {
                if seen_ids.insert(record.id) {
                    Ok(record)
                } else {
                    Err(RowIssue::new(row.line(), RowProblem::DuplicateId(record.id)))
                }
            });
            match outcome {
                Ok(record) => records.push(record),
                Err(issue) => {
                    warn!(line = issue.line, "{issue}");
                    invalid.push(issue);
                }
            }
        }
        report.valid_rows = records.len();
        invalid.sort_by_key(|issue| issue.line);
        report.invalid = invalid;

        let target = self
            .options
            .category
            .as_deref()
            .map(|c| transformer.canonical_category(c).to_string());
        if let Some(category) = &target {
            let before = records.len();
            records.retain(|r| &r.category == category);
            report.skipped = before - records.len();
            info!(%category, skipped = report.skipped, "category mode");
        }

        enter(Phase::Clearing);
        report.cleared = clear_table(
            self.store,
            &self.options.table,
            target.as_deref(),
            self.options.confirmed,
        )
        .await?;

        enter(Phase::Writing);
        let outcome = write_batches(
            self.store,
            &self.options.table,
            &records,
            self.options.batch_size,
        )
        .await;
        report.record_write(outcome);

        enter(Phase::Reporting);
        report.summarize(&records);
        report.elapsed = started.elapsed();
        info!(
            written = report.written,
            failed = report.write_failed,
            invalid = report.invalid_rows(),
            partial = report.is_partial(),
            "import finished"
        );

        Ok(RunOutput { report, records })
    }
}

fn enter(phase: Phase) {
    tracing::debug!(%phase, "entering phase");
}
