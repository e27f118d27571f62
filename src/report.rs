//! Operator-facing run summary, plus optional exports of the cleaned rows.

use crate::record::{InventoryRecord, RowIssue};
use crate::writer::{BatchFailure, WriteOutcome};
use crate::IngestResult;
use crc32fast::Hasher as Crc32;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// min / avg / max / sum over a set of positive amounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub sum: f64,
}

impl Spread {
    /// `None` when no value is above zero.
    pub fn of_positive(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut spread = Spread {
            min: f64::INFINITY,
            avg: 0.0,
            max: f64::NEG_INFINITY,
            sum: 0.0,
        };
        for v in values.into_iter().filter(|v| *v > 0.0) {
            count += 1;
            spread.min = spread.min.min(v);
            spread.max = spread.max.max(v);
            spread.sum += v;
        }
        if count == 0 {
            return None;
        }
        spread.avg = spread.sum / count as f64;
        Some(spread)
    }
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub source: String,
    pub schema: String,
    pub rows_seen: usize,
    pub valid_rows: usize,
    pub invalid: Vec<RowIssue>,
    /// Valid rows left out by a category filter.
    pub skipped: usize,
    pub cleared: usize,
    pub written: usize,
    pub write_failed: usize,
    pub batch_failures: Vec<BatchFailure>,
    pub categories: BTreeMap<String, usize>,
    pub price: Option<Spread>,
    pub stock_total: u64,
    pub stock_avg: f64,
    pub value: Option<Spread>,
    /// CRC32 over the cleaned records ordered by id.
    pub fingerprint: u32,
    pub elapsed: Duration,
}

impl IngestReport {
    pub fn new(source: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            schema: schema.into(),
            rows_seen: 0,
            valid_rows: 0,
            invalid: Vec::new(),
            skipped: 0,
            cleared: 0,
            written: 0,
            write_failed: 0,
            batch_failures: Vec::new(),
            categories: BTreeMap::new(),
            price: None,
            stock_total: 0,
            stock_avg: 0.0,
            value: None,
            fingerprint: fingerprint(&[]),
            elapsed: Duration::ZERO,
        }
    }

    /// Fill in aggregates over the records that were sent to the store.
    pub fn summarize(&mut self, records: &[InventoryRecord]) {
        self.categories.clear();
        for r in records {
            *self.categories.entry(r.category.clone()).or_default() += 1;
        }
        self.price = Spread::of_positive(records.iter().map(|r| r.price));
        self.value = Spread::of_positive(records.iter().map(|r| r.value));
        self.stock_total = records.iter().map(|r| r.stock).sum();
        self.stock_avg = if records.is_empty() {
            0.0
        } else {
            self.stock_total as f64 / records.len() as f64
        };
        self.fingerprint = fingerprint(records);
    }

    pub fn record_write(&mut self, outcome: WriteOutcome) {
        self.written = outcome.written;
        self.write_failed = outcome.failed;
        self.batch_failures = outcome.failures;
    }

    pub fn invalid_rows(&self) -> usize {
        self.invalid.len()
    }

    /// Some batches failed, so the table holds only part of the file.
    pub fn is_partial(&self) -> bool {
        !self.batch_failures.is_empty()
    }
}

/// Order-independent digest of a record set, for comparing two loads.
pub fn fingerprint(records: &[InventoryRecord]) -> u32 {
    let mut sorted: Vec<&InventoryRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.id);

    let mut crc = Crc32::new();
    for record in sorted {
        // fields separated by '\x1f' (unit separator), records by '\x1e'
        let row = record.to_row();
        for (i, value) in row.values().enumerate() {
            if i > 0 {
                crc.update(&[0x1f]);
            }
            crc.update(value.to_string().as_bytes());
        }
        crc.update(&[0x1e]);
    }
    crc.finalize()
}

fn money(v: f64) -> String {
    format!("{v:.2}")
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Inventory import: {} ({}) ===", self.source, self.schema)?;
        writeln!(f, "rows seen      {}", self.rows_seen)?;
        writeln!(f, "valid rows     {}", self.valid_rows)?;
        writeln!(f, "invalid rows   {}", self.invalid_rows())?;
        if self.skipped > 0 {
            writeln!(f, "skipped        {} (category filter)", self.skipped)?;
        }
        writeln!(f, "cleared        {}", self.cleared)?;
        writeln!(f, "written        {}", self.written)?;
        writeln!(f, "write failed   {}", self.write_failed)?;
        writeln!(
            f,
            "status         {}",
            if self.is_partial() { "PARTIAL" } else { "OK" }
        )?;

        if !self.invalid.is_empty() {
            writeln!(f, "\n--- invalid rows ---")?;
            for issue in &self.invalid {
                writeln!(f, "  {issue}")?;
            }
        }
        if !self.batch_failures.is_empty() {
            writeln!(f, "\n--- failed batches ---")?;
            for failure in &self.batch_failures {
                let first = failure.ids.first().copied().unwrap_or_default();
                let last = failure.ids.last().copied().unwrap_or_default();
                writeln!(
                    f,
                    "  batch {} ({} records, ids {first}..{last}): {}",
                    failure.batch_index + 1,
                    failure.ids.len(),
                    failure.message
                )?;
            }
        }

        writeln!(f, "\n--- categories ---")?;
        for (category, count) in &self.categories {
            writeln!(f, "  {category:<24} {count}")?;
        }

        writeln!(f, "\n--- totals ---")?;
        match self.price {
            Some(p) => writeln!(
                f,
                "  price          min {} / avg {} / max {}",
                money(p.min),
                money(p.avg),
                money(p.max)
            )?,
            None => writeln!(f, "  price          n/a")?,
        }
        writeln!(
            f,
            "  stock          total {} / avg {:.1}",
            self.stock_total, self.stock_avg
        )?;
        match self.value {
            Some(v) => writeln!(
                f,
                "  value          total {} / avg {} / min {} / max {}",
                money(v.sum),
                money(v.avg),
                money(v.min),
                money(v.max)
            )?,
            None => writeln!(f, "  value          n/a")?,
        }
        writeln!(f, "  fingerprint    {:08x}", self.fingerprint)?;
        write!(f, "  elapsed        {:.2}s", self.elapsed.as_secs_f64())
    }
}

/// Write the cleaned records as a pretty-printed JSON array.
pub async fn export_json(path: &Path, records: &[InventoryRecord]) -> IngestResult<()> {
    let body = serde_json::to_vec_pretty(records)?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

const CSV_EXPORT_HEADER: [&str; 15] = [
    "id",
    "product_name",
    "price",
    "category",
    "stock",
    "size",
    "units",
    "supplier",
    "barcode",
    "barcode_type",
    "tags",
    "min_level",
    "restock_price",
    "value",
    "notes",
];

/// Write the cleaned records as CSV with database column names.
pub async fn export_csv(path: &Path, records: &[InventoryRecord]) -> IngestResult<()> {
    let file = tokio::fs::File::create(path).await?;
    let mut wtr = csv_async::AsyncWriter::from_writer(file);
    wtr.write_record(&CSV_EXPORT_HEADER).await?;

    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    let num = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();
    for r in records {
        wtr.write_record(&[
            r.id.to_string(),
            r.product_name.clone(),
            r.price.to_string(),
            r.category.clone(),
            r.stock.to_string(),
            opt(&r.size),
            opt(&r.units),
            opt(&r.supplier),
            opt(&r.barcode),
            opt(&r.barcode_type),
            opt(&r.tags),
            num(r.min_level),
            num(r.restock_price),
            r.value.to_string(),
            r.notes.clone(),
        ])
        .await?;
    }
    wtr.flush().await?;
    Ok(())
}
