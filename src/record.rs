//! The canonical inventory row and the row-level problems that keep a line
//! out of it.

use crate::schema::FieldError;
use crate::store::Row;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between entries of [`InventoryRecord::notes`].
pub const NOTE_SEPARATOR: &str = "; ";

/// One cleaned stock item, shaped like a row of the `inventory` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: u64,
    pub product_name: String,
    pub price: f64,
    pub category: String,
    pub stock: u64,
    pub size: Option<String>,
    pub units: Option<String>,
    pub supplier: Option<String>,
    pub barcode: Option<String>,
    pub barcode_type: Option<String>,
    pub tags: Option<String>,
    pub min_level: Option<f64>,
    pub restock_price: Option<f64>,
    pub value: f64,
    pub notes: String,
}

impl InventoryRecord {
    /// A record with the given key and name, everything else empty.
    pub fn new(id: u64, product_name: impl Into<String>) -> Self {
        Self {
            id,
            product_name: product_name.into(),
            price: 0.0,
            category: crate::schema::UNCATEGORIZED.to_string(),
            stock: 0,
            size: None,
            units: None,
            supplier: None,
            barcode: None,
            barcode_type: None,
            tags: None,
            min_level: None,
            restock_price: None,
            value: 0.0,
            notes: String::new(),
        }
    }

    /// `value` must be refreshed whenever `stock` or `price` changes.
    pub fn recompute_value(&mut self) {
        self.value = self.stock as f64 * self.price;
    }

    pub fn add_note(&mut self, note: impl AsRef<str>) {
        let note = note.as_ref().trim();
        if note.is_empty() {
            return;
        }
        if !self.notes.is_empty() {
            self.notes.push_str(NOTE_SEPARATOR);
        }
        self.notes.push_str(note);
    }

    pub fn notes(&self) -> impl Iterator<Item = &str> {
        self.notes
            .split(NOTE_SEPARATOR)
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Column map for the table store.
    pub fn to_row(&self) -> Row {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Row::new(),
        }
    }

    pub fn from_row(row: &Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(row.clone()))
    }
}

/// Why a single input line was left out of the load.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowProblem {
    #[error("expected {expected} fields, found {found}")]
    FieldCountMismatch { expected: usize, found: usize },
    #[error("line is not valid text in the declared charset")]
    InvalidEncoding,
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("id `{0}` is not a positive whole number")]
    InvalidId(String),
    #[error("id {0} already appeared earlier in the file")]
    DuplicateId(u64),
}

/// Every problem found on one line, keyed by its 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct RowIssue {
    pub line: u64,
    pub problems: Vec<RowProblem>,
}

impl RowIssue {
    pub fn new(line: u64, problem: impl Into<RowProblem>) -> Self {
        Self {
            line,
            problems: vec![problem.into()],
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: ", self.line)?;
        for (i, problem) in self.problems.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{problem}")?;
        }
        Ok(())
    }
}
