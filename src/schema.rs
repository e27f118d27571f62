//! Column layouts and per-field typing rules.
//!
//! A [`SchemaDefinition`] is built once per run and never mutated. Two
//! layouts ship built in, one per stock source; custom layouts load from TOML.

use crate::parser::RawRow;
use crate::record::{RowIssue, RowProblem};
use crate::{IngestError, IngestResult};
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

pub const UNCATEGORIZED: &str = "Uncategorized";

pub mod columns {
    pub const ID: &str = "id";
    pub const PRODUCT_NAME: &str = "Product Name";
    pub const PRICE: &str = "Price";
    pub const SIZE: &str = "Size";
    pub const UNITS: &str = "Units";
    pub const CATEGORY: &str = "Category";
    pub const MIN_LEVEL: &str = "Min Level";
    pub const STOCK: &str = "Stock";
    pub const COUNT: &str = "count";
    pub const RESTOCK_PRICE: &str = "re-stock Price";
    pub const SUPPLIER: &str = "Supplier";
    pub const BARCODE: &str = "Barcode/QR2-Data";
    pub const BARCODE_TYPE: &str = "Barcode/QR2-Type";
    pub const NOTES: &str = "Notes";
    pub const TAGS: &str = "Tags";
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// A single field that failed its rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("{column}: required value is empty")]
    MissingRequiredField { column: String },
    #[error("{column}: `{value}` is not a number")]
    InvalidNumber { column: String, value: String },
    #[error("{column}: {value} is below the minimum of {min}")]
    BelowMinimum { column: String, value: f64, min: f64 },
    #[error("{column}: `{value}` is not an email address")]
    InvalidEmail { column: String, value: String },
    #[error("{column}: `{value}` is not a date")]
    InvalidDate { column: String, value: String },
    #[error("{column}: `{value}` is not one of {}", .allowed.join(", "))]
    NotInEnum {
        column: String,
        value: String,
        allowed: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Email,
    Date,
    Enum { values: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub column: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min: Option<f64>,
}

impl FieldRule {
    pub fn new(column: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            column: column.into(),
            kind,
            required: false,
            min: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }
}

/// Which column is authoritative for `stock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSource {
    /// `Stock`, taken as is.
    CurrentStock,
    /// `count` from the latest stocktake; overrides `Stock`.
    PhysicalCount,
}

impl StockSource {
    pub fn column(self) -> &'static str {
        match self {
            Self::CurrentStock => columns::STOCK,
            Self::PhysicalCount => columns::COUNT,
        }
    }
}

/// Moves items filed under `from_category` whose name mentions
/// `name_contains` into `to_category`. Matching ignores case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCorrection {
    pub from_category: String,
    pub name_contains: String,
    pub to_category: String,
}

impl CategoryCorrection {
    pub fn new(
        from_category: impl Into<String>,
        name_contains: impl Into<String>,
        to_category: impl Into<String>,
    ) -> Self {
        Self {
            from_category: from_category.into(),
            name_contains: name_contains.into(),
            to_category: to_category.into(),
        }
    }

    pub fn applies(&self, category: &str, product_name: &str) -> bool {
        category.eq_ignore_ascii_case(&self.from_category)
            && product_name
                .to_lowercase()
                .contains(&self.name_contains.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    name: String,
    required_columns: Vec<String>,
    rules: Vec<FieldRule>,
    stock_source: StockSource,
    #[serde(default = "default_categories")]
    known_categories: Vec<String>,
    #[serde(default = "default_corrections")]
    corrections: Vec<CategoryCorrection>,
}

fn default_categories() -> Vec<String> {
    [
        "Cold Beverages",
        "Hot Beverages",
        "Food Packs",
        "Snacks",
        "Liquor",
        "Cigarettes",
        "Toiletries",
        "Beach Gear",
        "Souvenirs",
        "Medicine",
        UNCATEGORIZED,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_corrections() -> Vec<CategoryCorrection> {
    // rice meals were filed with the drinks in the first stock list
    vec![CategoryCorrection::new("Cold Beverages", "rice", "Food Packs")]
}

impl SchemaDefinition {
    pub fn new(
        name: impl Into<String>,
        required_columns: Vec<String>,
        rules: Vec<FieldRule>,
        stock_source: StockSource,
    ) -> Self {
        Self {
            name: name.into(),
            required_columns,
            rules,
            stock_source,
            known_categories: default_categories(),
            corrections: default_corrections(),
        }
    }

    pub fn with_known_categories(mut self, categories: Vec<String>) -> Self {
        self.known_categories = categories;
        self
    }

    pub fn with_corrections(mut self, corrections: Vec<CategoryCorrection>) -> Self {
        self.corrections = corrections;
        self
    }

    /// Layout of the regular stock export: stock comes from `Stock`.
    pub fn current_stock() -> Self {
        Self::inventory("current-stock", StockSource::CurrentStock)
    }

    /// Layout of the stocktake sheet: stock comes from `count`.
    pub fn physical_count() -> Self {
        Self::inventory("physical-count", StockSource::PhysicalCount)
    }

    fn inventory(name: &str, stock_source: StockSource) -> Self {
        use columns::*;

        let number = || FieldKind::Number;
        let mut rules = vec![
            FieldRule::new(ID, number()).required().min(1.0),
            FieldRule::new(PRODUCT_NAME, FieldKind::String).required(),
            FieldRule::new(PRICE, number()).min(0.0),
            FieldRule::new(CATEGORY, FieldKind::String),
            FieldRule::new(MIN_LEVEL, number()).min(0.0),
            FieldRule::new(RESTOCK_PRICE, number()).min(0.0),
        ];
        // Only the column stock is read from gets checked.
        rules.push(FieldRule::new(stock_source.column(), number()).min(0.0));

        let required_columns = [ID, PRODUCT_NAME, PRICE, CATEGORY, stock_source.column()]
            .into_iter()
            .map(String::from)
            .collect();
        Self::new(name, required_columns, rules, stock_source)
    }

    /// Pick the built-in layout matching `headers`; the stocktake layout wins
    /// when both fit.
    pub fn detect(headers: &[String]) -> IngestResult<Self> {
        let count = Self::physical_count();
        if count.check_columns(headers).is_ok() {
            return Ok(count);
        }
        let current = Self::current_stock();
        current.check_columns(headers)?;
        Ok(current)
    }

    pub fn from_toml_str(text: &str) -> IngestResult<Self> {
        let schema: Self = toml::from_str(text).map_err(|e| IngestError::Schema(e.to_string()))?;
        if schema.required_columns.is_empty() {
            return Err(IngestError::Schema(format!(
                "schema `{}` declares no required columns",
                schema.name
            )));
        }
        Ok(schema)
    }

    pub fn load(path: &Path) -> IngestResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required_columns
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn stock_source(&self) -> StockSource {
        self.stock_source
    }

    pub fn known_categories(&self) -> &[String] {
        &self.known_categories
    }

    pub fn corrections(&self) -> &[CategoryCorrection] {
        &self.corrections
    }

    /// Header-level check: every required column must be present.
    pub fn check_columns(&self, headers: &[String]) -> IngestResult<()> {
        let missing: Vec<String> = self
            .required_columns
            .iter()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IngestError::MissingRequiredColumns(missing))
        }
    }

    /// Apply every rule to `row`; all failures are reported, not just the first.
    pub fn validate_row(&self, row: &RawRow) -> Result<(), RowIssue> {
        let problems: Vec<RowProblem> = self
            .rules
            .iter()
            .filter_map(|rule| validate_field(row.get(&rule.column), rule).err())
            .map(RowProblem::from)
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RowIssue {
                line: row.line(),
                problems,
            })
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

fn parses_as_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
        || DateTime::parse_from_rfc3339(value).is_ok()
}

/// Check one value against its rule. Blank optional values always pass.
pub fn validate_field(value: Option<&str>, rule: &FieldRule) -> Result<(), FieldError> {
    let column = || rule.column.clone();
    let value = match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None if rule.required => {
            return Err(FieldError::MissingRequiredField { column: column() })
        }
        None => return Ok(()),
    };

    match &rule.kind {
        FieldKind::String => Ok(()),
        FieldKind::Number => {
            let number = value
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| FieldError::InvalidNumber {
                    column: column(),
                    value: value.to_string(),
                })?;
            match rule.min {
                Some(min) if number < min => Err(FieldError::BelowMinimum {
                    column: column(),
                    value: number,
                    min,
                }),
                _ => Ok(()),
            }
        }
        FieldKind::Email if email_pattern().is_match(value) => Ok(()),
        FieldKind::Email => Err(FieldError::InvalidEmail {
            column: column(),
            value: value.to_string(),
        }),
        FieldKind::Date if parses_as_date(value) => Ok(()),
        FieldKind::Date => Err(FieldError::InvalidDate {
            column: column(),
            value: value.to_string(),
        }),
        FieldKind::Enum { values } => {
            if values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                Ok(())
            } else {
                Err(FieldError::NotInEnum {
                    column: column(),
                    value: value.to_string(),
                    allowed: values.clone(),
                })
            }
        }
    }
}
