use crate::parser::RawRow;
use crate::record::{InventoryRecord, RowIssue, RowProblem};
use crate::schema::{columns, FieldError, SchemaDefinition, StockSource, UNCATEGORIZED};
use std::collections::HashMap;

/// Lowercase everything, then capitalise the first letter of each
/// whitespace-separated word. Runs of whitespace collapse to one space.
pub fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn category_key(category: &str) -> String {
    category
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Turns validated rows into [`InventoryRecord`]s, noting every fix it makes.
pub struct Transformer<'a> {
    schema: &'a SchemaDefinition,
    categories: HashMap<String, &'a str>,
}

impl<'a> Transformer<'a> {
    pub fn new(schema: &'a SchemaDefinition) -> Self {
        let categories = schema
            .known_categories()
            .iter()
            .map(|c| (category_key(c), c.as_str()))
            .collect();
        Self { schema, categories }
    }

    /// The known spelling of `category`, or the trimmed input when it is not
    /// a known category.
    pub fn canonical_category<'c>(&self, category: &'c str) -> &'c str
    where
        'a: 'c,
    {
        let category = category.trim();
        match self.categories.get(&category_key(category)) {
            Some(&known) => known,
            None => category,
        }
    }

    pub fn transform(&self, row: &RawRow) -> Result<InventoryRecord, RowIssue> {
        let id = parse_id(row).map_err(|problem| RowIssue::new(row.line(), problem))?;

        let raw_name = row.get(columns::PRODUCT_NAME).unwrap_or_default();
        let mut record = InventoryRecord::new(id, title_case(raw_name));
        if let Some(existing) = row.get(columns::NOTES) {
            record.add_note(existing);
        }
        let spaced = raw_name.split_whitespace().collect::<Vec<_>>().join(" ");
        if spaced != raw_name {
            record.add_note("Extra whitespace removed from product name");
        }
        if record.product_name != spaced {
            record.add_note("Product name converted to Title Case");
        }

        self.apply_category(&mut record, row.get(columns::CATEGORY));
        apply_price(&mut record, row.get(columns::PRICE));
        self.apply_stock(&mut record, row);

        if row.has_column(columns::RESTOCK_PRICE) {
            let restock = match parse_number(row.get(columns::RESTOCK_PRICE)) {
                Some(p) if p >= 0.0 => p,
                _ => {
                    record.add_note("Re-stock price missing, defaulted to 0");
                    0.0
                }
            };
            record.restock_price = Some(restock);
        }
        record.min_level = parse_number(row.get(columns::MIN_LEVEL)).filter(|m| *m >= 0.0);

        let text = |column: &str| row.get(column).map(str::to_string);
        record.size = text(columns::SIZE);
        record.units = text(columns::UNITS);
        record.supplier = text(columns::SUPPLIER);
        record.barcode = text(columns::BARCODE);
        record.barcode_type = text(columns::BARCODE_TYPE);
        record.tags = text(columns::TAGS);

        record.recompute_value();
        Ok(record)
    }

    fn apply_category(&self, record: &mut InventoryRecord, raw: Option<&str>) {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            record.category = UNCATEGORIZED.to_string();
            record.add_note("Category missing, set to Uncategorized");
            return;
        }

        let known = self.canonical_category(raw);
        if known != raw {
            record.add_note(format!("Category normalized from \"{raw}\" to {known}"));
        }
        record.category = known.to_string();

        let correction = self
            .schema
            .corrections()
            .iter()
            .find(|c| c.applies(&record.category, &record.product_name));
        if let Some(c) = correction {
            record.add_note(format!(
                "Category corrected from {} to {} (name contains \"{}\")",
                record.category, c.to_category, c.name_contains
            ));
            record.category = c.to_category.clone();
        }
    }

    fn apply_stock(&self, record: &mut InventoryRecord, row: &RawRow) {
        let source = self.schema.stock_source();
        let raw = parse_number(row.get(source.column()));

        let stock = match raw {
            Some(n) if n >= 0.0 => n,
            Some(n) => {
                record.add_note(format!("Stock {n} is negative, defaulted to 0"));
                0.0
            }
            None if source == StockSource::PhysicalCount => {
                record.add_note("Physical count missing, stock defaulted to 0");
                0.0
            }
            None => {
                record.add_note("Stock missing, defaulted to 0");
                0.0
            }
        };

        if raw.is_some() && source == StockSource::PhysicalCount {
            record.add_note("Stock set from latest physical count");
        }
        if stock.fract() != 0.0 {
            record.add_note(format!("Stock {stock} rounded down to {}", stock.floor()));
        }
        record.stock = stock.floor() as u64;
    }
}

fn apply_price(record: &mut InventoryRecord, raw: Option<&str>) {
    record.price = match parse_number(raw) {
        Some(p) if p >= 0.0 => p,
        Some(p) => {
            record.add_note(format!("Price {p} is negative, defaulted to 0"));
            0.0
        }
        None => {
            record.add_note("Price missing, defaulted to 0");
            0.0
        }
    };
}

fn parse_id(row: &RawRow) -> Result<u64, RowProblem> {
    let raw = row
        .get(columns::ID)
        .ok_or_else(|| FieldError::MissingRequiredField {
            column: columns::ID.to_string(),
        })?;
    if let Ok(id) = raw.parse::<u64>() {
        if id > 0 {
            return Ok(id);
        }
    }
    match raw.parse::<f64>() {
        Ok(n) if n >= 1.0 && n.fract() == 0.0 && n <= u64::MAX as f64 => Ok(n as u64),
        _ => Err(RowProblem::InvalidId(raw.to_string())),
    }
}
