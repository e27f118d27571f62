//! Table-oriented destination: the four operations the loader needs.
//!
//! Rows are JSON objects keyed by column name; the primary key column is
//! [`PRIMARY_KEY`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

pub type Row = serde_json::Map<String, Value>;

pub const PRIMARY_KEY: &str = "id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key value violates unique constraint: {column} = {value}")]
    Conflict { column: String, value: String },
    #[error("store responded with {status}: {message}")]
    Api { status: u16, message: String },
    #[error("store is misconfigured: {0}")]
    Config(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }
}

/// `column <op> value`. A missing or null column never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

macro_rules! filter_ctor {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(column: impl Into<String>, value: impl Into<Value>) -> Self {
                Self { column: column.into(), op: FilterOp::$op, value: value.into() }
            }
        )*
    };
}

impl Filter {
    filter_ctor!(eq => Eq, neq => Neq, gt => Gt, gte => Gte, lt => Lt, lte => Lte);

    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.column).filter(|v| !v.is_null()) else {
            return false;
        };
        let ordering = match (actual, &self.value) {
            (Value::Number(a), Value::Number(b)) => {
                a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b))
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) if a == b => Some(Ordering::Equal),
            _ => None,
        };
        match (self.op, ordering) {
            (FilterOp::Eq, Some(o)) => o == Ordering::Equal,
            (FilterOp::Neq, Some(o)) => o != Ordering::Equal,
            (FilterOp::Neq, None) => true,
            (FilterOp::Gt, Some(o)) => o == Ordering::Greater,
            (FilterOp::Gte, Some(o)) => o != Ordering::Less,
            (FilterOp::Lt, Some(o)) => o == Ordering::Less,
            (FilterOp::Lte, Some(o)) => o != Ordering::Greater,
            _ => false,
        }
    }

    /// PostgREST query pair, e.g. `("id", "neq.0")`.
    fn to_query(&self) -> (String, String) {
        let value = match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (self.column.clone(), format!("{}.{}", self.op.as_str(), value))
    }
}

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Row>>;

    /// Insert all rows or none of them; returns the number inserted.
    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<usize>;

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> StoreResult<usize>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<usize>;
}

/// In-process tables, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(table: &str, rows: Vec<Row>) -> Self {
        let mut tables = HashMap::new();
        tables.insert(table.to_string(), rows);
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Snapshot of `table` in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

fn key_of(row: &Row) -> Option<String> {
    row.get(PRIMARY_KEY)
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filters.iter().all(|f| f.matches(r)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let existing = tables.entry(table.to_string()).or_default();

        let mut keys: Vec<String> = existing.iter().filter_map(key_of).collect();
        for row in &rows {
            if let Some(key) = key_of(row) {
                if keys.contains(&key) {
                    return Err(StoreError::Conflict {
                        column: PRIMARY_KEY.to_string(),
                        value: key,
                    });
                }
                keys.push(key);
            }
        }

        let inserted = rows.len();
        existing.extend(rows);
        Ok(inserted)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let mut updated = 0;
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| filters.iter().all(|f| f.matches(r))) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filters.iter().all(|f| f.matches(r)));
        Ok(before - rows.len())
    }
}

/// Client for the hosted backend's REST interface (`/rest/v1/<table>`).
#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: &str) -> StoreResult<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(StoreError::Config("store url is empty".into()));
        }
        let header = |value: String| {
            HeaderValue::from_str(&value).map_err(|e| StoreError::Config(e.to_string()))
        };

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header(api_key.to_string())?);
        headers.insert(AUTHORIZATION, header(format!("Bearer {api_key}"))?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn query(filters: &[Filter]) -> Vec<(String, String)> {
        filters.iter().map(Filter::to_query).collect()
    }

    async fn check(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
            .unwrap_or(body);
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn returned_rows(response: reqwest::Response) -> StoreResult<usize> {
        let rows: Vec<Row> = Self::check(response).await?.json().await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl TableStore for RestStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        let response = self
            .client
            .get(self.endpoint(table))
            .query(&[("select", "*")])
            .query(&Self::query(filters))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<usize> {
        let inserted = rows.len();
        let response = self
            .client
            .post(self.endpoint(table))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(inserted)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> StoreResult<usize> {
        let response = self
            .client
            .patch(self.endpoint(table))
            .header("Prefer", "return=representation")
            .query(&Self::query(filters))
            .json(&patch)
            .send()
            .await?;
        Self::returned_rows(response).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<usize> {
        let response = self
            .client
            .delete(self.endpoint(table))
            .header("Prefer", "return=representation")
            .query(&Self::query(filters))
            .send()
            .await?;
        Self::returned_rows(response).await
    }
}
