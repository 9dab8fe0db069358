//! Remote data service client.
//!
//! Business data lives in a relational backend exposed as table-like
//! resources plus one sequence procedure. [`DataService`] is the untyped,
//! object-safe seam over JSON rows; [`DataClient`] layers serde conversions
//! on top so services work with domain types.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryDataService;
pub use postgres::PgDataService;

/// Name of the server-side procedure allocating order numbers.
pub const GENERATE_ORDER_NUMBER: &str = "generate_order_number";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Products,
    ProductVariants,
    Orders,
    OrderItems,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Products => "products",
            Self::ProductVariants => "product_variants",
            Self::Orders => "orders",
            Self::OrderItems => "order_items",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Equality filter on one column.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Serialize) -> Self {
        Self { column: column.into(), value: serde_json::to_value(value).unwrap_or(Value::Null) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// `select * from <table> where <filters> order by <order>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Select {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub order: Vec<OrderBy>,
}

impl Select {
    pub fn from(table: Table) -> Self { Self { table, filters: Vec::new(), order: Vec::new() } }

    pub fn eq(mut self, column: impl Into<String>, value: impl Serialize) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order.push(OrderBy { column: column.into(), descending: false });
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order.push(OrderBy { column: column.into(), descending: true });
        self
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not decode {table} row: {source}")]
    Decode { table: Table, #[source] source: serde_json::Error },

    #[error("could not encode row: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{0} returned no rows")]
    EmptyResult(Table),

    #[error("remote call failed: {0}")]
    Remote(String),
}

pub type Result<T> = std::result::Result<T, DataError>;

#[async_trait]
pub trait DataService: Send + Sync {
    async fn select(&self, query: &Select) -> Result<Vec<Value>>;

    /// Inserts `rows` and returns them as stored (ids, defaults, timestamps filled).
    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>>;

    /// Applies `patch` (a JSON object) to every matching row; returns the count.
    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<u64>;

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64>;

    /// Calls a zero-argument remote procedure.
    async fn rpc(&self, function: &str) -> Result<Value>;
}

/// Typed handle over a shared [`DataService`].
#[derive(Clone)]
pub struct DataClient {
    inner: Arc<dyn DataService>,
}

impl DataClient {
    pub fn new(service: Arc<dyn DataService>) -> Self { Self { inner: service } }

    pub async fn select<T: DeserializeOwned>(&self, query: &Select) -> Result<Vec<T>> {
        let rows = self.inner.select(query).await?;
        rows.into_iter().map(|row| decode(query.table, row)).collect()
    }

    pub async fn select_one<T: DeserializeOwned>(&self, query: &Select) -> Result<Option<T>> {
        let rows = self.inner.select(query).await?;
        rows.into_iter().next().map(|row| decode(query.table, row)).transpose()
    }

    pub async fn insert_one<T: Serialize, R: DeserializeOwned>(&self, table: Table, row: &T) -> Result<R> {
        let row = serde_json::to_value(row).map_err(DataError::Encode)?;
        let stored = self.inner.insert(table, vec![row]).await?;
        let first = stored.into_iter().next().ok_or(DataError::EmptyResult(table))?;
        decode(table, first)
    }

    pub async fn insert_all<T: Serialize, R: DeserializeOwned>(&self, table: Table, rows: &[T]) -> Result<Vec<R>> {
        let rows = rows.iter().map(serde_json::to_value).collect::<std::result::Result<Vec<_>, _>>().map_err(DataError::Encode)?;
        let stored = self.inner.insert(table, rows).await?;
        stored.into_iter().map(|row| decode(table, row)).collect()
    }

    pub async fn update<T: Serialize>(&self, table: Table, filters: &[Filter], patch: &T) -> Result<u64> {
        let patch = serde_json::to_value(patch).map_err(DataError::Encode)?;
        self.inner.update(table, filters, patch).await
    }

    pub async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        self.inner.delete(table, filters).await
    }

    pub async fn rpc<R: DeserializeOwned>(&self, function: &str) -> Result<R> {
        let value = self.inner.rpc(function).await?;
        serde_json::from_value(value).map_err(|e| DataError::Remote(format!("{function}: {e}")))
    }
}

fn decode<T: DeserializeOwned>(table: Table, row: Value) -> Result<T> {
    serde_json::from_value(row).map_err(|source| DataError::Decode { table, source })
}

/// Column and function names are interpolated into SQL, so they must be
/// plain lowercase identifiers.
pub(crate) fn check_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid { Ok(name) } else { Err(DataError::InvalidIdentifier(name.to_string())) }
}
