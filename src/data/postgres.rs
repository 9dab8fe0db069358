//! PostgreSQL-backed data service.
//!
//! Rows travel as `jsonb` in both directions. Filters compare inside jsonb
//! (`to_jsonb(t) -> 'col' = value`) so uuid, text, numeric and boolean
//! columns all bind the same way.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use super::{check_identifier, DataError, DataService, Filter, Result, Select, Table};

#[derive(Clone)]
pub struct PgDataService {
    pool: PgPool,
}

impl PgDataService {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self::new(pool))
    }
}

fn push_where(qb: &mut QueryBuilder<'_, Postgres>, filters: &[Filter]) {
    for (i, filter) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push("to_jsonb(t) -> ").push_bind(filter.column.clone());
        qb.push(" = ").push_bind(Json(filter.value.clone()));
    }
}

/// Column list shared by every row of an insert, validated as identifiers.
fn insert_columns(rows: &[Value]) -> Result<Vec<String>> {
    let Some(Value::Object(first)) = rows.first() else {
        return Err(DataError::Remote("insert rows must be JSON objects".into()));
    };
    first.keys().map(|k| check_identifier(k).map(str::to_string)).collect()
}

pub(crate) fn select_sql(query: &Select) -> Result<QueryBuilder<'static, Postgres>> {
    let mut qb = QueryBuilder::new(format!("SELECT to_jsonb(t) FROM {} t", query.table));
    push_where(&mut qb, &query.filters);
    for (i, order) in query.order.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(format!("t.{}", check_identifier(&order.column)?));
        qb.push(if order.descending { " DESC" } else { " ASC" });
    }
    Ok(qb)
}

#[async_trait]
impl DataService for PgDataService {
    async fn select(&self, query: &Select) -> Result<Vec<Value>> {
        let mut qb = select_sql(query)?;
        debug!(sql = qb.sql(), "select");
        Ok(qb.build_query_scalar::<Value>().fetch_all(&self.pool).await?)
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>> {
        if rows.is_empty() { return Ok(Vec::new()); }
        let columns = insert_columns(&rows)?.join(", ");
        let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO {table} AS t ({columns}) SELECT {columns} FROM jsonb_populate_recordset(NULL::{table}, "));
        qb.push_bind(Json(Value::Array(rows)));
        qb.push(") RETURNING to_jsonb(t)");
        debug!(sql = qb.sql(), "insert");
        Ok(qb.build_query_scalar::<Value>().fetch_all(&self.pool).await?)
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<u64> {
        let columns = insert_columns(std::slice::from_ref(&patch))?.join(", ");
        let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {table} AS t SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, "));
        qb.push_bind(Json(patch));
        qb.push("))");
        push_where(&mut qb, filters);
        debug!(sql = qb.sql(), "update");
        Ok(qb.build().execute(&self.pool).await?.rows_affected())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {table} AS t"));
        push_where(&mut qb, filters);
        debug!(sql = qb.sql(), "delete");
        Ok(qb.build().execute(&self.pool).await?.rows_affected())
    }

    async fn rpc(&self, function: &str) -> Result<Value> {
        let sql = format!("SELECT to_jsonb({}())", check_identifier(function)?);
        Ok(sqlx::query_scalar::<_, Value>(&sql).fetch_one(&self.pool).await?)
    }
}
