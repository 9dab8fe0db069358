//! In-memory data service.
//!
//! Mirrors the backend's behavior closely enough to run the portal without a
//! database: generated ids and timestamps, column defaults, cascading
//! deletes and a sequential order-number procedure. Failures can be injected
//! per operation for tests.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DataError, DataService, Filter, Result, Select, Table, GENERATE_ORDER_NUMBER};

/// Operation that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Select(Table),
    Insert(Table),
    Update(Table),
    Delete(Table),
    Rpc,
}

#[derive(Default)]
pub struct MemoryDataService {
    tables: RwLock<HashMap<Table, Vec<Map<String, Value>>>>,
    failing: RwLock<HashSet<Operation>>,
    order_seq: AtomicU64,
}

impl MemoryDataService {
    pub fn new() -> Self { Self::default() }

    pub async fn fail_on(&self, op: Operation) { self.failing.write().await.insert(op); }
    pub async fn recover(&self, op: Operation) { self.failing.write().await.remove(&op); }

    /// All rows of `table` in insertion order.
    pub async fn rows(&self, table: Table) -> Vec<Value> {
        self.tables.read().await.get(&table).map(|rows| rows.iter().cloned().map(Value::Object).collect()).unwrap_or_default()
    }

    pub async fn count(&self, table: Table) -> usize {
        self.tables.read().await.get(&table).map_or(0, Vec::len)
    }

    async fn check(&self, op: Operation) -> Result<()> {
        if self.failing.read().await.contains(&op) {
            return Err(DataError::Remote(format!("injected failure: {op:?}")));
        }
        Ok(())
    }
}

fn matches(row: &Map<String, Value>, filters: &[Filter]) -> bool {
    filters.iter().all(|f| row.get(&f.column).unwrap_or(&Value::Null) == &f.value)
}

/// Orders JSON scalars the way the backend orders their columns.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn defaults(table: Table) -> Map<String, Value> {
    let defaults = match table {
        Table::Profiles => json!({"status": "pending", "is_admin": false, "tax_id": null}),
        Table::Products => json!({"is_available": true, "description": "", "image_url": null, "image_urls": null, "category": null}),
        Table::ProductVariants => json!({"is_available": true, "sort_order": 0}),
        Table::Orders => json!({"status": "submitted", "notes": null}),
        Table::OrderItems => json!({}),
    };
    defaults.as_object().cloned().unwrap_or_default()
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn select(&self, query: &Select) -> Result<Vec<Value>> {
        self.check(Operation::Select(query.table)).await?;
        let tables = self.tables.read().await;
        let mut rows: Vec<&Map<String, Value>> = tables.get(&query.table).map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).collect()).unwrap_or_default();
        rows.sort_by(|a, b| {
            query.order.iter().fold(Ordering::Equal, |acc, o| {
                acc.then_with(|| {
                    let ord = compare(a.get(&o.column).unwrap_or(&Value::Null), b.get(&o.column).unwrap_or(&Value::Null));
                    if o.descending { ord.reverse() } else { ord }
                })
            })
        });
        Ok(rows.into_iter().cloned().map(Value::Object).collect())
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>> {
        self.check(Operation::Insert(table)).await?;
        let now = json!(Utc::now());
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(fields) = row else {
                return Err(DataError::Remote("insert rows must be JSON objects".into()));
            };
            let mut full = defaults(table);
            full.insert("id".into(), json!(Uuid::new_v4()));
            full.insert("created_at".into(), now.clone());
            if table != Table::OrderItems { full.insert("updated_at".into(), now.clone()); }
            full.extend(fields);
            stored.push(full);
        }
        self.tables.write().await.entry(table).or_default().extend(stored.iter().cloned());
        Ok(stored.into_iter().map(Value::Object).collect())
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<u64> {
        self.check(Operation::Update(table)).await?;
        let Value::Object(patch) = patch else {
            return Err(DataError::Remote("update patch must be a JSON object".into()));
        };
        let now = json!(Utc::now());
        let mut tables = self.tables.write().await;
        let mut count = 0;
        for row in tables.entry(table).or_default().iter_mut().filter(|r| matches(r, filters)) {
            row.extend(patch.clone());
            if row.contains_key("updated_at") { row.insert("updated_at".into(), now.clone()); }
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<u64> {
        self.check(Operation::Delete(table)).await?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(rows).into_iter().partition(|r| matches(r, filters));
        *rows = kept;
        let child = match table {
            Table::Products => Some((Table::ProductVariants, "product_id")),
            Table::Orders => Some((Table::OrderItems, "order_id")),
            _ => None,
        };
        if let Some((child, column)) = child {
            let ids: Vec<&Value> = removed.iter().filter_map(|r| r.get("id")).collect();
            tables.entry(child).or_default().retain(|r| !ids.contains(&r.get(column).unwrap_or(&Value::Null)));
        }
        Ok(removed.len() as u64)
    }

    async fn rpc(&self, function: &str) -> Result<Value> {
        self.check(Operation::Rpc).await?;
        if function != GENERATE_ORDER_NUMBER {
            return Err(DataError::Remote(format!("unknown function {function}")));
        }
        let next = self.order_seq.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        Ok(json!(format!("WO-{next:06}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_fills_defaults() {
        let db = MemoryDataService::new();
        let stored = db.insert(Table::Orders, vec![json!({"order_number": "WO-1", "total_amount": 4.5})]).await.unwrap();
        assert_eq!(stored[0]["status"], "submitted");
        assert!(stored[0]["id"].is_string());
        assert!(stored[0]["created_at"].is_string());
        assert_eq!(db.count(Table::Orders).await, 1);
    }

    #[tokio::test]
    async fn test_select_filters_and_orders() {
        let db = MemoryDataService::new();
        db.insert(Table::ProductVariants, vec![
            json!({"product_id": "p1", "name": "B", "sort_order": 2}),
            json!({"product_id": "p1", "name": "A", "sort_order": 1, "is_available": false}),
            json!({"product_id": "p2", "name": "C", "sort_order": 0}),
        ]).await.unwrap();

        let rows = db.select(&Select::from(Table::ProductVariants).eq("product_id", "p1").order_by("sort_order")).await.unwrap();
        assert_eq!(rows.iter().map(|r| r["name"].as_str().unwrap()).collect::<Vec<_>>(), vec!["A", "B"]);

        let rows = db.select(&Select::from(Table::ProductVariants).eq("is_available", true).order_by_desc("name")).await.unwrap();
        assert_eq!(rows.iter().map(|r| r["name"].as_str().unwrap()).collect::<Vec<_>>(), vec!["C", "B"]);
    }

    #[tokio::test]
    async fn test_update_and_cascade_delete() {
        let db = MemoryDataService::new();
        let product = db.insert(Table::Products, vec![json!({"name": "Widget"})]).await.unwrap().remove(0);
        db.insert(Table::ProductVariants, vec![json!({"product_id": product["id"], "name": "Red"})]).await.unwrap();

        let updated = db.update(Table::Products, &[Filter::eq("id", &product["id"])], json!({"is_available": false})).await.unwrap();
        assert_eq!(updated, 1);
        assert_eq!(db.rows(Table::Products).await[0]["is_available"], false);

        assert_eq!(db.delete(Table::Products, &[Filter::eq("id", &product["id"])]).await.unwrap(), 1);
        assert_eq!(db.count(Table::ProductVariants).await, 0);
    }

    #[tokio::test]
    async fn test_order_numbers_are_sequential() {
        let db = MemoryDataService::new();
        assert_eq!(db.rpc(GENERATE_ORDER_NUMBER).await.unwrap(), "WO-000001");
        assert_eq!(db.rpc(GENERATE_ORDER_NUMBER).await.unwrap(), "WO-000002");
        assert!(db.rpc("drop_everything").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let db = MemoryDataService::new();
        db.fail_on(Operation::Rpc).await;
        assert!(db.rpc(GENERATE_ORDER_NUMBER).await.is_err());
        db.recover(Operation::Rpc).await;
        assert!(db.rpc(GENERATE_ORDER_NUMBER).await.is_ok());
    }
}
