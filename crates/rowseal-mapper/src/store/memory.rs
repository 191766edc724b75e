//! # In-Memory Storage
//!
//! Process-local tables behind a `parking_lot::RwLock`. Transactions stage
//! their writes and apply them on commit; transactions are serialized
//! against each other by an async mutex, while autocommit executors write
//! through immediately.
//!
//! The `raw_*` and [`MemoryDatabase::tamper`] helpers bypass the mapper
//! entirely. They exist to simulate out-of-band modification of stored
//! rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rowseal_core::PrimaryKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Database, Executor, Transaction};
use crate::error::StoreError;
use crate::query::Query;
use crate::tuple::Tuple;

type Table = BTreeMap<PrimaryKey, Tuple>;
type Tables = BTreeMap<String, Table>;

/// Shared in-memory database. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryDatabase {
    /// Empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a stored row without verification.
    pub fn raw_get(&self, table: &str, pk: &PrimaryKey) -> Option<Tuple> {
        self.tables.read().get(table).and_then(|t| t.get(pk)).cloned()
    }

    /// Store a row verbatim, replacing any existing one.
    pub fn raw_put(&self, table: &str, tuple: Tuple) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(tuple.pk.clone(), tuple);
    }

    /// Modify a stored row in place. Returns false if it does not exist.
    pub fn tamper(&self, table: &str, pk: &PrimaryKey, f: impl FnOnce(&mut Tuple)) -> bool {
        match self.tables.write().get_mut(table).and_then(|t| t.get_mut(pk)) {
            Some(tuple) => {
                f(tuple);
                true
            }
            None => false,
        }
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }
}

fn select(tables: &Tables, table: &str, query: &Query) -> Vec<Tuple> {
    tables
        .get(table)
        .map(|t| t.values().filter(|row| query.matches(&row.payload)).cloned().collect())
        .unwrap_or_default()
}

/// Autocommit executor.
#[derive(Debug)]
pub struct MemoryExecutor {
    db: MemoryDatabase,
}

#[async_trait]
impl Executor for MemoryExecutor {
    async fn fetch_one(&mut self, table: &str, pk: &PrimaryKey) -> Result<Option<Tuple>, StoreError> {
        Ok(self.db.raw_get(table, pk))
    }

    async fn fetch_all(&mut self, table: &str, query: &Query) -> Result<Vec<Tuple>, StoreError> {
        Ok(select(&self.db.tables.read(), table, query))
    }

    async fn insert(&mut self, table: &str, tuple: &Tuple) -> Result<(), StoreError> {
        let mut tables = self.db.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&tuple.pk) {
            return Err(StoreError::Conflict {
                table: table.to_string(),
                key: tuple.pk.clone(),
            });
        }
        rows.insert(tuple.pk.clone(), tuple.clone());
        Ok(())
    }

    async fn update(&mut self, table: &str, tuple: &Tuple) -> Result<bool, StoreError> {
        let mut tables = self.db.tables.write();
        match tables.get_mut(table).and_then(|t| t.get_mut(&tuple.pk)) {
            Some(row) => {
                *row = tuple.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&mut self, table: &str, pk: &PrimaryKey) -> Result<bool, StoreError> {
        let mut tables = self.db.tables.write();
        Ok(tables.get_mut(table).and_then(|t| t.remove(pk)).is_some())
    }
}

/// Staged transaction. Writes are applied on commit, discarded on drop.
#[derive(Debug)]
pub struct MemoryTransaction {
    db: MemoryDatabase,
    /// `None` marks a staged deletion.
    staged: BTreeMap<(String, PrimaryKey), Option<Tuple>>,
    _guard: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    fn visible(&self, table: &str, pk: &PrimaryKey) -> Option<Tuple> {
        match self.staged.get(&(table.to_string(), pk.clone())) {
            Some(staged) => staged.clone(),
            None => self.db.raw_get(table, pk),
        }
    }
}

#[async_trait]
impl Executor for MemoryTransaction {
    async fn fetch_one(&mut self, table: &str, pk: &PrimaryKey) -> Result<Option<Tuple>, StoreError> {
        Ok(self.visible(table, pk))
    }

    async fn fetch_all(&mut self, table: &str, query: &Query) -> Result<Vec<Tuple>, StoreError> {
        let mut rows: BTreeMap<PrimaryKey, Tuple> = select(&self.db.tables.read(), table, &Query::all())
            .into_iter()
            .map(|t| (t.pk.clone(), t))
            .collect();
        for ((staged_table, pk), staged) in &self.staged {
            if staged_table != table {
                continue;
            }
            match staged {
                Some(tuple) => rows.insert(pk.clone(), tuple.clone()),
                None => rows.remove(pk),
            };
        }
        Ok(rows
            .into_values()
            .filter(|row| query.matches(&row.payload))
            .collect())
    }

    async fn insert(&mut self, table: &str, tuple: &Tuple) -> Result<(), StoreError> {
        if self.visible(table, &tuple.pk).is_some() {
            return Err(StoreError::Conflict {
                table: table.to_string(),
                key: tuple.pk.clone(),
            });
        }
        self.staged
            .insert((table.to_string(), tuple.pk.clone()), Some(tuple.clone()));
        Ok(())
    }

    async fn update(&mut self, table: &str, tuple: &Tuple) -> Result<bool, StoreError> {
        if self.visible(table, &tuple.pk).is_none() {
            return Ok(false);
        }
        self.staged
            .insert((table.to_string(), tuple.pk.clone()), Some(tuple.clone()));
        Ok(true)
    }

    async fn delete(&mut self, table: &str, pk: &PrimaryKey) -> Result<bool, StoreError> {
        if self.visible(table, pk).is_none() {
            return Ok(false);
        }
        self.staged.insert((table.to_string(), pk.clone()), None);
        Ok(true)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut tables = this.db.tables.write();
        for ((table, pk), staged) in this.staged {
            let rows = tables.entry(table).or_default();
            match staged {
                Some(tuple) => rows.insert(pk, tuple),
                None => rows.remove(&pk),
            };
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            db: self.clone(),
            staged: BTreeMap::new(),
            _guard: guard,
        }))
    }

    async fn acquire(&self) -> Result<Box<dyn Executor>, StoreError> {
        Ok(Box::new(MemoryExecutor { db: self.clone() }))
    }

    async fn ensure_table(&self, table: &str) -> Result<(), StoreError> {
        self.tables.write().entry(table.to_string()).or_default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tuple(pk: &str, name: &str) -> Tuple {
        Tuple {
            pk: PrimaryKey::from(pk),
            payload: json!({"id": pk, "name": name}).as_object().cloned().unwrap(),
            signature: None,
        }
    }

    #[tokio::test]
    async fn test_autocommit_crud() {
        let db = MemoryDatabase::new();
        let mut exec = db.acquire().await.unwrap();
        exec.insert("t", &tuple("a", "x")).await.unwrap();
        assert!(matches!(
            exec.insert("t", &tuple("a", "y")).await,
            Err(StoreError::Conflict { .. })
        ));
        assert!(exec.update("t", &tuple("a", "z")).await.unwrap());
        assert!(!exec.update("t", &tuple("b", "z")).await.unwrap());
        let row = exec.fetch_one("t", &PrimaryKey::from("a")).await.unwrap().unwrap();
        assert_eq!(row.payload["name"], "z");
        assert!(exec.delete("t", &PrimaryKey::from("a")).await.unwrap());
        assert!(!exec.delete("t", &PrimaryKey::from("a")).await.unwrap());
        assert_eq!(db.row_count("t"), 0);
    }

    #[tokio::test]
    async fn test_fetch_all_filters_and_orders() {
        let db = MemoryDatabase::new();
        let mut exec = db.acquire().await.unwrap();
        for (pk, name) in [("c", "x"), ("a", "x"), ("b", "y")] {
            exec.insert("t", &tuple(pk, name)).await.unwrap();
        }
        let rows = exec.fetch_all("t", &Query::all().eq("name", "x")).await.unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.pk.as_str()).collect();
        assert_eq!(keys, ["a", "c"]);
        assert!(exec.fetch_all("missing", &Query::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_commit_applies() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        tx.insert("t", &tuple("a", "x")).await.unwrap();
        assert!(tx.fetch_one("t", &PrimaryKey::from("a")).await.unwrap().is_some());
        assert_eq!(tx.fetch_all("t", &Query::all()).await.unwrap().len(), 1);
        assert_eq!(db.row_count("t"), 0);
        tx.commit().await.unwrap();
        assert_eq!(db.row_count("t"), 1);
    }

    #[tokio::test]
    async fn test_transaction_drop_discards() {
        let db = MemoryDatabase::new();
        db.raw_put("t", tuple("a", "x"));
        {
            let mut tx = db.begin().await.unwrap();
            assert!(tx.delete("t", &PrimaryKey::from("a")).await.unwrap());
            assert!(tx.fetch_all("t", &Query::all()).await.unwrap().is_empty());
        }
        assert_eq!(db.row_count("t"), 1);

        let mut tx = db.begin().await.unwrap();
        tx.update("t", &tuple("a", "y")).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(db.raw_get("t", &PrimaryKey::from("a")).unwrap().payload["name"], "x");
    }

    #[tokio::test]
    async fn test_tamper() {
        let db = MemoryDatabase::new();
        db.raw_put("t", tuple("a", "x"));
        assert!(db.tamper("t", &PrimaryKey::from("a"), |t| {
            t.payload.insert("name".into(), json!("evil"));
        }));
        assert!(!db.tamper("t", &PrimaryKey::from("b"), |_| {}));
        assert_eq!(db.raw_get("t", &PrimaryKey::from("a")).unwrap().payload["name"], "evil");
    }
}
