//! # Storage Contract
//!
//! The mapper reads and writes [`Tuple`]s through three traits:
//!
//! - [`Executor`]: row operations on one connection or transaction.
//! - [`Transaction`]: an executor whose writes become visible on commit.
//! - [`Database`]: hands out executors and transactions.
//!
//! DAO operations take any `Executor` and open no transaction themselves;
//! the caller decides the boundary. The roll workflow is the exception: it
//! begins its own transaction on a [`Database`].

use async_trait::async_trait;
use rowseal_core::PrimaryKey;

use crate::error::StoreError;
use crate::query::Query;
use crate::tuple::Tuple;

pub mod memory;
pub mod postgres;

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;

/// Row operations on a single table.
#[async_trait]
pub trait Executor: Send {
    /// Fetch a row by primary key.
    async fn fetch_one(&mut self, table: &str, pk: &PrimaryKey) -> Result<Option<Tuple>, StoreError>;

    /// Fetch a row by primary key and lock it until the transaction ends.
    async fn fetch_for_update(&mut self, table: &str, pk: &PrimaryKey) -> Result<Option<Tuple>, StoreError> {
        self.fetch_one(table, pk).await
    }

    /// Fetch every row matching `query`, in primary-key order.
    async fn fetch_all(&mut self, table: &str, query: &Query) -> Result<Vec<Tuple>, StoreError>;

    /// Insert a new row. Fails with [`StoreError::Conflict`] if the key exists.
    async fn insert(&mut self, table: &str, tuple: &Tuple) -> Result<(), StoreError>;

    /// Replace an existing row. Returns false if no row has this key.
    async fn update(&mut self, table: &str, tuple: &Tuple) -> Result<bool, StoreError>;

    /// Delete a row. Returns false if no row has this key.
    async fn delete(&mut self, table: &str, pk: &PrimaryKey) -> Result<bool, StoreError>;
}

/// An executor whose writes are applied atomically on commit.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait Transaction: Executor {
    /// Apply every write.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Source of executors and transactions.
#[async_trait]
pub trait Database: Send + Sync {
    /// Begin a transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Acquire an autocommit executor.
    async fn acquire(&self) -> Result<Box<dyn Executor>, StoreError>;

    /// Create the table of an entity type if it does not exist.
    async fn ensure_table(&self, table: &str) -> Result<(), StoreError>;
}
