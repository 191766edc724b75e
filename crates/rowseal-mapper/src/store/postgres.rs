//! # PostgreSQL Storage
//!
//! One table per entity type:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS <table> (
//!     pk        TEXT PRIMARY KEY,
//!     payload   JSONB NOT NULL,
//!     signature TEXT
//! );
//! ```
//!
//! Queries filter with JSONB containment (`payload @> $1`). Table names
//! come from validated descriptors and are plain identifiers; they are
//! still quoted when interpolated.

use async_trait::async_trait;
use rowseal_core::PrimaryKey;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres};

use super::{Database, Executor, Transaction};
use crate::descriptor::is_plain_identifier;
use crate::error::StoreError;
use crate::query::Query;
use crate::tuple::Tuple;

/// PostgreSQL-backed database.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to `url` with a small pool.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct TupleRow {
    pk: String,
    payload: serde_json::Value,
    signature: Option<String>,
}

impl TupleRow {
    fn into_tuple(self, table: &str) -> Result<Tuple, StoreError> {
        match self.payload {
            serde_json::Value::Object(payload) => Ok(Tuple {
                pk: PrimaryKey::new(self.pk),
                payload,
                signature: self.signature,
            }),
            _ => Err(StoreError::Corrupt {
                table: table.to_string(),
                key: self.pk,
                reason: "payload is not a JSON object".into(),
            }),
        }
    }
}

fn quoted(table: &str) -> Result<String, StoreError> {
    if !is_plain_identifier(table) {
        return Err(StoreError::Corrupt {
            table: table.to_string(),
            key: String::new(),
            reason: "table name is not a plain identifier".into(),
        });
    }
    Ok(format!("\"{table}\""))
}

async fn fetch_one(
    conn: &mut PgConnection,
    table: &str,
    pk: &PrimaryKey,
    lock: bool,
) -> Result<Option<Tuple>, StoreError> {
    let sql = format!(
        "SELECT pk, payload, signature FROM {} WHERE pk = $1{}",
        quoted(table)?,
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, TupleRow>(&sql)
        .bind(pk.as_str())
        .fetch_optional(conn)
        .await?;
    row.map(|r| r.into_tuple(table)).transpose()
}

async fn fetch_all(conn: &mut PgConnection, table: &str, query: &Query) -> Result<Vec<Tuple>, StoreError> {
    let sql = format!(
        "SELECT pk, payload, signature FROM {} WHERE payload @> $1 ORDER BY pk",
        quoted(table)?
    );
    let rows = sqlx::query_as::<_, TupleRow>(&sql)
        .bind(query.as_containment())
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(|r| r.into_tuple(table)).collect()
}

async fn insert(conn: &mut PgConnection, table: &str, tuple: &Tuple) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT INTO {} (pk, payload, signature) VALUES ($1, $2, $3)",
        quoted(table)?
    );
    let result = sqlx::query(&sql)
        .bind(tuple.pk.as_str())
        .bind(serde_json::Value::Object(tuple.payload.clone()))
        .bind(tuple.signature.as_deref())
        .execute(conn)
        .await;
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => Err(StoreError::Conflict {
            table: table.to_string(),
            key: tuple.pk.clone(),
        }),
        Err(e) => Err(e.into()),
    }
}

async fn update(conn: &mut PgConnection, table: &str, tuple: &Tuple) -> Result<bool, StoreError> {
    let sql = format!(
        "UPDATE {} SET payload = $2, signature = $3 WHERE pk = $1",
        quoted(table)?
    );
    let result = sqlx::query(&sql)
        .bind(tuple.pk.as_str())
        .bind(serde_json::Value::Object(tuple.payload.clone()))
        .bind(tuple.signature.as_deref())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn delete(conn: &mut PgConnection, table: &str, pk: &PrimaryKey) -> Result<bool, StoreError> {
    let sql = format!("DELETE FROM {} WHERE pk = $1", quoted(table)?);
    let result = sqlx::query(&sql).bind(pk.as_str()).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Autocommit executor on a pooled connection.
pub struct PgExecutor {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl Executor for PgExecutor {
    async fn fetch_one(&mut self, table: &str, pk: &PrimaryKey) -> Result<Option<Tuple>, StoreError> {
        fetch_one(&mut self.conn, table, pk, false).await
    }

    async fn fetch_all(&mut self, table: &str, query: &Query) -> Result<Vec<Tuple>, StoreError> {
        fetch_all(&mut self.conn, table, query).await
    }

    async fn insert(&mut self, table: &str, tuple: &Tuple) -> Result<(), StoreError> {
        insert(&mut self.conn, table, tuple).await
    }

    async fn update(&mut self, table: &str, tuple: &Tuple) -> Result<bool, StoreError> {
        update(&mut self.conn, table, tuple).await
    }

    async fn delete(&mut self, table: &str, pk: &PrimaryKey) -> Result<bool, StoreError> {
        delete(&mut self.conn, table, pk).await
    }
}

/// Open PostgreSQL transaction. Rolled back by sqlx if dropped.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Executor for PgTransaction {
    async fn fetch_one(&mut self, table: &str, pk: &PrimaryKey) -> Result<Option<Tuple>, StoreError> {
        fetch_one(&mut self.tx, table, pk, false).await
    }

    async fn fetch_for_update(&mut self, table: &str, pk: &PrimaryKey) -> Result<Option<Tuple>, StoreError> {
        fetch_one(&mut self.tx, table, pk, true).await
    }

    async fn fetch_all(&mut self, table: &str, query: &Query) -> Result<Vec<Tuple>, StoreError> {
        fetch_all(&mut self.tx, table, query).await
    }

    async fn insert(&mut self, table: &str, tuple: &Tuple) -> Result<(), StoreError> {
        insert(&mut self.tx, table, tuple).await
    }

    async fn update(&mut self, table: &str, tuple: &Tuple) -> Result<bool, StoreError> {
        update(&mut self.tx, table, tuple).await
    }

    async fn delete(&mut self, table: &str, pk: &PrimaryKey) -> Result<bool, StoreError> {
        delete(&mut self.tx, table, pk).await
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn acquire(&self) -> Result<Box<dyn Executor>, StoreError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgExecutor { conn }))
    }

    async fn ensure_table(&self, table: &str) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (pk TEXT PRIMARY KEY, payload JSONB NOT NULL, signature TEXT)",
            quoted(table)?
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        tracing::debug!(table, "table ensured");
        Ok(())
    }
}
