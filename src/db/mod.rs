//! SQLite database module for the congregation hierarchy
//!
//! ## Architecture
//!
//! - Diesel over SQLite, connections handed out by an r2d2 pool
//! - Every table carries `matrix_id`; repositories take a [`TenantContext`]
//! - Multi-statement writes use `BEGIN IMMEDIATE` so concurrent writers on
//!   the same key serialize on the database lock
//!
//! ## Tables
//!
//! - `congregations`, `networks`, `discipleships`, `cells` - the org hierarchy
//! - `congregation_kids_leaders`, `discipleship_disciples`,
//!   `cell_leaders_in_training`, `member_roles` - role edges
//! - `members`, `ministries`, `roles` - people and their ranks
//! - `reports`, `attendances` - meeting occurrences and who was present

pub mod attendance;
pub mod cells;
pub mod context;
pub mod diesel_schema;
pub mod members;
pub mod models;
pub mod org_graph;
pub mod organization;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use tracing::{debug, info};

use crate::error::ServiceError;
use diesel_schema::{cells as cells_table, congregations, members as members_table, reports};

pub use context::TenantContext;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Per-connection pragmas applied when the pool opens a connection
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    enable_wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
            .map_err(diesel::r2d2::Error::QueryError)?;
        if self.enable_wal {
            conn.batch_execute("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
                .map_err(diesel::r2d2::Error::QueryError)?;
        }
        Ok(())
    }
}

/// Pooled SQLite database
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open or create the database file and initialize the schema
    pub fn open(db_path: &Path, pool_size: u32) -> Result<Self, ServiceError> {
        info!("Opening SQLite database at {:?}", db_path);

        let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_customizer(Box::new(ConnectionOptions { enable_wal: true }))
            .build(manager)
            .map_err(|e| ServiceError::Pool(format!("Failed to build pool: {}", e)))?;

        let db = Self { pool };
        db.with_conn(schema::init_schema)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    ///
    /// The pool holds a single connection so every checkout sees the same data.
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        debug!("Opening in-memory SQLite database");

        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .connection_customizer(Box::new(ConnectionOptions { enable_wal: false }))
            .build(manager)
            .map_err(|e| ServiceError::Pool(format!("Failed to build in-memory pool: {}", e)))?;

        let db = Self { pool };
        db.with_conn(schema::init_schema)?;
        Ok(db)
    }

    fn conn(&self) -> Result<PooledConn, ServiceError> {
        self.pool
            .get()
            .map_err(|e| ServiceError::Pool(format!("Failed to get connection: {}", e)))
    }

    /// Run a read with a pooled connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, ServiceError>,
    {
        let mut pooled = self.conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        f(conn)
    }

    /// Run reads that must agree with each other inside one snapshot
    pub fn with_snapshot<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, ServiceError>,
    {
        let mut pooled = self.conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        conn.transaction(f)
    }

    /// Run a write atomically; any error rolls back every statement in `f`
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, ServiceError>,
    {
        let mut pooled = self.conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        conn.immediate_transaction(f)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, ServiceError> {
        self.with_conn(|conn| {
            let congregation_count: i64 = congregations::table
                .count()
                .get_result(conn)
                .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;
            let cell_count: i64 = cells_table::table
                .count()
                .get_result(conn)
                .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;
            let member_count: i64 = members_table::table
                .count()
                .get_result(conn)
                .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;
            let report_count: i64 = reports::table
                .count()
                .get_result(conn)
                .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

            Ok(DbStats {
                congregation_count: congregation_count as u64,
                cell_count: cell_count as u64,
                member_count: member_count as u64,
                report_count: report_count as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStats {
    pub congregation_count: u64,
    pub cell_count: u64,
    pub member_count: u64,
    pub report_count: u64,
}
