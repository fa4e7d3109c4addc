//! SQLite storage implementation for barline.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the [`CandleStore`](barline_core::CandleStore) trait defined in
//! `barline-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations
//! - The single-writer actor
//! - The candle repository and its Diesel model
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//!
//! ```text
//!   core (ingestion)
//!          │
//!          ▼
//!  storage-sqlite (this crate)
//!          │
//!          ▼
//!      SQLite DB
//! ```

pub mod candles;
pub mod db;
pub mod errors;
pub mod schema;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

pub use candles::CandleRepository;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from barline-core for convenience
pub use barline_core::errors::{DatabaseError, Error, Result};

use std::sync::Arc;

/// Opens (creating if needed) the database at `db_path`, applies pending
/// migrations and starts the writer. Must be called from within a Tokio
/// runtime.
pub fn open_candle_store(db_path: &str) -> Result<Arc<CandleRepository>> {
    let db_path = init(db_path)?;
    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer(pool.as_ref().clone());
    Ok(Arc::new(CandleRepository::new(pool, writer)))
}
