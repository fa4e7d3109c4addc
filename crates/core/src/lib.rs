//! Barline Core - Candle ingestion domain, services, and traits.
//!
//! This crate contains the ingestion and repair logic. It is
//! database-agnostic and defines the `CandleStore` trait implemented by the
//! `storage-sqlite` crate.

pub mod candles;
pub mod errors;

pub use candles::*;

// Re-export error types
pub use errors::{DatabaseError, Error, ErrorKind, Result};
