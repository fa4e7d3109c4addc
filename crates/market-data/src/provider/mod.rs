//! Candle provider abstraction and implementations.
//!
//! This module contains:
//! - The `CandleProvider` trait the ingestion service depends on
//! - Provider capabilities and per-tier rate limits
//! - The OKX public REST implementation

mod capabilities;
mod traits;

pub mod okx;

pub use capabilities::{ProviderCapabilities, TierLimits};
pub use traits::CandleProvider;
