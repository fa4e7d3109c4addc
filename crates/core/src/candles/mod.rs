//! Candle ingestion module.
//!
//! - [`model`] - Gaps, reports and the service state
//! - [`gaps`] - Pure gap computation over sorted open times
//! - [`store`] - Storage trait implemented by the SQLite crate
//! - [`locks`] - Per-range exclusive locks
//! - [`policy`] - Backfill/retention policy and the clock
//! - [`repair_queue`] - Day-window repair scheduling
//! - [`service`] - The ingestion service
//!
//! ```text
//! IngestionService → CandleProvider → market-data crate (OKX)
//!       ↓
//! CandleStore (DB)
//! ```

pub mod gaps;
pub mod locks;
pub mod model;
pub mod policy;
pub mod repair_queue;
pub mod service;
pub mod store;


pub use gaps::find_gaps;
pub use locks::{RangeGuard, RangeLocks};
pub use model::{FetchReport, Gap, IngestionState, RepairReport, Tier};
pub use policy::{Clock, IngestionPolicy, SystemClock};
pub use repair_queue::{day_windows, DayWindow, RepairQueue};
pub use service::IngestionService;
pub use store::CandleStore;
