//! The tick feed: per-instrument tick stores, time-merged iteration, CSV ingestion, and
//! tick filters.

pub mod error;
pub mod filter;
pub mod memory;
pub mod series;
pub mod text;

pub use error::FeedError;
pub use memory::{MemoryTickFeed, NewTicksEvent};
pub use series::TickDataSeries;
pub use text::{load_instruments_into_feed, load_ticks_from_path, TextFeedConfig, DEFAULT_DATETIME_FORMAT};
