//! # tickbacktest
//!
//! An event-driven backtesting engine for tick-level trading strategies. A
//! [`feed::MemoryTickFeed`] merges per-instrument bid/ask tick series into one
//! monotonically time-ordered stream. A [`broker::Broker`] models order acceptance,
//! expiry, fills (market, limit, stop, stop-limit), partial fills under per-tick volume
//! caps, commissions, and cash/position bookkeeping. A [`dispatcher::Dispatcher`] steps
//! the feed forward one tick batch at a time, always letting the broker react to a batch
//! before the strategy sees it — the ordering guarantee that makes a backtest
//! reproducible.
//!
//! ## Getting started
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use rust_decimal_macros::dec;
//! use tickbacktest::broker::Broker;
//! use tickbacktest::engine::Engine;
//! use tickbacktest::feed::MemoryTickFeed;
//! use tickbacktest::strategy::{Strategy, StrategyContext};
//! use tickbacktest::tick::{Frequency, Tick, Ticks};
//!
//! struct BuyAndHold {
//!     bought: bool,
//! }
//!
//! impl Strategy for BuyAndHold {
//!     fn on_ticks(&mut self, ctx: &mut StrategyContext, ticks: &Ticks) {
//!         if !self.bought && ticks.contains("AAPL") {
//!             ctx.enter_long("AAPL", dec!(10.0), ticks.datetime()).ok();
//!             self.bought = true;
//!         }
//!     }
//! }
//!
//! let mut feed = MemoryTickFeed::new(Frequency::Trade);
//! feed.add_ticks(
//!     "AAPL",
//!     vec![Tick::new(Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap(), dec!(190.0), dec!(190.1), Frequency::Trade)],
//! )
//! .unwrap();
//!
//! let broker = Broker::builder()
//!     .starting_cash(dec!(10_000.0))
//!     .feed_frequency(Frequency::Trade)
//!     .build()
//!     .unwrap();
//!
//! let mut engine = Engine::new(feed, broker, BuyAndHold { bought: false });
//! let summary = engine.run().unwrap();
//! assert_eq!(summary.steps, 1);
//! ```
//!
//! ## Layout
//!
//! * [`tick`] — the immutable [`tick::Tick`] value and the [`tick::Ticks`] batch the feed
//!   dispatches one timestamp at a time.
//! * [`instrument`] — per-instrument quantity rounding.
//! * [`event`] — the typed publish/subscribe primitive every subject uses to advertise
//!   its events, without an implicit global bus.
//! * [`feed`] — the in-memory tick multiplexer, a CSV loader, and tick filters.
//! * [`fill_strategy`] — the default per-order-kind fill-price and fill-size policy.
//! * [`slippage`] — the pluggable price-adjustment seam the fill strategy calls through.
//! * [`order`] — the order state machine, modeled as a tagged union over kind.
//! * [`commission`] — pluggable commission models the broker charges on each fill.
//! * [`broker`] — the cash/position ledger, order routing, and expiry.
//! * [`dispatcher`] — deterministic, single-threaded stepping across registered subjects.
//! * [`engine`] — wires a feed, a broker, and a strategy together and runs them to
//!   completion.
//! * [`strategy`] — the callbacks a strategy implements, plus order-helper
//!   constructors and position tracking.

#![warn(missing_copy_implementations)]

pub mod broker;
pub mod commission;
pub mod dispatcher;
pub mod engine;
pub mod event;
pub mod feed;
pub mod fill_strategy;
pub mod instrument;
pub mod order;
pub mod slippage;
pub mod strategy;
pub mod tick;
