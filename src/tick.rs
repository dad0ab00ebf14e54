//! Quote ticks and the per-timestamp batches the feed emits.

use std::collections::HashMap;
use std::collections::hash_map::{Iter, Keys};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Instruments are identified by an exchange-agnostic symbol string.
pub type Instrument = String;

/// Coarse time resolution a [`Tick`] was sampled at.
///
/// `Trade` marks an individual trade print; everything from `Day` upward marks an
/// end-of-period aggregate. The fill strategy and broker both branch on this to decide
/// whether volume rationing and slippage apply.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Frequency {
    Trade,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl Frequency {
    /// True for any resolution finer than a full trading day.
    pub fn is_intraday(self) -> bool {
        self < Frequency::Day
    }
}

/// A single top-of-book quote for one instrument at one instant.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tick {
    datetime: DateTime<Utc>,
    bid: Decimal,
    ask: Decimal,
    frequency: Frequency,
}

impl Tick {
    pub fn new(datetime: DateTime<Utc>, bid: Decimal, ask: Decimal, frequency: Frequency) -> Self {
        Self {
            datetime,
            bid,
            ask,
            frequency,
        }
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    pub fn bid(&self) -> Decimal {
        self.bid
    }

    pub fn ask(&self) -> Decimal {
        self.ask
    }

    /// This engine's reference price for an instrument is its bid.
    pub fn price(&self) -> Decimal {
        self.bid
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }
}

#[derive(Debug, Error, Copy, Clone)]
pub enum TicksError {
    #[error("cannot build a Ticks batch from an empty set of ticks")]
    EmptyBatch,
    #[error("all ticks in a Ticks batch must share the same datetime")]
    TimestampMismatch,
}

/// All ticks sharing a single `datetime`, keyed by instrument.
///
/// Construction enforces that the batch is non-empty and internally consistent: every
/// contained [`Tick`] carries the same `datetime` as the batch itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticks {
    datetime: DateTime<Utc>,
    ticks: HashMap<Instrument, Tick>,
}

impl Ticks {
    pub fn new(ticks: HashMap<Instrument, Tick>) -> Result<Self, TicksError> {
        let mut iter = ticks.values();
        let datetime = iter.next().ok_or(TicksError::EmptyBatch)?.datetime();

        if iter.any(|tick| tick.datetime() != datetime) {
            return Err(TicksError::TimestampMismatch);
        }

        Ok(Self { datetime, ticks })
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    pub fn get(&self, instrument: &str) -> Option<&Tick> {
        self.ticks.get(instrument)
    }

    pub fn contains(&self, instrument: &str) -> bool {
        self.ticks.contains_key(instrument)
    }

    pub fn instruments(&self) -> Keys<'_, Instrument, Tick> {
        self.ticks.keys()
    }

    pub fn iter(&self) -> Iter<'_, Instrument, Tick> {
        self.ticks.iter()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dt(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn should_reject_empty_batch() {
        assert!(matches!(
            Ticks::new(HashMap::new()),
            Err(TicksError::EmptyBatch)
        ));
    }

    #[test]
    fn should_reject_mismatched_timestamps() {
        let mut map = HashMap::new();
        map.insert(
            "AAA".to_string(),
            Tick::new(dt("2024-01-01T00:00:00Z"), dec!(1.0), dec!(1.1), Frequency::Trade),
        );
        map.insert(
            "BBB".to_string(),
            Tick::new(dt("2024-01-01T00:00:01Z"), dec!(2.0), dec!(2.1), Frequency::Trade),
        );

        assert!(matches!(
            Ticks::new(map),
            Err(TicksError::TimestampMismatch)
        ));
    }

    #[test]
    fn should_build_consistent_batch() {
        let mut map = HashMap::new();
        map.insert(
            "AAA".to_string(),
            Tick::new(dt("2024-01-01T00:00:00Z"), dec!(1.0), dec!(1.1), Frequency::Trade),
        );

        let ticks = Ticks::new(map).unwrap();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks.get("AAA").unwrap().price(), dec!(1.0));
    }

    #[test]
    fn tick_price_is_bid() {
        let tick = Tick::new(dt("2024-01-01T00:00:00Z"), dec!(10.0), dec!(10.5), Frequency::Minute);
        assert_eq!(tick.price(), tick.bid());
    }

    #[test]
    fn day_frequency_is_not_intraday() {
        assert!(!Frequency::Day.is_intraday());
        assert!(Frequency::Minute.is_intraday());
    }
}
