//! In-memory, multi-instrument tick feed: the engine's tick multiplexer.
//!
//! Per-instrument tick sequences are merged into a single, strictly time-ordered stream.
//! All ticks sharing a timestamp are dispatched together as one [`Ticks`] batch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::event::EventBus;
use crate::feed::error::FeedError;
use crate::feed::series::TickDataSeries;
use crate::tick::{Frequency, Instrument, Tick, Ticks};

/// Emitted on the feed's own event bus every time a new batch is dispatched.
#[derive(Debug, Clone)]
pub struct NewTicksEvent(pub Ticks);

pub struct MemoryTickFeed {
    frequency: Frequency,
    ticks: HashMap<Instrument, Vec<Tick>>,
    cursor: HashMap<Instrument, usize>,
    last_tick: HashMap<Instrument, Tick>,
    series: HashMap<Instrument, TickDataSeries>,
    default_instrument: Option<Instrument>,
    series_max_len: usize,
    current_datetime: Option<DateTime<Utc>>,
    started: bool,
    new_ticks: EventBus<NewTicksEvent>,
}

impl MemoryTickFeed {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            ticks: HashMap::new(),
            cursor: HashMap::new(),
            last_tick: HashMap::new(),
            series: HashMap::new(),
            default_instrument: None,
            series_max_len: 0,
            current_datetime: None,
            started: false,
            new_ticks: EventBus::new(),
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn is_intraday(&self) -> bool {
        self.frequency.is_intraday()
    }

    /// Registers an instrument so a bounded [`TickDataSeries`] accumulates its history,
    /// and records it as the feed's default instrument.
    pub fn register_instrument(&mut self, instrument: &str, max_len: usize) {
        self.default_instrument = Some(instrument.to_string());
        self.series_max_len = max_len;
        self.series
            .entry(instrument.to_string())
            .or_insert_with(|| TickDataSeries::new(max_len));
    }

    pub fn data_series(&self, instrument: &str) -> Option<&TickDataSeries> {
        self.series.get(instrument)
    }

    pub fn default_instrument(&self) -> Option<&str> {
        self.default_instrument.as_deref()
    }

    /// Extends an instrument's tick sequence, keeping it sorted by datetime. Fails once
    /// the feed has started iterating (`next_ticks` has been called at least once).
    pub fn add_ticks(&mut self, instrument: &str, new_ticks: Vec<Tick>) -> Result<(), FeedError> {
        if self.started {
            return Err(FeedError::FeedLocked);
        }

        let entry = self.ticks.entry(instrument.to_string()).or_default();
        entry.extend(new_ticks);
        entry.sort_by_key(|tick| tick.datetime());
        self.cursor.entry(instrument.to_string()).or_insert(0);
        Ok(())
    }

    pub fn last_tick(&self, instrument: &str) -> Option<Tick> {
        self.last_tick.get(instrument).copied()
    }

    pub fn subscribe_new_ticks<F>(&mut self, callback: F)
    where
        F: FnMut(&NewTicksEvent) + 'static,
    {
        self.new_ticks.subscribe(callback);
    }

    /// The smallest not-yet-emitted timestamp across all instruments, or `None` if every
    /// instrument's sequence is exhausted.
    pub fn peek_datetime(&self) -> Option<DateTime<Utc>> {
        self.ticks
            .iter()
            .filter_map(|(instrument, sequence)| {
                let cursor = *self.cursor.get(instrument).unwrap_or(&0);
                sequence.get(cursor).map(Tick::datetime)
            })
            .min()
    }

    pub fn eof(&self) -> bool {
        self.ticks.iter().all(|(instrument, sequence)| {
            self.cursor.get(instrument).copied().unwrap_or(0) >= sequence.len()
        })
    }

    /// Collects every instrument's tick at `peek_datetime()`, advances those cursors, and
    /// emits the resulting batch on the feed's bus.
    pub fn next_ticks(&mut self) -> Result<Option<Ticks>, FeedError> {
        self.started = true;

        let Some(smallest) = self.peek_datetime() else {
            return Ok(None);
        };

        if self.current_datetime == Some(smallest) {
            return Err(FeedError::DuplicateTimestamp(smallest));
        }

        let mut batch = HashMap::new();
        for (instrument, sequence) in &self.ticks {
            let cursor = self.cursor.entry(instrument.clone()).or_insert(0);
            if let Some(tick) = sequence.get(*cursor) {
                if tick.datetime() == smallest {
                    batch.insert(instrument.clone(), *tick);
                    *cursor += 1;
                }
            }
        }

        let ticks = Ticks::new(batch)?;
        self.current_datetime = Some(smallest);

        for (instrument, tick) in ticks.iter() {
            self.last_tick.insert(instrument.clone(), *tick);
            if let Some(series) = self.series.get_mut(instrument) {
                series.append(tick);
            }
        }

        self.new_ticks.emit(&NewTicksEvent(ticks.clone()));
        Ok(Some(ticks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn dt(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn should_merge_instruments_in_time_order() {
        let mut feed = MemoryTickFeed::new(Frequency::Minute);
        feed.add_ticks(
            "AAA",
            vec![
                Tick::new(dt(1), dec!(10.0), dec!(10.1), Frequency::Minute),
                Tick::new(dt(3), dec!(12.0), dec!(12.1), Frequency::Minute),
            ],
        )
        .unwrap();
        feed.add_ticks(
            "BBB",
            vec![Tick::new(dt(2), dec!(20.0), dec!(20.1), Frequency::Minute)],
        )
        .unwrap();

        let first = feed.next_ticks().unwrap().unwrap();
        assert_eq!(first.datetime(), dt(1));
        assert!(first.contains("AAA"));
        assert!(!first.contains("BBB"));

        let second = feed.next_ticks().unwrap().unwrap();
        assert_eq!(second.datetime(), dt(2));
        assert!(second.contains("BBB"));

        let third = feed.next_ticks().unwrap().unwrap();
        assert_eq!(third.datetime(), dt(3));
        assert!(third.contains("AAA"));

        assert!(feed.eof());
        assert!(feed.next_ticks().unwrap().is_none());
    }

    #[test]
    fn should_lock_after_first_next_ticks() {
        let mut feed = MemoryTickFeed::new(Frequency::Minute);
        feed.add_ticks("AAA", vec![Tick::new(dt(1), dec!(10.0), dec!(10.1), Frequency::Minute)])
            .unwrap();
        feed.next_ticks().unwrap();

        assert!(matches!(
            feed.add_ticks("AAA", vec![Tick::new(dt(2), dec!(10.0), dec!(10.1), Frequency::Minute)]),
            Err(FeedError::FeedLocked)
        ));
    }
}
