//! Bounded lookback buffer for a single registered instrument.
//!
//! Supplements the in-memory feed: a strategy that wants a fixed window of recent
//! bid/ask history without re-querying the feed can read straight off the series that
//! `MemoryTickFeed::register_instrument` maintains.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::tick::Tick;

#[derive(Debug, Clone)]
pub struct TickDataSeries {
    max_len: usize,
    bids: VecDeque<Decimal>,
    asks: VecDeque<Decimal>,
}

impl TickDataSeries {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            bids: VecDeque::with_capacity(max_len.min(1024)),
            asks: VecDeque::with_capacity(max_len.min(1024)),
        }
    }

    pub fn append(&mut self, tick: &Tick) {
        if self.max_len > 0 {
            if self.bids.len() == self.max_len {
                self.bids.pop_front();
                self.asks.pop_front();
            }
            self.bids.push_back(tick.bid());
            self.asks.push_back(tick.ask());
        }
    }

    pub fn bids(&self) -> &VecDeque<Decimal> {
        &self.bids
    }

    pub fn asks(&self) -> &VecDeque<Decimal> {
        &self.asks
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::Frequency;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn should_cap_at_max_len() {
        let mut series = TickDataSeries::new(2);
        for bid in [dec!(1.0), dec!(2.0), dec!(3.0)] {
            series.append(&Tick::new(Utc::now(), bid, bid + dec!(0.1), Frequency::Trade));
        }
        assert_eq!(
            series.bids().iter().copied().collect::<Vec<_>>(),
            vec![dec!(2.0), dec!(3.0)]
        );
    }
}
