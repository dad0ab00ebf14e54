//! Drives a tiny feed through a full engine run: a buy-and-hold strategy against a
//! two-tick feed, checking the resulting ledger and position end to end.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tickbacktest::broker::Broker;
use tickbacktest::engine::Engine;
use tickbacktest::feed::MemoryTickFeed;
use tickbacktest::strategy::{PositionHandle, Strategy, StrategyContext};
use tickbacktest::tick::{Frequency, Tick, Ticks};

struct BuyAndHold {
    entered: bool,
    exited: bool,
    position: Option<PositionHandle>,
}

impl Strategy for BuyAndHold {
    fn on_ticks(&mut self, ctx: &mut StrategyContext, ticks: &Ticks) {
        if !self.entered && ticks.contains("AAA") {
            self.position = ctx.enter_long("AAA", dec!(10.0), ticks.datetime()).ok();
            self.entered = true;
        }
    }

    fn on_enter_ok(&mut self, ctx: &mut StrategyContext, position: &PositionHandle) {
        let mut position = position.clone();
        ctx.exit_position(&mut position, dec!(10.0), Utc::now()).ok();
        self.position = Some(position);
    }

    fn on_exit_ok(&mut self, _ctx: &mut StrategyContext, _position: &PositionHandle) {
        self.exited = true;
    }
}

fn dt(hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
}

#[test]
fn buy_and_hold_enters_then_exits_across_three_ticks() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut feed = MemoryTickFeed::new(Frequency::Trade);
    feed.add_ticks(
        "AAA",
        vec![
            Tick::new(dt(9), dec!(10.0), dec!(10.1), Frequency::Trade),
            Tick::new(dt(10), dec!(10.5), dec!(10.6), Frequency::Trade),
            Tick::new(dt(11), dec!(11.0), dec!(11.1), Frequency::Trade),
        ],
    )
    .unwrap();

    let broker = Broker::builder()
        .starting_cash(dec!(10_000.0))
        .feed_frequency(Frequency::Trade)
        .build()
        .unwrap();

    let mut engine = Engine::new(
        feed,
        broker,
        BuyAndHold {
            entered: false,
            exited: false,
            position: None,
        },
    );

    let summary = engine.run().unwrap();

    assert_eq!(summary.steps, 3);
    // Entry fills on the tick after submission (at the 10.5/10.6 bar), the exit fills the
    // bar after that; by the end of the run the position is flat again.
    let broker = engine.broker();
    let broker = broker.borrow();
    assert_eq!(
        broker.positions().get("AAA").copied().unwrap_or(Decimal::ZERO),
        Decimal::ZERO
    );
    assert!(broker.active_orders().next().is_none());
    assert_eq!(summary.ending_cash, broker.cash(true));
}

#[test]
fn an_empty_feed_fails_the_run_with_no_feed_data() {
    let feed = MemoryTickFeed::new(Frequency::Trade);
    let broker = Broker::builder()
        .starting_cash(dec!(10_000.0))
        .feed_frequency(Frequency::Trade)
        .build()
        .unwrap();

    let mut engine = Engine::new(
        feed,
        broker,
        BuyAndHold {
            entered: false,
            exited: false,
            position: None,
        },
    );

    assert!(engine.run().is_err());
}
