//! Wires a tick feed, a broker, and a strategy together and drives them to completion
//! through the dispatcher.
//!
//! The feed is the only registered [`Subject`]; the broker has no timeline of its own; it
//! reacts synchronously to the feed's `NewTicksEvent` bus. Subscription order on that bus
//! is what gives the whole run its causal guarantee: the broker always sees a tick batch
//! before the strategy does.

use std::cell::RefCell;
use std::rc::Rc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use crate::broker::{Broker, OrderEventKind};
use crate::dispatcher::{Dispatcher, DispatcherEvent, Subject};
use crate::feed::MemoryTickFeed;
use crate::strategy::{PositionRole, Strategy, StrategyContext};
use crate::tick::Ticks;

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum EngineError {
    #[error("backtest finished without the feed ever emitting a tick")]
    NoFeedData,
}

impl Subject for MemoryTickFeed {
    fn peek_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        MemoryTickFeed::peek_datetime(self)
    }

    fn eof(&self) -> bool {
        MemoryTickFeed::eof(self)
    }

    fn dispatch(&mut self) {
        if let Err(err) = self.next_ticks() {
            warn!(error = %err, "tick feed failed to advance");
        }
    }
}

/// Summary of one completed run, returned by [`Engine::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub ending_cash: Decimal,
    pub ending_equity: Decimal,
}

/// Owns a feed/broker/strategy triple and runs them to completion.
pub struct Engine<S: Strategy> {
    feed: MemoryTickFeed,
    broker: Rc<RefCell<Broker>>,
    strategy: Rc<RefCell<S>>,
    ctx: Rc<RefCell<StrategyContext>>,
    last_ticks: Rc<RefCell<Option<Ticks>>>,
}

impl<S: Strategy + 'static> Engine<S> {
    pub fn new(mut feed: MemoryTickFeed, broker: Broker, strategy: S) -> Self {
        let broker = Rc::new(RefCell::new(broker));
        let strategy = Rc::new(RefCell::new(strategy));
        let ctx = Rc::new(RefCell::new(StrategyContext::new(Rc::clone(&broker))));
        let last_ticks: Rc<RefCell<Option<Ticks>>> = Rc::new(RefCell::new(None));

        let broker_for_feed = Rc::clone(&broker);
        feed.subscribe_new_ticks(move |event| {
            broker_for_feed.borrow_mut().on_ticks(&event.0);
        });

        let strategy_for_feed = Rc::clone(&strategy);
        let ctx_for_feed = Rc::clone(&ctx);
        feed.subscribe_new_ticks(move |event| {
            strategy_for_feed
                .borrow_mut()
                .on_ticks(&mut ctx_for_feed.borrow_mut(), &event.0);
        });

        let last_ticks_for_feed = Rc::clone(&last_ticks);
        feed.subscribe_new_ticks(move |event| {
            *last_ticks_for_feed.borrow_mut() = Some(event.0.clone());
        });

        let registry = ctx.borrow().position_registry();
        let strategy_for_orders = Rc::clone(&strategy);
        let ctx_for_orders = Rc::clone(&ctx);
        broker.borrow_mut().subscribe_order_events(move |event| {
            let mut strategy = strategy_for_orders.borrow_mut();
            let mut ctx = ctx_for_orders.borrow_mut();

            strategy.on_order_updated(&mut ctx, event);

            let Some(order_id) = event.order.id() else {
                return;
            };
            let tracked = registry.borrow_mut().remove(&order_id);
            let Some((position, role)) = tracked else {
                return;
            };

            match (role, &event.kind) {
                (PositionRole::Entry, OrderEventKind::Filled) => {
                    strategy.on_enter_ok(&mut ctx, &position)
                }
                (PositionRole::Entry, OrderEventKind::Canceled { .. }) => {
                    strategy.on_enter_canceled(&mut ctx, &position)
                }
                (PositionRole::Exit, OrderEventKind::Filled) => {
                    strategy.on_exit_ok(&mut ctx, &position)
                }
                (PositionRole::Exit, OrderEventKind::Canceled { .. }) => {
                    strategy.on_exit_canceled(&mut ctx, &position)
                }
                // Partial fills and acceptance/submission events don't resolve a
                // position one way or the other; put it back so the next event can.
                _ => {
                    registry.borrow_mut().insert(order_id, (position, role));
                }
            }
        });

        Self {
            feed,
            broker,
            strategy,
            ctx,
            last_ticks,
        }
    }

    pub fn broker(&self) -> Rc<RefCell<Broker>> {
        Rc::clone(&self.broker)
    }

    /// Runs the feed to exhaustion, dispatching `on_start`/`on_idle`/`on_finish` around it.
    /// Fails with [`EngineError::NoFeedData`] if the feed never emitted a single tick.
    pub fn run(&mut self) -> Result<RunSummary, EngineError> {
        self.strategy.borrow_mut().on_start(&mut self.ctx.borrow_mut());

        let strategy = &self.strategy;
        let ctx = &self.ctx;
        let mut dispatcher = Dispatcher::new();
        dispatcher.add_subject(&mut self.feed);
        let steps = dispatcher.run(|event| {
            if event == DispatcherEvent::Idle {
                strategy.borrow_mut().on_idle(&mut ctx.borrow_mut());
            }
        });

        let last = self.last_ticks.borrow().clone().ok_or(EngineError::NoFeedData)?;
        self.strategy
            .borrow_mut()
            .on_finish(&mut self.ctx.borrow_mut(), &last);

        let broker = self.broker.borrow();
        Ok(RunSummary {
            steps,
            ending_cash: broker.cash(true),
            ending_equity: broker.equity(),
        })
    }
}
