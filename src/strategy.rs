//! The strategy surface: callbacks the user implements, plus the order-helper
//! constructors and position-tracking conveniences a strategy calls into the broker
//! through.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::broker::{Broker, BrokerError, OrderEvent};
use crate::order::Action;
use crate::tick::Ticks;

/// Whether a tracked order id is a position's entry or its exit, used to route a broker
/// order event back to the matching `on_enter_*`/`on_exit_*` strategy callback. Modeled
/// on the reference system's position object, which watches its own entry/exit orders the
/// same way.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PositionRole {
    Entry,
    Exit,
}

pub(crate) type PositionRegistry = Rc<RefCell<HashMap<u64, (PositionHandle, PositionRole)>>>;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("an analyzer named '{0}' is already attached")]
    AnalyzerNameConflict(String),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Long,
    Short,
}

/// Tracks the entry/exit order ids belonging to one logical position, in the spirit of
/// the reference system's position helper objects.
#[derive(Debug, Clone)]
pub struct PositionHandle {
    pub instrument: String,
    pub direction: Direction,
    pub entry_order_id: u64,
    pub exit_order_id: Option<u64>,
}

/// External collaborator seam for performance/risk analytics. No concrete analyzer ships
/// in this crate; attaching one is purely bookkeeping against name collisions.
pub trait Analyzer {
    fn name(&self) -> &str;
}

/// Everything a running [`Strategy`] callback can do: submit orders against the broker,
/// inspect its ledger, and attach analyzers. Holds the broker by a non-owning, single
/// owner shared handle (`Rc<RefCell<_>>`) rather than a raw back-reference, since the
/// engine is strictly single-threaded and never needs `Arc`/`Mutex`.
pub struct StrategyContext {
    broker: Rc<RefCell<Broker>>,
    analyzers: HashMap<String, Box<dyn Analyzer>>,
    positions: PositionRegistry,
}

impl StrategyContext {
    pub fn new(broker: Rc<RefCell<Broker>>) -> Self {
        Self {
            broker,
            analyzers: HashMap::new(),
            positions: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub(crate) fn position_registry(&self) -> PositionRegistry {
        Rc::clone(&self.positions)
    }

    pub fn broker(&self) -> std::cell::Ref<'_, Broker> {
        self.broker.borrow()
    }

    pub fn attach_analyzer(
        &mut self,
        name: impl Into<String>,
        analyzer: Box<dyn Analyzer>,
    ) -> Result<(), StrategyError> {
        let name = name.into();
        if self.analyzers.contains_key(&name) {
            return Err(StrategyError::AnalyzerNameConflict(name));
        }
        self.analyzers.insert(name, analyzer);
        Ok(())
    }

    fn action_and_quantity(signed_quantity: Decimal) -> (Action, Decimal) {
        if signed_quantity >= Decimal::ZERO {
            (Action::Buy, signed_quantity)
        } else {
            (Action::Sell, -signed_quantity)
        }
    }

    /// `signed_quantity` positive submits a BUY, negative a SELL, mirroring the reference
    /// strategy helpers' sign convention.
    pub fn market_order(
        &mut self,
        instrument: &str,
        signed_quantity: Decimal,
        on_close: bool,
        good_till_canceled: bool,
        all_or_none: bool,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, StrategyError> {
        let (action, quantity) = Self::action_and_quantity(signed_quantity);
        let mut broker = self.broker.borrow_mut();
        let order = broker
            .create_market_order(action, instrument, quantity, on_close)?
            .with_good_till_canceled(good_till_canceled)
            .with_all_or_none(all_or_none);
        Ok(broker.submit(order, at)?)
    }

    pub fn limit_order(
        &mut self,
        instrument: &str,
        signed_quantity: Decimal,
        limit_price: Decimal,
        good_till_canceled: bool,
        all_or_none: bool,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, StrategyError> {
        let (action, quantity) = Self::action_and_quantity(signed_quantity);
        let mut broker = self.broker.borrow_mut();
        let order = broker
            .create_limit_order(action, instrument, quantity, limit_price)
            .with_good_till_canceled(good_till_canceled)
            .with_all_or_none(all_or_none);
        Ok(broker.submit(order, at)?)
    }

    pub fn stop_order(
        &mut self,
        instrument: &str,
        signed_quantity: Decimal,
        stop_price: Decimal,
        good_till_canceled: bool,
        all_or_none: bool,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, StrategyError> {
        let (action, quantity) = Self::action_and_quantity(signed_quantity);
        let mut broker = self.broker.borrow_mut();
        let order = broker
            .create_stop_order(action, instrument, quantity, stop_price)
            .with_good_till_canceled(good_till_canceled)
            .with_all_or_none(all_or_none);
        Ok(broker.submit(order, at)?)
    }

    pub fn stop_limit_order(
        &mut self,
        instrument: &str,
        signed_quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        good_till_canceled: bool,
        all_or_none: bool,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, StrategyError> {
        let (action, quantity) = Self::action_and_quantity(signed_quantity);
        let mut broker = self.broker.borrow_mut();
        let order = broker
            .create_stop_limit_order(action, instrument, quantity, stop_price, limit_price)
            .with_good_till_canceled(good_till_canceled)
            .with_all_or_none(all_or_none);
        Ok(broker.submit(order, at)?)
    }

    fn register_entry(&mut self, handle: PositionHandle) {
        self.positions
            .borrow_mut()
            .insert(handle.entry_order_id, (handle.clone(), PositionRole::Entry));
    }

    pub fn enter_long(
        &mut self,
        instrument: &str,
        quantity: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<PositionHandle, StrategyError> {
        let order_id = self.market_order(instrument, quantity, false, false, false, at)?;
        let handle = PositionHandle {
            instrument: instrument.to_string(),
            direction: Direction::Long,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.register_entry(handle.clone());
        Ok(handle)
    }

    pub fn enter_short(
        &mut self,
        instrument: &str,
        quantity: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<PositionHandle, StrategyError> {
        let order_id = self.market_order(instrument, -quantity, false, false, false, at)?;
        let handle = PositionHandle {
            instrument: instrument.to_string(),
            direction: Direction::Short,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.register_entry(handle.clone());
        Ok(handle)
    }

    pub fn enter_long_limit(
        &mut self,
        instrument: &str,
        quantity: Decimal,
        limit_price: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<PositionHandle, StrategyError> {
        let order_id = self.limit_order(instrument, quantity, limit_price, false, false, at)?;
        let handle = PositionHandle {
            instrument: instrument.to_string(),
            direction: Direction::Long,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.register_entry(handle.clone());
        Ok(handle)
    }

    pub fn enter_short_limit(
        &mut self,
        instrument: &str,
        quantity: Decimal,
        limit_price: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<PositionHandle, StrategyError> {
        let order_id = self.limit_order(instrument, -quantity, limit_price, false, false, at)?;
        let handle = PositionHandle {
            instrument: instrument.to_string(),
            direction: Direction::Short,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.register_entry(handle.clone());
        Ok(handle)
    }

    pub fn enter_long_stop(
        &mut self,
        instrument: &str,
        quantity: Decimal,
        stop_price: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<PositionHandle, StrategyError> {
        let order_id = self.stop_order(instrument, quantity, stop_price, false, false, at)?;
        let handle = PositionHandle {
            instrument: instrument.to_string(),
            direction: Direction::Long,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.register_entry(handle.clone());
        Ok(handle)
    }

    pub fn enter_short_stop(
        &mut self,
        instrument: &str,
        quantity: Decimal,
        stop_price: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<PositionHandle, StrategyError> {
        let order_id = self.stop_order(instrument, -quantity, stop_price, false, false, at)?;
        let handle = PositionHandle {
            instrument: instrument.to_string(),
            direction: Direction::Short,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.register_entry(handle.clone());
        Ok(handle)
    }

    pub fn enter_long_stop_limit(
        &mut self,
        instrument: &str,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<PositionHandle, StrategyError> {
        let order_id =
            self.stop_limit_order(instrument, quantity, stop_price, limit_price, false, false, at)?;
        let handle = PositionHandle {
            instrument: instrument.to_string(),
            direction: Direction::Long,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.register_entry(handle.clone());
        Ok(handle)
    }

    pub fn enter_short_stop_limit(
        &mut self,
        instrument: &str,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<PositionHandle, StrategyError> {
        let order_id =
            self.stop_limit_order(instrument, -quantity, stop_price, limit_price, false, false, at)?;
        let handle = PositionHandle {
            instrument: instrument.to_string(),
            direction: Direction::Short,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.register_entry(handle.clone());
        Ok(handle)
    }

    /// Submits the matching exit order for `position` (a market order closing it out
    /// entirely), records the exit order id on the handle, and tracks it so its
    /// resolution fires `on_exit_ok`/`on_exit_canceled`.
    pub fn exit_position(
        &mut self,
        position: &mut PositionHandle,
        quantity: Decimal,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, StrategyError> {
        let signed = match position.direction {
            Direction::Long => -quantity,
            Direction::Short => quantity,
        };
        let order_id = self.market_order(&position.instrument, signed, false, false, false, at)?;
        position.exit_order_id = Some(order_id);
        self.positions
            .borrow_mut()
            .insert(order_id, (position.clone(), PositionRole::Exit));
        Ok(order_id)
    }
}

/// Implemented by user strategies. Only `on_ticks` is required; every other callback has
/// a no-op default, matching how sparse the reference strategies' callback overrides
/// typically are.
pub trait Strategy {
    fn on_ticks(&mut self, ctx: &mut StrategyContext, ticks: &Ticks);

    fn on_start(&mut self, _ctx: &mut StrategyContext) {}
    fn on_finish(&mut self, _ctx: &mut StrategyContext, _last: &Ticks) {}
    fn on_idle(&mut self, _ctx: &mut StrategyContext) {}
    fn on_order_updated(&mut self, _ctx: &mut StrategyContext, _event: &OrderEvent) {}
    fn on_enter_ok(&mut self, _ctx: &mut StrategyContext, _position: &PositionHandle) {}
    fn on_enter_canceled(&mut self, _ctx: &mut StrategyContext, _position: &PositionHandle) {}
    fn on_exit_ok(&mut self, _ctx: &mut StrategyContext, _position: &PositionHandle) {}
    fn on_exit_canceled(&mut self, _ctx: &mut StrategyContext, _position: &PositionHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::Frequency;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct NoopAnalyzer;
    impl Analyzer for NoopAnalyzer {
        fn name(&self) -> &str {
            "noop"
        }
    }

    fn context() -> StrategyContext {
        let broker = Broker::builder()
            .starting_cash(dec!(10_000.0))
            .feed_frequency(Frequency::Trade)
            .build()
            .unwrap();
        StrategyContext::new(Rc::new(RefCell::new(broker)))
    }

    #[test]
    fn negative_quantity_submits_a_sell() {
        let mut ctx = context();
        ctx.market_order("AAA", dec!(-10.0), false, false, false, Utc::now())
            .unwrap();

        let broker = ctx.broker();
        let order = broker.active_orders().next().unwrap();
        assert_eq!(order.action(), Action::Sell);
        assert_eq!(order.quantity(), dec!(10.0));
    }

    #[test]
    fn attaching_duplicate_analyzer_name_fails() {
        let mut ctx = context();
        ctx.attach_analyzer("returns", Box::new(NoopAnalyzer)).unwrap();

        assert!(matches!(
            ctx.attach_analyzer("returns", Box::new(NoopAnalyzer)),
            Err(StrategyError::AnalyzerNameConflict(_))
        ));
    }

    #[test]
    fn enter_long_then_exit_tracks_both_order_ids() {
        let mut ctx = context();
        let mut position = ctx.enter_long("AAA", dec!(10.0), Utc::now()).unwrap();
        assert_eq!(position.entry_order_id, 1);

        ctx.exit_position(&mut position, dec!(10.0), Utc::now()).unwrap();
        assert_eq!(position.exit_order_id, Some(2));
    }

    #[test]
    fn enter_long_registers_the_entry_order_for_callback_routing() {
        let mut ctx = context();
        let position = ctx.enter_long("AAA", dec!(10.0), Utc::now()).unwrap();

        let registry = ctx.position_registry();
        let registry = registry.borrow();
        let (handle, role) = registry.get(&position.entry_order_id).unwrap();
        assert_eq!(handle.instrument, "AAA");
        assert_eq!(*role, PositionRole::Entry);
    }
}
