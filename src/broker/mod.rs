//! The broker: cash/position ledger, order routing, expiry, and commission charging.
//!
//! The broker is a *subject* in the dispatcher's sense (see [`crate::dispatcher`]), but it
//! has no independent timeline of its own: all of its work happens synchronously inside
//! [`Broker::on_ticks`], driven by whatever feed the caller wires it to. It never holds a
//! reference to the feed — the caller passes each batch in.

pub mod error;
pub mod event;

pub use error::BrokerError;
pub use event::{OrderEvent, OrderEventKind};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::commission::{Commission, NoCommission};
use crate::event::EventBus;
use crate::fill_strategy::{DefaultFillStrategy, FillStrategy};
use crate::instrument::{IntegerTraits, InstrumentTraits};
use crate::order::{Action, Order, OrderKind, ExecutionInfo};
use crate::slippage::{NoSlippage, SlippageModel};
use crate::tick::{Frequency, Instrument, Tick, Ticks};

/// Serde-deserializable broker policy, following the engine's per-component `Config`
/// convention.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct BrokerConfig {
    pub starting_cash: Decimal,
    #[serde(default)]
    pub allow_negative_cash: bool,
}

pub struct Broker {
    cash: Decimal,
    positions: HashMap<Instrument, Decimal>,
    instrument_price: HashMap<Instrument, Decimal>,
    last_tick: HashMap<Instrument, Tick>,
    active_orders: HashMap<u64, Order>,
    next_order_id: u64,
    commission: Box<dyn Commission>,
    fill_strategy: Box<dyn FillStrategy>,
    slippage: Box<dyn SlippageModel>,
    instrument_traits: IntegerTraits,
    allow_negative_cash: bool,
    feed_frequency: Frequency,
    started: bool,
    events: EventBus<OrderEvent>,
}

impl Broker {
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::default()
    }

    /// Builds a broker from a serde-deserialized [`BrokerConfig`], against a feed running
    /// at `feed_frequency`.
    pub fn from_config(config: BrokerConfig, feed_frequency: Frequency) -> Result<Broker, BrokerError> {
        Broker::builder()
            .starting_cash(config.starting_cash)
            .allow_negative_cash(config.allow_negative_cash)
            .feed_frequency(feed_frequency)
            .build()
    }

    pub fn cash(&self, include_short: bool) -> Decimal {
        if include_short {
            return self.cash;
        }

        let short_value: Decimal = self
            .positions
            .iter()
            .filter(|(_, qty)| **qty < Decimal::ZERO)
            .map(|(instrument, qty)| qty.abs() * self.price_for(instrument).unwrap_or(Decimal::ZERO))
            .sum();

        self.cash - short_value
    }

    pub fn equity(&self) -> Decimal {
        let positions_value: Decimal = self
            .positions
            .iter()
            .map(|(instrument, qty)| {
                qty * self
                    .price_for(instrument)
                    .expect("equity requires a known price for every open position")
            })
            .sum();
        self.cash + positions_value
    }

    pub fn positions(&self) -> &HashMap<Instrument, Decimal> {
        &self.positions
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.active_orders.values()
    }

    pub fn instrument_traits(&self, _instrument: &str) -> &dyn InstrumentTraits {
        &self.instrument_traits
    }

    pub fn set_allow_negative_cash(&mut self, allow: bool) {
        self.allow_negative_cash = allow;
    }

    /// Seeds an opening position. Only permitted before the broker has processed its first
    /// tick batch.
    pub fn set_shares(&mut self, instrument: &str, quantity: Decimal, price: Decimal) {
        assert!(!self.started, "cannot set shares after the broker has started");
        self.positions.insert(instrument.to_string(), quantity);
        self.instrument_price.insert(instrument.to_string(), price);
    }

    pub fn subscribe_order_events<F>(&mut self, callback: F)
    where
        F: FnMut(&OrderEvent) + 'static,
    {
        self.events.subscribe(callback);
    }

    fn price_for(&self, instrument: &str) -> Option<Decimal> {
        self.last_tick
            .get(instrument)
            .map(Tick::bid)
            .or_else(|| self.instrument_price.get(instrument).copied())
    }

    fn next_order_id(&mut self) -> u64 {
        let id = self.next_order_id;
        self.next_order_id += 1;
        id
    }

    pub fn create_market_order(
        &self,
        action: Action,
        instrument: &str,
        quantity: Decimal,
        on_close: bool,
    ) -> Result<Order, BrokerError> {
        if on_close && self.feed_frequency.is_intraday() {
            return Err(BrokerError::MarketOnCloseNotSupported);
        }
        Ok(Order::new(
            action,
            instrument.to_string(),
            OrderKind::Market { on_close },
            quantity,
        ))
    }

    pub fn create_limit_order(
        &self,
        action: Action,
        instrument: &str,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Order {
        Order::new(
            action,
            instrument.to_string(),
            OrderKind::Limit { limit_price },
            quantity,
        )
    }

    pub fn create_stop_order(
        &self,
        action: Action,
        instrument: &str,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Order {
        Order::new(
            action,
            instrument.to_string(),
            OrderKind::Stop {
                stop_price,
                stop_hit: false,
            },
            quantity,
        )
    }

    pub fn create_stop_limit_order(
        &self,
        action: Action,
        instrument: &str,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Order {
        Order::new(
            action,
            instrument.to_string(),
            OrderKind::StopLimit {
                stop_price,
                limit_price,
                stop_hit: false,
            },
            quantity,
        )
    }

    /// Submits an order for processing. Fails if the order was already submitted/filled.
    pub fn submit(&mut self, mut order: Order, at: DateTime<Utc>) -> Result<u64, BrokerError> {
        order.submit(self.next_order_id(), at)?;
        let id = order.id().expect("submit() always assigns an id");
        tracing::info!(order_id = id, instrument = order.instrument(), "order submitted");
        self.events.emit(&OrderEvent {
            order: order.clone(),
            kind: OrderEventKind::Submitted,
        });
        self.active_orders.insert(id, order);
        Ok(id)
    }

    pub fn cancel(&mut self, order_id: u64) -> Result<(), BrokerError> {
        let mut order = self
            .active_orders
            .remove(&order_id)
            .ok_or(BrokerError::NotActive)?;

        if order.state() == crate::order::OrderState::Filled {
            self.active_orders.insert(order_id, order);
            return Err(BrokerError::AlreadyFilled);
        }

        order.cancel()?;
        tracing::info!(order_id = order_id, instrument = order.instrument(), "order canceled by user");
        self.events.emit(&OrderEvent {
            order: order.clone(),
            kind: OrderEventKind::Canceled {
                reason: "User requested cancellation",
            },
        });
        Ok(())
    }

    /// Processes one tick batch: accepts newly submitted orders, then walks a *snapshot*
    /// of the active-orders cohort against the batch. Orders submitted during this call do
    /// not join the cohort until the next batch (P5).
    pub fn on_ticks(&mut self, ticks: &Ticks) {
        for (instrument, tick) in ticks.iter() {
            self.fill_strategy.reset_for_tick(instrument, tick);
            self.last_tick.insert(instrument.clone(), *tick);
        }
        self.fill_strategy.on_ticks(ticks.datetime());

        let mut order_ids: Vec<u64> = self.active_orders.keys().copied().collect();
        // `active_orders` is a HashMap, so its iteration order is randomized per process;
        // sorting by id (assignment order) keeps a same-instrument cohort's processing
        // order, and therefore the emitted event stream and final cash/positions,
        // reproducible across runs.
        order_ids.sort_unstable();

        for id in order_ids {
            let Some(instrument) = self.active_orders.get(&id).map(|o| o.instrument().to_string())
            else {
                continue;
            };
            let Some(tick) = ticks.get(&instrument).copied() else {
                continue;
            };

            self.on_tick_for_order(id, ticks.datetime(), tick);
        }

        self.started = true;
    }

    fn on_tick_for_order(&mut self, id: u64, batch_datetime: DateTime<Utc>, tick: Tick) {
        let Some(mut order) = self.active_orders.remove(&id) else {
            return;
        };

        if order.state() == crate::order::OrderState::Submitted {
            order.accept(batch_datetime).expect("submitted order can always be accepted");
            tracing::info!(order_id = order.id().unwrap_or_default(), instrument = order.instrument(), "order accepted");
            self.events.emit(&OrderEvent {
                order: order.clone(),
                kind: OrderEventKind::Accepted,
            });
        }

        if order.is_active() {
            self.process_order(&mut order, tick);
        }

        if order.is_active() {
            self.active_orders.insert(id, order);
        }
    }

    fn process_order(&mut self, order: &mut Order, tick: Tick) {
        if self.pre_process_expiry(order, tick) {
            return;
        }

        let fill = self
            .fill_strategy
            .fill(order, &tick, &self.instrument_traits, self.slippage.as_ref());

        if let Some(fill) = fill {
            self.commit_execution(order, tick.datetime(), fill);
        }

        if order.is_active() {
            self.post_process_expiry(order, tick);
        }
    }

    /// Cancels a non-GTC order that rolled over a day boundary before it could be
    /// processed this tick. Returns `true` if the order was canceled (and should not be
    /// processed further this step).
    fn pre_process_expiry(&mut self, order: &mut Order, tick: Tick) -> bool {
        if order.good_till_canceled() {
            return false;
        }
        let Some(accepted_at) = order.accepted_at() else {
            return false;
        };
        if tick.datetime().date_naive() > accepted_at.date_naive() {
            order.cancel().expect("active order can always be canceled");
            tracing::info!(order_id = order.id().unwrap_or_default(), instrument = order.instrument(), "order expired");
            self.events.emit(&OrderEvent {
                order: order.clone(),
                kind: OrderEventKind::Canceled { reason: "Expired" },
            });
            true
        } else {
            false
        }
    }

    fn post_process_expiry(&mut self, order: &mut Order, tick: Tick) {
        if order.good_till_canceled() {
            return;
        }
        let Some(accepted_at) = order.accepted_at() else {
            return;
        };
        let expired =
            !self.feed_frequency.is_intraday() && tick.datetime().date_naive() >= accepted_at.date_naive();
        if expired {
            order.cancel().expect("active order can always be canceled");
            tracing::info!(order_id = order.id().unwrap_or_default(), instrument = order.instrument(), "order expired");
            self.events.emit(&OrderEvent {
                order: order.clone(),
                kind: OrderEventKind::Canceled { reason: "Expired" },
            });
        }
    }

    /// Applies a fill's cash/commission/position effects. The order's own state
    /// transition (`add_execution`) happens first, so a transition failure leaves the
    /// ledger untouched. Insufficient cash (without `allow_negative_cash`) is logged and
    /// leaves the order active with no ledger mutation at all.
    fn commit_execution(
        &mut self,
        order: &mut Order,
        datetime: DateTime<Utc>,
        fill: crate::fill_strategy::FillInfo,
    ) {
        let signed = match order.action() {
            Action::Buy => Decimal::ONE,
            Action::Sell => -Decimal::ONE,
        };
        let commission = self.commission.calculate(order, fill.price, fill.quantity);
        let cost = -signed * fill.price * fill.quantity - commission;
        let new_cash = self.cash + cost;

        if new_cash < Decimal::ZERO && !self.allow_negative_cash {
            tracing::debug!(
                order_id = order.id().unwrap_or_default(),
                instrument = order.instrument(),
                "insufficient cash to commit execution, order remains active"
            );
            return;
        }

        let execution = ExecutionInfo {
            price: fill.price,
            quantity: fill.quantity,
            commission,
            datetime,
        };

        if order.add_execution(execution).is_err() {
            return;
        }

        self.cash = new_cash;
        let shares_delta = signed * fill.quantity;
        let position = self
            .positions
            .entry(order.instrument().to_string())
            .or_insert(Decimal::ZERO);
        *position = self.instrument_traits.round_quantity(*position + shares_delta);
        if *position == Decimal::ZERO {
            self.positions.remove(order.instrument());
        }

        self.fill_strategy
            .on_order_filled(order, &fill, &self.instrument_traits);

        let kind = if order.state() == crate::order::OrderState::Filled {
            OrderEventKind::Filled
        } else {
            OrderEventKind::PartiallyFilled
        };
        tracing::info!(
            order_id = order.id().unwrap_or_default(),
            instrument = order.instrument(),
            price = %fill.price,
            quantity = %fill.quantity,
            "order filled"
        );
        self.events.emit(&OrderEvent {
            order: order.clone(),
            kind,
        });
    }
}

#[derive(Default)]
pub struct BrokerBuilder {
    starting_cash: Option<Decimal>,
    feed_frequency: Option<Frequency>,
    commission: Option<Box<dyn Commission>>,
    fill_strategy: Option<Box<dyn FillStrategy>>,
    slippage: Option<Box<dyn SlippageModel>>,
    allow_negative_cash: bool,
}

impl BrokerBuilder {
    pub fn starting_cash(mut self, cash: Decimal) -> Self {
        self.starting_cash = Some(cash);
        self
    }

    pub fn feed_frequency(mut self, frequency: Frequency) -> Self {
        self.feed_frequency = Some(frequency);
        self
    }

    pub fn commission(mut self, commission: Box<dyn Commission>) -> Self {
        self.commission = Some(commission);
        self
    }

    pub fn fill_strategy(mut self, fill_strategy: Box<dyn FillStrategy>) -> Self {
        self.fill_strategy = Some(fill_strategy);
        self
    }

    pub fn slippage(mut self, slippage: Box<dyn SlippageModel>) -> Self {
        self.slippage = Some(slippage);
        self
    }

    pub fn allow_negative_cash(mut self, allow: bool) -> Self {
        self.allow_negative_cash = allow;
        self
    }

    pub fn build(self) -> Result<Broker, BrokerError> {
        let starting_cash = self
            .starting_cash
            .ok_or(BrokerError::BuilderIncomplete("starting_cash"))?;
        if starting_cash < Decimal::ZERO {
            return Err(BrokerError::NegativeStartingCash);
        }

        Ok(Broker {
            cash: starting_cash,
            positions: HashMap::new(),
            instrument_price: HashMap::new(),
            last_tick: HashMap::new(),
            active_orders: HashMap::new(),
            next_order_id: 1,
            commission: self.commission.unwrap_or_else(|| Box::new(NoCommission)),
            fill_strategy: self
                .fill_strategy
                .unwrap_or_else(|| Box::new(DefaultFillStrategy::new(None))),
            slippage: self.slippage.unwrap_or_else(|| Box::new(NoSlippage)),
            instrument_traits: IntegerTraits,
            allow_negative_cash: self.allow_negative_cash,
            feed_frequency: self.feed_frequency.unwrap_or(Frequency::Minute),
            started: false,
            events: EventBus::new(),
        })
    }
}
