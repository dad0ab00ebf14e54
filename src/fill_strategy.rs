//! Per-order-kind fill-price and fill-size policy.
//!
//! This is the component that decides, for an active order sitting against one incoming
//! tick, whether and at what price/size it fills. The broker calls it once per order per
//! tick and commits whatever [`FillInfo`] (if any) comes back.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::instrument::InstrumentTraits;
use crate::order::{Action, Order, OrderKind};
use crate::slippage::SlippageModel;
use crate::tick::{Frequency, Tick};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FillInfo {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// How limit/stop trigger functions decide a threshold has been penetrated.
///
/// The reference implementation's trigger functions ignore the order's action and
/// threshold price entirely and simply return the tick's bid — almost certainly a defect
/// rather than intended behavior. [`TriggerPolicy::Penetration`] implements the documented
/// semantics instead and is the default; [`TriggerPolicy::AlwaysBid`] reproduces the
/// original behavior verbatim for strategies tuned against it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    #[default]
    Penetration,
    AlwaysBid,
}

/// Serde-deserializable policy for constructing a [`DefaultFillStrategy`], following the
/// engine's per-component `Config` convention.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct FillStrategyConfig {
    /// Fraction of a non-trade tick's notional volume available to fill against, in
    /// `(0, 1]`. `None` leaves volume unrationed.
    #[serde(default)]
    pub volume_limit: Option<Decimal>,
    #[serde(default)]
    pub trigger_policy: TriggerPolicy,
}

impl From<FillStrategyConfig> for DefaultFillStrategy {
    fn from(config: FillStrategyConfig) -> Self {
        DefaultFillStrategy::new(config.volume_limit).with_trigger_policy(config.trigger_policy)
    }
}

impl TriggerPolicy {
    fn limit_trigger(self, action: Action, limit_price: Decimal, tick: &Tick) -> Option<Decimal> {
        match self {
            TriggerPolicy::AlwaysBid => Some(tick.bid()),
            TriggerPolicy::Penetration => {
                let penetrated = match action {
                    Action::Buy => tick.bid() <= limit_price,
                    Action::Sell => tick.bid() >= limit_price,
                };
                penetrated.then(|| tick.bid())
            }
        }
    }

    fn stop_trigger(self, action: Action, stop_price: Decimal, tick: &Tick) -> Option<Decimal> {
        match self {
            TriggerPolicy::AlwaysBid => Some(tick.bid()),
            TriggerPolicy::Penetration => {
                let penetrated = match action {
                    Action::Buy => tick.bid() >= stop_price,
                    Action::Sell => tick.bid() <= stop_price,
                };
                penetrated.then(|| tick.bid())
            }
        }
    }
}

/// Per-order-kind fill policy, parameterized over per-tick volume rationing.
pub trait FillStrategy {
    fn on_ticks(&mut self, tick_datetime: chrono::DateTime<chrono::Utc>);

    /// Refreshes any per-instrument, per-tick state (such as volume rationing) ahead of
    /// processing orders against `tick`. Strategies that don't ration volume can leave the
    /// default no-op.
    fn reset_for_tick(&mut self, _instrument: &str, _tick: &Tick) {}

    fn on_order_filled(&mut self, order: &Order, fill: &FillInfo, traits: &dyn InstrumentTraits);

    fn fill(
        &mut self,
        order: &mut Order,
        tick: &Tick,
        traits: &dyn InstrumentTraits,
        slippage: &dyn SlippageModel,
    ) -> Option<FillInfo>;
}

/// The engine's only shipped fill strategy: volume-rationed market/limit/stop/stop-limit
/// fills with a pluggable trigger policy and slippage model.
pub struct DefaultFillStrategy {
    volume_limit: Option<Decimal>,
    trigger_policy: TriggerPolicy,
    volume_left: HashMap<String, Decimal>,
    volume_used: HashMap<String, Decimal>,
}

impl DefaultFillStrategy {
    /// `volume_limit`, if set, must lie in `(0, 1]`.
    pub fn new(volume_limit: Option<Decimal>) -> Self {
        if let Some(limit) = volume_limit {
            assert!(
                limit > Decimal::ZERO && limit <= Decimal::ONE,
                "volume_limit must be in (0, 1]"
            );
        }
        Self {
            volume_limit,
            trigger_policy: TriggerPolicy::default(),
            volume_left: HashMap::new(),
            volume_used: HashMap::new(),
        }
    }

    pub fn with_trigger_policy(mut self, policy: TriggerPolicy) -> Self {
        self.trigger_policy = policy;
        self
    }

    pub fn volume_left(&self, instrument: &str) -> Decimal {
        self.volume_left.get(instrument).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn volume_used(&self, instrument: &str) -> Decimal {
        self.volume_used.get(instrument).copied().unwrap_or(Decimal::ZERO)
    }

    fn fill_size(&self, order: &Order, traits: &dyn InstrumentTraits) -> Decimal {
        let max_volume = match self.volume_limit {
            Some(_) => traits.round_quantity(self.volume_left(order.instrument())),
            None => order.remaining(),
        };

        if !order.all_or_none() {
            max_volume.min(order.remaining())
        } else if order.remaining() <= max_volume {
            order.remaining()
        } else {
            Decimal::ZERO
        }
    }
}

impl FillStrategy for DefaultFillStrategy {
    fn on_ticks(&mut self, _tick_datetime: chrono::DateTime<chrono::Utc>) {
        // Per-instrument reset happens via `reset_for_tick`, called by the broker once it
        // knows which instruments are present in the incoming batch.
    }

    /// Resets the per-instrument volume-used counter for a new tick; refills volume-left
    /// when rationing is enabled. Called once per instrument per incoming tick.
    fn reset_for_tick(&mut self, instrument: &str, tick: &Tick) {
        if tick.frequency() == Frequency::Trade {
            self.volume_left.insert(instrument.to_string(), dec!(10_000.0));
        } else if self.volume_limit.is_some() {
            // No order is in hand yet at this point, so there is nothing to round against;
            // this placeholder stands in for a real traded-volume feed.
            self.volume_left.insert(instrument.to_string(), dec!(10_000.0));
        }
        self.volume_used.insert(instrument.to_string(), Decimal::ZERO);
    }

    fn on_order_filled(&mut self, order: &Order, fill: &FillInfo, traits: &dyn InstrumentTraits) {
        let instrument = order.instrument();
        if self.volume_limit.is_some() {
            let left = traits.round_quantity(self.volume_left(instrument));
            let used = traits.round_quantity(fill.quantity);
            self.volume_left.insert(instrument.to_string(), left - used);
        }
        let used_total = self.volume_used(instrument) + traits.round_quantity(fill.quantity);
        self.volume_used.insert(instrument.to_string(), used_total);
    }

    fn fill(
        &mut self,
        order: &mut Order,
        tick: &Tick,
        traits: &dyn InstrumentTraits,
        slippage: &dyn SlippageModel,
    ) -> Option<FillInfo> {
        match order.kind() {
            OrderKind::Market { .. } => {
                let size = self.fill_size(order, traits);
                if size == Decimal::ZERO {
                    tracing::debug!(instrument = order.instrument(), "zero fill size, skipping market order");
                    return None;
                }
                let mut price = tick.bid();
                if tick.frequency() != Frequency::Trade {
                    let used = self.volume_used(order.instrument());
                    price = slippage.adjust_price(order, price, size, tick, used);
                }
                Some(FillInfo { price, quantity: size })
            }
            OrderKind::Limit { limit_price } => {
                let size = self.fill_size(order, traits);
                if size == Decimal::ZERO {
                    return None;
                }
                self.trigger_policy
                    .limit_trigger(order.action(), limit_price, tick)
                    .map(|price| FillInfo { price, quantity: size })
            }
            OrderKind::Stop { stop_price, stop_hit } => {
                self.fill_stop(order, tick, traits, slippage, stop_hit, stop_price)
            }
            OrderKind::StopLimit {
                stop_price,
                limit_price,
                stop_hit,
            } => self.fill_stop_limit(order, tick, traits, stop_hit, stop_price, limit_price),
        }
    }
}

impl DefaultFillStrategy {
    fn fill_stop(
        &mut self,
        order: &mut Order,
        tick: &Tick,
        traits: &dyn InstrumentTraits,
        slippage: &dyn SlippageModel,
        was_hit: bool,
        stop_price: Decimal,
    ) -> Option<FillInfo> {
        let trigger = if was_hit {
            None
        } else {
            self.trigger_policy.stop_trigger(order.action(), stop_price, tick)
        };
        let just_triggered = trigger.is_some();
        let hit = was_hit || just_triggered;
        order.set_stop_hit(hit);

        if !hit {
            return None;
        }

        let size = self.fill_size(order, traits);
        if size == Decimal::ZERO {
            return None;
        }

        let mut price = if just_triggered { trigger.unwrap() } else { tick.bid() };
        if tick.frequency() != Frequency::Trade {
            let used = self.volume_used(order.instrument());
            price = slippage.adjust_price(order, price, size, tick, used);
        }
        Some(FillInfo { price, quantity: size })
    }

    fn fill_stop_limit(
        &mut self,
        order: &mut Order,
        tick: &Tick,
        traits: &dyn InstrumentTraits,
        was_hit: bool,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Option<FillInfo> {
        let stop_trigger = if was_hit {
            None
        } else {
            self.trigger_policy.stop_trigger(order.action(), stop_price, tick)
        };
        let hit = was_hit || stop_trigger.is_some();
        order.set_stop_hit(hit);

        if !hit {
            return None;
        }

        let size = self.fill_size(order, traits);
        if size == Decimal::ZERO {
            return None;
        }

        let limit_trigger = self.trigger_policy.limit_trigger(order.action(), limit_price, tick);
        let price = match (stop_trigger, limit_trigger) {
            (Some(stop_price_hit), Some(_)) => match order.action() {
                Action::Buy => stop_price_hit.min(limit_price),
                Action::Sell => stop_price_hit.max(limit_price),
            },
            (None, Some(limit_price_hit)) => limit_price_hit,
            (_, None) => return None,
        };

        Some(FillInfo { price, quantity: size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::IntegerTraits;
    use crate::order::{Action, OrderKind};
    use crate::slippage::NoSlippage;
    use chrono::Utc;

    fn tick(bid: Decimal, ask: Decimal, frequency: Frequency) -> Tick {
        Tick::new(Utc::now(), bid, ask, frequency)
    }

    #[test]
    fn market_order_fills_at_bid() {
        let mut strategy = DefaultFillStrategy::new(None);
        let mut order = Order::new(
            Action::Buy,
            "AAA".to_string(),
            OrderKind::Market { on_close: false },
            dec!(100.0),
        );
        let tick = tick(dec!(10.0), dec!(10.1), Frequency::Trade);

        let fill = strategy
            .fill(&mut order, &tick, &IntegerTraits, &NoSlippage)
            .unwrap();
        assert_eq!(fill.price, dec!(10.0));
        assert_eq!(fill.quantity, dec!(100.0));
    }

    #[test]
    fn limit_buy_fires_only_when_bid_at_or_below_limit_under_penetration_policy() {
        let mut strategy = DefaultFillStrategy::new(None);
        let mut order = Order::new(
            Action::Buy,
            "AAA".to_string(),
            OrderKind::Limit { limit_price: dec!(10.0) },
            dec!(50.0),
        );

        assert!(strategy
            .fill(&mut order, &tick(dec!(11.0), dec!(11.1), Frequency::Minute), &IntegerTraits, &NoSlippage)
            .is_none());

        let fill = strategy
            .fill(&mut order, &tick(dec!(9.0), dec!(9.1), Frequency::Minute), &IntegerTraits, &NoSlippage)
            .unwrap();
        assert_eq!(fill.price, dec!(9.0));
    }

    #[test]
    fn limit_buy_always_fills_under_always_bid_policy() {
        let mut strategy =
            DefaultFillStrategy::new(None).with_trigger_policy(TriggerPolicy::AlwaysBid);
        let mut order = Order::new(
            Action::Buy,
            "AAA".to_string(),
            OrderKind::Limit { limit_price: dec!(10.0) },
            dec!(50.0),
        );

        let fill = strategy
            .fill(&mut order, &tick(dec!(11.0), dec!(11.1), Frequency::Minute), &IntegerTraits, &NoSlippage)
            .unwrap();
        assert_eq!(fill.price, dec!(11.0));
    }

    #[test]
    fn stop_buy_triggers_when_bid_crosses_above_stop_price() {
        let mut strategy = DefaultFillStrategy::new(None);
        let mut order = Order::new(
            Action::Buy,
            "AAA".to_string(),
            OrderKind::Stop {
                stop_price: dec!(15.0),
                stop_hit: false,
            },
            dec!(10.0),
        );

        assert!(strategy
            .fill(&mut order, &tick(dec!(14.0), dec!(14.1), Frequency::Minute), &IntegerTraits, &NoSlippage)
            .is_none());
        assert!(!order.stop_hit());

        let fill = strategy
            .fill(&mut order, &tick(dec!(16.0), dec!(16.1), Frequency::Minute), &IntegerTraits, &NoSlippage)
            .unwrap();
        assert_eq!(fill.price, dec!(16.0));
        assert!(order.stop_hit());
    }

    #[test]
    fn all_or_none_blocks_partial_fill_when_volume_insufficient() {
        let mut strategy = DefaultFillStrategy::new(Some(dec!(0.25)));
        strategy.volume_left.insert("AAA".to_string(), dec!(20.0));

        let mut order = Order::new(
            Action::Buy,
            "AAA".to_string(),
            OrderKind::Market { on_close: false },
            dec!(80.0),
        )
        .with_all_or_none(true);

        assert!(strategy
            .fill(&mut order, &tick(dec!(10.0), dec!(10.1), Frequency::Minute), &IntegerTraits, &NoSlippage)
            .is_none());
    }

    #[test]
    fn config_deserializes_and_builds_the_strategy() {
        let config: FillStrategyConfig =
            serde_json::from_str(r#"{"volume_limit": 0.5, "trigger_policy": "always_bid"}"#)
                .unwrap();
        assert_eq!(config.volume_limit, Some(dec!(0.5)));
        assert_eq!(config.trigger_policy, TriggerPolicy::AlwaysBid);

        let strategy: DefaultFillStrategy = config.into();
        assert_eq!(strategy.volume_left("AAA"), Decimal::ZERO);
    }
}
