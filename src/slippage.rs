//! Pluggable price adjustment applied to non-trade-frequency fills.

use rust_decimal::Decimal;

use crate::order::Order;
use crate::tick::Tick;

/// Adjusts a candidate fill price to account for market impact.
///
/// `volume_used_so_far` is the quantity already filled against this instrument earlier in
/// the same tick step, letting a model scale impact with how much of the tick's rationed
/// volume a prior order has already consumed. Never invoked for `Frequency::Trade` ticks:
/// a trade print is already an executed price, there is nothing to slip against.
pub trait SlippageModel {
    fn adjust_price(
        &self,
        order: &Order,
        price: Decimal,
        fill_size: Decimal,
        tick: &Tick,
        volume_used_so_far: Decimal,
    ) -> Decimal;
}

/// Identity model: returns the price unchanged.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoSlippage;

impl SlippageModel for NoSlippage {
    fn adjust_price(
        &self,
        _order: &Order,
        price: Decimal,
        _fill_size: Decimal,
        _tick: &Tick,
        _volume_used_so_far: Decimal,
    ) -> Decimal {
        price
    }
}

/// Moves the fill price against the order's direction by a fixed percentage, the same
/// constant-slippage assumption production systems often default to for market-like
/// orders. BUY fills worsen upward, SELL fills worsen downward.
#[derive(Debug, Copy, Clone)]
pub struct FixedPercentageSlippage {
    percentage: Decimal,
}

impl FixedPercentageSlippage {
    /// `percentage` must be in `[0, 1)`.
    pub fn new(percentage: Decimal) -> Self {
        assert!(
            (Decimal::ZERO..Decimal::ONE).contains(&percentage),
            "slippage percentage must be in [0, 1)"
        );
        Self { percentage }
    }
}

impl SlippageModel for FixedPercentageSlippage {
    fn adjust_price(
        &self,
        order: &Order,
        price: Decimal,
        _fill_size: Decimal,
        _tick: &Tick,
        _volume_used_so_far: Decimal,
    ) -> Decimal {
        match order.action() {
            crate::order::Action::Buy => price * (Decimal::ONE + self.percentage),
            crate::order::Action::Sell => price * (Decimal::ONE - self.percentage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Action, OrderKind};
    use crate::tick::Frequency;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn no_slippage_returns_price_unchanged() {
        let order = Order::new(
            Action::Buy,
            "AAA".to_string(),
            OrderKind::Market { on_close: false },
            dec!(10.0),
        );
        let tick = Tick::new(Utc::now(), dec!(9.9), dec!(10.1), Frequency::Minute);

        assert_eq!(
            NoSlippage.adjust_price(&order, dec!(10.0), dec!(10.0), &tick, Decimal::ZERO),
            dec!(10.0)
        );
    }

    #[test]
    fn fixed_percentage_slippage_worsens_price_against_the_order() {
        let buy = Order::new(
            Action::Buy,
            "AAA".to_string(),
            OrderKind::Market { on_close: false },
            dec!(10.0),
        );
        let sell = Order::new(
            Action::Sell,
            "AAA".to_string(),
            OrderKind::Market { on_close: false },
            dec!(10.0),
        );
        let tick = Tick::new(Utc::now(), dec!(9.9), dec!(10.1), Frequency::Minute);
        let model = FixedPercentageSlippage::new(dec!(0.01));

        assert_eq!(
            model.adjust_price(&buy, dec!(10.0), dec!(10.0), &tick, Decimal::ZERO),
            dec!(10.1)
        );
        assert_eq!(
            model.adjust_price(&sell, dec!(10.0), dec!(10.0), &tick, Decimal::ZERO),
            dec!(9.9)
        );
    }
}
