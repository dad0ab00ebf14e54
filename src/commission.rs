//! Commission models applied by the broker on each committed execution.

use rust_decimal::Decimal;

use crate::order::Order;

/// Computes the commission owed on a fill.
pub trait Commission {
    fn calculate(&self, order: &Order, price: Decimal, quantity: Decimal) -> Decimal;
}

/// No commission at all.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoCommission;

impl Commission for NoCommission {
    fn calculate(&self, _order: &Order, _price: Decimal, _quantity: Decimal) -> Decimal {
        Decimal::ZERO
    }
}

/// A flat amount charged only on an order's first fill.
#[derive(Debug, Copy, Clone)]
pub struct FixedPerTrade {
    amount: Decimal,
}

impl FixedPerTrade {
    pub fn new(amount: Decimal) -> Self {
        Self { amount }
    }
}

impl Commission for FixedPerTrade {
    fn calculate(&self, order: &Order, _price: Decimal, _quantity: Decimal) -> Decimal {
        if order.execution_info().is_none() {
            self.amount
        } else {
            Decimal::ZERO
        }
    }
}

/// A percentage of the trade's gross value, charged on every fill.
#[derive(Debug, Copy, Clone)]
pub struct PercentageOfTrade {
    percentage: Decimal,
}

impl PercentageOfTrade {
    /// `percentage` must be in `[0, 1)`.
    pub fn new(percentage: Decimal) -> Self {
        assert!(
            (Decimal::ZERO..Decimal::ONE).contains(&percentage),
            "commission percentage must be in [0, 1)"
        );
        Self { percentage }
    }
}

impl Commission for PercentageOfTrade {
    fn calculate(&self, _order: &Order, price: Decimal, quantity: Decimal) -> Decimal {
        price * quantity * self.percentage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Action, OrderKind};
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::new(
            Action::Buy,
            "AAA".to_string(),
            OrderKind::Market { on_close: false },
            dec!(100.0),
        )
    }

    #[test]
    fn no_commission_is_always_zero() {
        assert_eq!(NoCommission.calculate(&order(), dec!(10.0), dec!(100.0)), Decimal::ZERO);
    }

    #[test]
    fn fixed_per_trade_charges_only_first_fill() {
        let commission = FixedPerTrade::new(dec!(5.0));
        let mut order = order();
        assert_eq!(commission.calculate(&order, dec!(10.0), dec!(50.0)), dec!(5.0));

        order.submit(1, chrono::Utc::now()).unwrap();
        order.accept(chrono::Utc::now()).unwrap();
        order
            .add_execution(crate::order::ExecutionInfo {
                price: dec!(10.0),
                quantity: dec!(50.0),
                commission: dec!(5.0),
                datetime: chrono::Utc::now(),
            })
            .unwrap();

        assert_eq!(commission.calculate(&order, dec!(10.0), dec!(50.0)), Decimal::ZERO);
    }

    #[test]
    fn percentage_scales_with_notional() {
        let commission = PercentageOfTrade::new(dec!(0.01));
        assert_eq!(commission.calculate(&order(), dec!(100.0), dec!(10.0)), dec!(10.0));
    }
}
