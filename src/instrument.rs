//! Per-instrument quantity rounding rules.

use rust_decimal::Decimal;

/// Rounds order/fill quantities to an instrument's tradable unit.
///
/// The reference broker only ever rounds to whole shares, so a single zero-sized
/// implementation covers every instrument unless a caller supplies its own.
pub trait InstrumentTraits {
    fn round_quantity(&self, quantity: Decimal) -> Decimal;
}

/// Rounds to the nearest whole unit, mirroring the broker's default share-counting rule.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct IntegerTraits;

impl InstrumentTraits for IntegerTraits {
    fn round_quantity(&self, quantity: Decimal) -> Decimal {
        quantity.round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn should_round_to_whole_shares() {
        let traits = IntegerTraits;
        assert_eq!(traits.round_quantity(dec!(10.4)), dec!(10));
        assert_eq!(traits.round_quantity(dec!(10.5)), dec!(11));
    }
}
