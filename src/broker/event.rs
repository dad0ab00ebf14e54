//! Order-lifecycle events the broker emits on its event bus.

use crate::order::Order;

#[derive(Debug, Clone)]
pub enum OrderEventKind {
    Submitted,
    Accepted,
    Filled,
    PartiallyFilled,
    Canceled { reason: &'static str },
}

#[derive(Debug, Clone)]
pub struct OrderEvent {
    pub order: Order,
    pub kind: OrderEventKind,
}
