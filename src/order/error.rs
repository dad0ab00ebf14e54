use thiserror::Error;

use super::OrderState;

#[derive(Debug, Error, Copy, Clone, PartialEq)]
pub enum OrderError {
    #[error("illegal order state transition from {from:?} to {to:?}")]
    IllegalStateTransition { from: OrderState, to: OrderState },
    #[error("order has already been processed and cannot be submitted again")]
    AlreadyProcessed,
    #[error("order is not active")]
    NotActive,
    #[error("cannot cancel an order that has already been filled")]
    AlreadyFilled,
}
