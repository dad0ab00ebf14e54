//! Orders modeled as a tagged union over kind, with an explicit state machine.
//!
//! The reference broker double-dispatches fills through a class hierarchy of order
//! subclasses. Here the order carries its kind as data and the fill strategy switches on
//! it once, which keeps the state machine in one place instead of scattered across
//! per-subclass `process` overrides.

pub mod error;

pub use error::OrderError;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::tick::Instrument;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Action {
    Buy,
    Sell,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum OrderState {
    Initial,
    Submitted,
    Accepted,
    PartiallyFilled,
    Filled,
    Canceled,
}

impl OrderState {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            OrderState::Submitted | OrderState::Accepted | OrderState::PartiallyFilled
        )
    }
}

/// Order-kind-specific data. Holds only what each kind needs to compute its trigger and
/// fill price; the common quantity/flags/state live on [`Order`] itself.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub enum OrderKind {
    Market { on_close: bool },
    Limit { limit_price: Decimal },
    Stop { stop_price: Decimal, stop_hit: bool },
    StopLimit {
        stop_price: Decimal,
        limit_price: Decimal,
        stop_hit: bool,
    },
}

/// Record of the most recent fill applied to an order.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionInfo {
    pub price: Decimal,
    pub quantity: Decimal,
    pub commission: Decimal,
    pub datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: Option<u64>,
    action: Action,
    instrument: Instrument,
    kind: OrderKind,
    quantity: Decimal,
    filled: Decimal,
    good_till_canceled: bool,
    all_or_none: bool,
    state: OrderState,
    submitted_at: Option<DateTime<Utc>>,
    accepted_at: Option<DateTime<Utc>>,
    execution_info: Option<ExecutionInfo>,
}

impl Order {
    pub fn new(action: Action, instrument: Instrument, kind: OrderKind, quantity: Decimal) -> Self {
        Self {
            id: None,
            action,
            instrument,
            kind,
            quantity,
            filled: Decimal::ZERO,
            good_till_canceled: false,
            all_or_none: false,
            state: OrderState::Initial,
            submitted_at: None,
            accepted_at: None,
            execution_info: None,
        }
    }

    pub fn with_good_till_canceled(mut self, gtc: bool) -> Self {
        self.good_till_canceled = gtc;
        self
    }

    pub fn with_all_or_none(mut self, all_or_none: bool) -> Self {
        self.all_or_none = all_or_none;
        self
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn filled(&self) -> Decimal {
        self.filled
    }

    pub fn remaining(&self) -> Decimal {
        self.quantity - self.filled
    }

    pub fn good_till_canceled(&self) -> bool {
        self.good_till_canceled
    }

    pub fn all_or_none(&self) -> bool {
        self.all_or_none
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn accepted_at(&self) -> Option<DateTime<Utc>> {
        self.accepted_at
    }

    pub fn execution_info(&self) -> Option<ExecutionInfo> {
        self.execution_info
    }

    /// Whether a stop (or stop-limit) order's trigger has fired. Non-stop kinds are never
    /// "hit" in this sense and always report `false`.
    pub fn stop_hit(&self) -> bool {
        match self.kind {
            OrderKind::Stop { stop_hit, .. } | OrderKind::StopLimit { stop_hit, .. } => stop_hit,
            _ => false,
        }
    }

    pub fn set_stop_hit(&mut self, hit: bool) {
        match &mut self.kind {
            OrderKind::Stop { stop_hit, .. } | OrderKind::StopLimit { stop_hit, .. } => {
                *stop_hit = hit
            }
            _ => {}
        }
    }

    pub fn submit(&mut self, id: u64, at: DateTime<Utc>) -> Result<(), OrderError> {
        if self.state != OrderState::Initial {
            return Err(OrderError::AlreadyProcessed);
        }
        self.id = Some(id);
        self.submitted_at = Some(at);
        self.state = OrderState::Submitted;
        Ok(())
    }

    pub fn accept(&mut self, at: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition(OrderState::Accepted, self.state == OrderState::Submitted)?;
        self.accepted_at = Some(at);
        Ok(())
    }

    /// Applies a fill, transitioning to `Filled` when it exhausts the remaining quantity or
    /// `PartiallyFilled` otherwise. Mutates `filled`/`execution_info` only on success, so a
    /// caller can rely on an error leaving the order untouched.
    pub fn add_execution(&mut self, info: ExecutionInfo) -> Result<(), OrderError> {
        let can_fill = matches!(self.state, OrderState::Accepted | OrderState::PartiallyFilled);
        if !can_fill {
            return Err(OrderError::IllegalStateTransition {
                from: self.state,
                to: OrderState::PartiallyFilled,
            });
        }

        let filled = self.filled + info.quantity;
        let next_state = if filled >= self.quantity {
            OrderState::Filled
        } else {
            OrderState::PartiallyFilled
        };

        self.filled = filled;
        self.execution_info = Some(info);
        self.state = next_state;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        if self.state == OrderState::Filled || self.state == OrderState::Canceled {
            return Err(OrderError::AlreadyFilled);
        }
        self.transition(OrderState::Canceled, self.is_active())?;
        Ok(())
    }

    fn transition(&mut self, to: OrderState, allowed: bool) -> Result<(), OrderError> {
        if !allowed {
            return Err(OrderError::IllegalStateTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
