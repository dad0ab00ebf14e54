use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("builder incomplete, missing attribute: {0}")]
    BuilderIncomplete(&'static str),
    #[error("starting cash must be non-negative")]
    NegativeStartingCash,
    #[error("the order was already processed and cannot be submitted again")]
    AlreadyProcessed,
    #[error("the order is not active anymore")]
    NotActive,
    #[error("can't cancel an order that has already been filled")]
    AlreadyFilled,
    #[error("market-on-close orders are not supported on intraday feeds")]
    MarketOnCloseNotSupported,
    #[error(transparent)]
    Order(#[from] crate::order::OrderError),
}
