use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("cannot add ticks to a feed that has already started iterating")]
    FeedLocked,
    #[error("duplicate timestamp {0} encountered while iterating the feed")]
    DuplicateTimestamp(chrono::DateTime<chrono::Utc>),
    #[error(transparent)]
    Ticks(#[from] crate::tick::TicksError),
    #[error("malformed tick row: {0}")]
    MalformedRow(String),
    #[error("no data_directory configured for loading instruments by name")]
    MissingDataDirectory,
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
