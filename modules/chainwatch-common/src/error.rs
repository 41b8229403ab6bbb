use thiserror::Error;

/// Startup failures: configuration and watchlist problems that abort
/// the process before a run begins. Runtime layers carry their own
/// error types next to the code that produces them (`StoreError`,
/// `DecodeError`); sensor and agent failures degrade in place instead
/// of propagating.
#[derive(Error, Debug)]
pub enum ChainwatchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid watchlist: {0}")]
    Validation(String),
}
