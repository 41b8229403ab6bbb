pub mod config;
pub mod error;
pub mod types;
pub mod watchlist;

pub use config::AppConfig;
pub use error::ChainwatchError;
pub use types::*;
pub use watchlist::{load_watchlist, Watchlist};
