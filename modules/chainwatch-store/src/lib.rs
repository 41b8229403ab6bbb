pub mod error;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{EventStore, StoreOutcome, DEDUP_WINDOW_HOURS};
