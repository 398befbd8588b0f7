//! Price history: exchange client, parquet cache, and the store that
//! combines them.

pub mod cache;
pub mod exchange;
pub mod store;
pub mod types;

pub use cache::ParquetCache;
pub use exchange::{ExchangeClient, ExchangeConfig, RetryPolicy};
pub use store::PriceStore;
pub use types::{Bar, BarTable};
