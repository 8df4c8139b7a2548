//! Domain types: registry tables, logical keys, segments.

pub mod key;
pub mod registry;
pub mod segment;

pub use key::{expand_keys, LogicalKey};
pub use registry::{ConfigurationError, Interval, MarketDataType, Registry, TradingType};
pub use segment::{OutputFormat, Segment, StorageFormat};
