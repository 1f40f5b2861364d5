//! Insertion ordered hash maps with per-key assignment timestamps.

mod error;
mod ordered_map;
mod timestamped;

pub use error::{Error, Result};
pub use ordered_map::{IntOrderedMap, OrderedMap};
pub use timestamped::TimestampedOrderedMap;
