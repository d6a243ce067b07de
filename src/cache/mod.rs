//! In-memory page cache shared by every list loader.
//!
//! This module provides a resource-agnostic cache that:
//! - Stores whole pages keyed by resource, page index and page size
//! - Expires entries lazily once their TTL has elapsed
//! - Bounds its size by evicting the oldest-loaded pages first

mod entry;
mod store;

pub use entry::{CacheEntry, CacheKey};
pub use store::{PagedCache, SharedPageCache};
