//! Core types for the page cache.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Identifies one page of one resource under one pagination configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  /// Logical resource name, including any server-side filter
  pub resource: String,
  /// Zero-based page index
  pub page: usize,
  /// Number of items requested per page
  pub page_size: usize,
}

impl CacheKey {
  pub fn new(resource: impl Into<String>, page: usize, page_size: usize) -> Self {
    Self {
      resource: resource.into(),
      page,
      page_size,
    }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}[{}x{}]", self.resource, self.page, self.page_size)
  }
}

/// A cached page. Never mutated after creation; a refresh replaces it.
#[derive(Debug)]
pub struct CacheEntry<T> {
  /// The page's items in server order
  pub items: Arc<[T]>,
  /// When the page was stored
  pub loaded_at: Instant,
  /// `loaded_at + ttl`
  pub expires_at: Instant,
  /// Insertion sequence, orders entries stored at the same instant
  pub(super) seq: u64,
}

impl<T> CacheEntry<T> {
  pub(super) fn new(items: Vec<T>, loaded_at: Instant, ttl: Duration, seq: u64) -> Self {
    Self {
      items: items.into(),
      loaded_at,
      expires_at: loaded_at + ttl,
      seq,
    }
  }

  /// Whether the entry is still usable at `now`.
  pub fn is_fresh_at(&self, now: Instant) -> bool {
    now < self.expires_at
  }
}

// Manual impl so cloning an entry does not require `T: Clone`.
impl<T> Clone for CacheEntry<T> {
  fn clone(&self) -> Self {
    Self {
      items: Arc::clone(&self.items),
      loaded_at: self.loaded_at,
      expires_at: self.expires_at,
      seq: self.seq,
    }
  }
}
