//! Bounded, TTL-expiring page store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::entry::{CacheEntry, CacheKey};

/// Keyed store of previously loaded pages.
///
/// Expiry is lazy: an entry past its `expires_at` is reported as absent but
/// stays in the map until eviction or a clear removes it. Eviction runs after
/// every `put` and drops the oldest-loaded entries; reads do not refresh an
/// entry's age.
#[derive(Debug)]
pub struct PagedCache<T> {
  entries: HashMap<CacheKey, CacheEntry<T>>,
  max_entries: usize,
  next_seq: u64,
}

impl<T> PagedCache<T> {
  pub fn new(max_entries: usize) -> Self {
    Self {
      entries: HashMap::new(),
      max_entries,
      next_seq: 0,
    }
  }

  pub fn max_entries(&self) -> usize {
    self.max_entries
  }

  /// Number of stored entries, including logically expired ones.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Get a page if it is still fresh.
  pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry<T>> {
    self.get_at(key, Instant::now())
  }

  fn get_at(&self, key: &CacheKey, now: Instant) -> Option<&CacheEntry<T>> {
    self.entries.get(key).filter(|entry| entry.is_fresh_at(now))
  }

  /// Store a page, replacing any previous entry for the key, then evict.
  pub fn put(&mut self, key: CacheKey, items: Vec<T>, ttl: Duration) {
    let seq = self.next_seq;
    self.next_seq += 1;

    let entry = CacheEntry::new(items, Instant::now(), ttl, seq);
    self.entries.insert(key, entry);
    self.evict();
  }

  /// Drop the oldest entries until the store is back at `max_entries`.
  pub fn evict(&mut self) {
    if self.entries.len() <= self.max_entries {
      return;
    }

    let mut by_age: Vec<(Instant, u64, CacheKey)> = self
      .entries
      .iter()
      .map(|(key, entry)| (entry.loaded_at, entry.seq, key.clone()))
      .collect();
    by_age.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    let excess = self.entries.len() - self.max_entries;
    for (_, _, key) in by_age.into_iter().take(excess) {
      debug!(%key, "evicting cached page");
      self.entries.remove(&key);
    }
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Remove every page of one resource, leaving other resources intact.
  pub fn clear_resource(&mut self, resource: &str) {
    self.entries.retain(|key, _| key.resource != resource);
  }
}

/// Page cache shared between loaders.
///
/// Mutation is limited to whole-entry insert/remove, so a lock poisoned by a
/// panicking holder still guards a consistent map and is recovered.
pub struct SharedPageCache<T> {
  inner: Arc<Mutex<PagedCache<T>>>,
}

impl<T> SharedPageCache<T> {
  pub fn new(max_entries: usize) -> Self {
    Self {
      inner: Arc::new(Mutex::new(PagedCache::new(max_entries))),
    }
  }

  fn lock(&self) -> MutexGuard<'_, PagedCache<T>> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
    self.lock().get(key).cloned()
  }

  pub fn put(&self, key: CacheKey, items: Vec<T>, ttl: Duration) {
    self.lock().put(key, items, ttl);
  }

  pub fn clear(&self) {
    self.lock().clear();
  }

  pub fn clear_resource(&self, resource: &str) {
    self.lock().clear_resource(resource);
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }
}

impl<T> Clone for SharedPageCache<T> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}
