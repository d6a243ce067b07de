//! Incremental, page-at-a-time loading of long lists.
//!
//! An [`IncrementalLoader`] owns the aggregated items of one resource and
//! pulls further pages on demand through an injected fetch function, going
//! through the shared [`SharedPageCache`] first.
//!
//! Like the rest of the UI it is tick-driven: `load_more()` and `refresh()`
//! return immediately, the fetch runs as a spawned task, and `poll()` applies
//! its result from the event loop.
//!
//! ```ignore
//! let client = table_client.clone();
//! let mut loader = IncrementalLoader::new("campaigns", config, cache, move |req, token| {
//!     let client = client.clone();
//!     async move { client.fetch_page("campaigns", None, req, token).await }
//! });
//!
//! loader.refresh();
//!
//! // In event loop tick
//! if loader.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, SharedPageCache};

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default lifetime of a cached page.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// One page to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page: usize,
  pub page_size: usize,
}

/// Why a page fetch did not produce items.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
  /// The request was superseded or abandoned. Never shown to the user.
  #[error("request cancelled")]
  Cancelled,
  /// The source rejected the request or could not be reached.
  #[error("{0}")]
  Failed(String),
}

/// Boxed future returned by page fetchers.
pub type PageFuture<T> = BoxFuture<'static, Result<Vec<T>, FetchError>>;

type FetcherFn<T> = Arc<dyn Fn(PageRequest, CancellationToken) -> PageFuture<T> + Send + Sync>;

/// Pagination and cache settings for one loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
  pub page_size: usize,
  pub ttl: Duration,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      page_size: DEFAULT_PAGE_SIZE,
      ttl: DEFAULT_TTL,
    }
  }
}

/// Observable state of a loader.
#[derive(Debug, Clone)]
pub struct LoadState<T> {
  /// Items of every loaded page, in page order
  pub items: Vec<T>,
  pub is_loading: bool,
  /// False once a page came back shorter than the page size
  pub has_more: bool,
  /// Reason the last fetch failed, cleared by the next successful page
  pub error: Option<String>,
  /// Index of the last page appended, `None` before the first one
  pub current_page: Option<usize>,
}

impl<T> Default for LoadState<T> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      is_loading: false,
      has_more: true,
      error: None,
      current_page: None,
    }
  }
}

/// The single fetch a loader may have outstanding.
struct InFlight<T> {
  request: PageRequest,
  token: CancellationToken,
  receiver: mpsc::UnboundedReceiver<Result<Vec<T>, FetchError>>,
}

/// Cursor-style loader over a paged resource.
pub struct IncrementalLoader<T> {
  resource: String,
  config: LoaderConfig,
  cache: SharedPageCache<T>,
  fetcher: FetcherFn<T>,
  state: LoadState<T>,
  in_flight: Option<InFlight<T>>,
}

impl<T: Clone + Send + 'static> IncrementalLoader<T> {
  /// Create a loader for `resource`.
  ///
  /// The fetcher is called once per page that is not served from the cache.
  /// It receives a token that is cancelled when the request is superseded;
  /// honoring it is optional, since a cancelled request's result is dropped
  /// either way.
  pub fn new<F, Fut>(
    resource: impl Into<String>,
    config: LoaderConfig,
    cache: SharedPageCache<T>,
    fetcher: F,
  ) -> Self
  where
    F: Fn(PageRequest, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'static,
  {
    Self {
      resource: resource.into(),
      config,
      cache,
      fetcher: Arc::new(move |request, token| Box::pin(fetcher(request, token))),
      state: LoadState::default(),
      in_flight: None,
    }
  }

  pub fn resource(&self) -> &str {
    &self.resource
  }

  pub fn page_size(&self) -> usize {
    self.config.page_size
  }

  pub fn state(&self) -> &LoadState<T> {
    &self.state
  }

  pub fn items(&self) -> &[T] {
    &self.state.items
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading
  }

  pub fn has_more(&self) -> bool {
    self.state.has_more
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error.as_deref()
  }

  pub fn current_page(&self) -> Option<usize> {
    self.state.current_page
  }

  /// Load the next page.
  ///
  /// This is a no-op while a fetch is outstanding or after the last page.
  /// A fresh cached page is appended immediately without a fetch.
  pub fn load_more(&mut self) {
    if self.state.is_loading || !self.state.has_more {
      return;
    }

    let page = self.state.current_page.map_or(0, |p| p + 1);
    self.load_page(page, false);
  }

  /// Discard everything and reload from the first page.
  ///
  /// Cancels the outstanding fetch, drops this resource's cached pages and
  /// fetches page 0 from the source even if a fresh copy exists.
  pub fn refresh(&mut self) {
    self.cancel_in_flight();
    info!(resource = %self.resource, "refreshing");

    self.cache.clear_resource(&self.resource);
    self.state = LoadState::default();
    self.load_page(0, true);
  }

  /// Abandon the outstanding fetch, if any, without starting another.
  pub fn cancel(&mut self) {
    self.cancel_in_flight();
    self.state.is_loading = false;
  }

  /// Apply the outstanding fetch's result if it has arrived.
  ///
  /// Returns `true` if the state changed. Call this in the event loop tick.
  pub fn poll(&mut self) -> bool {
    let in_flight = match &mut self.in_flight {
      Some(in_flight) => in_flight,
      None => return false,
    };

    let outcome = match in_flight.receiver.try_recv() {
      Ok(outcome) => outcome,
      Err(mpsc::error::TryRecvError::Empty) => return false,
      Err(mpsc::error::TryRecvError::Disconnected) => Err(lost_task(&in_flight.token)),
    };

    let request = in_flight.request;
    self.in_flight = None;
    self.apply(request, outcome);
    true
  }

  /// Wait for the outstanding fetch, if any, and apply its result.
  ///
  /// Returns `true` if there was a fetch to wait for.
  pub async fn settle(&mut self) -> bool {
    let in_flight = match &mut self.in_flight {
      Some(in_flight) => in_flight,
      None => return false,
    };

    let outcome = match in_flight.receiver.recv().await {
      Some(outcome) => outcome,
      None => Err(lost_task(&in_flight.token)),
    };

    let request = in_flight.request;
    self.in_flight = None;
    self.apply(request, outcome);
    true
  }

  fn cache_key(&self, page: usize) -> CacheKey {
    CacheKey::new(self.resource.clone(), page, self.config.page_size)
  }

  fn load_page(&mut self, page: usize, force_refresh: bool) {
    let request = PageRequest {
      page,
      page_size: self.config.page_size,
    };

    if !force_refresh {
      let key = self.cache_key(page);
      if let Some(entry) = self.cache.get(&key) {
        debug!(%key, "page cache hit");
        self.append_page(request, entry.items.to_vec());
        return;
      }
      debug!(%key, "page cache miss");
    }

    self.start_fetch(request);
  }

  fn start_fetch(&mut self, request: PageRequest) {
    debug!(resource = %self.resource, page = request.page, "fetching page");

    let (tx, rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let future = (self.fetcher)(request, token.clone());

    let task_token = token.clone();
    tokio::spawn(async move {
      let outcome = tokio::select! {
        biased;
        _ = task_token.cancelled() => Err(FetchError::Cancelled),
        outcome = future => outcome,
      };
      // Ignore send errors - receiver is dropped when the request is superseded
      let _ = tx.send(outcome);
    });

    self.in_flight = Some(InFlight {
      request,
      token,
      receiver: rx,
    });
    self.state.is_loading = true;
  }

  fn cancel_in_flight(&mut self) {
    if let Some(in_flight) = self.in_flight.take() {
      debug!(resource = %self.resource, page = in_flight.request.page, "cancelling fetch");
      in_flight.token.cancel();
    }
  }

  fn apply(&mut self, request: PageRequest, outcome: Result<Vec<T>, FetchError>) {
    self.state.is_loading = false;

    match outcome {
      Ok(items) => {
        self
          .cache
          .put(self.cache_key(request.page), items.clone(), self.config.ttl);
        self.append_page(request, items);
      }
      Err(FetchError::Cancelled) => {
        debug!(resource = %self.resource, page = request.page, "fetch cancelled");
      }
      Err(FetchError::Failed(reason)) => {
        warn!(resource = %self.resource, page = request.page, %reason, "fetch failed");
        self.state.error = Some(reason);
      }
    }
  }

  fn append_page(&mut self, request: PageRequest, items: Vec<T>) {
    self.state.has_more = items.len() >= request.page_size;
    self.state.current_page = Some(request.page);
    self.state.error = None;
    self.state.items.extend(items);
  }
}

/// Outcome for a fetch task that ended without reporting, e.g. a panicking
/// fetcher. Only a cancelled request counts as cancelled.
fn lost_task(token: &CancellationToken) -> FetchError {
  if token.is_cancelled() {
    FetchError::Cancelled
  } else {
    FetchError::Failed("fetch task ended without a result".to_string())
  }
}

impl<T> Drop for IncrementalLoader<T> {
  fn drop(&mut self) {
    if let Some(in_flight) = self.in_flight.take() {
      in_flight.token.cancel();
    }
  }
}

impl<T> std::fmt::Debug for IncrementalLoader<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("IncrementalLoader")
      .field("resource", &self.resource)
      .field("config", &self.config)
      .field("items", &self.state.items.len())
      .field("is_loading", &self.state.is_loading)
      .field("has_more", &self.state.has_more)
      .field("current_page", &self.state.current_page)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use std::sync::Mutex;

  const TTL: Duration = Duration::from_secs(300);

  fn config(page_size: usize) -> LoaderConfig {
    LoaderConfig { page_size, ttl: TTL }
  }

  /// Loader over the numbers `0..total`, counting fetcher invocations.
  fn numbers(
    total: usize,
    page_size: usize,
    cache: SharedPageCache<usize>,
    calls: Arc<AtomicUsize>,
  ) -> IncrementalLoader<usize> {
    IncrementalLoader::new("numbers", config(page_size), cache, move |req, _token| {
      calls.fetch_add(1, Ordering::SeqCst);
      async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let start = req.page * req.page_size;
        let end = (start + req.page_size).min(total);
        Ok((start..end).collect())
      }
    })
  }

  #[tokio::test(start_paused = true)]
  async fn test_pages_aggregate_in_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut loader = numbers(50, 20, SharedPageCache::new(50), calls.clone());

    let mut expected_len = 0;
    for page_len in [20, 20, 10] {
      loader.load_more();
      assert!(loader.is_loading());
      assert!(loader.settle().await);
      expected_len += page_len;
      assert_eq!(loader.items().len(), expected_len);
    }

    assert_eq!(loader.items(), (0..50).collect::<Vec<_>>().as_slice());
    assert_eq!(loader.current_page(), Some(2));
    assert!(!loader.has_more());
    assert!(!loader.is_loading());
  }

  #[tokio::test(start_paused = true)]
  async fn test_end_of_data_stops_fetching() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut loader = numbers(5, 20, SharedPageCache::new(50), calls.clone());

    loader.load_more();
    loader.settle().await;
    assert!(!loader.has_more());

    loader.load_more();
    loader.load_more();
    assert!(!loader.is_loading());
    assert!(!loader.settle().await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_full_last_page_needs_one_more_fetch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut loader = numbers(40, 20, SharedPageCache::new(50), calls.clone());

    for _ in 0..3 {
      loader.load_more();
      loader.settle().await;
    }

    assert_eq!(loader.items().len(), 40);
    assert!(!loader.has_more());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_single_fetch_in_flight() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut loader = numbers(100, 20, SharedPageCache::new(50), calls.clone());

    loader.load_more();
    loader.load_more();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    loader.settle().await;
    assert_eq!(loader.items().len(), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_poll_applies_result_on_tick() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut loader = numbers(100, 20, SharedPageCache::new(50), calls);

    loader.load_more();
    assert!(!loader.poll());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(loader.poll());
    assert_eq!(loader.items().len(), 20);
    assert!(!loader.poll());
  }

  #[tokio::test(start_paused = true)]
  async fn test_cached_page_skips_fetch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = SharedPageCache::new(50);

    let mut first = numbers(100, 20, cache.clone(), calls.clone());
    first.load_more();
    first.settle().await;

    let mut second = numbers(100, 20, cache.clone(), calls.clone());
    second.load_more();

    assert!(!second.is_loading());
    assert_eq!(second.items(), first.items());
    assert_eq!(second.current_page(), Some(0));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_page_is_refetched() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = SharedPageCache::new(50);

    let mut first = numbers(100, 20, cache.clone(), calls.clone());
    first.load_more();
    first.settle().await;

    tokio::time::advance(TTL).await;

    let mut second = numbers(100, 20, cache.clone(), calls.clone());
    second.load_more();
    assert!(second.is_loading());
    second.settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refresh_supersedes_pending_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_fetch = calls.clone();

    let cache = SharedPageCache::new(50);
    let mut loader = IncrementalLoader::new(
      "campaigns",
      config(20),
      cache.clone(),
      move |_req, _token| {
        let call = calls_for_fetch.fetch_add(1, Ordering::SeqCst);
        async move {
          if call == 0 {
            // Ignores its token and resolves late
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(vec!["stale"])
          } else {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(vec!["fresh"])
          }
        }
      },
    );

    loader.load_more();
    loader.refresh();
    assert!(loader.is_loading());

    loader.settle().await;
    assert_eq!(loader.items(), &["fresh"]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!loader.poll());
    assert_eq!(loader.items(), &["fresh"]);
    assert_eq!(loader.error(), None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // The superseded result never overwrites the fresh cached page
    let entry = cache.get(&CacheKey::new("campaigns", 0, 20)).unwrap();
    assert_eq!(&*entry.items, &["fresh"]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refresh_bypasses_fresh_cache() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = SharedPageCache::new(50);
    let mut loader = numbers(100, 20, cache.clone(), calls.clone());

    loader.load_more();
    loader.settle().await;
    loader.load_more();
    loader.settle().await;
    assert_eq!(loader.items().len(), 40);

    loader.refresh();
    assert!(loader.items().is_empty());
    assert_eq!(loader.current_page(), None);
    assert!(loader.has_more());
    assert!(loader.is_loading());

    loader.settle().await;
    assert_eq!(loader.items().len(), 20);
    assert_eq!(loader.current_page(), Some(0));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Only the refetched page is cached again
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refresh_keeps_other_resources_cached() {
    let cache = SharedPageCache::new(50);
    cache.put(CacheKey::new("other", 0, 20), vec![99], TTL);

    let mut loader = numbers(100, 20, cache.clone(), Arc::new(AtomicUsize::new(0)));
    loader.load_more();
    loader.settle().await;
    loader.refresh();

    assert!(cache.get(&CacheKey::new("other", 0, 20)).is_some());
    assert!(cache.get(&CacheKey::new("numbers", 0, 20)).is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_failure_keeps_last_good_state_and_retries() {
    let fail = Arc::new(AtomicBool::new(false));
    let fail_for_fetch = fail.clone();

    let mut loader = IncrementalLoader::new(
      "ad_accounts",
      config(2),
      SharedPageCache::new(50),
      move |req, _token| {
        let fail = fail_for_fetch.load(Ordering::SeqCst);
        async move {
          if fail {
            Err(FetchError::Failed("502 Bad Gateway".to_string()))
          } else {
            Ok(vec![req.page * 2, req.page * 2 + 1])
          }
        }
      },
    );

    loader.load_more();
    loader.settle().await;
    assert_eq!(loader.items(), &[0, 1]);

    fail.store(true, Ordering::SeqCst);
    loader.load_more();
    loader.settle().await;
    assert_eq!(loader.error(), Some("502 Bad Gateway"));
    assert_eq!(loader.items(), &[0, 1]);
    assert_eq!(loader.current_page(), Some(0));
    assert!(!loader.is_loading());
    assert!(loader.has_more());

    fail.store(false, Ordering::SeqCst);
    loader.load_more();
    loader.settle().await;
    assert_eq!(loader.error(), None);
    assert_eq!(loader.items(), &[0, 1, 2, 3]);
    assert_eq!(loader.current_page(), Some(1));
  }

  #[tokio::test(start_paused = true)]
  async fn test_failed_page_is_not_cached() {
    let cache = SharedPageCache::new(50);
    let mut loader = IncrementalLoader::new(
      "sessions",
      config(20),
      cache.clone(),
      |_req, _token| async { Err::<Vec<u8>, _>(FetchError::Failed("timeout".to_string())) },
    );

    loader.load_more();
    loader.settle().await;
    assert!(cache.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancel_is_silent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut loader = numbers(100, 20, SharedPageCache::new(50), calls);

    loader.load_more();
    loader.cancel();
    assert!(!loader.is_loading());
    assert!(!loader.settle().await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!loader.poll());
    assert!(loader.items().is_empty());
    assert_eq!(loader.error(), None);

    // Still able to load afterwards
    loader.load_more();
    loader.settle().await;
    assert_eq!(loader.items().len(), 20);
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancelled_result_from_fetcher_is_swallowed() {
    let mut loader = IncrementalLoader::new(
      "sessions",
      config(20),
      SharedPageCache::new(50),
      |_req, _token| async { Err::<Vec<u8>, _>(FetchError::Cancelled) },
    );

    loader.load_more();
    loader.settle().await;
    assert_eq!(loader.error(), None);
    assert!(!loader.is_loading());
    assert_eq!(loader.current_page(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_task_ending_without_result_is_a_failure() {
    let mut loader = IncrementalLoader::new(
      "sessions",
      config(20),
      SharedPageCache::new(50),
      |req: PageRequest, _token| async move {
        if req.page == 0 {
          panic!("fetcher bug");
        }
        Ok::<Vec<u8>, FetchError>(Vec::new())
      },
    );

    loader.load_more();
    assert!(loader.settle().await);
    assert!(!loader.is_loading());
    assert_eq!(loader.error(), Some("fetch task ended without a result"));
    assert_eq!(loader.current_page(), None);
    assert!(loader.has_more());
  }

  #[tokio::test(start_paused = true)]
  async fn test_polled_task_ending_without_result_is_a_failure() {
    let mut loader = IncrementalLoader::new(
      "sessions",
      config(20),
      SharedPageCache::new(50),
      |req: PageRequest, _token| async move {
        if req.page == 0 {
          panic!("fetcher bug");
        }
        Ok::<Vec<u8>, FetchError>(Vec::new())
      },
    );

    loader.load_more();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(loader.poll());
    assert!(loader.error().is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_drop_cancels_token() {
    let seen: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
    let seen_for_fetch = seen.clone();

    let mut loader = IncrementalLoader::new(
      "sessions",
      config(20),
      SharedPageCache::new(50),
      move |_req, token: CancellationToken| {
        *seen_for_fetch.lock().unwrap() = Some(token.clone());
        async move {
          token.cancelled().await;
          Err::<Vec<u8>, _>(FetchError::Cancelled)
        }
      },
    );

    loader.load_more();
    drop(loader);

    let token = seen.lock().unwrap().clone().unwrap();
    assert!(token.is_cancelled());
  }
}
