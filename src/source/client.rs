use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::loader::{FetchError, PageRequest};
use crate::source::api_types::{ApiRecord, ApiRecordsResponse};
use crate::source::types::Record;

/// Table API client wrapper
#[derive(Clone)]
pub struct TableClient {
  http: Client,
  base: Url,
  token: String,
}

impl TableClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(&config.source.url, token)
  }

  pub fn with_token(base_url: &str, token: String) -> Result<Self> {
    let base =
      Url::parse(base_url).map_err(|e| eyre!("Invalid source url {}: {}", base_url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("Invalid source url {}: not a base url", base_url));
    }

    let http = Client::builder()
      .user_agent(concat!("opsdeck/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  fn table_url(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    // Checked in with_token: the base url can carry path segments
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// URL of one page of a table
  pub fn page_url(&self, table: &str, filter: Option<&str>, request: PageRequest) -> Url {
    let mut url = self.table_url(&[table]);
    {
      let mut query = url.query_pairs_mut();
      query
        .append_pair("page", &request.page.to_string())
        .append_pair("page_size", &request.page_size.to_string());
      if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        query.append_pair("filter", filter);
      }
    }
    url
  }

  /// Fetch one page of records.
  ///
  /// Resolves to `FetchError::Cancelled` as soon as `token` is cancelled,
  /// dropping the underlying request.
  pub async fn fetch_page(
    &self,
    table: &str,
    filter: Option<&str>,
    request: PageRequest,
    token: CancellationToken,
  ) -> Result<Vec<Record>, FetchError> {
    let url = self.page_url(table, filter, request);
    debug!(%url, "GET page");

    let send = async {
      self
        .http
        .get(url)
        .bearer_auth(&self.token)
        .send()
        .await?
        .error_for_status()?
        .json::<ApiRecordsResponse>()
        .await
    };

    let response = tokio::select! {
      biased;
      _ = token.cancelled() => return Err(FetchError::Cancelled),
      response = send => response,
    };

    let response = response.map_err(|e| {
      FetchError::Failed(format!(
        "Failed to load {} page {}: {}",
        table, request.page, e
      ))
    })?;

    let mut records: Vec<Record> = response.records.into_iter().map(Record::from).collect();
    // A longer page would make end-of-data detection unreliable
    records.truncate(request.page_size);

    Ok(records)
  }

  /// Get a single record by id
  pub async fn get_record(&self, table: &str, id: &str) -> Result<Record> {
    let url = self.table_url(&[table, id]);
    debug!(%url, "GET record");

    let record: ApiRecord = self
      .http
      .get(url)
      .bearer_auth(&self.token)
      .send()
      .await
      .and_then(|r| r.error_for_status())
      .map_err(|e| eyre!("Failed to get record {}: {}", id, e))?
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse record {}: {}", id, e))?;

    Ok(record.into())
  }
}
