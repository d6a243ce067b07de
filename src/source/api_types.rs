//! Serde-deserializable types matching the table API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::types::Record;

// ============================================================================
// Record endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiRecord {
  pub id: String,
  #[serde(rename = "createdTime", default)]
  pub created_time: Option<DateTime<Utc>>,
  #[serde(default)]
  pub fields: BTreeMap<String, serde_json::Value>,
}

/// `GET {table}?page=..&page_size=..`
#[derive(Debug, Deserialize)]
pub struct ApiRecordsResponse {
  #[serde(default)]
  pub records: Vec<ApiRecord>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiRecord> for Record {
  fn from(api: ApiRecord) -> Self {
    Record {
      id: api.id,
      created: api.created_time,
      fields: api.fields,
    }
  }
}
