use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// A row of a remote table
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  pub id: String,
  pub created: Option<DateTime<Utc>>,
  pub fields: BTreeMap<String, Value>,
}

impl Record {
  /// Row title: the configured title field if present and non-empty, else the id.
  pub fn title(&self, title_field: Option<&str>) -> String {
    title_field
      .map(|name| self.field_text(name))
      .filter(|text| !text.is_empty())
      .unwrap_or_else(|| self.id.clone())
  }

  /// Display text for a field, empty if the field is missing.
  pub fn field_text(&self, name: &str) -> String {
    self.fields.get(name).map(value_text).unwrap_or_default()
  }
}

/// Render a JSON field value as a single line of text.
pub fn value_text(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(true) => "yes".to_string(),
    Value::Bool(false) => "no".to_string(),
    Value::Number(n) => n.to_string(),
    Value::Array(items) => items
      .iter()
      .map(value_text)
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>()
      .join(", "),
    // Linked records and attachments carry a display name
    Value::Object(map) => map
      .get("name")
      .or_else(|| map.get("filename"))
      .and_then(Value::as_str)
      .map(String::from)
      .unwrap_or_else(|| value.to_string()),
  }
}
