//! Remote table API: HTTP client, wire types and domain records.

mod api_types;
pub mod client;
pub mod types;

pub use client::TableClient;
pub use types::Record;
