use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::loader::LoaderConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub source: SourceConfig,
  /// Custom title for header (defaults to the source domain if not set)
  pub title: Option<String>,
  /// Resource opened at startup (defaults to the first configured one)
  pub default_resource: Option<String>,
  pub resources: Vec<ResourceConfig>,
  #[serde(default)]
  pub loading: LoadingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  /// Base URL of the table API, e.g. "https://tables.example.com/v1"
  pub url: String,
}

/// A browsable table.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
  /// Command name used to open the resource (e.g. "campaigns")
  pub name: String,
  /// Table path on the API (defaults to `name`)
  pub table: Option<String>,
  /// Field shown as the row title (defaults to the record id)
  pub title_field: Option<String>,
  /// Extra fields shown as list columns
  #[serde(default)]
  pub columns: Vec<String>,
  #[serde(default)]
  pub aliases: Vec<String>,
  /// Command palette description
  pub description: Option<String>,
}

impl ResourceConfig {
  pub fn table(&self) -> &str {
    self.table.as_deref().unwrap_or(&self.name)
  }
}

/// Pagination, cache and input timing settings.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoadingConfig {
  /// How long a cached page stays fresh
  pub ttl_ms: u64,
  /// Upper bound on cached pages across all resources
  pub max_entries: usize,
  pub page_size: usize,
  /// Rows rendered past the viewport, also the prefetch margin
  pub overscan: usize,
  /// Quiet period before a search filter is applied
  pub debounce_delay_ms: u64,
}

impl Default for LoadingConfig {
  fn default() -> Self {
    Self {
      ttl_ms: 5 * 60 * 1000,
      max_entries: 50,
      page_size: 20,
      overscan: 2,
      debounce_delay_ms: 300,
    }
  }
}

impl LoadingConfig {
  pub fn loader(&self) -> LoaderConfig {
    LoaderConfig {
      page_size: self.page_size,
      ttl: Duration::from_millis(self.ttl_ms),
    }
  }

  pub fn debounce_delay(&self) -> Duration {
    Duration::from_millis(self.debounce_delay_ms)
  }

  fn validate(&self) -> Result<()> {
    if self.page_size == 0 {
      return Err(eyre!("loading.page_size must be greater than zero"));
    }
    if self.max_entries == 0 {
      return Err(eyre!("loading.max_entries must be greater than zero"));
    }
    Ok(())
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./opsdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/opsdeck/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/opsdeck/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("opsdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("opsdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    if config.resources.is_empty() {
      return Err(eyre!("at least one resource must be configured"));
    }
    config.loading.validate()?;

    Ok(config)
  }

  /// Find a resource by name or alias (case-insensitive).
  pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
    let name = name.to_lowercase();
    self.resources.iter().find(|r| {
      r.name.to_lowercase() == name || r.aliases.iter().any(|a| a.to_lowercase() == name)
    })
  }

  /// The resource to open at startup.
  pub fn startup_resource(&self) -> Option<&ResourceConfig> {
    self
      .default_resource
      .as_deref()
      .and_then(|name| self.resource(name))
      .or_else(|| self.resources.first())
  }

  /// Get the table API token from environment variables.
  ///
  /// Checks OPSDECK_API_TOKEN first, then TABLE_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("OPSDECK_API_TOKEN")
      .or_else(|_| std::env::var("TABLE_API_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set OPSDECK_API_TOKEN or TABLE_API_TOKEN environment variable.")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const MINIMAL: &str = r#"
source:
  url: https://tables.example.com/v1
resources:
  - name: campaigns
    title_field: Name
    columns: [Status, Budget]
    aliases: [c]
  - name: sessions
    table: browser_sessions
"#;

  #[test]
  fn test_defaults_apply() {
    let config = Config::parse(MINIMAL).unwrap();

    assert_eq!(config.loading, LoadingConfig::default());
    assert_eq!(config.loading.loader().page_size, 20);
    assert_eq!(config.loading.loader().ttl, Duration::from_secs(300));
    assert_eq!(config.loading.debounce_delay(), Duration::from_millis(300));
    assert_eq!(config.loading.overscan, 2);
    assert_eq!(config.loading.max_entries, 50);
  }

  #[test]
  fn test_loading_overrides() {
    let yaml = format!("{}loading:\n  page_size: 50\n  ttl_ms: 1000\n", MINIMAL);
    let config = Config::parse(&yaml).unwrap();

    assert_eq!(config.loading.page_size, 50);
    assert_eq!(config.loading.ttl_ms, 1000);
    assert_eq!(config.loading.overscan, 2);
  }

  #[test]
  fn test_zero_page_size_rejected() {
    let yaml = format!("{}loading:\n  page_size: 0\n", MINIMAL);
    assert!(Config::parse(&yaml).is_err());
  }

  #[test]
  fn test_no_resources_rejected() {
    let yaml = "source:\n  url: https://x\nresources: []\n";
    assert!(Config::parse(yaml).is_err());
  }

  #[test]
  fn test_resource_lookup() {
    let config = Config::parse(MINIMAL).unwrap();

    assert_eq!(config.resource("CAMPAIGNS").unwrap().name, "campaigns");
    assert_eq!(config.resource("c").unwrap().name, "campaigns");
    assert!(config.resource("ads").is_none());
    assert_eq!(config.resource("sessions").unwrap().table(), "browser_sessions");
    assert_eq!(config.resource("campaigns").unwrap().table(), "campaigns");
  }

  #[test]
  fn test_startup_resource() {
    let config = Config::parse(MINIMAL).unwrap();
    assert_eq!(config.startup_resource().unwrap().name, "campaigns");

    let config = Config {
      default_resource: Some("sessions".to_string()),
      ..config
    };
    assert_eq!(config.startup_resource().unwrap().name, "sessions");
  }
}
