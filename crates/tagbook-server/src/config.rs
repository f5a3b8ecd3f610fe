//! Server configuration, layered from an optional TOML file and `TAGBOOK_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use tagbook_api::ApiSettings;
use tagbook_core::reconcile::ReconcileConfig;
use tagbook_store_sqlite::CacheTtl;

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:           String,
  pub port:           u16,
  pub store_path:     PathBuf,
  /// Substrings that hide bookkeeping tags from the tag listing.
  pub tag_exclusions: Vec<String>,
  pub cache:          CacheConfig,
  pub reconcile:      ReconcileConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:           "127.0.0.1".into(),
      port:           8080,
      store_path:     PathBuf::from("~/.local/share/tagbook/tagbook.db"),
      tag_exclusions: vec!["comment".into(), "category".into()],
      cache:          CacheConfig::default(),
      reconcile:      ReconcileConfig::default(),
    }
  }
}

/// Read-cache lifetimes in seconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub facts_ttl_secs: u64,
  pub tags_ttl_secs:  u64,
  pub range_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    let ttl = CacheTtl::default();
    Self {
      facts_ttl_secs: ttl.facts.as_secs(),
      tags_ttl_secs:  ttl.tags.as_secs(),
      range_ttl_secs: ttl.range.as_secs(),
    }
  }
}

impl From<CacheConfig> for CacheTtl {
  fn from(c: CacheConfig) -> Self {
    Self {
      facts: Duration::from_secs(c.facts_ttl_secs),
      tags:  Duration::from_secs(c.tags_ttl_secs),
      range: Duration::from_secs(c.range_ttl_secs),
    }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists), then `TAGBOOK_*` variables on top.
  /// Nested keys use `__`, e.g. `TAGBOOK_CACHE__TAGS_TTL_SECS`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("TAGBOOK")
          .prefix_separator("_")
          .separator("__")
          .list_separator(",")
          .with_list_parse_key("tag_exclusions")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.validate()?;
    Ok(cfg)
  }

  /// Refuse configurations the server could not serve correctly.
  pub fn validate(&self) -> anyhow::Result<()> {
    self
      .reconcile
      .validate()
      .context("reconcile.modifiers must cover every reconcile tag")
  }

  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      tag_exclusions: self.tag_exclusions.clone(),
      reconcile:      self.reconcile.clone(),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn from_toml(src: &str) -> anyhow::Result<ServerConfig> {
    let cfg: ServerConfig = config::Config::builder()
      .add_source(config::File::from_str(src, config::FileFormat::Toml))
      .build()?
      .try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
  }

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = from_toml("").unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.tag_exclusions, ["comment", "category"]);
    assert_eq!(CacheTtl::from(cfg.cache), CacheTtl::default());
    assert_eq!(cfg.reconcile, ReconcileConfig::default());
  }

  #[test]
  fn file_values_override_defaults() {
    let cfg = from_toml(
      r#"
        port = 9000
        tag_exclusions = ["comment"]

        [cache]
        tags_ttl_secs = 30

        [reconcile]
        tags = ["E1"]

        [reconcile.modifiers]
        E1_index = 2.0
      "#,
    )
    .unwrap();

    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.tag_exclusions, ["comment"]);
    assert_eq!(cfg.cache.tags_ttl_secs, 30);
    assert_eq!(cfg.cache.facts_ttl_secs, 5);
    assert_eq!(cfg.reconcile.modifiers.get("E1_index"), Some(2.0));
  }

  #[test]
  fn missing_modifier_is_rejected_at_load() {
    let err = from_toml(
      r#"
        [reconcile]
        tags = ["E1", "E3"]
      "#,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("E3_index"));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/db.sqlite")), PathBuf::from(home).join("db.sqlite"));
    assert_eq!(expand_tilde(Path::new("/tmp/db")), PathBuf::from("/tmp/db"));
  }
}
