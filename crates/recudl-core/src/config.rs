//! JSON configuration: URL entries, header template, post-process toggles.
//!
//! The file is user-owned: downloads never rewrite it (progress goes to the
//! state log instead). URL entries keep their compact wire shapes and are
//! decoded per use by the `target` module.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::post_process::PostProcessConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Compact URL entries; see `target::decode` for the accepted shapes.
    #[serde(default)]
    pub urls: Vec<Value>,
    /// Header template; must carry the session cookie and a user agent.
    #[serde(default)]
    pub header: HashMap<String, String>,
    #[serde(default)]
    pub post_process: PostProcessConfig,
    #[serde(skip)]
    path: PathBuf,
}

impl Config {
    /// A fresh config with empty credential slots for the user to fill in.
    pub fn default_at(path: &Path) -> Self {
        let mut header = HashMap::new();
        header.insert("Cookie".to_string(), String::new());
        header.insert("User-Agent".to_string(), String::new());
        Self {
            urls: vec![Value::String(String::new())],
            header,
            post_process: PostProcessConfig::default(),
            path: path.to_path_buf(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to open config: {}", path.display()))?;
        let mut cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        cfg.path = path.to_path_buf();
        Ok(cfg)
    }

    pub fn save(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write config: {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True until the user has supplied at least one URL plus the session
    /// cookie and user agent.
    pub fn is_unconfigured(&self) -> bool {
        let no_urls = self.urls.is_empty()
            || matches!(self.urls.first(), Some(Value::String(s)) if s.is_empty());
        let missing = |key: &str| self.header.get(key).map_or(true, |v| v.is_empty());
        no_urls || missing("Cookie") || missing("User-Agent")
    }

    /// Appends scraped page URLs as bare string entries.
    pub fn append_urls(&mut self, urls: impl IntoIterator<Item = String>) {
        self.urls.extend(urls.into_iter().map(Value::String));
    }
}
