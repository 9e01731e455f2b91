//! Persisted set of processed headlines.
//!
//! The backing file is a JSON array of strings, rewritten wholesale after
//! every addition. A missing or unreadable file loads as an empty set so a
//! damaged history never blocks a batch; at worst headlines are reprocessed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use storybuilder_types::{Headline, Result};

pub const DEFAULT_HISTORY_FILE: &str = "history.json";

#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    entries: BTreeSet<Headline>,
}

impl HistoryStore {
    /// Load the set from `path`, falling back to empty on any failure.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(json) => match serde_json::from_str::<Vec<String>>(&json) {
                Ok(list) => list.into_iter().map(Headline::new).collect(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "History file is corrupt, starting empty");
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "History file unreadable, starting empty");
                BTreeSet::new()
            }
        };

        tracing::info!(path = %path.display(), count = entries.len(), "Loaded history");
        Self { path, entries }
    }

    pub fn contains(&self, headline: &Headline) -> bool {
        self.entries.contains(headline)
    }

    /// Add `headline` and immediately rewrite the backing file.
    ///
    /// The in-memory set keeps the addition even when the write fails.
    pub async fn add_and_persist(&mut self, headline: Headline) -> Result<()> {
        self.entries.insert(headline);
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let list: Vec<&str> = self.entries.iter().map(Headline::as_str).collect();
        let json = serde_json::to_string_pretty(&list)?;

        // Write-then-rename so a crash mid-write leaves the previous file intact.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), count = self.entries.len(), "History saved");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Headline> {
        self.entries.iter()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
