//! Item sources — where raw posts come from. The pipeline only sees the
//! `ItemSource` trait; the file-backed source reads a JSON Lines dump of
//! mined posts, one object per line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{info, warn};

use demandscout_common::types::RawItem;

use crate::traits::ItemSource;

pub struct JsonlItemSource {
    path: PathBuf,
}

impl JsonlItemSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ItemSource for JsonlItemSource {
    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let raw = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("cannot read items from {}", self.path.display()))?;

        let mut items = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawItem>(line) {
                Ok(item) => items.push(item),
                Err(e) => {
                    // One bad line never sinks the batch.
                    warn!(line = lineno + 1, error = %e, "Skipping unparseable item line");
                }
            }
        }

        info!(count = items.len(), path = %self.path.display(), "Items loaded");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn parses_items_and_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"source_id":"t3_a","subreddit":"SaaS","title":"I need a tool","body":"Looking for any app?","url":"https://reddit.com/a","created_at":"2026-08-01T12:00:00Z"}}"#
        )
        .unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"source_id":"t3_b","subreddit":"startups","title":"I wish a tool existed","created_at":"2026-08-02T12:00:00Z"}}"#
        )
        .unwrap();

        let items = JsonlItemSource::new(&path).fetch().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source_id, "t3_a");
        // body and url default to empty when absent
        assert_eq!(items[1].body, "");
        assert_eq!(items[1].url, "");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonlItemSource::new(dir.path().join("absent.jsonl"));
        assert!(source.fetch().await.is_err());
    }
}
