//! Atomic feed persistence.
//!
//! The document is serialized to a dot-prefixed temp file in the target
//! directory and renamed over the feed path, so readers only ever observe a
//! complete version. An optional external command (e.g. a gzip wrapper for
//! pre-compressed serving) runs after each publish.

use std::path::PathBuf;

use tracing::{debug, warn};

use marketindex_core::IndexError;

use crate::bucket::FeedDocument;

/// Publishes feed documents with an isolated-build-then-atomic-swap.
pub struct FeedWriter {
    path: PathBuf,
    compress_command: Option<String>,
}

impl FeedWriter {
    pub fn new(path: PathBuf, compress_command: Option<String>) -> Self {
        Self {
            path,
            compress_command,
        }
    }

    /// Load the last published document. A missing or corrupt file is an
    /// empty feed — the store can always rebuild it.
    pub async fn load(&self) -> FeedDocument {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "corrupt feed document; starting empty");
                FeedDocument::new()
            }),
            Err(_) => FeedDocument::new(),
        }
    }

    /// Write `document` and swap it into place.
    pub async fn publish(&self, document: &FeedDocument) -> Result<(), IndexError> {
        let bytes = serde_json::to_vec(document).map_err(|e| IndexError::Feed(e.to_string()))?;

        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IndexError::Feed(format!("feed path has no file name: {}", self.path.display())))?;
        // Same directory as the target, so the rename stays on one filesystem.
        let staging = self.path.with_file_name(format!(".{file_name}.tmp"));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| IndexError::Feed(e.to_string()))?;
            }
        }
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|e| IndexError::Feed(e.to_string()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| IndexError::Feed(e.to_string()))?;
        debug!(path = %self.path.display(), events = document.total_events(), "feed published");

        if let Some(command) = &self.compress_command {
            match tokio::process::Command::new(command)
                .arg(&self.path)
                .status()
                .await
            {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    warn!(command = %command, status = %status, "compression hook exited non-zero")
                }
                Err(e) => warn!(command = %command, error = %e, "compression hook could not run"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::FeedEntry;

    fn doc_with(n: usize) -> FeedDocument {
        let mut doc = FeedDocument::new();
        for i in 0..n {
            doc.push(
                209,
                1_000 + i as i64,
                FeedEntry {
                    kind: "list".into(),
                    token: format!("token{i}"),
                    value: 1,
                    fingerprint: "fp".into(),
                    addr: None,
                    metadata: serde_json::Value::Null,
                    tk: None,
                },
            );
        }
        doc
    }

    #[tokio::test]
    async fn publish_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity");
        let writer = FeedWriter::new(path.clone(), None);

        writer.publish(&doc_with(3)).await.unwrap();
        assert_eq!(writer.load().await.total_events(), 3);

        // No staging file left behind after the swap.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("activity")]);
    }

    #[tokio::test]
    async fn publish_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed").join("activity");
        let writer = FeedWriter::new(path.clone(), None);
        writer.publish(&doc_with(1)).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity");
        let writer = FeedWriter::new(path.clone(), None);
        assert!(writer.load().await.is_empty());

        std::fs::write(&path, b"{ truncated").unwrap();
        assert!(writer.load().await.is_empty());
    }

    #[tokio::test]
    async fn republish_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity");
        let writer = FeedWriter::new(path.clone(), None);
        writer.publish(&doc_with(5)).await.unwrap();
        writer.publish(&doc_with(2)).await.unwrap();
        assert_eq!(writer.load().await.total_events(), 2);
    }
}
