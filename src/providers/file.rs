use crate::core::error::{Result, UpdateError};
use crate::core::source::FeedSource;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads the feed from a local snapshot file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the snapshot file with `data`.
    pub async fn overwrite(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdateError::source(&format!("create {}", parent.display()), e))?;
        }
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| UpdateError::source(&format!("write {}", self.path.display()), e))?;
        debug!(path = %self.path.display(), bytes = data.len(), "Wrote feed file");
        Ok(())
    }
}

#[async_trait]
impl FeedSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_bytes(&self) -> Result<Vec<u8>> {
        debug!(path = %self.path.display(), "Reading feed file");
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| UpdateError::source(&format!("read {}", self.path.display()), e))
    }
}
