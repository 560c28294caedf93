use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Download bookkeeping for a cached catalogue file, stored as JSON next to
/// the file itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct FileMeta {
    pub path: PathBuf,
    pub downloaded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub etag: Option<String>,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
}

impl FileMeta {
    /// Loads the metadata for `file_path`, or starts fresh when there is
    /// none or it belongs to another file.
    pub fn load(file_path: &Path) -> Result<Self> {
        let meta_path = Self::meta_path(file_path);
        let fresh = FileMeta {
            path: file_path.to_path_buf(),
            downloaded_at: None,
            etag: None,
            last_modified: None,
        };

        let meta = match std::fs::read_to_string(&meta_path) {
            Ok(meta) => {
                let data: FileMeta = serde_json::from_str(&meta)?;
                if data.path == file_path {
                    data
                } else {
                    tracing::warn!(?meta_path, "ignoring metadata for a different file");
                    fresh
                }
            }
            Err(_) => fresh,
        };

        Ok(meta)
    }

    pub fn save(&self) -> Result<()> {
        let meta = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::meta_path(&self.path), meta)?;
        Ok(())
    }

    /// Whether a conditional request may be answered from the cache.
    pub fn is_cached(&self) -> bool {
        self.path.exists() && (self.etag.is_some() || self.last_modified.is_some())
    }

    fn meta_path(file_path: &Path) -> PathBuf {
        let mut name = file_path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }
}
