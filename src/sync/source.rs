use anyhow::{Context, Result};
use async_compression::tokio::bufread::GzipDecoder;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, BufReader};
use tracing::info;

use super::{ensure_file::ensure_file, file_meta::FileMeta};

/// A decompressed catalogue byte stream.
pub type SceneStream = Box<dyn AsyncRead + Send + Unpin>;

/// Produces a fresh catalogue stream at the start of every run.
#[async_trait::async_trait]
pub trait StreamSource: Send + Sync {
    fn location(&self) -> &str;

    async fn open(&self) -> Result<SceneStream>;
}

/// Reads the catalogue from a URL or a local path, optionally gzipped.
///
/// URLs are downloaded into `cache_dir` first and re-requested with
/// `If-None-Match` / `If-Modified-Since`, so an unchanged catalogue is not
/// fetched twice.
pub struct LocationSource {
    location: String,
    gzip: bool,
    cache_dir: PathBuf,
}

impl LocationSource {
    pub fn new(location: impl Into<String>, gzip: bool, cache_dir: impl Into<PathBuf>) -> Self {
        LocationSource {
            location: location.into(),
            gzip,
            cache_dir: cache_dir.into(),
        }
    }

    fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    fn cache_path(&self) -> PathBuf {
        let file_name = self
            .location
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
            .filter(|segment| !segment.contains(':'))
            .unwrap_or("catalogue");
        self.cache_dir.join(file_name)
    }

    async fn fetch(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .with_context(|| format!("Failed to create cache directory {:?}", self.cache_dir))?;

        let mut meta = FileMeta::load(&self.cache_path())?;
        ensure_file(&mut meta, &self.location).await?;
        Ok(meta.path)
    }
}

#[async_trait::async_trait]
impl StreamSource for LocationSource {
    fn location(&self) -> &str {
        &self.location
    }

    async fn open(&self) -> Result<SceneStream> {
        let path = if self.is_remote() {
            self.fetch().await?
        } else {
            clean_path(&self.location)
        };

        info!("Opening file {:?}", path);
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("Could not open {:?}", path))?;
        let reader = BufReader::new(file);

        if self.gzip {
            let mut decoder = GzipDecoder::new(reader);
            // concatenated gzip members read as one stream
            decoder.multiple_members(true);
            Ok(Box::new(decoder))
        } else {
            Ok(Box::new(reader))
        }
    }
}

/// Gzip is assumed when the location ends in `gz`.
pub fn looks_gzipped(location: &str) -> bool {
    location.to_ascii_lowercase().ends_with("gz")
}

fn clean_path(location: &str) -> PathBuf {
    Path::new(location).components().collect()
}
