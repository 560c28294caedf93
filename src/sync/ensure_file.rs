use anyhow::Result;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::file_meta::FileMeta;

/// Makes sure `meta.path` holds the latest copy of `url`, using the stored
/// validators for a conditional request. Returns true if a new copy was
/// downloaded.
pub async fn ensure_file(meta: &mut FileMeta, url: &str) -> Result<bool> {
    let client = reqwest::Client::new();
    let mut request = client.get(url);
    if meta.is_cached() {
        if let Some(etag) = &meta.etag {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }

        if let Some(last_modified) = &meta.last_modified {
            request = request.header(
                reqwest::header::IF_MODIFIED_SINCE,
                last_modified.to_rfc2822(),
            );
        }
    }

    info!("Requesting {}", url);
    let response = request.send().await?.error_for_status()?;
    match response.status() {
        reqwest::StatusCode::OK => {
            info!("Downloading {:?}", meta.path);
            let etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            let last_modified = response
                .headers()
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
                .map(|v| v.with_timezone(&chrono::Utc));

            // the cached copy is only replaced once the whole body has arrived
            let partial_path = meta.path.with_extension("partial");
            let mut file = tokio::fs::File::create(&partial_path).await?;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            drop(file);
            tokio::fs::rename(&partial_path, &meta.path).await?;

            meta.downloaded_at = Some(chrono::Utc::now());
            meta.etag = etag;
            meta.last_modified = last_modified;
            meta.save()?;
            info!("Downloaded {:?}", meta.path);
            Ok(true)
        }
        reqwest::StatusCode::NOT_MODIFIED => {
            info!("{:?} is up to date", meta.path);
            Ok(false)
        }
        code => Err(anyhow::anyhow!(
            "Unexpected status code for {}: {}",
            url,
            code
        )),
    }
}
