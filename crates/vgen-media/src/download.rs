//! Clip payload download.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Download a video payload to a local file. Returns the byte count.
///
/// The write is verified against the downloaded length; an empty body is
/// treated as a failure, not an empty clip.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    path: impl AsRef<Path>,
) -> MediaResult<u64> {
    let path = path.as_ref();
    debug!("Downloading {} to {}", url, path.display());

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::download_failed(format!("GET {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::download_failed(format!(
            "GET {} returned {}",
            url, status
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MediaError::download_failed(format!("reading body of {} failed: {}", url, e)))?;

    if bytes.is_empty() {
        return Err(MediaError::download_failed(format!("{} returned an empty body", url)));
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &bytes).await?;

    let written = tokio::fs::metadata(path).await?.len();
    if written != bytes.len() as u64 {
        return Err(MediaError::download_failed(format!(
            "short write for {}: {} of {} bytes",
            path.display(),
            written,
            bytes.len()
        )));
    }

    info!("Downloaded {} ({} bytes)", path.display(), written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_rejects_unroutable_url() {
        let client = reqwest::Client::new();
        let dir = tempfile::tempdir().unwrap();
        let err = download_to_file(
            &client,
            "http://127.0.0.1:1/clip.mp4",
            dir.path().join("clip.mp4"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::DownloadFailed { .. }));
    }
}
