//! Release archive download
//!
//! Streams Xray-core release assets to disk, optionally through a proxy.

use super::error::{CoreError, Result};
use futures_util::StreamExt;
use reqwest::{Client, Proxy, StatusCode};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Create HTTP client with appropriate headers
pub fn create_client(proxy: Option<&str>) -> Result<Client> {
    let mut builder =
        Client::builder().user_agent(concat!("xray-manager/", env!("CARGO_PKG_VERSION")));

    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        let proxy = Proxy::all(proxy)
            .map_err(|e| CoreError::Settings(format!("invalid proxy {}: {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| CoreError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Download `url` into `dest`, replacing any existing file
pub async fn download_file(client: &Client, url: &str, dest: &Path) -> Result<PathBuf> {
    log::info!("Downloading {} to {}", url, dest.display());

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CoreError::Network(format!("Failed to start download: {}", e)))?;

    if !response.status().is_success() {
        return Err(CoreError::Network(format!(
            "Download of {} failed with status {}",
            url,
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut file = File::create(dest)?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let start_time = Instant::now();
    let mut last_report = Instant::now();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| CoreError::Network(format!("Download error: {}", e)))?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;

        // Throttle progress lines
        if last_report.elapsed().as_secs() >= 2 {
            let elapsed = start_time.elapsed().as_secs_f64();
            let speed = if elapsed > 0.0 {
                downloaded as f64 / elapsed
            } else {
                0.0
            };
            log::info!(
                "Downloaded {} / {} bytes ({:.0} KB/s)",
                downloaded,
                total_size,
                speed / 1024.0
            );
            last_report = Instant::now();
        }
    }
    file.flush()?;

    log::info!("Download complete: {} bytes", downloaded);
    Ok(dest.to_path_buf())
}

/// Fetch a small text asset; `Ok(None)` when the server reports 404
pub async fn fetch_text(client: &Client, url: &str) -> Result<Option<String>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CoreError::Network(format!("Failed to fetch {}: {}", url, e)))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(CoreError::Network(format!(
            "Fetching {} failed with status {}",
            url,
            response.status()
        )));
    }

    Ok(Some(response.text().await?))
}
