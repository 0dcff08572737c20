// Stereux Core - Sliding-window playlist engine for the Stereux player
// Copyright (C) 2025 Stereux contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Transfer primitive: one URL into one local file
//!
//! # Behavior
//! - The parent directory of the destination is created if absent
//! - The body is streamed chunk by chunk into a buffered file writer
//! - Non-2xx responses fail with `UnexpectedStatusCode`
//! - The whole transfer is bounded by the configured timeout
//!
//! Scraped links are often relative; `resolve_url` turns them into absolute
//! URLs against the source base before a transfer starts.

use crate::config::PlayerConfig;
use crate::download::progress::ProgressSink;
use crate::error::{PlayerError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

const DOWNLOAD_BUFF_SZ: usize = 64 * 1024;
const MAX_REDIRECTS: usize = 10;

/// Fetch a remote resource to a local path
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Download `url` into `destination`, returning the bytes written
    async fn fetch(
        &self,
        url: &Url,
        destination: &Path,
        progress: Option<ProgressSink>,
    ) -> Result<u64>;
}

/// Resolve a scraped link against the source base URL
///
/// Absolute links pass through unchanged. Only http and https are accepted.
pub fn resolve_url(base: &Url, raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PlayerError::InvalidDownloadUrl("empty URL".to_string()));
    }

    let url = base
        .join(raw)
        .map_err(|e| PlayerError::InvalidDownloadUrl(format!("{}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(PlayerError::InvalidDownloadUrl(format!(
            "{}: unsupported scheme '{}'",
            raw, other
        ))),
    }
}

/// reqwest-backed transfer
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: Client,
    timeout: Duration,
}

impl HttpTransfer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("stereux-core/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &PlayerConfig) -> Result<Self> {
        Self::new(config.transfer_timeout())
    }

    async fn fetch_inner(
        &self,
        url: &Url,
        destination: &Path,
        progress: Option<&ProgressSink>,
    ) -> Result<u64> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlayerError::UnexpectedStatusCode {
                status_code: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total = response.content_length().unwrap_or(0);
        let mut tracker = progress.map(|sink| sink.tracker(total));

        let file = File::create(destination).await?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFF_SZ, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify(e))?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if let (Some(sink), Some(tracker)) = (progress, tracker.as_mut()) {
                if tracker.update(written) {
                    sink.emit(tracker.snapshot());
                }
            }
        }

        writer.flush().await?;

        if let (Some(sink), Some(tracker)) = (progress, tracker.as_mut()) {
            sink.emit(tracker.finish(written));
        }

        Ok(written)
    }

    fn classify(&self, error: reqwest::Error) -> PlayerError {
        if error.is_timeout() {
            PlayerError::Timeout(self.timeout.as_secs())
        } else if error.is_connect() {
            PlayerError::network_error(error.to_string(), true)
        } else {
            PlayerError::ReqwestError(error)
        }
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(
        &self,
        url: &Url,
        destination: &Path,
        progress: Option<ProgressSink>,
    ) -> Result<u64> {
        tracing::debug!(%url, destination = %destination.display(), "transfer started");

        let result = match tokio::time::timeout(
            self.timeout,
            self.fetch_inner(url, destination, progress.as_ref()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PlayerError::Timeout(self.timeout.as_secs())),
        };

        if result.is_err() {
            if let Some(sink) = &progress {
                sink.emit(sink.tracker(0).fail());
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::{TransferKind, TransferProgress, TransferState};
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port
    async fn serve_once(response: &'static [u8]) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        Url::parse(&format!("http://{}/track/7.mp3", addr)).unwrap()
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("https://ncs.io/").unwrap();

        let url = resolve_url(&base, "/track/download/abc").unwrap();
        assert_eq!(url.as_str(), "https://ncs.io/track/download/abc");

        let url = resolve_url(&base, "https://cdn.example.com/a.jpg").unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_resolve_rejects_bad_urls() {
        let base = Url::parse("https://ncs.io/").unwrap();

        assert!(matches!(resolve_url(&base, "  "), Err(PlayerError::InvalidDownloadUrl(_))));
        assert!(matches!(
            resolve_url(&base, "mailto:someone@example.com"),
            Err(PlayerError::InvalidDownloadUrl(_))
        ));
        assert!(matches!(
            resolve_url(&base, "http://[::1"),
            Err(PlayerError::InvalidDownloadUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_http_fetch_writes_file() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("7").join("7.mp3");

        let seen = Arc::new(Mutex::new(Vec::<TransferProgress>::new()));
        let seen_cb = seen.clone();
        let sink = ProgressSink::new(
            7,
            TransferKind::Media,
            Arc::new(move |p| seen_cb.lock().unwrap().push(p)),
        );

        let transfer = HttpTransfer::new(Duration::from_secs(10)).unwrap();
        let written = transfer.fetch(&url, &dest, Some(sink)).await.unwrap();

        assert_eq!(written, 5);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last().unwrap().state, TransferState::Completed);
    }

    #[tokio::test]
    async fn test_http_fetch_rejects_error_status() {
        let url = serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("7.mp3");

        let transfer = HttpTransfer::new(Duration::from_secs(10)).unwrap();
        let err = transfer.fetch(&url, &dest, None).await.unwrap_err();

        assert!(matches!(err, PlayerError::UnexpectedStatusCode { status_code: 404, .. }));
        assert!(!dest.exists());
    }
}
