//! Streaming downloads with progress reporting.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::error::InstallError;

/// Progress of a single download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Content length is known.
    Percent(u8),
    /// Server sent no content length; bytes written so far.
    Indeterminate { downloaded: u64 },
}

/// Caller-supplied progress callback.
pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// HTTP fetcher for release artifacts.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    idle_timeout: Duration,
    request_timeout: Duration,
}

impl Downloader {
    /// `idle_timeout` bounds the wait for each body chunk of a download;
    /// `request_timeout` bounds small whole-body fetches such as manifests.
    pub fn new(client: Client, idle_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            client,
            idle_timeout,
            request_timeout,
        }
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// On any failure the file at `dest` is removed before the error is
    /// returned.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<&ProgressFn>,
    ) -> Result<u64, InstallError> {
        match self.stream_to(url, dest, on_progress).await {
            Ok(written) => Ok(written),
            Err(e) => {
                match tokio::fs::remove_file(dest).await {
                    Ok(()) => {}
                    Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                    Err(rm) => {
                        tracing::warn!(
                            "Could not remove partial download {}: {rm}",
                            dest.display()
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        url: &str,
        dest: &Path,
        on_progress: Option<&ProgressFn>,
    ) -> Result<u64, InstallError> {
        let report = |p: Progress| {
            if let Some(cb) = on_progress {
                cb(p);
            }
        };

        let response = match timeout(self.idle_timeout, self.client.get(url).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(InstallError::download(url, e)),
            Err(_) => {
                return Err(InstallError::download(
                    url,
                    format!(
                        "no response headers within {}s",
                        self.idle_timeout.as_secs()
                    ),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::download(url, format!("HTTP {status}")));
        }

        let total = response.content_length();
        let mut file = File::create(dest)
            .await
            .map_err(|e| InstallError::fs("create", dest, e))?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_percent: Option<u8> = None;

        loop {
            let chunk = match timeout(self.idle_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Err(InstallError::download(url, e)),
                Ok(None) => break,
                Err(_) => {
                    return Err(InstallError::download(
                        url,
                        format!(
                            "no data received for {}s after {downloaded} bytes",
                            self.idle_timeout.as_secs()
                        ),
                    ));
                }
            };

            file.write_all(&chunk)
                .await
                .map_err(|e| InstallError::fs("write", dest, e))?;
            downloaded += chunk.len() as u64;

            match total {
                Some(total) if total > 0 => {
                    let percent = (downloaded.saturating_mul(100) / total).min(100) as u8;
                    if last_percent != Some(percent) {
                        last_percent = Some(percent);
                        report(Progress::Percent(percent));
                    }
                }
                Some(_) => {}
                None => report(Progress::Indeterminate { downloaded }),
            }
        }

        file.flush()
            .await
            .map_err(|e| InstallError::fs("flush", dest, e))?;

        if total.is_some() && last_percent != Some(100) {
            report(Progress::Percent(100));
        }

        tracing::debug!("Downloaded {downloaded} bytes from {url}");
        Ok(downloaded)
    }

    /// Fetch a small text document (e.g. a checksum manifest) into memory.
    pub async fn fetch_text(&self, url: &str) -> Result<String, InstallError> {
        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| InstallError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::network(url, format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| InstallError::network(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use mockito::Server;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn downloader() -> Downloader {
        Downloader::new(
            Client::new(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
    }

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<Progress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));
        (cb, seen)
    }

    #[tokio::test]
    async fn test_download_writes_file_and_reports_progress() {
        let body = vec![7u8; 64 * 1024];
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/asset.tar.gz")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("asset.tar.gz");
        let (cb, seen) = recorder();

        let written = downloader()
            .download(&format!("{}/asset.tar.gz", server.url()), &dest, Some(&cb))
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&Progress::Percent(100)));
        let mut previous = 0;
        for p in seen.iter() {
            match *p {
                Progress::Percent(pct) => {
                    assert!(pct >= previous, "progress went backwards: {seen:?}");
                    previous = pct;
                }
                other => panic!("length is known, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_length_reports_bytes() {
        let body = vec![3u8; 10 * 1024];
        let chunk = body.clone();
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/stream.tar.gz")
            .with_status(200)
            .with_chunked_body(move |w| w.write_all(&chunk))
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("stream.tar.gz");
        let (cb, seen) = recorder();

        downloader()
            .download(&format!("{}/stream.tar.gz", server.url()), &dest, Some(&cb))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), body);
        let seen = seen.lock().unwrap();
        assert!(
            seen.iter()
                .all(|p| matches!(p, Progress::Indeterminate { .. })),
            "no length was sent, got {seen:?}"
        );
        assert_eq!(
            seen.last(),
            Some(&Progress::Indeterminate {
                downloaded: body.len() as u64
            })
        );
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dir = tempdir().unwrap();
        let dest = dir.path().join("never.tar.gz");
        let d = Downloader::new(
            Client::new(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            d.download(&format!("http://{addr}/never.tar.gz"), &dest, None),
        )
        .await
        .expect("download should give up on its own");

        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Download);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_without_callback() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/small")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("small");
        downloader()
            .download(&format!("{}/small", server.url()), &dest, None)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_http_error_removes_partial_file() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/gone.zip")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dest = dir.path().join("gone.zip");
        std::fs::write(&dest, b"stale bytes from an earlier attempt").unwrap();

        let err = downloader()
            .download(&format!("{}/gone.zip", server.url()), &dest, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Download);
        assert!(err.to_string().contains("404"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_connection_refused_is_download_error() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("x.tar.gz");
        let err = downloader()
            .download("http://127.0.0.1:9/x.tar.gz", &dest, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Download);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_text() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/checksums.txt")
            .with_status(200)
            .with_body("abc  file.tar.gz\n")
            .create_async()
            .await;
        let _err = server
            .mock("GET", "/missing.txt")
            .with_status(500)
            .create_async()
            .await;

        let d = downloader();
        let text = d
            .fetch_text(&format!("{}/checksums.txt", server.url()))
            .await
            .unwrap();
        assert_eq!(text, "abc  file.tar.gz\n");

        let err = d
            .fetch_text(&format!("{}/missing.txt", server.url()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
