use crate::error::DownloadError;
use crate::game::installer::config::{current_timeout, DEFAULT_CONCURRENCY};
use crate::game::installer::core::mirror::MirrorSelection;
use crate::game::installer::types::{CancelToken, ProgressReporter};
use futures::StreamExt;
use reqwest::Client;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::{create_dir_all, File};
use tokio::io::AsyncWriteExt;

/// Outbound proxy, optionally with basic credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub address: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    fn url(&self) -> String {
        if self.address.contains("://") {
            format!("{}:{}", self.address, self.port)
        } else {
            format!("http://{}:{}", self.address, self.port)
        }
    }
}

/// Knobs for a batch download run
#[derive(Debug, Clone)]
pub struct DownloaderOptions {
    /// Worker pool size; caps in-flight transfers
    pub concurrency: usize,
    pub check_hash: bool,
    pub timeout: Duration,
    pub proxy: Option<ProxySettings>,
    pub mirror_selection: MirrorSelection,
}

impl Default for DownloaderOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            check_hash: true,
            timeout: current_timeout(),
            proxy: None,
            mirror_selection: MirrorSelection::default(),
        }
    }
}

/// Build the shared HTTP client for a run
pub fn build_client(options: &DownloaderOptions) -> Result<Client, DownloadError> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(options.concurrency.max(1))
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .timeout(options.timeout);

    if let Some(proxy) = &options.proxy {
        let mut p = reqwest::Proxy::all(proxy.url())?;
        if let Some(user) = &proxy.username {
            p = p.basic_auth(user, proxy.password.as_deref().unwrap_or(""));
        }
        builder = builder.proxy(p);
    }

    Ok(builder.build()?)
}

/// Sibling `.part` path used while a transfer is in flight
pub fn part_path(path: &Path) -> PathBuf {
    let tmp_name = format!(
        "{}.part",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
    );
    path.with_file_name(tmp_name)
}

/// What a single transfer must satisfy before it is moved into place
#[derive(Debug, Clone, Copy, Default)]
pub struct Expectation<'a> {
    pub sha1: Option<&'a str>,
    pub size: Option<u64>,
}

/// One attempt against one URL. The body is streamed to a `.part` sibling and
/// renamed over `path` only after size and hash checks pass; on any failure
/// the `.part` file is removed.
pub async fn download_to_path(
    client: &Client,
    url: &str,
    path: &Path,
    expect: Expectation<'_>,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
) -> Result<(), DownloadError> {
    log::debug!("Downloading: {} -> {:?}", url, path);

    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .await
            .map_err(|source| DownloadError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let tmp_path = part_path(path);
    let result = download_with_validation(client, url, path, &tmp_path, expect, cancel, reporter).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

async fn download_with_validation(
    client: &Client,
    url: &str,
    path: &Path,
    tmp_path: &Path,
    expect: Expectation<'_>,
    cancel: &CancelToken,
    reporter: &dyn ProgressReporter,
) -> Result<(), DownloadError> {
    if cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    let start = Instant::now();
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let total_size = response.content_length().or(expect.size);
    let io_err = |source| DownloadError::Io {
        path: tmp_path.to_path_buf(),
        source,
    };

    let mut file = File::create(tmp_path).await.map_err(io_err)?;
    let mut downloaded: u64 = 0;
    let mut hasher = Sha1::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        if cancel.is_cancelled() {
            log::warn!("Download cancelled: {:?}", path);
            return Err(DownloadError::Cancelled);
        }

        let chunk = chunk_result?;
        file.write_all(&chunk).await.map_err(io_err)?;
        hasher.update(&chunk);

        downloaded += chunk.len() as u64;
        reporter.bytes(downloaded, total_size);
    }
    file.flush().await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);

    if let Some(expected) = expect.size {
        if expected != downloaded {
            return Err(DownloadError::SizeMismatch {
                url: url.to_string(),
                expected,
                actual: downloaded,
            });
        }
    }

    if let Some(expected) = expect.sha1 {
        let computed = format!("{:x}", hasher.finalize());
        if !computed.eq_ignore_ascii_case(expected) {
            return Err(DownloadError::HashMismatch {
                url: url.to_string(),
                expected: expected.to_string(),
                actual: computed,
            });
        }
        log::debug!("SHA1 validated: {}", computed);
    }

    // Last chance before the file becomes visible
    if cancel.is_cancelled() {
        log::warn!("Download cancelled before commit: {:?}", path);
        return Err(DownloadError::Cancelled);
    }

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|source| DownloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let secs = start.elapsed().as_secs_f64();
    let throughput = (downloaded as f64 / 1024.0 / 1024.0) / secs.max(0.001);
    log::debug!(
        "Download stats: url={}, size={} bytes, time={:.2}s, throughput={:.2} MB/s",
        url,
        downloaded,
        secs,
        throughput
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::installer::types::SilentProgressReporter;
    use crate::utils::hash::sha1_hex;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn part_path_is_a_sibling() {
        let p = Path::new("/data/libraries/a/b.jar");
        assert_eq!(part_path(p), Path::new("/data/libraries/a/b.jar.part"));
    }

    #[test]
    fn proxy_url_adds_scheme() {
        let proxy = ProxySettings {
            address: "127.0.0.1".into(),
            port: 8080,
            username: Some("u".into()),
            password: None,
        };
        assert_eq!(proxy.url(), "http://127.0.0.1:8080");
        let options = DownloaderOptions {
            proxy: Some(proxy),
            ..Default::default()
        };
        assert!(build_client(&options).is_ok());
    }

    #[tokio::test]
    async fn verified_download_lands_at_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/file.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("nested").join("file.bin");
        let client = build_client(&DownloaderOptions::default()).unwrap();
        let sha = sha1_hex(b"payload");

        download_to_path(
            &client,
            &format!("{}/file.bin", server.uri()),
            &dest,
            Expectation {
                sha1: Some(&sha),
                size: Some(7),
            },
            &CancelToken::never(),
            &SilentProgressReporter,
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn size_mismatch_removes_part_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"short".to_vec()))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("file.bin");
        let client = build_client(&DownloaderOptions::default()).unwrap();

        let err = download_to_path(
            &client,
            &format!("{}/file.bin", server.uri()),
            &dest,
            Expectation {
                sha1: None,
                size: Some(100),
            },
            &CancelToken::never(),
            &SilentProgressReporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::SizeMismatch { expected: 100, actual: 5, .. }));
        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let client = build_client(&DownloaderOptions::default()).unwrap();
        let err = download_to_path(
            &client,
            &format!("{}/missing", server.uri()),
            &tmp.path().join("missing"),
            Expectation::default(),
            &CancelToken::never(),
            &SilentProgressReporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::Status { status: 404, .. }));
    }
}
