//! Fetch and decompress collaborators.

use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use flate2::read::GzDecoder;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::error::{EtlError, EtlResult};

/// Somewhere dataset archives can be retrieved from.
#[async_trait::async_trait]
pub trait DatasetSource: Debug + Send + Sync {
    /// Retrieve `url` into `dest`, replacing whatever was there.
    async fn fetch(&self, url: &str, dest: &Path) -> EtlResult<PathBuf>;
}

/// Downloads datasets over HTTP, retrying transient failures twice.
#[derive(Debug, Clone)]
pub struct HttpSource {
    http: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent("reelstat/0.1.0 (https://github.com/oxur/reelstat)")
            .build()?;
        Ok(Self { http })
    }

    async fn download(&self, url: &str, dest: &Path) -> EtlResult<()> {
        let mut response = self.http.get(url).send().await?.error_for_status()?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        log::info!("Downloaded {} ({} bytes)", url, written);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DatasetSource for HttpSource {
    async fn fetch(&self, url: &str, dest: &Path) -> EtlResult<PathBuf> {
        prepare_destination(dest).await?;
        log::info!("Downloading {} to {}", url, dest.display());

        let attempt = || self.download(url, dest);
        let result = attempt
            .retry(ExponentialBuilder::default().with_max_times(2))
            .when(EtlError::is_transient)
            .notify(|e, wait| {
                log::warn!("Download of {} failed ({}), retrying in {:?}", url, e, wait);
            })
            .await;

        if let Err(e) = result {
            if let Err(cleanup) = tokio::fs::remove_file(dest).await {
                log::debug!("No partial file to remove at {}: {}", dest.display(), cleanup);
            }
            return Err(EtlError::Fetch {
                url: url.to_string(),
                message: e.to_string(),
            });
        }
        Ok(dest.to_path_buf())
    }
}

/// Copies datasets out of a local directory, matching on the URL's file name.
#[derive(Debug, Clone)]
pub struct MirrorSource {
    dir: PathBuf,
}

impl MirrorSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl DatasetSource for MirrorSource {
    async fn fetch(&self, url: &str, dest: &Path) -> EtlResult<PathBuf> {
        let name = file_name_of(url).ok_or_else(|| EtlError::Fetch {
            url: url.to_string(),
            message: "URL has no file name".to_string(),
        })?;
        let from = self.dir.join(name);
        prepare_destination(dest).await?;
        log::info!("Copying {} to {}", from.display(), dest.display());

        tokio::fs::copy(&from, dest)
            .await
            .map_err(|e| EtlError::Fetch {
                url: url.to_string(),
                message: format!("{}: {e}", from.display()),
            })?;
        Ok(dest.to_path_buf())
    }
}

/// Last path segment of a URL, e.g. `title.ratings.tsv.gz`.
pub fn file_name_of(url: &str) -> Option<&str> {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
}

async fn prepare_destination(dest: &Path) -> EtlResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::remove_file(dest).await {
        Ok(()) => log::debug!("Removed stale {}", dest.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Decompress a single gzip stream next to the archive, dropping the `.gz`
/// suffix. Returns the decompressed path.
pub fn decompress_gz(path: &Path) -> EtlResult<PathBuf> {
    let out = match path.extension() {
        Some(ext) if ext == "gz" => path.with_extension(""),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".out");
            PathBuf::from(name)
        }
    };

    let wrap = |source: std::io::Error| EtlError::Decompress {
        path: path.to_path_buf(),
        source,
    };

    let input = File::open(path).map_err(wrap)?;
    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut output = BufWriter::new(File::create(&out).map_err(wrap)?);
    let bytes = std::io::copy(&mut decoder, &mut output).map_err(wrap)?;
    std::io::Write::flush(&mut output).map_err(wrap)?;

    log::info!(
        "Decompressed {} to {} ({} bytes)",
        path.display(),
        out.display(),
        bytes
    );
    Ok(out)
}
