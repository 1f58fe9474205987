use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::Client;
use tracing::info;

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 15;

fn client() -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(concat!("covid-risk-scores/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .context("failed to build HTTP client")
}

/// A download written next to its destination and moved into place only
/// once complete, so an interrupted fetch never leaves a truncated dataset.
struct PartialFile {
    partial: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl PartialFile {
    fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating directory: {}", parent.display()))?;
        }
        let mut partial = path.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let file = File::create(&partial)
            .with_context(|| format!("failed creating {}", partial.display()))?;
        Ok(Self {
            partial,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> anyhow::Result<()> {
        self.writer
            .write_all(chunk)
            .with_context(|| format!("failed writing {}", self.partial.display()))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    fn commit(self, path: &Path) -> anyhow::Result<u64> {
        let file = self
            .writer
            .into_inner()
            .map_err(|err| anyhow!("failed flushing {}: {}", self.partial.display(), err.error()))?;
        file.sync_all()
            .with_context(|| format!("failed syncing {}", self.partial.display()))?;
        std::fs::rename(&self.partial, path)
            .with_context(|| format!("failed moving dataset into place: {}", path.display()))?;
        Ok(self.written)
    }
}

/// Streams `url` to `path`, replacing whatever was there.
pub async fn download(url: &str, path: &Path) -> anyhow::Result<u64> {
    info!(url, path = %path.display(), "downloading dataset");
    let mut response = client()?
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed GET request: {url}"))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("GET {url} returned {status}"));
    }

    let mut file = PartialFile::create(path)?;
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?
    {
        file.write_chunk(&chunk)?;
    }
    let bytes = file.commit(path)?;

    info!(bytes, "download done");
    Ok(bytes)
}
