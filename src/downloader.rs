use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::DownloadError;
use crate::{CHUNK_SIZE, VERSION};

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Result of one file transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Destination already existed; nothing was requested
    Skipped,
    Downloaded { bytes: u64 },
    Failed(String),
}

/// Something that can place a remote file at a local path
pub trait Transfer {
    fn download(&self, url: &str, destination: &Path) -> DownloadOutcome;
}

pub struct Downloader {
    client: Client,
    token: String,
}

impl Downloader {
    pub fn new(token: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(format!("moodle-sync/{VERSION}"))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            // Large files on slow links can take minutes; only connecting is bounded
            .timeout(None)
            .build()?;
        Ok(Self::with_client(client, token))
    }

    pub fn with_client(client: Client, token: &str) -> Self {
        Self {
            client,
            token: token.to_string(),
        }
    }

    fn transfer(&self, url: &str, destination: &Path) -> Result<u64, DownloadError> {
        let url = authenticated_url(url, &self.token)?;
        let mut response = self.client.get(url).send()?.error_for_status()?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        // Stream into a side file so an interrupted transfer is never
        // mistaken for a finished one on the next run
        let partial = partial_path(destination);
        match write_stream(&mut response, &partial) {
            Ok(bytes) => {
                fs::rename(&partial, destination)?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

impl Transfer for Downloader {
    fn download(&self, url: &str, destination: &Path) -> DownloadOutcome {
        if destination.exists() {
            debug!(path = %destination.display(), "already present, skipping");
            return DownloadOutcome::Skipped;
        }

        match self.transfer(url, destination) {
            Ok(bytes) => DownloadOutcome::Downloaded { bytes },
            Err(e) => {
                warn!(path = %destination.display(), error = %e, "download failed");
                DownloadOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Moodle file URLs need the token as a query parameter
pub fn authenticated_url(url: &str, token: &str) -> Result<Url, DownloadError> {
    let mut parsed = Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
    parsed.query_pairs_mut().append_pair("token", token);
    Ok(parsed)
}

/// `<destination>.part`
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}

/// Copy `reader` into a new file at `path` in fixed-size chunks
pub fn write_stream(reader: &mut impl Read, path: &Path) -> Result<u64, DownloadError> {
    let mut file = fs::File::create(path)?;
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])?;
        total += n as u64;
    }

    file.flush()?;
    Ok(total)
}
