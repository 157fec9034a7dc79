//! Resumable HTTP transfers
//!
//! A transfer probes the server with `Range: bytes=0-0`. When the server
//! answers `206` with a total size, the file is split into byte ranges that
//! are fetched concurrently into `<file>.partN` and joined at the end. A
//! JSON marker `<file>.resume.json` records the plan until the join
//! succeeds, so an interrupted transfer can pick up where its parts stop.
//! Servers without range support are streamed in one piece.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::try_join_all;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::USER_AGENT;
use crate::error::{Result, SeriesError};

/// Suffix of the marker file written next to an unfinished target
pub const MARKER_SUFFIX: &str = ".resume.json";

/// Progress notifications emitted while a transfer runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Size is known (or not) and `resumed_bytes` are already on disk
    Started {
        total: Option<u64>,
        resumed_bytes: u64,
    },
    /// `bytes` more were written
    Progress { bytes: u64 },
    Finished { bytes: u64 },
    Failed { message: String },
}

pub type EventSender = mpsc::UnboundedSender<TransferEvent>;

/// One file to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub url: String,
    pub target: PathBuf,
    /// Number of concurrent byte ranges (at least 1)
    pub chunk_count: usize,
}

/// Outcome of a finished transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Final size of the target file
    pub bytes: u64,
    /// Whether parts from an earlier run were reused
    pub resumed: bool,
}

/// Something that can fetch a URL into a file and continue a partial fetch
///
/// Implementations report through `events` and return the final error as
/// well; callers decide whether a failure stops anything.
#[allow(async_fn_in_trait)]
pub trait TransferEngine {
    /// Where the resume marker for `target` lives
    fn marker_path(&self, target: &Path) -> PathBuf {
        marker_path(target)
    }

    /// Fetch from scratch, discarding nothing but the target's own parts
    async fn start(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats>;

    /// Continue a transfer whose marker exists
    async fn resume(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats>;
}

/// `<target>.resume.json`
pub fn marker_path(target: &Path) -> PathBuf {
    with_suffix(target, MARKER_SUFFIX)
}

/// `<target>.part<index>`
pub fn part_path(target: &Path, index: usize) -> PathBuf {
    with_suffix(target, &format!(".part{}", index))
}

fn with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Inclusive byte range `start..=end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Splits `total` bytes into at most `count` contiguous ranges
///
/// Lengths differ by at most one byte. A zero-length file has no ranges.
pub fn plan_chunks(total: u64, count: usize) -> Vec<ChunkRange> {
    if total == 0 {
        return Vec::new();
    }

    let count = (count.max(1) as u64).min(total);
    let base = total / count;
    let extra = total % count;

    let mut chunks = Vec::with_capacity(count as usize);
    let mut start = 0;
    for i in 0..count {
        let len = base + u64::from(i < extra);
        chunks.push(ChunkRange {
            start,
            end: start + len - 1,
        });
        start += len;
    }
    chunks
}

/// On-disk record of an unfinished chunked transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeMarker {
    pub total: u64,
    pub chunks: Vec<ChunkRange>,
}

impl ResumeMarker {
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?).await?;
        Ok(())
    }
}

/// What the range probe learned about the server
enum Probe {
    Ranged { total: u64 },
    Whole(reqwest::Response),
}

/// [`TransferEngine`] over plain HTTP(S) with range requests
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new() -> Result<Self> {
        Self::with_user_agent(USER_AGENT)
    }

    /// Media files can take long, so only connecting is time-limited.
    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .map_err(SeriesError::HttpError)?;

        Ok(Self { client })
    }

    async fn probe(&self, url: &str) -> Result<Probe> {
        let response = self.client.get(url).header(RANGE, "bytes=0-0").send().await?;
        let status = response.status();

        if status == StatusCode::PARTIAL_CONTENT {
            if let Some(total) = content_range_total(&response) {
                return Ok(Probe::Ranged { total });
            }
            // Partial answer of unknown size: ask again for the whole body
            let response = self.client.get(url).send().await?.error_for_status()?;
            return Ok(Probe::Whole(response));
        }

        if status.is_success() {
            return Ok(Probe::Whole(response));
        }

        Err(SeriesError::Transfer(format!(
            "server answered HTTP {} for {}",
            status, url
        )))
    }

    async fn fresh(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats> {
        match self.probe(&request.url).await? {
            Probe::Ranged { total } => {
                let marker = ResumeMarker {
                    total,
                    chunks: plan_chunks(total, request.chunk_count),
                };
                for index in 0..marker.chunks.len() {
                    File::create(part_path(&request.target, index)).await?;
                }
                marker.save(&self.marker_path(&request.target)).await?;
                debug!(
                    "Fetching {} bytes in {} ranges into {}",
                    total,
                    marker.chunks.len(),
                    request.target.display()
                );

                let _ = events.send(TransferEvent::Started {
                    total: Some(total),
                    resumed_bytes: 0,
                });
                let bytes = self.fetch_chunks(request, &marker, events).await?;
                Ok(TransferStats {
                    bytes,
                    resumed: false,
                })
            }
            Probe::Whole(response) => {
                debug!("No range support, streaming {}", request.url);
                let _ = events.send(TransferEvent::Started {
                    total: response.content_length(),
                    resumed_bytes: 0,
                });
                let bytes = stream_whole(response, &request.target, events).await?;
                discard_marker(&self.marker_path(&request.target)).await;
                Ok(TransferStats {
                    bytes,
                    resumed: false,
                })
            }
        }
    }

    async fn continue_from_marker(
        &self,
        request: &TransferRequest,
        events: &EventSender,
    ) -> Result<TransferStats> {
        let marker_file = self.marker_path(&request.target);
        let marker = match ResumeMarker::load(&marker_file).await {
            Ok(marker) => marker,
            Err(e) => {
                warn!(
                    "Unreadable resume marker {} ({}), starting over",
                    marker_file.display(),
                    e
                );
                discard_marker(&marker_file).await;
                return self.fresh(request, events).await;
            }
        };

        match self.probe(&request.url).await? {
            Probe::Ranged { total } if total == marker.total => {
                let mut resumed_bytes = 0;
                for (index, chunk) in marker.chunks.iter().enumerate() {
                    resumed_bytes += existing_len(&part_path(&request.target, index))
                        .await
                        .min(chunk.size());
                }
                debug!(
                    "Resuming {} with {} of {} bytes present",
                    request.target.display(),
                    resumed_bytes,
                    total
                );

                let _ = events.send(TransferEvent::Started {
                    total: Some(total),
                    resumed_bytes,
                });
                let bytes = self.fetch_chunks(request, &marker, events).await?;
                Ok(TransferStats {
                    bytes,
                    resumed: true,
                })
            }
            _ => {
                warn!(
                    "Remote file for {} changed since the last attempt, starting over",
                    request.target.display()
                );
                remove_parts(&request.target, marker.chunks.len()).await;
                discard_marker(&marker_file).await;
                self.fresh(request, events).await
            }
        }
    }

    /// Fetches every missing range, then joins the parts into the target
    async fn fetch_chunks(
        &self,
        request: &TransferRequest,
        marker: &ResumeMarker,
        events: &EventSender,
    ) -> Result<u64> {
        let fetches = marker.chunks.iter().enumerate().map(|(index, chunk)| {
            self.fetch_chunk(&request.url, *chunk, part_path(&request.target, index), events)
        });
        try_join_all(fetches).await?;

        let bytes = join_parts(&request.target, marker).await?;
        remove_parts(&request.target, marker.chunks.len()).await;
        fs::remove_file(self.marker_path(&request.target)).await?;
        Ok(bytes)
    }

    /// Appends the rest of `chunk` to its part file
    ///
    /// A part file only ever holds a prefix of its range, so its length is
    /// the offset to continue from.
    async fn fetch_chunk(
        &self,
        url: &str,
        chunk: ChunkRange,
        part: PathBuf,
        events: &EventSender,
    ) -> Result<()> {
        let done = existing_len(&part).await.min(chunk.size());
        if done == chunk.size() {
            return Ok(());
        }

        let from = chunk.start + done;
        let mut response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={}-{}", from, chunk.end))
            .send()
            .await?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(SeriesError::Transfer(format!(
                "range {}-{} answered HTTP {}",
                from,
                chunk.end,
                response.status()
            )));
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&part).await?;
        let mut remaining = chunk.end - from + 1;

        while remaining > 0 {
            let Some(bytes) = response.chunk().await? else {
                break;
            };
            let take = (bytes.len() as u64).min(remaining) as usize;
            file.write_all(&bytes[..take]).await?;
            remaining -= take as u64;
            let _ = events.send(TransferEvent::Progress { bytes: take as u64 });
        }
        file.flush().await?;

        if remaining > 0 {
            return Err(SeriesError::Transfer(format!(
                "connection closed with {} bytes of range {}-{} missing",
                remaining, chunk.start, chunk.end
            )));
        }
        Ok(())
    }
}

impl TransferEngine for HttpTransfer {
    async fn start(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats> {
        report(self.fresh(request, events).await, events)
    }

    async fn resume(&self, request: &TransferRequest, events: &EventSender) -> Result<TransferStats> {
        report(self.continue_from_marker(request, events).await, events)
    }
}

fn report(result: Result<TransferStats>, events: &EventSender) -> Result<TransferStats> {
    let event = match &result {
        Ok(stats) => TransferEvent::Finished { bytes: stats.bytes },
        Err(e) => TransferEvent::Failed {
            message: e.to_string(),
        },
    };
    let _ = events.send(event);
    result
}

/// Total size from `Content-Range: bytes 0-0/<total>`
fn content_range_total(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_RANGE)?
        .to_str()
        .ok()?
        .rsplit('/')
        .next()?
        .trim()
        .parse()
        .ok()
}

async fn existing_len(path: &Path) -> u64 {
    fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

/// Removes a marker that no longer describes the file on disk
async fn discard_marker(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Could not remove resume marker {}: {}", path.display(), e);
    }
}

async fn remove_parts(target: &Path, count: usize) {
    for index in 0..count {
        let _ = fs::remove_file(part_path(target, index)).await;
    }
}

/// Concatenates the parts in range order into `target`
async fn join_parts(target: &Path, marker: &ResumeMarker) -> Result<u64> {
    let mut out = File::create(target).await?;
    let mut written = 0;

    for (index, chunk) in marker.chunks.iter().enumerate() {
        let part = File::open(part_path(target, index)).await?;
        let copied = tokio::io::copy(&mut part.take(chunk.size()), &mut out).await?;
        if copied != chunk.size() {
            return Err(SeriesError::Transfer(format!(
                "part {} holds {} of {} bytes",
                index,
                copied,
                chunk.size()
            )));
        }
        written += copied;
    }

    out.flush().await?;
    Ok(written)
}

/// Streams a whole response into `<target>.part0`, renamed on success
async fn stream_whole(
    mut response: reqwest::Response,
    target: &Path,
    events: &EventSender,
) -> Result<u64> {
    let part = part_path(target, 0);
    let mut file = File::create(&part).await?;
    let mut written = 0;

    while let Some(bytes) = response.chunk().await? {
        file.write_all(&bytes).await?;
        written += bytes.len() as u64;
        let _ = events.send(TransferEvent::Progress {
            bytes: bytes.len() as u64,
        });
    }
    file.flush().await?;
    drop(file);

    fs::rename(&part, target).await?;
    Ok(written)
}
