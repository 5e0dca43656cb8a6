//! HTTP downloads with optional parallel range requests.
//!
//! Small objects, and servers that do not advertise `Accept-Ranges: bytes`,
//! are streamed with a single GET. Everything else is split into parts that
//! are fetched concurrently and written at their offsets.

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode, header};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::{DEFAULT_PART_SIZE, ObjectDownloader, TransportError, byte_ranges};

/// Downloads artifacts addressed by URL.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    part_size: u64,
}

impl HttpDownloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            part_size: DEFAULT_PART_SIZE,
        }
    }

    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    /// Probe size and range support. A non-success status is reported as
    /// "no range support", so the caller falls back to a single GET that
    /// surfaces the real failure. A request that cannot be sent is an error.
    async fn probe(&self, url: &str) -> Result<(u64, bool), TransportError> {
        let head = self
            .client
            .head(url)
            .header(header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?;

        if !head.status().is_success() {
            return Ok((0, false));
        }

        // `Response::content_length` reports the (empty) HEAD body, so read the header.
        let total_size = head
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let accept_ranges = head
            .headers()
            .get(header::ACCEPT_RANGES)
            .is_some_and(|v| v == "bytes");

        Ok((total_size, accept_ranges))
    }

    async fn download_range(
        &self,
        url: &str,
        dest: &Path,
        start: u64,
        end: u64,
    ) -> Result<u64, TransportError> {
        let resp = self
            .client
            .get(url)
            .header(header::USER_AGENT, crate::USER_AGENT)
            .header(header::RANGE, format!("bytes={start}-{end}"))
            .send()
            .await?
            .error_for_status()?;

        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(TransportError::Service(format!(
                "server ignored range request bytes={start}-{end} ({})",
                resp.status()
            )));
        }

        let mut file = OpenOptions::new().write(true).open(dest).await?;
        file.seek(SeekFrom::Start(start)).await?;
        write_stream(resp.bytes_stream(), &mut file).await
    }
}

#[async_trait]
impl ObjectDownloader for HttpDownloader {
    async fn download(
        &self,
        location: &str,
        mut file: File,
        path: &Path,
        parts: usize,
    ) -> Result<u64, TransportError> {
        let (total_size, accept_ranges) = self.probe(location).await?;

        if parts > 1 && accept_ranges && total_size > self.part_size {
            tracing::debug!(
                "Downloading {location} in {} byte ranges ({parts} at a time)",
                total_size.div_ceil(self.part_size)
            );
            file.set_len(total_size).await?;
            drop(file);

            let written: Vec<u64> = stream::iter(byte_ranges(total_size, self.part_size))
                .map(|(start, end)| self.download_range(location, path, start, end))
                .buffer_unordered(parts)
                .try_collect()
                .await?;
            return Ok(written.into_iter().sum());
        }

        let response = self
            .client
            .get(location)
            .header(header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        write_stream(response.bytes_stream(), &mut file).await
    }
}

async fn write_stream(
    mut stream: impl futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
    file: &mut File,
) -> Result<u64, TransportError> {
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
