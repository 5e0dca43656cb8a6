//! IO modules - side effects (network, filesystem)
//!
//! The traits here are the only boundary between release matching and a
//! concrete repository. Sources depend on them, never on a client type.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;

pub mod download;
pub mod local;
pub mod s3;

/// Number of parallel sub-transfers used when the caller passes `0`.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 5;

/// Size of one ranged sub-transfer (5 MiB).
pub const DEFAULT_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Failure reported by a repository while listing or transferring.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Service(String),
}

/// One page of raw object keys from a repository listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
}

/// A repository that can enumerate its object keys.
pub trait ObjectLister: Send + Sync {
    /// Lazily list keys under `prefix`, one page per stream item.
    ///
    /// The next page is only requested when the consumer polls for it;
    /// dropping the stream stops the listing. A fresh call starts over.
    fn list_pages<'a>(
        &'a self,
        prefix: Option<&'a str>,
    ) -> BoxStream<'a, Result<ObjectPage, TransportError>>;
}

/// A repository that can stream one object into a local file.
#[async_trait]
pub trait ObjectDownloader: Send + Sync {
    /// Write the object at `location` into `file` (opened at `path`).
    ///
    /// `parts` is the maximum number of parallel sub-transfers; it is
    /// always at least 1. Returns the number of bytes written.
    async fn download(
        &self,
        location: &str,
        file: File,
        path: &Path,
        parts: usize,
    ) -> Result<u64, TransportError>;

    /// Parallelism used when the caller does not choose one.
    fn default_concurrency(&self) -> usize {
        DEFAULT_DOWNLOAD_CONCURRENCY
    }
}

/// Split `total` bytes into inclusive `(start, end)` ranges of at most
/// `part_size` bytes.
pub(crate) fn byte_ranges(total: u64, part_size: u64) -> Vec<(u64, u64)> {
    let part_size = part_size.max(1);
    (0..total.div_ceil(part_size))
        .map(|i| {
            let start = i * part_size;
            (start, (start + part_size).min(total) - 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_ranges_cover_every_byte() {
        assert_eq!(byte_ranges(10, 4), vec![(0, 3), (4, 7), (8, 9)]);
        assert_eq!(byte_ranges(8, 4), vec![(0, 3), (4, 7)]);
        assert_eq!(byte_ranges(3, 4), vec![(0, 2)]);
    }

    #[test]
    fn test_byte_ranges_empty_object() {
        assert!(byte_ranges(0, 4).is_empty());
    }
}
