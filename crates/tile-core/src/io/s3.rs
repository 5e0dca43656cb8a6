//! S3-compatible bucket access for release repositories.
//!
//! Listing walks `ListObjectsV2` continuation tokens lazily, one page per
//! request. Downloads use ranged `GetObject` calls for large objects.

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3 as s3;
use aws_sdk_s3::error::DisplayErrorContext;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use super::{
    DEFAULT_PART_SIZE, ObjectDownloader, ObjectLister, ObjectPage, TransportError, byte_ranges,
};
use crate::lockfile::BucketConfig;

/// A client bound to one bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: s3::Client,
    bucket: String,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

fn sdk_error<E: std::error::Error>(err: E) -> TransportError {
    TransportError::Service(DisplayErrorContext(err).to_string())
}

impl S3Store {
    /// Build a client from lockfile settings.
    ///
    /// Explicit keys in the config take precedence; otherwise the AWS
    /// default credential chain (environment, profile, instance role) is used.
    pub async fn from_config(config: &BucketConfig) -> Self {
        let region = s3::config::Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = s3::config::Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "tile-lockfile",
                );
                s3::Config::builder()
                    .behavior_version_latest()
                    .region(region)
                    .credentials_provider(credentials)
            }
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn download_range(
        &self,
        key: &str,
        dest: &Path,
        start: u64,
        end: u64,
    ) -> Result<u64, TransportError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(sdk_error)?;

        let mut file = OpenOptions::new().write(true).open(dest).await?;
        file.seek(SeekFrom::Start(start)).await?;
        write_body(resp.body, &mut file).await
    }
}

impl ObjectLister for S3Store {
    fn list_pages<'a>(
        &'a self,
        prefix: Option<&'a str>,
    ) -> BoxStream<'a, Result<ObjectPage, TransportError>> {
        stream::unfold(Cursor::Start, move |cursor| async move {
            let token = match cursor {
                Cursor::Done => return None,
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
            };

            tracing::trace!("Listing s3://{}/{}", self.bucket, prefix.unwrap_or_default());
            let result = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(prefix.map(str::to_owned))
                .set_continuation_token(token)
                .send()
                .await;

            match result {
                Ok(output) => {
                    let keys = output
                        .contents()
                        .iter()
                        .filter_map(|object| object.key().map(str::to_owned))
                        .collect();
                    let next = match output.next_continuation_token() {
                        Some(token) if output.is_truncated().unwrap_or(false) => {
                            Cursor::Next(token.to_owned())
                        }
                        _ => Cursor::Done,
                    };
                    Some((Ok(ObjectPage { keys }), next))
                }
                Err(err) => Some((Err(sdk_error(err)), Cursor::Done)),
            }
        })
        .boxed()
    }
}

#[async_trait]
impl ObjectDownloader for S3Store {
    async fn download(
        &self,
        location: &str,
        mut file: File,
        path: &Path,
        parts: usize,
    ) -> Result<u64, TransportError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(location)
            .send()
            .await
            .map_err(sdk_error)?;
        let total_size = head.content_length().unwrap_or(0).max(0) as u64;

        if parts > 1 && total_size > DEFAULT_PART_SIZE {
            file.set_len(total_size).await?;
            drop(file);

            let written: Vec<u64> = stream::iter(byte_ranges(total_size, DEFAULT_PART_SIZE))
                .map(|(start, end)| self.download_range(location, path, start, end))
                .buffer_unordered(parts)
                .try_collect()
                .await?;
            return Ok(written.into_iter().sum());
        }

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(location)
            .send()
            .await
            .map_err(sdk_error)?;
        write_body(resp.body, &mut file).await
    }
}

async fn write_body(
    mut body: s3::primitives::ByteStream,
    file: &mut File,
) -> Result<u64, TransportError> {
    let mut written: u64 = 0;
    while let Some(chunk) = body.try_next().await.map_err(sdk_error)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
