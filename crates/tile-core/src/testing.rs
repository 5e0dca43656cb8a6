//! In-memory repositories for unit tests.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::io::{ObjectDownloader, ObjectLister, ObjectPage, TransportError};

/// Serves fixed pages of keys, optionally interleaved with errors.
#[derive(Default)]
pub struct FakeLister {
    items: Vec<Result<Vec<String>, String>>,
    pulled: AtomicUsize,
    prefixes: Mutex<Vec<Option<String>>>,
}

impl FakeLister {
    pub fn new(pages: &[&[&str]]) -> Self {
        Self::default().then_pages(pages)
    }

    /// Append pages after everything configured so far.
    pub fn then_pages(mut self, pages: &[&[&str]]) -> Self {
        self.items.extend(
            pages
                .iter()
                .map(|page| Ok(page.iter().map(|k| k.to_string()).collect())),
        );
        self
    }

    /// Yield `message` as an error once the pages so far are exhausted.
    pub fn failing_after(mut self, message: &str) -> Self {
        self.items.push(Err(message.to_string()));
        self
    }

    /// Number of stream items the consumer has pulled.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    pub fn prefixes(&self) -> Vec<Option<String>> {
        self.prefixes.lock().unwrap().clone()
    }
}

impl ObjectLister for FakeLister {
    fn list_pages<'a>(
        &'a self,
        prefix: Option<&'a str>,
    ) -> BoxStream<'a, Result<ObjectPage, TransportError>> {
        self.prefixes
            .lock()
            .unwrap()
            .push(prefix.map(str::to_owned));

        stream::iter(self.items.iter())
            .map(|item| match item {
                Ok(keys) => Ok(ObjectPage { keys: keys.clone() }),
                Err(message) => Err(TransportError::Service(message.clone())),
            })
            .inspect(|_| {
                self.pulled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed()
    }
}

/// Records transfers and writes `<label>/<location>` as the file body.
pub struct FakeDownloader {
    label: String,
    failure: Option<String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl FakeDownloader {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every transfer with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// `(location, parts)` for every transfer, in call order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectDownloader for FakeDownloader {
    async fn download(
        &self,
        location: &str,
        mut file: File,
        _path: &Path,
        parts: usize,
    ) -> Result<u64, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((location.to_string(), parts));

        if let Some(message) = &self.failure {
            return Err(TransportError::Service(message.clone()));
        }

        let body = format!("{}/{}", self.label, location);
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        Ok(body.len() as u64)
    }
}
