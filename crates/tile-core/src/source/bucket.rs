//! Object-store buckets of release tarballs.
//!
//! Compiled and built buckets share this implementation; the pattern's
//! [`ArtifactKind`] decides whether extracted stemcells take part in
//! matching.

use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tile_schema::{
    BuiltArtifact, CompiledArtifact, LocatedArtifact, MatchedSet, ReleaseRequirement, Stemcell,
};

use super::{ReleaseSource, Retrieved, Retriever, admits, record_first};
use crate::error::FetchError;
use crate::io::{ObjectDownloader, ObjectLister};
use crate::pattern::{ArtifactKind, Candidate, ReleasePattern};
use crate::reporter::Reporter;

pub struct BucketReleaseSource {
    name: &'static str,
    pattern: ReleasePattern,
    prefix: Option<String>,
    lister: Arc<dyn ObjectLister>,
    retriever: Retriever,
    reporter: Arc<dyn Reporter>,
}

impl BucketReleaseSource {
    pub fn new(
        pattern: ReleasePattern,
        lister: Arc<dyn ObjectLister>,
        downloader: Arc<dyn ObjectDownloader>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let name = match pattern.kind() {
            ArtifactKind::Compiled => "compiled-releases",
            ArtifactKind::Built => "built-releases",
        };
        Self {
            name,
            pattern,
            prefix: None,
            lister,
            retriever: Retriever::new(downloader, reporter.clone()),
            reporter,
        }
    }

    /// Only list keys below `prefix`.
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    fn artifact(candidate: Candidate, key: String) -> LocatedArtifact {
        match candidate.stemcell {
            Some(stemcell) => LocatedArtifact::Compiled(CompiledArtifact {
                id: candidate.id,
                stemcell,
                location: key,
            }),
            None => LocatedArtifact::Built(BuiltArtifact {
                id: candidate.id,
                location: key,
            }),
        }
    }
}

#[async_trait]
impl ReleaseSource for BucketReleaseSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn locate(
        &self,
        desired: &ReleaseRequirement,
        stemcell: Option<&Stemcell>,
    ) -> Result<MatchedSet, FetchError> {
        let mut matched = MatchedSet::new();
        let mut pages = self.lister.list_pages(self.prefix.as_deref());

        while let Some(page) = pages.next().await {
            let page = page.map_err(FetchError::Listing)?;

            for key in page.keys {
                let Some(candidate) = self.pattern.extract(&key) else {
                    tracing::trace!(
                        "{}: {key} does not match {}",
                        self.name,
                        self.pattern.as_str()
                    );
                    continue;
                };
                if !admits(desired, stemcell, &candidate.id, candidate.stemcell.as_ref()) {
                    tracing::trace!("{}: {key} is not a desired release", self.name);
                    continue;
                }

                let artifact = Self::artifact(candidate, key);
                record_first(&mut matched, self.name, self.reporter.as_ref(), artifact);
            }
        }

        tracing::debug!("{}: located {} of {} releases", self.name, matched.len(), desired.len());
        Ok(matched)
    }

    async fn retrieve(
        &self,
        dest_dir: &Path,
        matched: &MatchedSet,
        concurrency: usize,
    ) -> Result<Vec<Retrieved>, FetchError> {
        self.retriever.retrieve(dest_dir, matched, concurrency).await
    }
}
