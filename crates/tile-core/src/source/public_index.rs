//! The public release catalog (bosh.io).
//!
//! The catalog has no listing of its own, so each desired release is looked
//! up by guessing its repository path from configured organizations and
//! name suffixes. The first repository publishing the exact version wins.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tile_schema::{
    BuiltArtifact, LocatedArtifact, MatchedSet, ReleaseId, ReleaseRequirement, Stemcell,
};

use super::{ReleaseSource, Retrieved, Retriever, admits, record_first};
use crate::error::FetchError;
use crate::io::{ObjectDownloader, TransportError};
use crate::lockfile::PublicIndexConfig;
use crate::reporter::Reporter;

const NAME: &str = "public-index";

#[derive(Debug, Deserialize)]
struct PublishedVersion {
    version: String,
    #[serde(default)]
    url: Option<String>,
}

pub struct PublicIndexSource {
    base_url: String,
    orgs: Vec<String>,
    suffixes: Vec<String>,
    client: Client,
    retriever: Retriever,
    reporter: Arc<dyn Reporter>,
}

impl PublicIndexSource {
    pub fn new(
        config: &PublicIndexConfig,
        client: Client,
        downloader: Arc<dyn ObjectDownloader>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            orgs: config.orgs.clone(),
            suffixes: config.suffixes.clone(),
            client,
            retriever: Retriever::new(downloader, reporter.clone()),
            reporter,
        }
    }

    /// Candidate repository paths for `name`, in probing order.
    fn repositories(&self, name: &str) -> Vec<String> {
        self.orgs
            .iter()
            .flat_map(|org| {
                self.suffixes
                    .iter()
                    .map(move |suffix| format!("github.com/{org}/{name}{suffix}"))
            })
            .collect()
    }

    /// Versions a repository publishes. A repository the catalog does not
    /// know is reported as publishing nothing.
    async fn published(&self, repository: &str) -> Result<Vec<PublishedVersion>, TransportError> {
        let url = format!("{}/api/v1/releases/{repository}", self.base_url);
        tracing::trace!("Probing {url}");

        let resp = self
            .client
            .get(&url)
            .header(header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        Ok(resp.error_for_status()?.json().await?)
    }

    async fn find(&self, id: &ReleaseId) -> Result<Option<LocatedArtifact>, TransportError> {
        for repository in self.repositories(&id.name) {
            let Some(published) = self
                .published(&repository)
                .await?
                .into_iter()
                .find(|p| p.version == id.version)
            else {
                continue;
            };

            let location = published.url.unwrap_or_else(|| {
                format!("{}/d/{repository}?v={}", self.base_url, id.version)
            });
            return Ok(Some(LocatedArtifact::Built(BuiltArtifact {
                id: id.clone(),
                location,
            })));
        }
        Ok(None)
    }
}

#[async_trait]
impl ReleaseSource for PublicIndexSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn locate(
        &self,
        desired: &ReleaseRequirement,
        stemcell: Option<&Stemcell>,
    ) -> Result<MatchedSet, FetchError> {
        let mut matched = MatchedSet::new();

        for id in desired.ids() {
            // Catalog releases are source releases: never stemcell-specific.
            if !admits(desired, stemcell, id, None) {
                continue;
            }
            match self.find(id).await.map_err(FetchError::Listing)? {
                Some(artifact) => {
                    record_first(&mut matched, NAME, self.reporter.as_ref(), artifact)
                }
                None => tracing::trace!("{NAME}: {id} is not published"),
            }
        }

        tracing::debug!("{NAME}: located {} of {} releases", matched.len(), desired.len());
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
