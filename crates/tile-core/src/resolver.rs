//! Multi-source release resolution.
//!
//! Sources are asked in priority order, each only for what is still missing,
//! so a release is always taken from the highest-priority source holding it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tile_schema::{MatchedSet, ReleaseId, ReleaseRequirement, Stemcell};

use crate::error::FetchError;
use crate::source::{ReleaseSource, Retrieved};

pub struct Resolver {
    sources: Vec<Arc<dyn ReleaseSource>>,
}

/// What one source contributed to a resolution.
pub struct SourceMatches {
    pub source: Arc<dyn ReleaseSource>,
    pub matched: MatchedSet,
}

/// Outcome of [`Resolver::resolve`].
pub struct Resolution {
    found: Vec<SourceMatches>,
    unmatched: ReleaseRequirement,
}

impl Resolver {
    /// `sources` must already be in priority order.
    pub fn new(sources: Vec<Arc<dyn ReleaseSource>>) -> Self {
        Self { sources }
    }

    /// Locate every release in `desired` across the configured sources.
    ///
    /// Releases no source holds are reported in [`Resolution::unmatched`]
    /// rather than as an error.
    ///
    /// # Errors
    ///
    /// Returns the first source error; later sources are not consulted.
    pub async fn resolve(
        &self,
        desired: &ReleaseRequirement,
        stemcell: Option<&Stemcell>,
    ) -> Result<Resolution, FetchError> {
        let mut remaining = desired.clone();
        let mut found = Vec::new();

        for source in &self.sources {
            if remaining.is_empty() {
                break;
            }

            tracing::debug!("Asking {} for {} releases", source.name(), remaining.len());
            let located = source.locate(&remaining, stemcell).await?;

            let matched: MatchedSet = located
                .into_iter()
                .filter(|artifact| {
                    let wanted = remaining.contains(artifact.id());
                    if !wanted {
                        tracing::warn!(
                            "{} returned {} which was not requested",
                            source.name(),
                            artifact.id()
                        );
                    }
                    wanted
                })
                .collect();
            if matched.is_empty() {
                continue;
            }

            remaining = remaining.without(matched.ids());
            found.push(SourceMatches {
                source: source.clone(),
                matched,
            });
        }

        Ok(Resolution {
            found,
            unmatched: remaining,
        })
    }
}

impl Resolution {
    /// Matches grouped by the source that produced them, in priority order.
    pub fn found(&self) -> &[SourceMatches] {
        &self.found
    }

    /// Every matched release, regardless of source.
    pub fn matched(&self) -> MatchedSet {
        let mut all = MatchedSet::new();
        for group in &self.found {
            all.absorb(group.matched.clone());
        }
        all
    }

    pub fn unmatched(&self) -> &ReleaseRequirement {
        &self.unmatched
    }

    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }

    /// Name of the source that matched `id`.
    pub fn source_of(&self, id: &ReleaseId) -> Option<&str> {
        self.found
            .iter()
            .find(|group| group.matched.contains(id))
            .map(|group| group.source.name())
    }

    /// Download every match through the source that found it.
    ///
    /// # Errors
    ///
    /// Stops at the first failed artifact.
    pub async fn retrieve(
        &self,
        dest_dir: &Path,
        concurrency: usize,
    ) -> Result<Vec<Retrieved>, FetchError> {
        let mut retrieved = Vec::new();
        for group in &self.found {
            retrieved.extend(
                group
                    .source
                    .retrieve(dest_dir, &group.matched, concurrency)
                    .await?,
            );
        }
        Ok(retrieved)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field(
                "found",
                &self
                    .found
                    .iter()
                    .map(|g| (g.source.name(), g.matched.len()))
                    .collect::<Vec<_>>(),
            )
            .field("unmatched", &self.unmatched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tile_schema::{BuiltArtifact, CompiledArtifact, LocatedArtifact};

    /// Holds a fixed set of artifacts and records what it was asked for.
    struct FakeSource {
        name: &'static str,
        holds: Vec<LocatedArtifact>,
        fail: bool,
        asked: Mutex<Vec<Vec<ReleaseId>>>,
        retrieved: Mutex<Vec<ReleaseId>>,
    }

    impl FakeSource {
        fn new(name: &'static str, holds: Vec<LocatedArtifact>) -> Arc<Self> {
            Arc::new(Self {
                name,
                holds,
                fail: false,
                asked: Mutex::new(Vec::new()),
                retrieved: Mutex::new(Vec::new()),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                holds: Vec::new(),
                fail: true,
                asked: Mutex::new(Vec::new()),
                retrieved: Mutex::new(Vec::new()),
            })
        }

        fn asked(&self) -> Vec<Vec<ReleaseId>> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReleaseSource for FakeSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn locate(
            &self,
            desired: &ReleaseRequirement,
            _stemcell: Option<&Stemcell>,
        ) -> Result<MatchedSet, FetchError> {
            self.asked
                .lock()
                .unwrap()
                .push(desired.ids().cloned().collect());
            if self.fail {
                return Err(FetchError::Listing(crate::io::TransportError::Service(
                    "listing failed".to_string(),
                )));
            }
            // Deliberately ignores `desired` to exercise the resolver's filter.
            Ok(self.holds.iter().cloned().collect())
        }

        async fn retrieve(
            &self,
            dest_dir: &Path,
            matched: &MatchedSet,
            _concurrency: usize,
        ) -> Result<Vec<Retrieved>, FetchError> {
            let mut out = Vec::new();
            for artifact in matched.artifacts() {
                self.retrieved.lock().unwrap().push(artifact.id().clone());
                out.push(Retrieved {
                    id: artifact.id().clone(),
                    path: dest_dir.join(artifact.local_filename()),
                    bytes: 0,
                });
            }
            Ok(out)
        }
    }

    fn built(name: &str, version: &str) -> LocatedArtifact {
        LocatedArtifact::Built(BuiltArtifact {
            id: ReleaseId::new(name, version),
            location: format!("{name}-{version}"),
        })
    }

    fn compiled(name: &str, version: &str) -> LocatedArtifact {
        LocatedArtifact::Compiled(CompiledArtifact {
            id: ReleaseId::new(name, version),
            stemcell: Stemcell::new("ubuntu-xenial", "190.0.0"),
            location: format!("compiled/{name}-{version}"),
        })
    }

    fn resolver(sources: &[&Arc<FakeSource>]) -> Resolver {
        Resolver::new(
            sources
                .iter()
                .map(|source| Arc::clone(*source) as Arc<dyn ReleaseSource>)
                .collect(),
        )
    }

    fn desired(ids: &[(&str, &str)]) -> ReleaseRequirement {
        ReleaseRequirement::from_ids(ids.iter().map(|(n, v)| ReleaseId::new(*n, *v)), None)
    }

    #[tokio::test]
    async fn test_higher_priority_source_wins() {
        let compiled_src = FakeSource::new("compiled", vec![compiled("bpm", "1.2.3")]);
        let index = FakeSource::new("index", vec![built("bpm", "1.2.3"), built("uaa", "74.0.0")]);
        let resolver = resolver(&[&compiled_src, &index]);

        let resolution = resolver
            .resolve(&desired(&[("bpm", "1.2.3"), ("uaa", "74.0.0")]), None)
            .await
            .unwrap();

        assert!(resolution.is_complete());
        let bpm = ReleaseId::new("bpm", "1.2.3");
        assert_eq!(resolution.source_of(&bpm), Some("compiled"));
        assert!(resolution.matched().get(&bpm).unwrap().stemcell().is_some());
        assert_eq!(
            resolution.source_of(&ReleaseId::new("uaa", "74.0.0")),
            Some("index")
        );

        // The second source is only asked for what is still missing.
        assert_eq!(index.asked(), vec![vec![ReleaseId::new("uaa", "74.0.0")]]);
    }

    #[tokio::test]
    async fn test_stops_once_everything_is_found() {
        let first = FakeSource::new("first", vec![built("bpm", "1.2.3")]);
        let second = FakeSource::new("second", vec![built("bpm", "1.2.3")]);
        let resolver = resolver(&[&first, &second]);

        let resolution = resolver
            .resolve(&desired(&[("bpm", "1.2.3")]), None)
            .await
            .unwrap();

        assert!(resolution.is_complete());
        assert!(second.asked().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_releases_are_data() {
        let source = FakeSource::new("only", vec![built("bpm", "1.2.3"), built("extra", "0.1.0")]);
        let resolver = resolver(&[&source]);

        let resolution = resolver
            .resolve(&desired(&[("bpm", "1.2.3"), ("uaa", "74.0.0")]), None)
            .await
            .unwrap();

        assert!(!resolution.is_complete());
        assert_eq!(
            resolution.unmatched().ids().collect::<Vec<_>>(),
            vec![&ReleaseId::new("uaa", "74.0.0")]
        );
        // Releases nobody asked for are dropped.
        assert!(!resolution.matched().contains(&ReleaseId::new("extra", "0.1.0")));
        assert_eq!(resolution.matched().len(), 1);
    }

    #[tokio::test]
    async fn test_source_error_aborts_resolution() {
        let broken = FakeSource::failing("broken");
        let later = FakeSource::new("later", vec![built("bpm", "1.2.3")]);
        let resolver = resolver(&[&broken, &later]);

        let err = resolver
            .resolve(&desired(&[("bpm", "1.2.3")]), None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "listing failed");
        assert!(later.asked().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_dispatches_to_producing_source() {
        let compiled_src = FakeSource::new("compiled", vec![compiled("bpm", "1.2.3")]);
        let index = FakeSource::new("index", vec![built("uaa", "74.0.0")]);
        let resolver = resolver(&[&compiled_src, &index]);

        let resolution = resolver
            .resolve(&desired(&[("bpm", "1.2.3"), ("uaa", "74.0.0")]), None)
            .await
            .unwrap();
        let retrieved = resolution.retrieve(Path::new("/releases"), 0).await.unwrap();

        assert_eq!(retrieved.len(), 2);
        assert_eq!(
            *compiled_src.retrieved.lock().unwrap(),
            vec![ReleaseId::new("bpm", "1.2.3")]
        );
        assert_eq!(
            *index.retrieved.lock().unwrap(),
            vec![ReleaseId::new("uaa", "74.0.0")]
        );
    }

    #[tokio::test]
    async fn test_empty_desired_set_asks_nobody() {
        let source = FakeSource::new("only", vec![built("bpm", "1.2.3")]);
        let resolver = resolver(&[&source]);

        let resolution = resolver.resolve(&ReleaseRequirement::new(), None).await.unwrap();

        assert!(resolution.is_complete());
        assert!(resolution.found().is_empty());
        assert!(source.asked().is_empty());
    }
}
