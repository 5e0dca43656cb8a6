//! Located artifacts and the set of matches for a requirement.

use crate::RELEASE_TARBALL_EXT;
use crate::release::{ReleaseId, Stemcell};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// A release compiled against a specific stemcell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Identity of the compiled release.
    pub id: ReleaseId,
    /// Stemcell the release was compiled against.
    pub stemcell: Stemcell,
    /// Repository-specific location (e.g. an object key).
    pub location: String,
}

/// A stemcell-independent release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
    /// Identity of the release.
    pub id: ReleaseId,
    /// Repository-specific location (an object key or a download URL).
    pub location: String,
}

/// A release found in some repository, ready to be retrieved.
///
/// The `location` is opaque: only the source that produced the artifact
/// knows how to turn it into bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatedArtifact {
    /// Pre-compiled against a stemcell.
    Compiled(CompiledArtifact),
    /// Compiled at deploy time; usable with any stemcell.
    Built(BuiltArtifact),
}

impl LocatedArtifact {
    /// Identity of the located release.
    pub fn id(&self) -> &ReleaseId {
        match self {
            Self::Compiled(a) => &a.id,
            Self::Built(a) => &a.id,
        }
    }

    /// Repository-specific location of the artifact.
    pub fn location(&self) -> &str {
        match self {
            Self::Compiled(a) => &a.location,
            Self::Built(a) => &a.location,
        }
    }

    /// Stemcell of a compiled artifact; `None` for built artifacts.
    pub fn stemcell(&self) -> Option<&Stemcell> {
        match self {
            Self::Compiled(a) => Some(&a.stemcell),
            Self::Built(_) => None,
        }
    }

    /// Deterministic local filename derived from identity alone.
    ///
    /// # Example
    ///
    /// ```
    /// use tile_schema::{CompiledArtifact, LocatedArtifact, ReleaseId, Stemcell};
    ///
    /// let artifact = LocatedArtifact::Compiled(CompiledArtifact {
    ///     id: ReleaseId::new("bpm", "1.2.3"),
    ///     stemcell: Stemcell::new("ubuntu-trusty", "1234"),
    ///     location: "some-bpm-key".into(),
    /// });
    /// assert_eq!(artifact.local_filename(), "bpm-1.2.3-ubuntu-trusty-1234.tgz");
    /// ```
    pub fn local_filename(&self) -> String {
        match self {
            Self::Compiled(a) => format!(
                "{}-{}-{}-{}.{RELEASE_TARBALL_EXT}",
                a.id.name, a.id.version, a.stemcell.os, a.stemcell.version
            ),
            Self::Built(a) => format!("{}-{}.{RELEASE_TARBALL_EXT}", a.id.name, a.id.version),
        }
    }
}

/// Releases matched so far, keyed by identity.
///
/// Entries are write-once: recording an id that is already present leaves
/// the existing artifact in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedSet {
    artifacts: BTreeMap<ReleaseId, LocatedArtifact>,
}

impl MatchedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an artifact under its id.
    ///
    /// Returns `false` (and keeps the earlier entry) if the id was already
    /// recorded.
    pub fn record(&mut self, artifact: LocatedArtifact) -> bool {
        match self.artifacts.entry(artifact.id().clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(artifact);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Look up the artifact recorded for `id`.
    pub fn get(&self, id: &ReleaseId) -> Option<&LocatedArtifact> {
        self.artifacts.get(id)
    }

    /// Whether `id` has been matched.
    pub fn contains(&self, id: &ReleaseId) -> bool {
        self.artifacts.contains_key(id)
    }

    /// Number of matched releases.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether nothing has been matched.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Matched ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &ReleaseId> {
        self.artifacts.keys()
    }

    /// Matched artifacts in id order.
    pub fn artifacts(&self) -> impl Iterator<Item = &LocatedArtifact> {
        self.artifacts.values()
    }

    /// Record every artifact of `other` whose id is not yet present.
    ///
    /// Returns the number of artifacts added.
    pub fn absorb(&mut self, other: MatchedSet) -> usize {
        other
            .artifacts
            .into_values()
            .filter(|artifact| self.record(artifact.clone()))
            .count()
    }
}

impl FromIterator<LocatedArtifact> for MatchedSet {
    fn from_iter<I: IntoIterator<Item = LocatedArtifact>>(iter: I) -> Self {
        let mut set = Self::new();
        for artifact in iter {
            set.record(artifact);
        }
        set
    }
}

impl IntoIterator for MatchedSet {
    type Item = LocatedArtifact;
    type IntoIter = btree_map::IntoValues<ReleaseId, LocatedArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.into_values()
    }
}
