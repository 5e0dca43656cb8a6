//! Release identity, stemcells and the desired release set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifies a release by name and exact version.
///
/// # Example
///
/// ```
/// use tile_schema::ReleaseId;
///
/// let id = ReleaseId::new("bpm", "1.2.3-lts");
/// assert_eq!(id.to_string(), "bpm/1.2.3-lts");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReleaseId {
    /// Release name (e.g. `bpm`).
    pub name: String,
    /// Exact release version (e.g. `1.2.3-lts`).
    pub version: String,
}

impl ReleaseId {
    /// Create a new `ReleaseId`.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// The base image a compiled release was built against.
///
/// Compared by exact string equality on both fields; no version ranges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Stemcell {
    /// Operating system name (e.g. `ubuntu-xenial`).
    pub os: String,
    /// Stemcell version (e.g. `190.0.0`).
    pub version: String,
}

impl Stemcell {
    /// Create a new `Stemcell`.
    pub fn new(os: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Stemcell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.version)
    }
}

/// Error returned when a string is not in `os/version` form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid stemcell '{0}': expected 'os/version'")]
pub struct StemcellParseError(pub String);

impl FromStr for Stemcell {
    type Err = StemcellParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((os, version)) if !os.is_empty() && !version.is_empty() => {
                Ok(Self::new(os, version))
            }
            _ => Err(StemcellParseError(s.to_string())),
        }
    }
}

/// The desired release set: every required release, each with an optional
/// stemcell constraint.
///
/// Built once from upstream input and read-only afterwards. Iteration order
/// is sorted by [`ReleaseId`] so that resolution is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseRequirement {
    releases: BTreeMap<ReleaseId, Option<Stemcell>>,
}

impl ReleaseRequirement {
    /// Create an empty requirement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a requirement where every release shares the same constraint.
    pub fn from_ids(ids: impl IntoIterator<Item = ReleaseId>, stemcell: Option<&Stemcell>) -> Self {
        ids.into_iter().map(|id| (id, stemcell.cloned())).collect()
    }

    /// Add a release with its optional stemcell constraint.
    pub fn insert(&mut self, id: ReleaseId, stemcell: Option<Stemcell>) {
        self.releases.insert(id, stemcell);
    }

    /// Whether `id` is part of the desired set.
    pub fn contains(&self, id: &ReleaseId) -> bool {
        self.releases.contains_key(id)
    }

    /// The stemcell constraint recorded for `id`, if any.
    pub fn constraint(&self, id: &ReleaseId) -> Option<&Stemcell> {
        self.releases.get(id).and_then(Option::as_ref)
    }

    /// Number of desired releases.
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    /// Whether nothing is desired.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Iterate over the desired release ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &ReleaseId> {
        self.releases.keys()
    }

    /// Iterate over `(id, constraint)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&ReleaseId, Option<&Stemcell>)> {
        self.releases.iter().map(|(id, s)| (id, s.as_ref()))
    }

    /// Return a copy of this requirement with the given ids removed.
    pub fn without<'a>(&self, satisfied: impl IntoIterator<Item = &'a ReleaseId>) -> Self {
        let mut remaining = self.clone();
        for id in satisfied {
            remaining.releases.remove(id);
        }
        remaining
    }
}

impl FromIterator<(ReleaseId, Option<Stemcell>)> for ReleaseRequirement {
    fn from_iter<I: IntoIterator<Item = (ReleaseId, Option<Stemcell>)>>(iter: I) -> Self {
        Self {
            releases: iter.into_iter().collect(),
        }
    }
}
