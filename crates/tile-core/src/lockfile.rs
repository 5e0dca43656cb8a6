//! Lockfile parsing for tile projects.
//!
//! A lockfile (`Tilefile.lock`) pins every release a tile ships with, the
//! stemcell compiled releases must target, and where to look for them.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tile_schema::{ReleaseId, ReleaseRequirement, Stemcell};
use tokio::fs;

/// Default lockfile name, relative to the working directory.
pub const DEFAULT_LOCKFILE: &str = "Tilefile.lock";

/// Catalog queried when the lockfile does not name one.
pub const DEFAULT_PUBLIC_INDEX_URL: &str = "https://bosh.io";

/// Top-level lockfile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lockfile {
    /// Stemcell that compiled releases must have been built against.
    #[serde(default)]
    pub stemcell: Option<Stemcell>,
    /// Every release the tile requires.
    #[serde(default, rename = "release")]
    pub releases: Vec<LockedRelease>,
    /// Bucket holding releases compiled against a stemcell.
    #[serde(default)]
    pub compiled_releases: Option<BucketConfig>,
    /// Bucket holding stemcell-independent releases.
    #[serde(default)]
    pub built_releases: Option<BucketConfig>,
    /// Public release catalog settings.
    #[serde(default)]
    pub public_index: PublicIndexConfig,
}

/// A `[[release]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedRelease {
    pub name: String,
    pub version: String,
}

/// Location and naming convention of a release bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    pub bucket: String,
    /// Only keys under this prefix are listed.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// S3-compatible endpoint; implies path-style addressing.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Pattern with `release_name`/`release_version` (and, for compiled
    /// buckets, `stemcell_os`/`stemcell_version`) named groups.
    pub regex: String,
}

/// The `[public_index]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIndexConfig {
    #[serde(default = "default_public_index_url")]
    pub url: String,
    /// Organizations probed for each release, in order.
    #[serde(default = "default_orgs")]
    pub orgs: Vec<String>,
    /// Repository name suffixes probed for each organization, in order.
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
}

impl Default for PublicIndexConfig {
    fn default() -> Self {
        Self {
            url: default_public_index_url(),
            orgs: default_orgs(),
            suffixes: default_suffixes(),
        }
    }
}

fn default_region() -> String {
    "us-west-1".to_string()
}

fn default_public_index_url() -> String {
    DEFAULT_PUBLIC_INDEX_URL.to_string()
}

fn default_orgs() -> Vec<String> {
    [
        "cloudfoundry",
        "pivotal-cf",
        "cloudfoundry-incubator",
        "cloudfoundry-community",
    ]
    .map(String::from)
    .to_vec()
}

fn default_suffixes() -> Vec<String> {
    ["", "-release", "-bosh-release", "-boshrelease", "-bosh", "-forked"]
        .map(String::from)
        .to_vec()
}

impl Lockfile {
    /// Asynchronously load, parse and validate a `Lockfile`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`Lockfile::validate`].
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse and validate lockfile contents.
    ///
    /// # Errors
    ///
    /// Returns an error if `content` is not a valid lockfile.
    pub fn parse(content: &str) -> Result<Self> {
        let lockfile: Lockfile = toml::from_str(content)?;
        lockfile.validate()?;
        Ok(lockfile)
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error for empty release fields, duplicate releases, or a
    /// compiled bucket without a stemcell to match against.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for release in &self.releases {
            if release.name.is_empty() || release.version.is_empty() {
                bail!("Release entries need both a name and a version");
            }
            if !seen.insert((&release.name, &release.version)) {
                bail!(
                    "Release {}/{} is listed more than once",
                    release.name,
                    release.version
                );
            }
        }

        if self.compiled_releases().is_some() && self.stemcell.is_none() {
            bail!("compiled_releases is configured but no [stemcell] is set");
        }

        Ok(())
    }

    /// Compiled release bucket, if one is configured with a non-empty name.
    pub fn compiled_releases(&self) -> Option<&BucketConfig> {
        self.compiled_releases
            .as_ref()
            .filter(|c| !c.bucket.is_empty())
    }

    /// Built release bucket, if one is configured with a non-empty name.
    pub fn built_releases(&self) -> Option<&BucketConfig> {
        self.built_releases.as_ref().filter(|c| !c.bucket.is_empty())
    }

    /// The desired release set described by this lockfile.
    pub fn requirement(&self) -> ReleaseRequirement {
        ReleaseRequirement::from_ids(
            self.releases
                .iter()
                .map(|r| ReleaseId::new(&r.name, &r.version)),
            self.stemcell.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKFILE: &str = r#"
[stemcell]
os = "ubuntu-xenial"
version = "190.0.0"

[[release]]
name = "bpm"
version = "1.2.3-lts"

[[release]]
name = "uaa"
version = "74.0.0"

[compiled_releases]
bucket = "compiled-releases"
regex = '^2.5/.+/(?P<release_name>[a-z-_]+)-(?P<release_version>[0-9\.]+)-(?P<stemcell_os>[a-z-_]+)-(?P<stemcell_version>[\d\.]+)\.tgz$'

[built_releases]
bucket = ""
regex = ""
"#;

    #[test]
    fn test_parse_lockfile() {
        let lock = Lockfile::parse(LOCKFILE).unwrap();

        assert_eq!(lock.stemcell, Some(Stemcell::new("ubuntu-xenial", "190.0.0")));
        assert_eq!(lock.releases.len(), 2);

        let compiled = lock.compiled_releases().unwrap();
        assert_eq!(compiled.bucket, "compiled-releases");
        assert_eq!(compiled.region, "us-west-1");
        assert!(compiled.regex.contains("(?P<stemcell_os>"));

        // An empty bucket name means "not configured"
        assert!(lock.built_releases().is_none());

        assert_eq!(lock.public_index.url, DEFAULT_PUBLIC_INDEX_URL);
        assert_eq!(lock.public_index.orgs.len(), 4);
    }

    #[test]
    fn test_requirement_carries_stemcell() {
        let lock = Lockfile::parse(LOCKFILE).unwrap();
        let desired = lock.requirement();

        assert_eq!(desired.len(), 2);
        assert_eq!(
            desired.constraint(&ReleaseId::new("bpm", "1.2.3-lts")),
            Some(&Stemcell::new("ubuntu-xenial", "190.0.0"))
        );
    }

    #[test]
    fn test_compiled_bucket_requires_stemcell() {
        let content = r#"
[compiled_releases]
bucket = "compiled-releases"
regex = "x"
"#;
        let err = Lockfile::parse(content).unwrap_err();
        assert!(err.to_string().contains("no [stemcell]"));
    }

    #[test]
    fn test_duplicate_release_rejected() {
        let content = r#"
[[release]]
name = "bpm"
version = "1.2.3"

[[release]]
name = "bpm"
version = "1.2.3"
"#;
        let err = Lockfile::parse(content).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[tokio::test]
    async fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Tilefile.lock");

        let err = Lockfile::load(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("Tilefile.lock"));
    }
}
