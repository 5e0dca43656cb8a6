//! Release tarballs already present in the releases directory.
//!
//! Identity is read from the `release.MF` manifest inside each tarball, not
//! from the filename, so renamed or hand-copied tarballs are still recognised.
//! Every archive is read to its end, so a tarball cut short by an interrupted
//! transfer is reported as damaged instead of being mistaken for a release.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tile_schema::{RELEASE_TARBALL_EXT, ReleaseId, ReleaseRequirement, Stemcell};

/// A release tarball found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRelease {
    pub id: ReleaseId,
    /// Set when the tarball holds packages compiled against a stemcell.
    pub stemcell: Option<Stemcell>,
    pub path: PathBuf,
}

impl LocalRelease {
    /// Whether this tarball can stand in for a desired release.
    ///
    /// Ids must match, and a compiled tarball must target exactly the
    /// required stemcell.
    pub fn satisfies(&self, desired: &ReleaseRequirement) -> bool {
        if !desired.contains(&self.id) {
            return false;
        }
        match (&self.stemcell, desired.constraint(&self.id)) {
            (Some(local), Some(required)) => local == required,
            _ => true,
        }
    }
}

/// Contents of the releases directory.
#[derive(Debug, Default)]
pub struct Scan {
    /// Complete tarballs, sorted by path.
    pub releases: Vec<LocalRelease>,
    /// Tarballs that end early or fail to decompress, sorted by path.
    pub damaged: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ReleaseManifest {
    name: String,
    version: String,
    #[serde(default)]
    compiled_packages: Vec<CompiledPackage>,
}

#[derive(Debug, Deserialize)]
struct CompiledPackage {
    stemcell: String,
}

/// Scan `dir` for release tarballs.
///
/// A missing directory yields an empty scan. Files that are not tarballs are
/// ignored; complete tarballs without a readable manifest are an error.
pub async fn scan(dir: &Path) -> Result<Scan> {
    let mut scan = Scan::default();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(scan),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RELEASE_TARBALL_EXT) {
            continue;
        }

        let tarball = path.clone();
        match tokio::task::spawn_blocking(move || read_release(&tarball))
            .await
            .context("Release scan task panicked")??
        {
            Some(release) => {
                tracing::debug!("Found local release {} at {}", release.id, path.display());
                scan.releases.push(release);
            }
            None => scan.damaged.push(path),
        }
    }

    scan.releases.sort_by(|a, b| a.path.cmp(&b.path));
    scan.damaged.sort();
    Ok(scan)
}

/// Remove the given files from disk.
pub async fn delete<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<()> {
    for path in paths {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// `Ok(None)` when the archive itself is unreadable.
fn read_release(path: &Path) -> Result<Option<LocalRelease>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let manifest = match read_manifest(file) {
        Ok(Some(manifest)) => manifest,
        Ok(None) => anyhow::bail!("No release.MF found in {}", path.display()),
        Err(e) => {
            tracing::warn!("{} is damaged: {e}", path.display());
            return Ok(None);
        }
    };

    let manifest: ReleaseManifest = serde_yaml::from_slice(&manifest)
        .with_context(|| format!("Invalid release.MF in {}", path.display()))?;

    let stemcell = manifest
        .compiled_packages
        .first()
        .map(|p| p.stemcell.parse::<Stemcell>())
        .transpose()
        .with_context(|| format!("Invalid stemcell in {}", path.display()))?;

    Ok(Some(LocalRelease {
        id: ReleaseId::new(manifest.name, manifest.version),
        stemcell,
        path: path.to_path_buf(),
    }))
}

/// Read the whole archive and return the body of its `release.MF`, if any.
///
/// Fails when an entry holds fewer bytes than its header declares or the
/// gzip stream does not end with a valid trailer.
fn read_manifest(file: std::fs::File) -> io::Result<Option<Vec<u8>>> {
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut manifest = None;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let size = entry.size();
        let is_manifest = {
            let entry_path = entry.path()?;
            entry_path == Path::new("release.MF") || entry_path == Path::new("./release.MF")
        };

        let read = if is_manifest && manifest.is_none() {
            let mut body = Vec::new();
            let read = entry.read_to_end(&mut body)? as u64;
            manifest = Some(body);
            read
        } else {
            io::copy(&mut entry, &mut io::sink())?
        };
        if read != size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("entry ends after {read} of {size} bytes"),
            ));
        }
    }

    // Drain trailing padding so the gzip checksum is verified.
    io::copy(&mut archive.into_inner(), &mut io::sink())?;
    Ok(manifest)
}
