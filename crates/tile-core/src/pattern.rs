//! Release naming patterns.
//!
//! Each bucket names its release tarballs differently, so the identity of a
//! key is extracted with a configured regular expression and its named
//! capture groups. Patterns are validated when they are compiled, so a
//! misconfigured group is reported even if the bucket turns out to be empty.

use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;
use tile_schema::{ReleaseId, Stemcell};

pub const RELEASE_NAME: &str = "release_name";
pub const RELEASE_VERSION: &str = "release_version";
pub const STEMCELL_OS: &str = "stemcell_os";
pub const STEMCELL_VERSION: &str = "stemcell_version";

/// Which kind of artifact a repository holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Releases compiled against a specific stemcell.
    Compiled,
    /// Stemcell-independent releases.
    Built,
}

impl ArtifactKind {
    /// Capture groups a pattern must declare for this kind.
    pub fn required_groups(self) -> &'static [&'static str] {
        match self {
            Self::Compiled => &[RELEASE_NAME, RELEASE_VERSION, STEMCELL_OS, STEMCELL_VERSION],
            Self::Built => &[RELEASE_NAME, RELEASE_VERSION],
        }
    }
}

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid release pattern `{pattern}`: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("missing required capture group `{group}` in release pattern `{pattern}`")]
    MissingCaptureGroup { group: &'static str, pattern: String },
}

/// Identity extracted from a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: ReleaseId,
    /// Present only for compiled patterns.
    pub stemcell: Option<Stemcell>,
}

/// A validated naming pattern for one artifact kind.
#[derive(Debug, Clone)]
pub struct ReleasePattern {
    regex: Regex,
    kind: ArtifactKind,
}

impl ReleasePattern {
    /// Compile `pattern` and check it declares every group `kind` needs.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Invalid`] if the expression does not compile and
    /// [`PatternError::MissingCaptureGroup`] for the first absent group.
    pub fn new(pattern: &str, kind: ArtifactKind) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;

        let declared: HashSet<&str> = regex.capture_names().flatten().collect();
        if let Some(group) = kind
            .required_groups()
            .iter()
            .copied()
            .find(|group| !declared.contains(group))
        {
            return Err(PatternError::MissingCaptureGroup {
                group,
                pattern: pattern.to_string(),
            });
        }

        Ok(Self { regex, kind })
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Extract a candidate from `key`, or `None` if the key is unrelated.
    ///
    /// For compiled patterns a key whose stemcell groups did not take part
    /// in the match is treated as unrelated.
    pub fn extract(&self, key: &str) -> Option<Candidate> {
        let caps = self.regex.captures(key)?;
        let group = |name: &str| caps.name(name).map(|m| m.as_str());

        let id = ReleaseId::new(group(RELEASE_NAME)?, group(RELEASE_VERSION)?);
        let stemcell = match self.kind {
            ArtifactKind::Compiled => Some(Stemcell::new(
                group(STEMCELL_OS)?,
                group(STEMCELL_VERSION)?,
            )),
            ArtifactKind::Built => None,
        };

        Some(Candidate { id, stemcell })
    }
}
