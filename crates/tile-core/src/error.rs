use crate::io::TransportError;
use crate::pattern::PatternError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// A repository listing failed; the cause is passed through unchanged.
    #[error(transparent)]
    Listing(TransportError),

    #[error("failed to create {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to download file, {0}")]
    Transfer(TransportError),
}
