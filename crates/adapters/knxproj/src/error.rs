//! Archive adapter error types.

use knxha_domain::error::KnxHaError;

/// The archive as a whole cannot be read. Always fatal for the scan.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The buffer is not a zip archive.
    #[error("not a zip archive")]
    NotZip(#[source] zip::result::ZipError),

    #[error("archive has too many entries: {entries} (limit: {limit})")]
    TooManyEntries { entries: usize, limit: usize },

    #[error("member '{name}' is too large: {size} bytes (limit: {limit} bytes)")]
    MemberTooLarge { name: String, size: u64, limit: u64 },

    /// A member could not be decompressed.
    #[error("failed to read member '{name}'")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open member #{index}")]
    Entry {
        index: usize,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ArchiveError {
    /// Convert into a [`KnxHaError::Archive`] for propagation across the
    /// port boundary.
    pub fn into_domain(self) -> KnxHaError {
        KnxHaError::Archive(Box::new(self))
    }
}

impl From<ArchiveError> for KnxHaError {
    fn from(err: ArchiveError) -> Self {
        err.into_domain()
    }
}

/// One document could not be parsed as XML. Recovered from by the regex
/// fallback, never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed XML at byte {position}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}
