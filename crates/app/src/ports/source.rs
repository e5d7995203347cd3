//! Project source port — turns an archive into raw scan records.

use std::future::Future;

use knxha_domain::error::KnxHaError;
use knxha_domain::record::ProjectScan;

use super::ProgressSink;

/// A reader for project archives.
///
/// Implementations live in adapter crates (e.g. `adapter_knxproj`). They
/// report the `load`, `scan`, `extract` and `parse` phases through
/// `progress`; the caller owns `build` and `done`.
pub trait ProjectSource: Send + Sync {
    /// Scan `archive` and return every record found.
    ///
    /// Per-document problems are recovered from and recorded as notes in
    /// the returned scan.
    ///
    /// # Errors
    ///
    /// Returns [`KnxHaError::Archive`] when the archive as a whole cannot be
    /// read (not a zip, too many entries, oversized member).
    fn scan(
        &self,
        archive: &[u8],
        progress: &impl ProgressSink,
    ) -> impl Future<Output = Result<ProjectScan, KnxHaError>> + Send;
}
