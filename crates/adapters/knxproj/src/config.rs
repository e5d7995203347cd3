//! Scanner configuration.

use serde::Deserialize;

/// Limits and pacing for one archive scan.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// How many leading bytes of a member are checked for relevance
    /// markers before the member is fully read.
    pub prescan_bytes: usize,
    /// Yield to the runtime after this many documents.
    pub yield_every: usize,
    /// Maximum number of entries in the archive.
    pub max_entries: usize,
    /// Maximum uncompressed size of a single member, in bytes.
    pub max_member_bytes: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            prescan_bytes: 8 * 1024,
            yield_every: 8,
            max_entries: 10_000,
            max_member_bytes: 100 * 1024 * 1024,
        }
    }
}
