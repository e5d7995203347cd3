//! Zip container access with entry and size limits.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::config::ScannerConfig;
use crate::error::ArchiveError;

/// Substrings that mark a document as worth parsing.
const MARKERS: &[&str] = &[
    "GroupAddress",
    "GroupAddressRefId",
    "ComObject",
    "DeviceInstance",
    "GroupRange",
    "ProjectInformation",
    "<Project",
];

/// An XML member of the archive, by position and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlMember {
    pub index: usize,
    pub name: String,
}

/// A project archive opened over an in-memory buffer.
pub struct ProjectArchive<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
    prescan_bytes: usize,
    max_member_bytes: u64,
}

impl<'a> ProjectArchive<'a> {
    /// Open `bytes` as a zip archive and check the entry limit.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotZip`] for anything that is not a zip
    /// archive and [`ArchiveError::TooManyEntries`] above the entry limit.
    pub fn open(bytes: &'a [u8], config: &ScannerConfig) -> Result<Self, ArchiveError> {
        let zip = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::NotZip)?;
        if zip.len() > config.max_entries {
            return Err(ArchiveError::TooManyEntries {
                entries: zip.len(),
                limit: config.max_entries,
            });
        }
        Ok(Self {
            zip,
            prescan_bytes: config.prescan_bytes,
            max_member_bytes: config.max_member_bytes,
        })
    }

    /// Members whose name ends in `.xml` (any case), in archive order.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Entry`] when an entry header is unreadable.
    pub fn xml_members(&mut self) -> Result<Vec<XmlMember>, ArchiveError> {
        let mut members = Vec::new();
        for index in 0..self.zip.len() {
            let entry = self
                .zip
                .by_index_raw(index)
                .map_err(|source| ArchiveError::Entry { index, source })?;
            if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".xml") {
                continue;
            }
            members.push(XmlMember {
                index,
                name: entry.name().to_string(),
            });
        }
        Ok(members)
    }

    /// Read a member if its leading bytes contain a relevance marker.
    ///
    /// Only the prefix is decompressed for irrelevant members; `None` means
    /// the member was skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MemberTooLarge`] when the member exceeds the
    /// size limit, or a read error when it cannot be decompressed.
    pub fn read_relevant(&mut self, member: &XmlMember) -> Result<Option<Vec<u8>>, ArchiveError> {
        let limit = self.max_member_bytes;
        let mut file = self
            .zip
            .by_index(member.index)
            .map_err(|source| ArchiveError::Entry {
                index: member.index,
                source,
            })?;
        if file.size() > limit {
            return Err(ArchiveError::MemberTooLarge {
                name: member.name.clone(),
                size: file.size(),
                limit,
            });
        }
        let read_error = |source| ArchiveError::Read {
            name: member.name.clone(),
            source,
        };

        let mut bytes = Vec::new();
        (&mut file)
            .take(self.prescan_bytes as u64)
            .read_to_end(&mut bytes)
            .map_err(read_error)?;
        if !is_relevant(&bytes) {
            return Ok(None);
        }

        // the declared size may lie, so cap the real read as well
        let remaining = (limit + 1).saturating_sub(bytes.len() as u64);
        file.take(remaining)
            .read_to_end(&mut bytes)
            .map_err(read_error)?;
        if bytes.len() as u64 > limit {
            return Err(ArchiveError::MemberTooLarge {
                name: member.name.clone(),
                size: bytes.len() as u64,
                limit,
            });
        }
        Ok(Some(bytes))
    }
}

/// Whether a document prefix mentions any project element.
#[must_use]
pub fn is_relevant(prefix: &[u8]) -> bool {
    let text = String::from_utf8_lossy(prefix);
    MARKERS.iter().any(|marker| text.contains(marker))
}
