//! # knxha-adapter-knxproj
//!
//! Project archive adapter — reads a KNX `.knxproj` zip archive and turns it
//! into raw scan records.
//!
//! ## How it works
//!
//! Every `.xml` member is pre-scanned on a bounded prefix for project
//! markers; irrelevant members are skipped without decompressing the rest.
//! Relevant members are parsed with `quick-xml` into an element tree and
//! walked once with an explicit ancestor stack. A member that fails to parse
//! is recovered with a regex pass that only yields group addresses.
//!
//! | Element kind | Local tag names |
//! |---|---|
//! | address | `GroupAddress` |
//! | address reference | `Send`, `Receive`, `GroupAddressRef` |
//! | communication object | `ComObjectInstanceRef`, `ComObjectRef`, `ComObject` |
//! | device | `DeviceInstance`, `Device` |
//! | channel | `ChannelInstance`, `Channel` |
//! | group range | `GroupRange` |
//! | project | `Project`, `ProjectInformation` |
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `knxha-app` and `knxha-domain`.

mod archive;
mod config;
mod error;
mod fallback;
mod records;
mod traversal;
mod xml_tree;

pub use config::ScannerConfig;
pub use error::{ArchiveError, DocumentError};

use knxha_app::ports::{ProgressSink, ProjectSource};
use knxha_domain::error::KnxHaError;
use knxha_domain::progress::{Phase, ProgressEvent, file_slot};
use knxha_domain::record::ProjectScan;

use crate::archive::{ProjectArchive, XmlMember};
use crate::traversal::Traversal;

/// What happened to one XML member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Document {
    Parsed,
    Recovered,
    Skipped,
}

/// [`ProjectSource`] reading `.knxproj` archives.
#[derive(Debug, Clone, Default)]
pub struct KnxprojSource {
    config: ScannerConfig,
}

impl KnxprojSource {
    #[must_use]
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }
}

/// Read, decode and walk one member, folding its records into `scan`.
fn scan_member(
    archive: &mut ProjectArchive<'_>,
    member: &XmlMember,
    scan: &mut ProjectScan,
) -> Result<Document, ArchiveError> {
    let Some(bytes) = archive.read_relevant(member)? else {
        tracing::debug!(member = %member.name, "member skipped by prescan");
        return Ok(Document::Skipped);
    };
    let text = String::from_utf8_lossy(&bytes);
    match xml_tree::parse(&text) {
        Ok(roots) => {
            Traversal::new(member.name.as_str(), scan).walk(&roots);
            Ok(Document::Parsed)
        }
        Err(err) => {
            tracing::warn!(
                member = %member.name,
                error = %err,
                "document recovered with regex fallback"
            );
            let (addresses, notes) = fallback::extract_addresses(&member.name, &text);
            scan.notes.push(format!(
                "{}: {err}; recovered {} group address(es) without links",
                member.name,
                addresses.len()
            ));
            scan.addresses.extend(addresses);
            scan.notes.extend(notes);
            Ok(Document::Recovered)
        }
    }
}

impl ProjectSource for KnxprojSource {
    #[tracing::instrument(skip_all, fields(bytes = archive.len()))]
    async fn scan(
        &self,
        archive: &[u8],
        progress: &impl ProgressSink,
    ) -> Result<ProjectScan, KnxHaError> {
        progress.report(ProgressEvent::new(Phase::Load, Phase::Load.at(0.0)));
        let mut archive = ProjectArchive::open(archive, &self.config)?;
        progress.report(ProgressEvent::new(Phase::Load, Phase::Load.at(1.0)));

        let members = archive.xml_members()?;
        let total = members.len();
        progress.report(
            ProgressEvent::new(Phase::Scan, Phase::Scan.at(1.0)).with_files(0, total),
        );
        tracing::info!(documents = total, "archive opened");

        let mut scan = ProjectScan {
            documents_total: total,
            ..ProjectScan::default()
        };
        for (position, member) in members.iter().enumerate() {
            progress.report(
                ProgressEvent::new(Phase::Extract, file_slot(Phase::Extract, position, total, 0.0))
                    .with_files(position, total)
                    .with_filename(member.name.as_str())
                    .with_file_percent(0.0),
            );

            let document = scan_member(&mut archive, member, &mut scan)?;
            match document {
                Document::Parsed => scan.documents_parsed += 1,
                Document::Recovered => scan.documents_recovered += 1,
                Document::Skipped => scan.documents_skipped += 1,
            }

            progress.report(
                ProgressEvent::new(Phase::Parse, file_slot(Phase::Parse, position, total, 1.0))
                    .with_files(position + 1, total)
                    .with_filename(member.name.as_str())
                    .with_file_percent(100.0)
                    .with_found(scan.addresses.len()),
            );

            if (position + 1) % self.config.yield_every.max(1) == 0 {
                tokio::task::yield_now().await;
            }
        }

        tracing::info!(
            parsed = scan.documents_parsed,
            recovered = scan.documents_recovered,
            skipped = scan.documents_skipped,
            addresses = scan.addresses.len(),
            links = scan.links.len(),
            "documents scanned"
        );
        Ok(scan)
    }
}
