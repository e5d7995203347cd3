//! Regex extraction for documents the XML parser rejects.
//!
//! Only `GroupAddress` tags are recovered; links and topology are lost for
//! that document.

use std::sync::LazyLock;

use knxha_domain::record::RawAddress;
use regex::Regex;

use crate::records::raw_address;
use crate::xml_tree::Attributes;

static ADDRESS_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:[a-z_][\w.-]*:)?GroupAddress\b([^>]*)>")
        .expect("address tag pattern is a valid regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:[a-zA-Z_][\w.-]*:)?([a-zA-Z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern is a valid regex")
});

fn attributes(raw: &str) -> Attributes {
    let mut attributes = Attributes::default();
    for capture in ATTRIBUTE.captures_iter(raw) {
        let (Some(name), Some(value)) = (capture.get(1), capture.get(2).or_else(|| capture.get(3)))
        else {
            continue;
        };
        let value = quick_xml::escape::unescape(value.as_str())
            .map_or_else(|_| value.as_str().to_string(), |v| v.into_owned());
        attributes.push(name.as_str(), value);
    }
    attributes
}

/// Pull every group address out of raw document text.
///
/// Returns the addresses found and a note for each tag that had no usable
/// address.
#[must_use]
pub fn extract_addresses(member: &str, text: &str) -> (Vec<RawAddress>, Vec<String>) {
    let mut addresses = Vec::new();
    let mut notes = Vec::new();
    for (ordinal, capture) in ADDRESS_TAG.captures_iter(text).enumerate() {
        let raw = capture.get(1).map_or("", |m| m.as_str());
        match raw_address(&attributes(raw), "", member, ordinal) {
            Ok(address) => addresses.push(address),
            Err(note) => notes.push(note),
        }
    }
    (addresses, notes)
}
