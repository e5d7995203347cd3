//! Raw records produced by one scan of a project archive.
//!
//! These are created once per scan and never mutated afterwards; the catalog
//! assembler derives everything else from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::GroupAddress;
use crate::flags::ComObjectFlags;

/// One group address as declared in the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAddress {
    pub id: String,
    pub name: String,
    pub address: GroupAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
}

impl RawAddress {
    /// Whether the address carries a non-empty security attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.security
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }
}

/// How a communication object uses a group address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Write,
    State,
    Read,
    Status,
    Listen,
    #[default]
    Unknown,
}

impl Role {
    /// Roles that report the current value back.
    #[must_use]
    pub fn is_state_like(self) -> bool {
        matches!(self, Self::State | Self::Status | Self::Read)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Write => "write",
            Self::State => "state",
            Self::Read => "read",
            Self::Status => "status",
            Self::Listen => "listen",
            Self::Unknown => "unknown",
        })
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    /// Lenient: anything unrecognised is [`Role::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let role = match s.trim().to_ascii_lowercase().as_str() {
            "write" | "command" => Self::Write,
            "state" => Self::State,
            "read" => Self::Read,
            "status" | "feedback" => Self::Status,
            "listen" | "receive" => Self::Listen,
            _ => Self::Unknown,
        };
        Ok(role)
    }
}

/// Identity of an enclosing element (device, channel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRef {
    pub id: String,
    pub name: String,
}

/// The communication object that owns a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComObjectContext {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpt: Option<String>,
    pub flags: ComObjectFlags,
}

/// A reference from a communication object to a group address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub address_id: String,
    pub role: Role,
    /// Came from the sending connector, the object's first address.
    pub primary: bool,
    /// Up to three enclosing names, outermost first, joined by `" > "`.
    pub breadcrumb: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<ContextRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ContextRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub com_object: Option<ComObjectContext>,
}

/// A device instance seen during the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_ref: Option<String>,
}

/// A group range (main or middle group level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub start: u16,
    pub end: u16,
    /// 0 for a main group, 1 for a middle group.
    pub level: usize,
}

/// Everything one scan pass extracted from an archive.
#[derive(Debug, Clone, Default)]
pub struct ProjectScan {
    pub project_name: Option<String>,
    pub addresses: Vec<RawAddress>,
    pub links: Vec<Link>,
    pub devices: Vec<DeviceRecord>,
    pub ranges: Vec<RangeRecord>,
    /// Free-text notes about recovered or skipped documents.
    pub notes: Vec<String>,
    pub documents_total: usize,
    pub documents_parsed: usize,
    pub documents_skipped: usize,
    pub documents_recovered: usize,
}
