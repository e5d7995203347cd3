//! The rich project catalog: addresses, topology, devices and statistics.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::flags::ComObjectFlags;
use crate::record::{Link, RawAddress, Role};

/// One role binding from a communication object to an address id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub role: Role,
    pub address_id: String,
    /// The role was derived from flags rather than declared.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inferred: bool,
}

/// A communication object with its bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComObject {
    pub id: String,
    pub name: String,
    /// Normalized (dot form) declared datapoint type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpt: Option<String>,
    pub flags: ComObjectFlags,
    pub bindings: Vec<RoleBinding>,
}

impl ComObject {
    /// Address ids bound with the `write` role.
    pub fn write_ids(&self) -> impl Iterator<Item = &str> {
        self.ids_where(|role| role == Role::Write)
    }

    /// Address ids bound with a state-like role (`state`, `status`, `read`).
    pub fn state_ids(&self) -> impl Iterator<Item = &str> {
        self.ids_where(Role::is_state_like)
    }

    /// Address ids bound with the `listen` role.
    pub fn listen_ids(&self) -> impl Iterator<Item = &str> {
        self.ids_where(|role| role == Role::Listen)
    }

    /// Every bound address id, in binding order.
    pub fn address_ids(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.address_id.as_str())
    }

    fn ids_where(&self, keep: impl Fn(Role) -> bool) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(move |b| keep(b.role))
            .map(|b| b.address_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub com_objects: Vec<ComObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_ref: Option<String>,
    pub channels: Vec<Channel>,
}

impl Device {
    pub fn com_objects(&self) -> impl Iterator<Item = &ComObject> {
        self.channels.iter().flat_map(|c| c.com_objects.iter())
    }
}

/// A middle group and the ids of the addresses it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddleGroup {
    pub middle: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainGroup {
    pub main: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub middles: Vec<MiddleGroup>,
}

/// Main → middle → address hierarchy, numerically ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTree {
    pub mains: Vec<MainGroup>,
}

/// Flat view of a device for the id index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual_address: Option<String>,
    pub channels: usize,
    pub com_objects: usize,
}

/// Plain id → record lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIndexes {
    pub addresses: BTreeMap<String, RawAddress>,
    pub com_objects: BTreeMap<String, ComObject>,
    pub devices: BTreeMap<String, DeviceSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_addresses: usize,
    pub total_devices: usize,
    pub total_com_objects: usize,
    pub total_links: usize,
    /// Normalized dpt → number of addresses declaring it.
    pub dpt_usage: BTreeMap<String, usize>,
    pub secure: bool,
    pub secure_addresses: usize,
}

/// The assembled, deduplicated view of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Sorted by group address.
    pub addresses: Vec<RawAddress>,
    #[serde(default)]
    pub links: Vec<Link>,
    pub devices: Vec<Device>,
    pub tree: AddressTree,
    #[serde(default)]
    pub indexes: CatalogIndexes,
    pub stats: CatalogStats,
}

impl Catalog {
    /// Whether any communication object binds at least one address.
    #[must_use]
    pub fn has_bindings(&self) -> bool {
        self.devices
            .iter()
            .flat_map(Device::com_objects)
            .any(|co| !co.bindings.is_empty())
    }

    #[must_use]
    pub fn address(&self, id: &str) -> Option<&RawAddress> {
        self.indexes
            .addresses
            .get(id)
            .or_else(|| self.addresses.iter().find(|a| a.id == id))
    }

    /// Links grouped by target address id, in scan order.
    #[must_use]
    pub fn links_by_address(&self) -> HashMap<&str, Vec<&Link>> {
        let mut map: HashMap<&str, Vec<&Link>> = HashMap::new();
        for link in &self.links {
            map.entry(link.address_id.as_str()).or_default().push(link);
        }
        map
    }
}
