//! Catalog assembly — raw scan records into a deduplicated, indexed catalog.
//!
//! The assembler is the only place where records from different documents
//! meet: addresses come from the project file, links from device files, and
//! group ranges from wherever the export put them. Everything downstream
//! works on the resulting [`Catalog`].

use std::collections::{BTreeMap, HashMap, HashSet};

use knxha_domain::address::GroupAddress;
use knxha_domain::catalog::{
    AddressTree, Catalog, CatalogIndexes, CatalogStats, Channel, ComObject, Device, DeviceSummary,
    MainGroup, MiddleGroup, RoleBinding,
};
use knxha_domain::dpt::{Dpt, DptNormalizer};
use knxha_domain::flags::ComObjectFlags;
use knxha_domain::record::{DeviceRecord, Link, ProjectScan, RangeRecord, RawAddress, Role};
use knxha_domain::report::{
    DptConflict, DuplicateRoleBinding, ParseReport, SecureSummary, UnresolvedRole,
};

/// Id of the synthetic device holding com objects found outside any device.
pub const UNASSIGNED_DEVICE: &str = "unassigned";
/// Id of the synthetic channel holding com objects found outside any channel.
pub const DEFAULT_CHANNEL: &str = "default";

/// Result of one assembly pass.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub catalog: Catalog,
    pub report: ParseReport,
}

/// Builds a [`Catalog`] and its [`ParseReport`] from a [`ProjectScan`].
pub struct CatalogAssembler<'a> {
    dpts: &'a DptNormalizer,
}

impl<'a> CatalogAssembler<'a> {
    #[must_use]
    pub fn new(dpts: &'a DptNormalizer) -> Self {
        Self { dpts }
    }

    /// Assemble the catalog.
    ///
    /// Addresses are deduplicated by id (the last record wins) and sorted by
    /// group address. Links whose target cannot be resolved are dropped and
    /// noted in the report.
    #[tracing::instrument(skip_all, fields(addresses = scan.addresses.len(), links = scan.links.len()))]
    #[must_use]
    pub fn assemble(&self, scan: ProjectScan) -> Assembly {
        let mut report = ParseReport {
            notes: scan.notes,
            ..ParseReport::default()
        };

        let addresses = self.dedup_addresses(scan.addresses);
        let links = resolve_links(&addresses, scan.links, &mut report);
        let tree = build_tree(&addresses, &scan.ranges);

        let mut builder = DeviceTree::default();
        for record in scan.devices {
            builder.seed(record);
        }
        for link in &links {
            builder.bind(link, self.dpts, &mut report);
        }
        let devices = builder.finish(&mut report);

        report.dpt_conflicts = self.dpt_conflicts(&addresses, &devices);
        report.missing_dpts = addresses
            .iter()
            .filter(|a| a.dpt.as_deref().and_then(|d| self.dpts.dpt(d)).is_none())
            .map(|a| a.id.clone())
            .collect();

        let stats = self.stats(&addresses, &devices, links.len());
        report.secure = SecureSummary::from_count(stats.secure_addresses);
        let indexes = build_indexes(&addresses, &devices);

        tracing::info!(
            addresses = addresses.len(),
            devices = devices.len(),
            com_objects = stats.total_com_objects,
            links = links.len(),
            "catalog assembled"
        );

        Assembly {
            catalog: Catalog {
                project_name: scan.project_name,
                addresses,
                links,
                devices,
                tree,
                indexes,
                stats,
            },
            report,
        }
    }

    fn dedup_addresses(&self, raw: Vec<RawAddress>) -> Vec<RawAddress> {
        let mut by_id: HashMap<String, RawAddress> = HashMap::with_capacity(raw.len());
        for mut address in raw {
            address.dpt = address
                .dpt
                .filter(|dpt| !dpt.trim().is_empty())
                .map(|dpt| self.dpts.normalize(&dpt).unwrap_or(dpt));
            by_id.insert(address.id.clone(), address);
        }
        let mut addresses: Vec<RawAddress> = by_id.into_values().collect();
        addresses.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.id.cmp(&b.id)));
        addresses
    }

    fn dpt_conflicts(&self, addresses: &[RawAddress], devices: &[Device]) -> Vec<DptConflict> {
        let by_id: HashMap<&str, &RawAddress> =
            addresses.iter().map(|a| (a.id.as_str(), a)).collect();
        let mut seen = HashSet::new();
        let mut conflicts = Vec::new();
        for object in devices.iter().flat_map(Device::com_objects) {
            let Some(object_dpt) = object.dpt.as_deref().and_then(|d| self.dpts.dpt(d)) else {
                continue;
            };
            for address_id in object.address_ids() {
                let Some(address) = by_id.get(address_id) else {
                    continue;
                };
                let Some(address_dpt) = address.dpt.as_deref().and_then(|d| self.dpts.dpt(d))
                else {
                    continue;
                };
                if !dpts_disagree(address_dpt, object_dpt) {
                    continue;
                }
                if seen.insert((address_id.to_string(), object.id.clone())) {
                    conflicts.push(DptConflict {
                        address_id: address_id.to_string(),
                        address: address.address.to_string(),
                        address_dpt: address_dpt.dot(),
                        com_object: object.id.clone(),
                        com_object_dpt: object_dpt.dot(),
                    });
                }
            }
        }
        conflicts
    }

    fn stats(&self, addresses: &[RawAddress], devices: &[Device], links: usize) -> CatalogStats {
        let mut dpt_usage = BTreeMap::new();
        for dpt in addresses
            .iter()
            .filter_map(|a| a.dpt.as_deref().and_then(|d| self.dpts.normalize(d)))
        {
            *dpt_usage.entry(dpt).or_insert(0) += 1;
        }
        let secure_addresses = addresses.iter().filter(|a| a.is_secure()).count();
        CatalogStats {
            total_addresses: addresses.len(),
            total_devices: devices.len(),
            total_com_objects: devices.iter().map(|d| d.com_objects().count()).sum(),
            total_links: links,
            dpt_usage,
            secure: secure_addresses > 0,
            secure_addresses,
        }
    }
}

/// A bare major (`x.000`) agrees with every subtype of the same major.
fn dpts_disagree(address: Dpt, object: Dpt) -> bool {
    if address.main != object.main {
        return true;
    }
    address.sub != 0 && object.sub != 0 && address.sub != object.sub
}

fn id_suffix(id: &str) -> &str {
    id.rsplit_once('_').map_or(id, |(_, suffix)| suffix)
}

/// Rewrite link targets to catalog address ids: exact id first, else the
/// part after the last `_` when exactly one address carries that suffix.
fn resolve_links(
    addresses: &[RawAddress],
    links: Vec<Link>,
    report: &mut ParseReport,
) -> Vec<Link> {
    let exact: HashSet<&str> = addresses.iter().map(|a| a.id.as_str()).collect();
    // `None` marks a suffix shared by several addresses
    let mut by_suffix: HashMap<&str, Option<&str>> = HashMap::new();
    for address in addresses {
        by_suffix
            .entry(id_suffix(&address.id))
            .and_modify(|id| *id = None)
            .or_insert(Some(address.id.as_str()));
    }

    let mut unresolved = HashSet::new();
    let mut resolved = Vec::with_capacity(links.len());
    for mut link in links {
        let target = if exact.contains(link.address_id.as_str()) {
            Ok(link.address_id.clone())
        } else {
            match by_suffix.get(id_suffix(&link.address_id)) {
                Some(Some(id)) => Ok((*id).to_string()),
                Some(None) => Err("ambiguous reference to address"),
                None => Err("reference to unknown address"),
            }
        };
        match target {
            Ok(id) => {
                link.address_id = id;
                resolved.push(link);
            }
            Err(reason) => {
                if unresolved.insert(link.address_id.clone()) {
                    tracing::debug!(target = %link.address_id, reason, "dropping link");
                    report.notes.push(format!("{reason} {}", link.address_id));
                }
            }
        }
    }
    resolved
}

fn build_tree(addresses: &[RawAddress], ranges: &[RangeRecord]) -> AddressTree {
    let mut main_names: HashMap<u8, String> = HashMap::new();
    let mut middle_names: HashMap<(u8, u8), String> = HashMap::new();
    for range in ranges.iter().filter(|r| !r.name.trim().is_empty()) {
        let start = GroupAddress::from_packed(range.start);
        match range.level {
            0 => {
                main_names
                    .entry(start.main())
                    .or_insert_with(|| range.name.clone());
            }
            1 => {
                middle_names
                    .entry((start.main(), start.middle()))
                    .or_insert_with(|| range.name.clone());
            }
            _ => {}
        }
    }

    let mut grouped: BTreeMap<u8, BTreeMap<u8, Vec<String>>> = BTreeMap::new();
    for address in addresses {
        grouped
            .entry(address.address.main())
            .or_default()
            .entry(address.address.middle())
            .or_default()
            .push(address.id.clone());
    }

    AddressTree {
        mains: grouped
            .into_iter()
            .map(|(main, middles)| MainGroup {
                main,
                name: main_names.remove(&main),
                middles: middles
                    .into_iter()
                    .map(|(middle, addresses)| MiddleGroup {
                        middle,
                        name: middle_names.remove(&(main, middle)),
                        addresses,
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn build_indexes(addresses: &[RawAddress], devices: &[Device]) -> CatalogIndexes {
    let mut com_objects = BTreeMap::new();
    for object in devices.iter().flat_map(Device::com_objects) {
        com_objects
            .entry(object.id.clone())
            .or_insert_with(|| object.clone());
    }
    CatalogIndexes {
        addresses: addresses
            .iter()
            .map(|a| (a.id.clone(), a.clone()))
            .collect(),
        com_objects,
        devices: devices
            .iter()
            .map(|d| {
                (
                    d.id.clone(),
                    DeviceSummary {
                        id: d.id.clone(),
                        name: d.name.clone(),
                        individual_address: d.individual_address.clone(),
                        channels: d.channels.len(),
                        com_objects: d.com_objects().count(),
                    },
                )
            })
            .collect(),
    }
}

struct ObjectDraft {
    object: ComObject,
    /// Address id of the first primary (`Send`) reference.
    primary: Option<String>,
}

struct ChannelDraft {
    id: String,
    name: String,
    objects: Vec<ObjectDraft>,
    index: HashMap<String, usize>,
}

struct DeviceDraft {
    record: DeviceRecord,
    channels: Vec<ChannelDraft>,
    index: HashMap<String, usize>,
}

impl DeviceDraft {
    fn channel(&mut self, id: &str, name: &str) -> &mut ChannelDraft {
        let position = match self.index.get(id) {
            Some(position) => *position,
            None => {
                self.channels.push(ChannelDraft {
                    id: id.to_string(),
                    name: name.to_string(),
                    objects: Vec::new(),
                    index: HashMap::new(),
                });
                self.index.insert(id.to_string(), self.channels.len() - 1);
                self.channels.len() - 1
            }
        };
        &mut self.channels[position]
    }
}

impl ChannelDraft {
    fn object(
        &mut self,
        id: &str,
        name: &str,
        dpt: Option<String>,
        flags: &ComObjectFlags,
    ) -> &mut ObjectDraft {
        let position = match self.index.get(id) {
            Some(position) => *position,
            None => {
                self.objects.push(ObjectDraft {
                    object: ComObject {
                        id: id.to_string(),
                        name: name.to_string(),
                        dpt,
                        flags: flags.clone(),
                        bindings: Vec::new(),
                    },
                    primary: None,
                });
                self.index.insert(id.to_string(), self.objects.len() - 1);
                self.objects.len() - 1
            }
        };
        &mut self.objects[position]
    }
}

/// Devices → channels → com objects, in first-seen order.
#[derive(Default)]
struct DeviceTree {
    devices: Vec<DeviceDraft>,
    index: HashMap<String, usize>,
}

impl DeviceTree {
    fn seed(&mut self, record: DeviceRecord) {
        if self.index.contains_key(&record.id) {
            return;
        }
        self.index.insert(record.id.clone(), self.devices.len());
        self.devices.push(DeviceDraft {
            record,
            channels: Vec::new(),
            index: HashMap::new(),
        });
    }

    fn device(&mut self, id: &str, name: &str) -> &mut DeviceDraft {
        if !self.index.contains_key(id) {
            self.seed(DeviceRecord {
                id: id.to_string(),
                name: name.to_string(),
                individual_address: None,
                product_ref: None,
            });
        }
        let position = self.index[id];
        &mut self.devices[position]
    }

    fn bind(&mut self, link: &Link, dpts: &DptNormalizer, report: &mut ParseReport) {
        let Some(context) = &link.com_object else {
            return;
        };
        let (device_id, device_name) = link
            .device
            .as_ref()
            .map_or((UNASSIGNED_DEVICE, "Unassigned"), |d| {
                (d.id.as_str(), d.name.as_str())
            });
        let (channel_id, channel_name) = link
            .channel
            .as_ref()
            .map_or((DEFAULT_CHANNEL, "Default"), |c| (c.id.as_str(), c.name.as_str()));
        let dpt = context.dpt.as_deref().and_then(|d| dpts.normalize(d));

        let draft = self.device(device_id, device_name).channel(channel_id, channel_name).object(
            &context.id,
            &context.name,
            dpt,
            &context.flags,
        );

        if link.primary && draft.primary.is_none() {
            draft.primary = Some(link.address_id.clone());
        }
        match draft
            .object
            .bindings
            .iter()
            .find(|b| b.address_id == link.address_id)
        {
            Some(existing) if existing.role != link.role => {
                report.duplicate_role_bindings.push(DuplicateRoleBinding {
                    address_id: link.address_id.clone(),
                    com_object: context.id.clone(),
                    kept: existing.role,
                    dropped: link.role,
                });
            }
            Some(_) => {}
            None => draft.object.bindings.push(RoleBinding {
                role: link.role,
                address_id: link.address_id.clone(),
                inferred: false,
            }),
        }
    }

    fn finish(self, report: &mut ParseReport) -> Vec<Device> {
        self.devices
            .into_iter()
            .map(|device| Device {
                id: device.record.id,
                name: device.record.name,
                individual_address: device.record.individual_address,
                product_ref: device.record.product_ref,
                channels: device
                    .channels
                    .into_iter()
                    .map(|channel| Channel {
                        id: channel.id,
                        name: channel.name,
                        com_objects: channel
                            .objects
                            .into_iter()
                            .map(|mut draft| {
                                infer_roles(&mut draft.object, draft.primary.as_deref());
                                report.unresolved_roles.extend(
                                    draft
                                        .object
                                        .bindings
                                        .iter()
                                        .filter(|b| b.role == Role::Unknown)
                                        .map(|b| UnresolvedRole {
                                            com_object: draft.object.id.clone(),
                                            address_id: b.address_id.clone(),
                                        }),
                                );
                                draft.object
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Derive roles from flags for a com object that declares none.
///
/// The primary unknown binding (else the only one) becomes `write` when the
/// write flag is set, `state` when only a reporting flag is. With a write
/// flag and a reporting flag, the next unknown binding becomes `state`.
fn infer_roles(object: &mut ComObject, primary: Option<&str>) {
    if object.bindings.iter().any(|b| b.role != Role::Unknown) {
        return;
    }
    let unknown: Vec<usize> = (0..object.bindings.len()).collect();
    let chosen = primary
        .and_then(|p| {
            unknown
                .iter()
                .copied()
                .find(|i| object.bindings[*i].address_id == p)
        })
        .or_else(|| (unknown.len() == 1).then_some(0));
    let Some(chosen) = chosen else {
        return;
    };

    let writes = object.flags.write;
    let reports = object.flags.reports_state();
    let mut assign = |index: usize, role: Role| {
        let binding = &mut object.bindings[index];
        binding.role = role;
        binding.inferred = true;
    };
    if writes {
        assign(chosen, Role::Write);
        if reports && let Some(next) = unknown.iter().copied().find(|i| *i != chosen) {
            assign(next, Role::State);
        }
    } else if reports {
        assign(chosen, Role::State);
    }
}
