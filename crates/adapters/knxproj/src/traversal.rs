//! Depth-first walk over one document's element tree.
//!
//! The walk keeps an explicit ancestor stack instead of recursing, so deep
//! project files cannot overflow the call stack, and context (device,
//! channel, communication object) for a reference is found by looking up
//! that stack.

use knxha_domain::flags::{ComObjectFlags, FlagValue, RawFlags};
use knxha_domain::record::{
    ComObjectContext, ContextRef, DeviceRecord, Link, ProjectScan, RangeRecord, Role,
};

use crate::records::raw_address;
use crate::xml_tree::Element;

const ADDRESS: &[&str] = &["GroupAddress"];
const ADDRESS_REFERENCE: &[&str] = &["Send", "Receive", "GroupAddressRef"];
const COM_OBJECT: &[&str] = &["ComObjectInstanceRef", "ComObjectRef", "ComObject"];
const DEVICE: &[&str] = &["DeviceInstance", "Device"];
const CHANNEL: &[&str] = &["ChannelInstance", "Channel"];
const GROUP_RANGE: &[&str] = &["GroupRange"];
const PROJECT: &[&str] = &["Project", "ProjectInformation"];

const REFERENCE_TARGET: &[&str] = &["GroupAddressRefId", "RefId", "Ref", "GroupAddressId"];
const BREADCRUMB_DEPTH: usize = 3;

/// Collects the records of one member into the shared scan.
pub struct Traversal<'s> {
    member: String,
    scan: &'s mut ProjectScan,
    ordinal: usize,
}

impl<'s> Traversal<'s> {
    pub fn new(member: impl Into<String>, scan: &'s mut ProjectScan) -> Self {
        Self {
            member: member.into(),
            scan,
            ordinal: 0,
        }
    }

    /// Walk every top-level element in document order.
    pub fn walk(&mut self, roots: &[Element]) {
        for root in roots {
            self.walk_one(root);
        }
    }

    fn walk_one<'e>(&mut self, root: &'e Element) {
        let mut ancestors: Vec<&'e Element> = Vec::new();
        let mut pending: Vec<(usize, &'e Element)> = vec![(0, root)];
        while let Some((depth, element)) = pending.pop() {
            ancestors.truncate(depth);
            if self.visit(element, &ancestors) {
                ancestors.push(element);
                pending.extend(element.children.iter().rev().map(|c| (depth + 1, c)));
            }
        }
    }

    /// Record `element`; returns whether to descend into its children.
    fn visit(&mut self, element: &Element, ancestors: &[&Element]) -> bool {
        if element.is(ADDRESS) {
            let ordinal = self.ordinal;
            self.ordinal += 1;
            match raw_address(&element.attributes, &element.text, &self.member, ordinal) {
                Ok(address) => self.scan.addresses.push(address),
                Err(note) => {
                    tracing::debug!(%note, "group address skipped");
                    self.scan.notes.push(note);
                }
            }
            return false;
        }
        if element.is(ADDRESS_REFERENCE) {
            if let Some(link) = link(element, ancestors) {
                self.scan.links.push(link);
            }
            return false;
        }
        if element.is(DEVICE) {
            let ContextRef { id, name } = context(element);
            self.scan.devices.push(DeviceRecord {
                id,
                name,
                individual_address: element
                    .attributes
                    .first(&["IndividualAddress", "Address"])
                    .map(str::to_string),
                product_ref: element
                    .attributes
                    .get("ProductRefId")
                    .map(str::to_string),
            });
        } else if element.is(GROUP_RANGE) {
            self.group_range(element, ancestors);
        } else if element.is(PROJECT)
            && self.scan.project_name.is_none()
            && let Some(name) = element.attributes.get("Name")
        {
            self.scan.project_name = Some(name.to_string());
        }
        true
    }

    fn group_range(&mut self, element: &Element, ancestors: &[&Element]) {
        let bound = |name: &str| {
            element
                .attributes
                .get(name)
                .and_then(|v| v.parse::<u16>().ok())
        };
        let (Some(start), Some(end)) = (bound("RangeStart"), bound("RangeEnd")) else {
            self.scan.notes.push(format!(
                "{}: group range {:?} has no usable bounds",
                self.member,
                element.attributes.get("Name").unwrap_or_default()
            ));
            return;
        };
        self.scan.ranges.push(RangeRecord {
            id: element.attributes.get("Id").map(str::to_string),
            name: element
                .attributes
                .get("Name")
                .unwrap_or_default()
                .to_string(),
            start,
            end,
            level: ancestors.iter().filter(|a| a.is(GROUP_RANGE)).count(),
        });
    }
}

fn context(element: &Element) -> ContextRef {
    let attributes = &element.attributes;
    let id = attributes.first(&["Id", "RefId"]).unwrap_or_default();
    ContextRef {
        id: id.to_string(),
        name: attributes
            .first(&["Name", "Text", "FunctionText"])
            .unwrap_or(id)
            .to_string(),
    }
}

fn flags(element: &Element) -> ComObjectFlags {
    let raw: RawFlags = element
        .attributes
        .iter()
        .filter(|(name, _)| name.ends_with("Flag"))
        .map(|(name, value)| (name.to_string(), FlagValue::from_attribute(value)))
        .collect();
    ComObjectFlags::from_raw(&raw)
}

fn com_object(element: &Element) -> ComObjectContext {
    let ContextRef { id, name } = context(element);
    ComObjectContext {
        id,
        name,
        dpt: element
            .attributes
            .first(&["DatapointType", "DPT"])
            .map(str::to_string),
        flags: flags(element),
    }
}

/// Names of the last named ancestors, outermost first.
fn breadcrumb(ancestors: &[&Element]) -> String {
    let mut names: Vec<&str> = ancestors
        .iter()
        .rev()
        .filter_map(|a| a.attributes.get("Name"))
        .take(BREADCRUMB_DEPTH)
        .collect();
    names.reverse();
    names.join(" > ")
}

fn link(element: &Element, ancestors: &[&Element]) -> Option<Link> {
    let address_id = element.attributes.first(REFERENCE_TARGET)?.to_string();
    let nearest = |kind: &[&str]| ancestors.iter().rev().find(|a| a.is(kind)).copied();
    Some(Link {
        address_id,
        role: element
            .attributes
            .get("Role")
            .and_then(|role| role.parse().ok())
            .unwrap_or(Role::Unknown),
        primary: element.is(&["Send"]),
        breadcrumb: breadcrumb(ancestors),
        device: nearest(DEVICE).map(context),
        channel: nearest(CHANNEL).map(context),
        com_object: nearest(COM_OBJECT).map(com_object),
    })
}
