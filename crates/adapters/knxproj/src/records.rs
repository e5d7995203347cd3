//! Record construction shared by the tree traversal and the regex fallback.

use knxha_domain::address::GroupAddress;
use knxha_domain::record::RawAddress;

use crate::xml_tree::Attributes;

/// Derive the group address from an element's attributes.
///
/// Tries a slash-form `Address`, then a packed integer `Address`, then
/// separate `Main`/`Middle`/`Sub` attributes.
fn group_address(attributes: &Attributes) -> Option<GroupAddress> {
    if let Some(address) = attributes.get("Address") {
        if address.contains('/') {
            return address.parse().ok();
        }
        if let Ok(packed) = address.parse::<u16>() {
            return Some(GroupAddress::from_packed(packed));
        }
    }
    let part = |name: &str| attributes.get(name).and_then(|v| v.parse::<u32>().ok());
    GroupAddress::new(part("Main")?, part("Middle")?, part("Sub")?).ok()
}

/// Build one raw address from a `GroupAddress` element.
///
/// `ordinal` counts address tags in the member from 0 and is only used for
/// the id fallback. On failure the returned string is the note to record.
pub fn raw_address(
    attributes: &Attributes,
    text: &str,
    member: &str,
    ordinal: usize,
) -> Result<RawAddress, String> {
    let id = attributes
        .get("Id")
        .map_or_else(|| format!("{member}#{ordinal}"), str::to_string);
    let Some(address) = group_address(attributes) else {
        return Err(format!("{member}: group address {id} has no usable address"));
    };
    let text = text.trim();
    let name = attributes
        .first(&["Name", "Text"])
        .or((!text.is_empty()).then_some(text))
        .or_else(|| attributes.get("Description"))
        .unwrap_or("Unknown")
        .to_string();
    Ok(RawAddress {
        id,
        name,
        address,
        dpt: attributes.first(&["DatapointType", "DPT"]).map(str::to_string),
        description: attributes.get("Description").map(str::to_string),
        security: attributes.first(&["Security", "Key"]).map(str::to_string),
    })
}
