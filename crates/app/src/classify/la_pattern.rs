//! `LA<n>` naming convention: every function of one light shares the exact
//! same name and the middle group encodes the function.
//!
//! | dpt family | middle | field |
//! |---|---|---|
//! | boolean | 1 | on/off |
//! | boolean | 5 | on/off state |
//! | dimming | 2 | relative dimming |
//! | percent | 3 | brightness |
//! | percent | 4 | brightness state |

use std::collections::HashMap;

use knxha_domain::dpt::{Dpt, DptFamily};
use knxha_domain::entity::{EntityPayload, LightEntity, MappedEntity};
use knxha_domain::record::RawAddress;

use super::naming::is_la_name;
use super::{Strategy, StrategyContext, StrategyOutcome};

/// Strategies 2 and 4: group `LA<n>` addresses into lights.
///
/// The link-driven flavour adds the owning device/channel to the group key
/// and borrows the com-object dpt when an address declares none.
#[derive(Debug, Clone, Copy)]
pub struct LaPattern {
    link_driven: bool,
}

impl LaPattern {
    /// Group on the trimmed name alone.
    #[must_use]
    pub const fn by_name() -> Self {
        Self { link_driven: false }
    }

    /// Group on name plus the device/channel of the first link.
    #[must_use]
    pub const fn link_driven() -> Self {
        Self { link_driven: true }
    }

    fn family(&self, ctx: &StrategyContext<'_>, address: &RawAddress) -> Option<DptFamily> {
        ctx.family(address).or_else(|| {
            if !self.link_driven {
                return None;
            }
            ctx.links_for(&address.id)
                .iter()
                .find_map(|link| link.com_object.as_ref()?.dpt.as_deref())
                .and_then(|raw| ctx.dpts.dpt(raw))
                .map(Dpt::family)
        })
    }

    fn group_key(&self, ctx: &StrategyContext<'_>, address: &RawAddress) -> String {
        let name = address.name.trim().to_string();
        if !self.link_driven {
            return name;
        }
        format!("{name}\u{1f}{}", disambiguator(ctx, address))
    }
}

/// Device and channel names of the first link, else its breadcrumb without
/// the last segment.
fn disambiguator(ctx: &StrategyContext<'_>, address: &RawAddress) -> String {
    let Some(link) = ctx.links_for(&address.id).first() else {
        return String::new();
    };
    let names: Vec<&str> = [
        link.device.as_ref().map(|d| d.name.as_str()),
        link.channel.as_ref().map(|c| c.name.as_str()),
    ]
    .into_iter()
    .flatten()
    .filter(|name| !name.trim().is_empty())
    .collect();
    if !names.is_empty() {
        return names.join(" / ");
    }
    link.breadcrumb
        .rsplit_once(" > ")
        .map_or_else(String::new, |(head, _)| head.to_string())
}

fn assign(
    light: &mut LightEntity,
    family: Option<DptFamily>,
    address: &RawAddress,
) {
    let ga = address.address;
    let slot = match (family, ga.middle()) {
        (Some(DptFamily::Boolean), 1) => &mut light.address,
        (Some(DptFamily::Boolean), 5) => &mut light.state_address,
        (Some(DptFamily::Dimming), 2) => &mut light.dimming_address,
        (Some(DptFamily::Percent), 3) => &mut light.brightness_address,
        (Some(DptFamily::Percent), 4) => &mut light.brightness_state_address,
        _ => return,
    };
    slot.get_or_insert(ga);
}

impl Strategy for LaPattern {
    fn name(&self) -> &'static str {
        if self.link_driven {
            "link-driven"
        } else {
            "la-pattern"
        }
    }

    fn apply(&self, ctx: &StrategyContext<'_>, remaining: &[&RawAddress]) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::default();
        if self.link_driven && !ctx.has_links() {
            return outcome;
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<&RawAddress>> = Vec::new();
        for address in remaining.iter().copied().filter(|a| is_la_name(&a.name)) {
            let key = self.group_key(ctx, address);
            let position = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[position].push(address);
        }

        for members in groups {
            let mut light = LightEntity {
                name: members[0].name.trim().to_string(),
                ..LightEntity::default()
            };
            for member in &members {
                assign(&mut light, self.family(ctx, member), member);
            }
            let ids: Vec<String> = members.iter().map(|m| m.id.clone()).collect();
            let survives = light.address.is_some()
                || light.dimming_address.is_some()
                || light.brightness_address.is_some();
            if survives {
                outcome.push(MappedEntity::new(EntityPayload::Light(light), ids));
            } else {
                tracing::debug!(name = %light.name, "LA group without a controllable member");
                for id in &ids {
                    outcome.consume(id);
                }
            }
        }
        outcome
    }
}
