//! Address-based aggregation: a light whose functions sit on contiguous sub
//! addresses of one middle group and share a base name.

use std::collections::BTreeMap;

use knxha_domain::dpt::DptFamily;
use knxha_domain::entity::{EntityPayload, LightEntity, MappedEntity};
use knxha_domain::record::RawAddress;

use super::naming::{
    LIGHT_ROLE_WORDS, STATUS_WORDS, group_key, has_any_word, is_la_name, strip_words,
};
use super::{Strategy, StrategyContext, StrategyOutcome};

/// Strategy 3: blocks of contiguous, same-named addresses without links.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressBlocks;

fn base_name(address: &RawAddress) -> String {
    let base = strip_words(&address.name, LIGHT_ROLE_WORDS);
    if base.is_empty() {
        address.name.trim().to_string()
    } else {
        base
    }
}

/// Split one middle group (sorted by sub) into maximal runs of consecutive
/// subs sharing a base name.
fn blocks<'a>(members: &[&'a RawAddress]) -> Vec<Vec<&'a RawAddress>> {
    let mut blocks: Vec<Vec<&RawAddress>> = Vec::new();
    let mut current_key = String::new();
    for member in members.iter().copied() {
        let key = group_key(&base_name(member));
        let continues = blocks.last().and_then(|b| b.last()).is_some_and(|last| {
            key == current_key
                && u16::from(last.address.sub()) + 1 == u16::from(member.address.sub())
        });
        if continues {
            if let Some(block) = blocks.last_mut() {
                block.push(member);
            }
        } else {
            blocks.push(vec![member]);
            current_key = key;
        }
    }
    blocks
}

/// Fill the light field for `member`. Returns whether it was a dimming or
/// brightness member.
fn assign(ctx: &StrategyContext<'_>, light: &mut LightEntity, member: &RawAddress) -> bool {
    let is_state = has_any_word(&member.name, STATUS_WORDS);
    let ga = member.address;
    let (slot, dims) = match ctx.family(member) {
        Some(DptFamily::Boolean) if is_state => (&mut light.state_address, false),
        Some(DptFamily::Boolean) => (&mut light.address, false),
        Some(DptFamily::Dimming) => (&mut light.dimming_address, true),
        Some(DptFamily::Percent) if is_state => (&mut light.brightness_state_address, true),
        Some(DptFamily::Percent) => (&mut light.brightness_address, true),
        _ => return false,
    };
    slot.get_or_insert(ga);
    dims
}

impl Strategy for AddressBlocks {
    fn name(&self) -> &'static str {
        "address-blocks"
    }

    fn apply(&self, ctx: &StrategyContext<'_>, remaining: &[&RawAddress]) -> StrategyOutcome {
        let mut by_middle: BTreeMap<(u8, u8), Vec<&RawAddress>> = BTreeMap::new();
        for address in remaining
            .iter()
            .copied()
            .filter(|a| ctx.links_for(&a.id).is_empty() && !is_la_name(&a.name))
        {
            by_middle
                .entry((address.address.main(), address.address.middle()))
                .or_default()
                .push(address);
        }

        let mut outcome = StrategyOutcome::default();
        for members in by_middle.values_mut() {
            members.sort_by_key(|a| a.address);
            for block in blocks(members).into_iter().filter(|b| b.len() >= 2) {
                let mut light = LightEntity {
                    name: base_name(block[0]),
                    ..LightEntity::default()
                };
                let mut dims = false;
                for member in &block {
                    dims |= assign(ctx, &mut light, member);
                }
                if !dims {
                    continue;
                }
                let ids = block.iter().map(|m| m.id.clone()).collect();
                outcome.push(MappedEntity::new(EntityPayload::Light(light), ids));
            }
        }
        outcome
    }
}
