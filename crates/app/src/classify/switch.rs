//! Switch pairing: a boolean command and its `status`/`state` feedback share
//! a base name.

use std::collections::HashMap;

use knxha_domain::dpt::DptFamily;
use knxha_domain::entity::{EntityPayload, MappedEntity, SwitchEntity};
use knxha_domain::record::RawAddress;

use super::naming::{STATUS_WORDS, group_key, has_any_word, strip_words};
use super::{Strategy, StrategyContext, StrategyOutcome};

/// Strategy 5: pair boolean commands with their state addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchPairing;

#[derive(Default)]
struct Group<'a> {
    name: String,
    commands: Vec<&'a RawAddress>,
    states: Vec<&'a RawAddress>,
}

impl Strategy for SwitchPairing {
    fn name(&self) -> &'static str {
        "switch"
    }

    fn apply(&self, ctx: &StrategyContext<'_>, remaining: &[&RawAddress]) -> StrategyOutcome {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Group<'_>> = Vec::new();
        for address in remaining
            .iter()
            .copied()
            .filter(|a| ctx.family(a) == Some(DptFamily::Boolean))
        {
            let base = strip_words(&address.name, STATUS_WORDS);
            let position = *index.entry(group_key(&base)).or_insert_with(|| {
                groups.push(Group::default());
                groups.len() - 1
            });
            let group = &mut groups[position];
            if has_any_word(&address.name, STATUS_WORDS) {
                group.states.push(address);
            } else {
                if group.name.is_empty() {
                    group.name = base;
                }
                group.commands.push(address);
            }
        }

        let mut outcome = StrategyOutcome::default();
        for group in groups {
            let mut state = group.states.first().copied();
            for command in group.commands {
                let paired = state.take();
                let mut ids = vec![command.id.clone()];
                ids.extend(paired.map(|s| s.id.clone()));
                let entity = SwitchEntity {
                    name: if group.name.is_empty() {
                        command.name.trim().to_string()
                    } else {
                        group.name.clone()
                    },
                    address: command.address,
                    state_address: paired.map(|s| s.address),
                    respond_to_read: paired.is_none(),
                };
                outcome.push(MappedEntity::new(EntityPayload::Switch(entity), ids));
            }
        }
        outcome
    }
}
