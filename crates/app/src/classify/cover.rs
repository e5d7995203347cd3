//! Cover grouping: movement, stop and position addresses of one blind share
//! a base name once the cover role words are removed.

use std::collections::HashMap;

use knxha_domain::address::GroupAddress;
use knxha_domain::dpt::DptFamily;
use knxha_domain::entity::{CoverEntity, EntityPayload, MappedEntity};
use knxha_domain::record::RawAddress;

use super::naming::{
    ANGLE_WORDS, COVER_ROLE_WORDS, STATUS_WORDS, group_key, has_any_word, has_word, strip_words,
};
use super::{Strategy, StrategyContext, StrategyOutcome};

/// Strategy 6: group cover functions by base name.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverGrouping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoverRole {
    MoveLong,
    MoveShort,
    Stop,
    Position,
    PositionState,
    Angle,
    AngleState,
}

impl CoverRole {
    fn is_movement(self) -> bool {
        matches!(self, Self::MoveLong | Self::MoveShort | Self::Stop)
    }

    fn slot(self, cover: &mut CoverEntity) -> &mut Option<GroupAddress> {
        match self {
            Self::MoveLong => &mut cover.move_long_address,
            Self::MoveShort => &mut cover.move_short_address,
            Self::Stop => &mut cover.stop_address,
            Self::Position => &mut cover.position_address,
            Self::PositionState => &mut cover.position_state_address,
            Self::Angle => &mut cover.angle_address,
            Self::AngleState => &mut cover.angle_state_address,
        }
    }
}

fn role(ctx: &StrategyContext<'_>, address: &RawAddress) -> Option<CoverRole> {
    let dpt = ctx.dpt(address)?;
    let role = match (dpt.main, dpt.sub) {
        (1, 8) => CoverRole::MoveLong,
        (1, 7) => CoverRole::MoveShort,
        (1, 10) => CoverRole::Stop,
        _ => match dpt.family() {
            DptFamily::Boolean if has_word(&address.name, "stop") => CoverRole::Stop,
            DptFamily::Percent => {
                let angle = has_any_word(&address.name, ANGLE_WORDS);
                let state = has_any_word(&address.name, STATUS_WORDS);
                match (angle, state) {
                    (true, true) => CoverRole::AngleState,
                    (true, false) => CoverRole::Angle,
                    (false, true) => CoverRole::PositionState,
                    (false, false) => CoverRole::Position,
                }
            }
            _ => return None,
        },
    };
    Some(role)
}

fn base_name(address: &RawAddress) -> String {
    let base = strip_words(&address.name, COVER_ROLE_WORDS);
    if base.is_empty() {
        address.name.trim().to_string()
    } else {
        base
    }
}

#[derive(Default)]
struct Group<'a> {
    name: String,
    members: Vec<(CoverRole, &'a RawAddress)>,
}

impl Strategy for CoverGrouping {
    fn name(&self) -> &'static str {
        "cover"
    }

    fn apply(&self, ctx: &StrategyContext<'_>, remaining: &[&RawAddress]) -> StrategyOutcome {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Group<'_>> = Vec::new();
        for address in remaining.iter().copied() {
            let Some(role) = role(ctx, address) else {
                continue;
            };
            let base = base_name(address);
            let position = *index.entry(group_key(&base)).or_insert_with(|| {
                groups.push(Group {
                    name: base,
                    members: Vec::new(),
                });
                groups.len() - 1
            });
            groups[position].members.push((role, address));
        }

        let mut outcome = StrategyOutcome::default();
        for group in groups {
            let mut cover = CoverEntity {
                name: group.name,
                ..CoverEntity::default()
            };
            let mut ids = Vec::new();
            for (role, member) in group.members {
                let slot = role.slot(&mut cover);
                if slot.is_some() {
                    continue;
                }
                *slot = Some(member.address);
                ids.push(member.id.clone());
                if member.name.to_lowercase().contains("invert") {
                    if role.is_movement() {
                        cover.invert_updown = true;
                    } else {
                        cover.invert_position = true;
                    }
                }
            }
            if cover.primary_address().is_some() {
                outcome.push(MappedEntity::new(EntityPayload::Cover(cover), ids));
            }
        }
        outcome
    }
}
