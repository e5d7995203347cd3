//! Structured mapping — classification driven by com-object role bindings.
//!
//! Only usable when the catalog carries device/channel/com-object data. Each
//! channel is looked at as a whole first (a dimmer channel becomes one light),
//! then the remaining com objects are mapped one by one from their effective
//! datapoint family.

use std::collections::HashSet;

use knxha_domain::catalog::{Channel, ComObject};
use knxha_domain::dpt::{Dpt, DptFamily};
use knxha_domain::entity::{
    BinarySensorEntity, DateTimeEntity, EntityDomain, EntityPayload, LightEntity, MappedEntity,
    SceneEntity, SensorEntity, SwitchEntity,
};
use knxha_domain::record::RawAddress;

use super::naming::scene_number;
use super::{Strategy, StrategyContext, StrategyOutcome};

/// Strategy 1: map com objects with role bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Address,
    State,
    Brightness,
    BrightnessState,
}

/// An entity before its ids are checked against earlier claims. The first
/// slot is the primary one.
#[derive(Debug, Clone)]
struct Draft<'a> {
    domain: EntityDomain,
    sensor_type: &'static str,
    slots: Vec<(Slot, &'a str)>,
}

impl<'a> Draft<'a> {
    fn new(domain: EntityDomain) -> Self {
        Self {
            domain,
            sensor_type: "sensor",
            slots: Vec::new(),
        }
    }

    fn with(mut self, slot: Slot, id: Option<&'a str>) -> Self {
        if let Some(id) = id
            && self.get(slot).is_none()
        {
            self.slots.push((slot, id));
        }
        self
    }

    fn get(&self, slot: Slot) -> Option<&'a str> {
        self.slots.iter().find(|(s, _)| *s == slot).map(|(_, id)| *id)
    }

    fn primary(&self) -> Option<&'a str> {
        self.slots.first().map(|(_, id)| *id)
    }

    fn natural_key(&self) -> String {
        let part = |slot| self.get(slot).unwrap_or("");
        match self.domain {
            EntityDomain::Switch => format!("switch|{}|{}", part(Slot::Address), part(Slot::State)),
            EntityDomain::Light => format!(
                "light|{}|{}",
                part(Slot::Address),
                part(Slot::Brightness)
            ),
            EntityDomain::Sensor => format!("sensor|{}|{}", part(Slot::State), self.sensor_type),
            other => format!("{other}|{}", self.primary().unwrap_or("")),
        }
    }

    fn ids(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.slots.iter().map(|(_, id)| *id)
    }
}

/// Bindings of one com object that are still available.
struct Signals<'a> {
    family: Option<DptFamily>,
    dpt: Option<Dpt>,
    writes: Vec<&'a str>,
    states: Vec<&'a str>,
    listens: Vec<&'a str>,
}

impl<'a> Signals<'a> {
    fn new(
        ctx: &StrategyContext<'a>,
        object: &'a ComObject,
        available: &HashSet<&str>,
    ) -> Self {
        let dpt = effective_dpt(ctx, object);
        let keep = |ids: Vec<&'a str>| -> Vec<&'a str> {
            ids.into_iter().filter(|id| available.contains(id)).collect()
        };
        Self {
            family: dpt.map(Dpt::family),
            dpt,
            writes: keep(object.write_ids().collect()),
            states: keep(object.state_ids().collect()),
            listens: keep(object.listen_ids().collect()),
        }
    }

    fn without(&self, used: &HashSet<&str>) -> Self {
        let keep = |ids: &[&'a str]| -> Vec<&'a str> {
            ids.iter().copied().filter(|id| !used.contains(id)).collect()
        };
        Self {
            family: self.family,
            dpt: self.dpt,
            writes: keep(&self.writes),
            states: keep(&self.states),
            listens: keep(&self.listens),
        }
    }

    fn is(&self, family: DptFamily) -> bool {
        self.family == Some(family)
    }

    fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.states.is_empty() && self.listens.is_empty()
    }
}

/// Address-level dpt of the first bound address, else the com object's own.
fn effective_dpt(ctx: &StrategyContext<'_>, object: &ComObject) -> Option<Dpt> {
    object
        .address_ids()
        .next()
        .and_then(|id| ctx.catalog.address(id))
        .and_then(|address| ctx.dpt(address))
        .or_else(|| object.dpt.as_deref().and_then(|raw| ctx.dpts.dpt(raw)))
}

fn channel_drafts<'a>(
    ctx: &StrategyContext<'a>,
    channel: &'a Channel,
    available: &HashSet<&str>,
) -> Vec<Draft<'a>> {
    let signals: Vec<Signals<'a>> = channel
        .com_objects
        .iter()
        .map(|object| Signals::new(ctx, object, available))
        .collect();
    let mut used: HashSet<&str> = HashSet::new();
    let mut drafts = Vec::new();

    if let Some(light) = channel_light(&signals) {
        used.extend(light.ids());
        drafts.push(light);
    }

    for signal in &signals {
        let signal = signal.without(&used);
        if signal.is_empty() {
            continue;
        }
        if let Some(draft) = object_draft(&signal) {
            used.extend(draft.ids());
            drafts.push(draft);
        }
    }
    drafts
}

/// The first percent object with a write binding, combined with the
/// channel's boolean switching pair.
fn channel_light<'a>(signals: &[Signals<'a>]) -> Option<Draft<'a>> {
    let (index, brightness) = signals
        .iter()
        .enumerate()
        .find(|(_, s)| s.is(DptFamily::Percent) && !s.writes.is_empty())?;
    let others = || {
        signals
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != index)
            .map(|(_, s)| s)
    };

    let switching = others().find(|s| s.is(DptFamily::Boolean) && !s.writes.is_empty());
    let switching_state = switching
        .and_then(|s| s.states.first().copied())
        .or_else(|| {
            others()
                .find(|s| s.is(DptFamily::Boolean) && s.writes.is_empty() && !s.states.is_empty())
                .and_then(|s| s.states.first().copied())
        });
    let brightness_state = brightness.states.first().copied().or_else(|| {
        others()
            .find(|s| s.is(DptFamily::Percent) && s.writes.is_empty() && !s.states.is_empty())
            .and_then(|s| s.states.first().copied())
    });

    Some(
        Draft::new(EntityDomain::Light)
            .with(Slot::Address, switching.and_then(|s| s.writes.first().copied()))
            .with(Slot::State, switching_state)
            .with(Slot::Brightness, brightness.writes.first().copied())
            .with(Slot::BrightnessState, brightness_state),
    )
}

fn object_draft<'a>(signal: &Signals<'a>) -> Option<Draft<'a>> {
    let write = signal.writes.first().copied();
    let state = signal.states.first().copied();
    let listen = signal.listens.first().copied();
    let draft = match signal.family? {
        DptFamily::Scene => {
            Draft::new(EntityDomain::Scene).with(Slot::Address, write.or(state).or(listen))
        }
        DptFamily::Boolean if write.is_some() => Draft::new(EntityDomain::Switch)
            .with(Slot::Address, write)
            .with(Slot::State, state),
        DptFamily::Boolean => {
            Draft::new(EntityDomain::BinarySensor).with(Slot::State, state.or(listen))
        }
        DptFamily::Percent if write.is_some() => {
            Draft::new(EntityDomain::Light).with(Slot::Brightness, write)
        }
        DptFamily::Percent => {
            let mut draft = Draft::new(EntityDomain::Sensor).with(Slot::State, state.or(listen));
            draft.sensor_type = "percent";
            draft
        }
        DptFamily::Float2 | DptFamily::Float4 => {
            let mut draft =
                Draft::new(EntityDomain::Sensor).with(Slot::State, state.or(listen).or(write));
            draft.sensor_type = signal.dpt.map_or("sensor", Dpt::sensor_type);
            draft
        }
        DptFamily::Time | DptFamily::Date | DptFamily::DateTime => {
            let domain = match signal.family? {
                DptFamily::Time => EntityDomain::Time,
                DptFamily::Date => EntityDomain::Date,
                _ => EntityDomain::DateTime,
            };
            let address = write.or(state).or(listen);
            let state = state.filter(|s| Some(*s) != address);
            Draft::new(domain)
                .with(Slot::Address, address)
                .with(Slot::State, state)
        }
        _ => return None,
    };
    draft.primary().is_some().then_some(draft)
}

fn materialize(ctx: &StrategyContext<'_>, draft: &Draft<'_>) -> Option<MappedEntity> {
    let primary = ctx.catalog.address(draft.primary()?)?;
    let name = primary.name.clone();
    let ga = |slot: Slot| {
        draft
            .get(slot)
            .and_then(|id| ctx.catalog.address(id))
            .map(|a| a.address)
    };

    let payload = match draft.domain {
        EntityDomain::Switch => {
            let state_address = ga(Slot::State);
            EntityPayload::Switch(SwitchEntity {
                name,
                address: ga(Slot::Address)?,
                state_address,
                respond_to_read: state_address.is_none(),
            })
        }
        EntityDomain::BinarySensor => EntityPayload::BinarySensor(BinarySensorEntity {
            name,
            state_address: ga(Slot::State)?,
        }),
        EntityDomain::Light => EntityPayload::Light(LightEntity {
            name,
            address: ga(Slot::Address),
            state_address: ga(Slot::State),
            dimming_address: None,
            brightness_address: ga(Slot::Brightness),
            brightness_state_address: ga(Slot::BrightnessState),
        }),
        EntityDomain::Sensor => EntityPayload::Sensor(SensorEntity {
            name,
            state_address: ga(Slot::State)?,
            sensor_type: draft.sensor_type.to_string(),
        }),
        EntityDomain::Time | EntityDomain::Date | EntityDomain::DateTime => {
            let entity = DateTimeEntity {
                name,
                address: ga(Slot::Address)?,
                state_address: ga(Slot::State),
            };
            match draft.domain {
                EntityDomain::Time => EntityPayload::Time(entity),
                EntityDomain::Date => EntityPayload::Date(entity),
                _ => EntityPayload::DateTime(entity),
            }
        }
        EntityDomain::Scene => EntityPayload::Scene(SceneEntity {
            scene_number: scene_number(&name),
            address: ga(Slot::Address)?,
            name,
        }),
        EntityDomain::Cover | EntityDomain::Unknown => return None,
    };
    Some(MappedEntity::new(
        payload,
        draft.ids().map(str::to_string).collect(),
    ))
}

impl Strategy for StructuredMapping {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn apply(&self, ctx: &StrategyContext<'_>, remaining: &[&RawAddress]) -> StrategyOutcome {
        let available: HashSet<&str> = remaining.iter().map(|a| a.id.as_str()).collect();
        let drafts = ctx
            .catalog
            .devices
            .iter()
            .flat_map(|device| device.channels.iter())
            .flat_map(|channel| channel_drafts(ctx, channel, &available));

        let mut keys = HashSet::new();
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut outcome = StrategyOutcome::default();
        for mut draft in drafts {
            if !keys.insert(draft.natural_key()) {
                continue;
            }
            let Some(primary) = draft.primary() else {
                continue;
            };
            if claimed.contains(primary) {
                tracing::debug!(primary, domain = %draft.domain, "dropping entity with claimed primary");
                continue;
            }
            draft
                .slots
                .retain(|(_, id)| *id == primary || !claimed.contains(id));
            claimed.extend(draft.ids());
            if let Some(entity) = materialize(ctx, &draft) {
                outcome.push(entity);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use knxha_domain::catalog::{Catalog, Device, RoleBinding};
    use knxha_domain::dpt::DptNormalizer;
    use knxha_domain::flags::ComObjectFlags;
    use knxha_domain::record::Role;

    use super::*;

    fn address(id: &str, ga: &str, name: &str, dpt: &str) -> RawAddress {
        RawAddress {
            id: id.into(),
            name: name.into(),
            address: ga.parse().unwrap(),
            dpt: Some(dpt.into()),
            description: None,
            security: None,
        }
    }

    fn object(id: &str, dpt: &str, bindings: &[(Role, &str)]) -> ComObject {
        ComObject {
            id: id.into(),
            name: id.into(),
            dpt: Some(dpt.into()),
            flags: ComObjectFlags::default(),
            bindings: bindings
                .iter()
                .map(|(role, address_id)| RoleBinding {
                    role: *role,
                    address_id: (*address_id).to_string(),
                    inferred: false,
                })
                .collect(),
        }
    }

    fn catalog(addresses: Vec<RawAddress>, channels: Vec<Vec<ComObject>>) -> Catalog {
        Catalog {
            addresses,
            devices: vec![Device {
                id: "D".into(),
                name: "Actuator".into(),
                individual_address: None,
                product_ref: None,
                channels: channels
                    .into_iter()
                    .enumerate()
                    .map(|(i, com_objects)| Channel {
                        id: format!("C{i}"),
                        name: format!("Channel {i}"),
                        com_objects,
                    })
                    .collect(),
            }],
            ..Catalog::default()
        }
    }

    fn run(catalog: &Catalog) -> StrategyOutcome {
        let dpts = DptNormalizer::new();
        let ctx = StrategyContext::new(catalog, &dpts);
        let remaining: Vec<&RawAddress> = catalog.addresses.iter().collect();
        StructuredMapping.apply(&ctx, &remaining)
    }

    #[test]
    fn should_combine_dimmer_channel_into_one_light() {
        let catalog = catalog(
            vec![
                address("sw", "1/1/1", "Hall", "1.001"),
                address("sw_s", "1/5/1", "Hall state", "1.001"),
                address("br", "1/3/1", "Hall brightness", "5.001"),
                address("br_s", "1/4/1", "Hall brightness state", "5.001"),
            ],
            vec![vec![
                object("co_sw", "1.001", &[(Role::Write, "sw")]),
                object("co_sw_s", "1.001", &[(Role::Status, "sw_s")]),
                object("co_br", "5.001", &[(Role::Write, "br")]),
                object("co_br_s", "5.001", &[(Role::State, "br_s")]),
            ]],
        );
        let outcome = run(&catalog);
        assert_eq!(outcome.entities.len(), 1);
        let EntityPayload::Light(light) = &outcome.entities[0].payload else {
            panic!("expected a light");
        };
        assert_eq!(light.name, "Hall");
        assert_eq!(light.address.unwrap().to_string(), "1/1/1");
        assert_eq!(light.state_address.unwrap().to_string(), "1/5/1");
        assert_eq!(light.brightness_address.unwrap().to_string(), "1/3/1");
        assert_eq!(light.brightness_state_address.unwrap().to_string(), "1/4/1");
        assert_eq!(outcome.consumed.len(), 4);
    }

    #[test]
    fn should_map_boolean_objects_to_switch_and_binary_sensor() {
        let catalog = catalog(
            vec![
                address("a", "2/1/1", "Socket", "1.001"),
                address("b", "2/1/2", "Socket state", "1.001"),
                address("c", "2/1/3", "Window contact", "1.019"),
            ],
            vec![vec![
                object("co_a", "1.001", &[(Role::Write, "a"), (Role::State, "b")]),
                object("co_c", "1.019", &[(Role::Listen, "c")]),
            ]],
        );
        let outcome = run(&catalog);
        let domains: Vec<_> = outcome.entities.iter().map(MappedEntity::domain).collect();
        assert_eq!(domains, [EntityDomain::Switch, EntityDomain::BinarySensor]);
        let EntityPayload::Switch(switch) = &outcome.entities[0].payload else {
            panic!("expected a switch");
        };
        assert!(!switch.respond_to_read);
        assert_eq!(switch.state_address.unwrap().to_string(), "2/1/2");
    }

    #[test]
    fn should_use_address_dpt_over_com_object_dpt() {
        let catalog = catalog(
            vec![address("t", "3/0/1", "Living temperature", "9.001")],
            vec![vec![object("co_t", "1.001", &[(Role::State, "t")])]],
        );
        let outcome = run(&catalog);
        let EntityPayload::Sensor(sensor) = &outcome.entities[0].payload else {
            panic!("expected a sensor");
        };
        assert_eq!(sensor.sensor_type, "temperature");
    }

    #[test]
    fn should_map_write_only_scene_object() {
        let catalog = catalog(
            vec![address("s", "4/0/1", "Evening scene 2", "17.001")],
            vec![vec![object("co_s", "17.001", &[(Role::Write, "s")])]],
        );
        let outcome = run(&catalog);
        let EntityPayload::Scene(scene) = &outcome.entities[0].payload else {
            panic!("expected a scene");
        };
        assert_eq!(scene.scene_number, 2);
    }

    #[test]
    fn should_drop_duplicate_and_clear_claimed_secondary() {
        let catalog = catalog(
            vec![
                address("a", "2/1/1", "Socket", "1.001"),
                address("b", "2/1/2", "Socket state", "1.001"),
                address("c", "2/1/3", "Other", "1.001"),
            ],
            vec![
                vec![object("co_1", "1.001", &[(Role::Write, "a"), (Role::State, "b")])],
                vec![object("co_2", "1.001", &[(Role::Write, "a"), (Role::State, "b")])],
                vec![object("co_3", "1.001", &[(Role::Write, "c"), (Role::State, "b")])],
            ],
        );
        let outcome = run(&catalog);
        assert_eq!(outcome.entities.len(), 2);
        let EntityPayload::Switch(second) = &outcome.entities[1].payload else {
            panic!("expected a switch");
        };
        assert_eq!(second.address.to_string(), "2/1/3");
        assert!(second.state_address.is_none());
        assert!(second.respond_to_read);
    }

    #[test]
    fn should_skip_addresses_not_remaining() {
        let catalog = catalog(
            vec![address("a", "2/1/1", "Socket", "1.001")],
            vec![vec![object("co_a", "1.001", &[(Role::Write, "a")])]],
        );
        let dpts = DptNormalizer::new();
        let ctx = StrategyContext::new(&catalog, &dpts);
        let outcome = StructuredMapping.apply(&ctx, &[]);
        assert!(outcome.entities.is_empty());
    }

    #[test]
    fn should_never_emit_an_id_twice() {
        let catalog = catalog(
            vec![
                address("a", "2/1/1", "A", "1.001"),
                address("b", "2/1/2", "B", "5.001"),
            ],
            vec![
                vec![
                    object("co_a", "1.001", &[(Role::Write, "a")]),
                    object("co_b", "5.001", &[(Role::Write, "b")]),
                ],
                vec![object("co_c", "5.001", &[(Role::Write, "b"), (Role::State, "a")])],
            ],
        );
        let outcome = run(&catalog);
        let mut seen = HashSet::new();
        for id in outcome.entities.iter().flat_map(|e| e.ids.iter()) {
            assert!(seen.insert(id.clone()), "{id} emitted twice");
        }
    }
}
