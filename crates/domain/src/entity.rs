//! Home Assistant entity drafts produced by classification.
//!
//! Payload field names follow the Home Assistant KNX integration schema so
//! they can be serialized as-is. Every payload remembers the raw address ids
//! it was built from; those ids never reach the rendered configuration.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::address::GroupAddress;

/// Home Assistant KNX platform an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityDomain {
    Switch,
    BinarySensor,
    Light,
    Sensor,
    Time,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Cover,
    Scene,
    Unknown,
}

impl EntityDomain {
    /// Every domain, in output order.
    pub const ALL: [Self; 10] = [
        Self::Switch,
        Self::BinarySensor,
        Self::Light,
        Self::Sensor,
        Self::Time,
        Self::Date,
        Self::DateTime,
        Self::Cover,
        Self::Scene,
        Self::Unknown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::BinarySensor => "binary_sensor",
            Self::Light => "light",
            Self::Sensor => "sensor",
            Self::Time => "time",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Cover => "cover",
            Self::Scene => "scene",
            Self::Unknown => "unknown",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EntityDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchEntity {
    pub name: String,
    pub address: GroupAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_address: Option<GroupAddress>,
    pub respond_to_read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinarySensorEntity {
    pub name: String,
    pub state_address: GroupAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LightEntity {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_state_address: Option<GroupAddress>,
}

impl LightEntity {
    /// The address a light is keyed on: on/off, else brightness, else dimming.
    #[must_use]
    pub fn primary_address(&self) -> Option<GroupAddress> {
        self.address
            .or(self.brightness_address)
            .or(self.dimming_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorEntity {
    pub name: String,
    pub state_address: GroupAddress,
    #[serde(rename = "type")]
    pub sensor_type: String,
}

/// Shared shape of the `time`, `date` and `datetime` platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateTimeEntity {
    pub name: String,
    pub address: GroupAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_address: Option<GroupAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverEntity {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_long_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_short_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_state_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_address: Option<GroupAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_state_address: Option<GroupAddress>,
    pub invert_updown: bool,
    pub invert_position: bool,
}

impl CoverEntity {
    #[must_use]
    pub fn primary_address(&self) -> Option<GroupAddress> {
        self.move_long_address
            .or(self.move_short_address)
            .or(self.stop_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneEntity {
    pub name: String,
    pub address: GroupAddress,
    pub scene_number: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownEntity {
    pub name: String,
    pub address: GroupAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpt: Option<String>,
}

/// Domain-specific payload of a [`MappedEntity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntityPayload {
    Switch(SwitchEntity),
    BinarySensor(BinarySensorEntity),
    Light(LightEntity),
    Sensor(SensorEntity),
    Time(DateTimeEntity),
    Date(DateTimeEntity),
    DateTime(DateTimeEntity),
    Cover(CoverEntity),
    Scene(SceneEntity),
    Unknown(UnknownEntity),
}

impl EntityPayload {
    #[must_use]
    pub fn domain(&self) -> EntityDomain {
        match self {
            Self::Switch(_) => EntityDomain::Switch,
            Self::BinarySensor(_) => EntityDomain::BinarySensor,
            Self::Light(_) => EntityDomain::Light,
            Self::Sensor(_) => EntityDomain::Sensor,
            Self::Time(_) => EntityDomain::Time,
            Self::Date(_) => EntityDomain::Date,
            Self::DateTime(_) => EntityDomain::DateTime,
            Self::Cover(_) => EntityDomain::Cover,
            Self::Scene(_) => EntityDomain::Scene,
            Self::Unknown(_) => EntityDomain::Unknown,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Switch(e) => &e.name,
            Self::BinarySensor(e) => &e.name,
            Self::Light(e) => &e.name,
            Self::Sensor(e) => &e.name,
            Self::Time(e) | Self::Date(e) | Self::DateTime(e) => &e.name,
            Self::Cover(e) => &e.name,
            Self::Scene(e) => &e.name,
            Self::Unknown(e) => &e.name,
        }
    }

    /// Every group address the payload references, primary first.
    #[must_use]
    pub fn addresses(&self) -> Vec<GroupAddress> {
        let all: Vec<Option<GroupAddress>> = match self {
            Self::Switch(e) => vec![Some(e.address), e.state_address],
            Self::BinarySensor(e) => vec![Some(e.state_address)],
            Self::Light(e) => vec![
                e.address,
                e.state_address,
                e.dimming_address,
                e.brightness_address,
                e.brightness_state_address,
            ],
            Self::Sensor(e) => vec![Some(e.state_address)],
            Self::Time(e) | Self::Date(e) | Self::DateTime(e) => {
                vec![Some(e.address), e.state_address]
            }
            Self::Cover(e) => vec![
                e.move_long_address,
                e.move_short_address,
                e.stop_address,
                e.position_address,
                e.position_state_address,
                e.angle_address,
                e.angle_state_address,
            ],
            Self::Scene(e) => vec![Some(e.address)],
            Self::Unknown(e) => vec![Some(e.address)],
        };
        all.into_iter().flatten().collect()
    }
}

/// A classified entity plus the raw address ids it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedEntity {
    pub payload: EntityPayload,
    pub ids: Vec<String>,
}

impl MappedEntity {
    #[must_use]
    pub fn new(payload: EntityPayload, ids: Vec<String>) -> Self {
        Self { payload, ids }
    }

    #[must_use]
    pub fn domain(&self) -> EntityDomain {
        self.payload.domain()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.payload.name()
    }
}

/// Classified entities bucketed per domain, insertion order preserved.
///
/// Serializes as a map from domain name to the sequence of payloads, in
/// [`EntityDomain::ALL`] order, omitting empty domains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HaEntities {
    buckets: [Vec<MappedEntity>; 10],
}

impl HaEntities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: MappedEntity) {
        self.buckets[entity.domain().index()].push(entity);
    }

    #[must_use]
    pub fn domain(&self, domain: EntityDomain) -> &[MappedEntity] {
        &self.buckets[domain.index()]
    }

    /// All entities, domain by domain in output order.
    pub fn iter(&self) -> impl Iterator<Item = &MappedEntity> {
        self.buckets.iter().flatten()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&MappedEntity) -> bool) {
        for bucket in &mut self.buckets {
            bucket.retain(&mut keep);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// `(domain, count)` for every non-empty domain.
    #[must_use]
    pub fn counts(&self) -> Vec<(EntityDomain, usize)> {
        EntityDomain::ALL
            .iter()
            .map(|d| (*d, self.domain(*d).len()))
            .filter(|(_, n)| *n > 0)
            .collect()
    }
}

impl Extend<MappedEntity> for HaEntities {
    fn extend<T: IntoIterator<Item = MappedEntity>>(&mut self, iter: T) {
        for entity in iter {
            self.push(entity);
        }
    }
}

impl Serialize for HaEntities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let counts = self.counts();
        let mut map = serializer.serialize_map(Some(counts.len()))?;
        for (domain, _) in counts {
            let payloads: Vec<&EntityPayload> =
                self.domain(domain).iter().map(|e| &e.payload).collect();
            map.serialize_entry(domain.as_str(), &payloads)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ga(raw: &str) -> GroupAddress {
        raw.parse().unwrap()
    }

    fn switch(name: &str, id: &str) -> MappedEntity {
        MappedEntity::new(
            EntityPayload::Switch(SwitchEntity {
                name: name.into(),
                address: ga("1/1/1"),
                state_address: None,
                respond_to_read: true,
            }),
            vec![id.into()],
        )
    }

    fn sensor(name: &str) -> MappedEntity {
        MappedEntity::new(
            EntityPayload::Sensor(SensorEntity {
                name: name.into(),
                state_address: ga("2/0/1"),
                sensor_type: "temperature".into(),
            }),
            vec!["s".into()],
        )
    }

    #[test]
    fn should_bucket_by_domain_preserving_order() {
        let mut entities = HaEntities::new();
        entities.push(sensor("T"));
        entities.push(switch("A", "a"));
        entities.push(switch("B", "b"));
        let names: Vec<_> = entities.iter().map(MappedEntity::name).collect();
        assert_eq!(names, ["A", "B", "T"]);
        assert_eq!(entities.len(), 3);
    }

    #[test]
    fn should_serialize_non_empty_domains_in_fixed_order() {
        let mut entities = HaEntities::new();
        entities.push(sensor("T"));
        entities.push(switch("A", "a"));
        let json = serde_json::to_value(&entities).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        // serde_json sorts object keys; check content instead of order here
        assert_eq!(keys.len(), 2);
        assert_eq!(json["sensor"][0]["type"], "temperature");
        assert_eq!(json["switch"][0]["address"], "1/1/1");
        assert!(json["switch"][0].get("state_address").is_none());
    }

    #[test]
    fn should_not_serialize_consumed_ids() {
        let json = serde_json::to_value(&switch("A", "GA-1").payload).unwrap();
        assert!(json.get("ids").is_none());
    }

    #[test]
    fn should_retain_across_domains() {
        let mut entities = HaEntities::new();
        entities.push(switch("Reserve", "a"));
        entities.push(sensor("Reserve"));
        entities.push(switch("Hall", "b"));
        entities.retain(|e| e.name() != "Reserve");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities.counts(), vec![(EntityDomain::Switch, 1)]);
    }

    #[test]
    fn should_list_payload_addresses_primary_first() {
        let light = EntityPayload::Light(LightEntity {
            name: "L".into(),
            brightness_address: Some(ga("1/3/1")),
            address: Some(ga("1/1/1")),
            ..LightEntity::default()
        });
        assert_eq!(light.addresses(), vec![ga("1/1/1"), ga("1/3/1")]);
    }
}
