//! Last-resort classification of one address on its own.
//!
//! The datapoint type decides when there is one; otherwise keywords in the
//! name do. Anything still unrecognised becomes an `unknown` entity so no
//! address silently disappears from the output.

use knxha_domain::address::GroupAddress;
use knxha_domain::dpt::{Dpt, DptFamily};
use knxha_domain::entity::{
    BinarySensorEntity, CoverEntity, DateTimeEntity, EntityPayload, LightEntity, MappedEntity,
    SceneEntity, SensorEntity, SwitchEntity, UnknownEntity,
};
use knxha_domain::record::RawAddress;

use super::naming::{has_word, is_la_name, scene_number, tokens};
use super::{Strategy, StrategyContext, StrategyOutcome};

const LIGHT_KEYWORDS: &[&str] = &["light", "lighting", "lamp", "dim", "dimmer", "licht"];
const COVER_KEYWORDS: &[&str] = &["cover", "blind", "shutter", "rolluik", "screen", "jalousie"];
const SWITCH_KEYWORDS: &[&str] = &["switch", "central", "schakel"];
const DOOR_KEYWORDS: &[&str] = &["door", "gate"];
/// Sensor keyword → Home Assistant sensor type.
const SENSOR_KEYWORDS: &[(&str, &str)] = &[
    ("temperature", "temperature"),
    ("humidity", "humidity"),
    ("co2", "ppm"),
    ("lux", "illuminance"),
];

/// Strategy 7: classify every remaining address individually.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackClassifier;

/// Whether a name token is one of `keywords`, or its plural with `s`.
fn mentions(tokens: &[String], keywords: &[&str]) -> bool {
    tokens.iter().any(|token| {
        let singular = token.strip_suffix('s').unwrap_or(token.as_str());
        keywords.iter().any(|k| token.as_str() == *k || singular == *k)
    })
}

impl FallbackClassifier {
    /// Classify a single address.
    #[must_use]
    pub fn classify(&self, ctx: &StrategyContext<'_>, address: &RawAddress) -> MappedEntity {
        let dpt = ctx.dpt(address);
        let payload = dpt
            .and_then(|dpt| by_dpt(dpt, address))
            .or_else(|| by_keyword(address))
            .unwrap_or_else(|| {
                EntityPayload::Unknown(UnknownEntity {
                    name: address.name.clone(),
                    address: address.address,
                    dpt: address.dpt.clone(),
                })
            });
        MappedEntity::new(payload, vec![address.id.clone()])
    }
}

fn switch(address: &RawAddress) -> EntityPayload {
    EntityPayload::Switch(SwitchEntity {
        name: address.name.clone(),
        address: address.address,
        state_address: None,
        respond_to_read: false,
    })
}

fn binary_sensor(address: &RawAddress) -> EntityPayload {
    EntityPayload::BinarySensor(BinarySensorEntity {
        name: address.name.clone(),
        state_address: address.address,
    })
}

fn sensor(address: &RawAddress, sensor_type: &str) -> EntityPayload {
    EntityPayload::Sensor(SensorEntity {
        name: address.name.clone(),
        state_address: address.address,
        sensor_type: sensor_type.to_string(),
    })
}

fn time_like(name: String, address: GroupAddress) -> DateTimeEntity {
    DateTimeEntity {
        name,
        address,
        state_address: None,
    }
}

fn by_dpt(dpt: Dpt, address: &RawAddress) -> Option<EntityPayload> {
    let name = address.name.clone();
    let ga = address.address;
    let payload = match dpt.family() {
        DptFamily::Boolean if has_word(&address.name, "status") => binary_sensor(address),
        DptFamily::Boolean => switch(address),
        DptFamily::Dimming => EntityPayload::Light(LightEntity {
            name,
            dimming_address: Some(ga),
            ..LightEntity::default()
        }),
        DptFamily::Percent => EntityPayload::Light(LightEntity {
            name,
            brightness_address: Some(ga),
            ..LightEntity::default()
        }),
        DptFamily::Float2 | DptFamily::Float4 => sensor(address, dpt.sensor_type()),
        DptFamily::Time => EntityPayload::Time(time_like(name, ga)),
        DptFamily::Date => EntityPayload::Date(time_like(name, ga)),
        DptFamily::DateTime => EntityPayload::DateTime(time_like(name, ga)),
        DptFamily::Scene => EntityPayload::Scene(SceneEntity {
            scene_number: scene_number(&name),
            name,
            address: ga,
        }),
        DptFamily::Movement if mentions(&tokens(&address.name), DOOR_KEYWORDS) => switch(address),
        DptFamily::Movement => {
            let mut cover = CoverEntity {
                name,
                ..CoverEntity::default()
            };
            match dpt.sub {
                7 => cover.move_short_address = Some(ga),
                10 => cover.stop_address = Some(ga),
                _ => cover.move_long_address = Some(ga),
            }
            EntityPayload::Cover(cover)
        }
        DptFamily::Scaling | DptFamily::Other => return None,
    };
    Some(payload)
}

fn by_keyword(address: &RawAddress) -> Option<EntityPayload> {
    let tokens = tokens(&address.name);
    let ga = address.address;
    if is_la_name(&address.name) || mentions(&tokens, LIGHT_KEYWORDS) {
        return Some(EntityPayload::Light(LightEntity {
            name: address.name.clone(),
            address: Some(ga),
            ..LightEntity::default()
        }));
    }
    if let Some(&(_, sensor_type)) = SENSOR_KEYWORDS
        .iter()
        .find(|(keyword, _)| mentions(&tokens, &[*keyword]))
    {
        return Some(sensor(address, sensor_type));
    }
    if mentions(&tokens, COVER_KEYWORDS) {
        return Some(EntityPayload::Cover(CoverEntity {
            name: address.name.clone(),
            move_long_address: Some(ga),
            ..CoverEntity::default()
        }));
    }
    if tokens.iter().any(|t| t == "status") {
        return Some(binary_sensor(address));
    }
    if tokens.iter().any(|t| t == "on" || t == "off") || mentions(&tokens, SWITCH_KEYWORDS) {
        return Some(switch(address));
    }
    None
}

impl Strategy for FallbackClassifier {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn apply(&self, ctx: &StrategyContext<'_>, remaining: &[&RawAddress]) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::default();
        for address in remaining {
            outcome.push(self.classify(ctx, address));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use knxha_domain::catalog::Catalog;
    use knxha_domain::dpt::DptNormalizer;
    use knxha_domain::entity::EntityDomain;

    use super::*;

    fn address(name: &str, dpt: Option<&str>) -> RawAddress {
        RawAddress {
            id: "GA-1".into(),
            name: name.into(),
            address: "5/0/1".parse().unwrap(),
            dpt: dpt.map(str::to_string),
            description: None,
            security: None,
        }
    }

    fn classify(name: &str, dpt: Option<&str>) -> MappedEntity {
        let catalog = Catalog::default();
        let dpts = DptNormalizer::new();
        let ctx = StrategyContext::new(&catalog, &dpts);
        FallbackClassifier.classify(&ctx, &address(name, dpt))
    }

    #[test]
    fn should_classify_by_dpt_first() {
        assert_eq!(classify("Anything", Some("1.001")).domain(), EntityDomain::Switch);
        assert_eq!(
            classify("Door status", Some("1.019")).domain(),
            EntityDomain::BinarySensor
        );
        assert_eq!(classify("Dimmer", Some("3.007")).domain(), EntityDomain::Light);
        assert_eq!(classify("Level", Some("5.001")).domain(), EntityDomain::Light);
        assert_eq!(classify("Clock", Some("10.001")).domain(), EntityDomain::Time);
        assert_eq!(classify("Today", Some("11.001")).domain(), EntityDomain::Date);
        assert_eq!(classify("Now", Some("19.001")).domain(), EntityDomain::DateTime);
        assert_eq!(classify("Mood", Some("17.001")).domain(), EntityDomain::Scene);
    }

    #[test]
    fn should_map_float_to_typed_sensor() {
        let entity = classify("Outside", Some("9.001"));
        let EntityPayload::Sensor(sensor) = entity.payload else {
            panic!("expected a sensor");
        };
        assert_eq!(sensor.sensor_type, "temperature");
    }

    #[test]
    fn should_treat_movement_as_cover_unless_door() {
        assert_eq!(classify("Blind", Some("1.008")).domain(), EntityDomain::Cover);
        assert_eq!(classify("Garage gate", Some("1.008")).domain(), EntityDomain::Switch);
    }

    #[test]
    fn should_fall_back_to_keywords_without_dpt() {
        assert_eq!(classify("Kitchen light", None).domain(), EntityDomain::Light);
        assert_eq!(classify("LA4", None).domain(), EntityDomain::Light);
        assert_eq!(classify("Room temperature", None).domain(), EntityDomain::Sensor);
        assert_eq!(classify("Rolluik", None).domain(), EntityDomain::Cover);
        assert_eq!(classify("Alarm status", None).domain(), EntityDomain::BinarySensor);
        assert_eq!(classify("Central off", None).domain(), EntityDomain::Switch);
    }

    #[test]
    fn should_keep_unrecognised_address_as_unknown() {
        let entity = classify("Spare", Some("16.000"));
        let EntityPayload::Unknown(unknown) = entity.payload else {
            panic!("expected unknown");
        };
        assert_eq!(unknown.address.to_string(), "5/0/1");
        assert_eq!(unknown.dpt.as_deref(), Some("16.000"));
        assert_eq!(entity.ids, ["GA-1"]);
    }

    #[test]
    fn should_derive_co2_sensor_type() {
        let EntityPayload::Sensor(sensor) = classify("CO2 office", None).payload else {
            panic!("expected a sensor");
        };
        assert_eq!(sensor.sensor_type, "ppm");
    }

    #[test]
    fn should_match_whole_keywords_only() {
        assert_eq!(classify("Garden lights", None).domain(), EntityDomain::Light);
        assert_eq!(classify("Hall dimmer", None).domain(), EntityDomain::Light);
        assert_eq!(classify("Dimension", None).domain(), EntityDomain::Unknown);
        assert_eq!(classify("Front doorbell", Some("1.008")).domain(), EntityDomain::Cover);
        assert_eq!(classify("Front doors", Some("1.008")).domain(), EntityDomain::Switch);
        assert_eq!(classify("Screenshot", None).domain(), EntityDomain::Unknown);
    }
}
