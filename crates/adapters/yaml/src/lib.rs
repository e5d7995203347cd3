//! # knxha-adapter-yaml
//!
//! YAML adapter — renders classification results for Home Assistant.
//!
//! ## Outputs
//!
//! - [`render_entities`]: the Home Assistant `knx:` platform lists, one
//!   top-level key per non-empty domain in a fixed order. `name` and every
//!   `*address` field are always double-quoted so values like `1/1/1` or
//!   `on` survive a YAML round trip unchanged.
//! - [`render_catalog`]: the full catalog (project, statistics, topology,
//!   devices with canonical flags, indexes, links) for inspection.
//!
//! ## Dependency rule
//!
//! Depends on `knxha-domain` only; rendering is pure and does no IO.

mod error;

pub use error::RenderError;

use std::fmt::Write as _;

use knxha_domain::catalog::{AddressTree, Catalog, CatalogIndexes, CatalogStats, Device};
use knxha_domain::entity::{EntityDomain, HaEntities, MappedEntity};
use knxha_domain::record::Link;
use serde::Serialize;
use serde_yaml::Value;

/// Whether a field is always emitted as a double-quoted string.
fn is_quoted_key(key: &str) -> bool {
    key == "name" || key.ends_with("address")
}

fn scalar(key: &str, value: &Value) -> Result<String, RenderError> {
    if let Value::String(text) = value
        && (is_quoted_key(key) || text.contains('\n'))
    {
        return Ok(serde_json::to_string(text)?);
    }
    let rendered = serde_yaml::to_string(value)?;
    Ok(rendered.trim_end().to_string())
}

fn render_entity(out: &mut String, entity: &MappedEntity) -> Result<(), RenderError> {
    let Value::Mapping(fields) = serde_yaml::to_value(&entity.payload)? else {
        return Err(RenderError::NotAMapping {
            domain: entity.domain().to_string(),
            name: entity.name().to_string(),
        });
    };
    let mut prefix = "  - ";
    for (key, value) in &fields {
        let key = key.as_str().unwrap_or_default();
        writeln!(out, "{prefix}{key}: {}", scalar(key, value)?)?;
        prefix = "    ";
    }
    Ok(())
}

/// Render entities as the Home Assistant YAML document.
///
/// Domains appear in the order `switch, binary_sensor, light, sensor,
/// time, date, datetime, cover, scene, unknown`; empty domains are left out
/// and an empty set renders as `{}`.
///
/// # Errors
///
/// Returns [`RenderError`] if a payload cannot be encoded.
pub fn render_entities(entities: &HaEntities) -> Result<String, RenderError> {
    if entities.is_empty() {
        return Ok("{}\n".to_string());
    }
    let mut out = String::new();
    for domain in EntityDomain::ALL {
        let bucket = entities.domain(domain);
        if bucket.is_empty() {
            continue;
        }
        writeln!(out, "{domain}:")?;
        for entity in bucket {
            render_entity(&mut out, entity)?;
        }
    }
    tracing::debug!(
        entities = entities.len(),
        bytes = out.len(),
        "entities rendered"
    );
    Ok(out)
}

#[derive(Serialize)]
struct CatalogView<'a> {
    project: Option<&'a str>,
    stats: &'a CatalogStats,
    tree: &'a AddressTree,
    devices: &'a [Device],
    indexes: &'a CatalogIndexes,
    links: &'a [Link],
}

/// Render the full catalog as YAML.
///
/// # Errors
///
/// Returns [`RenderError::Yaml`] if the catalog cannot be encoded.
pub fn render_catalog(catalog: &Catalog) -> Result<String, RenderError> {
    let view = CatalogView {
        project: catalog.project_name.as_deref(),
        stats: &catalog.stats,
        tree: &catalog.tree,
        devices: &catalog.devices,
        indexes: &catalog.indexes,
        links: &catalog.links,
    };
    Ok(serde_yaml::to_string(&view)?)
}

#[cfg(test)]
mod tests {
    use knxha_domain::address::GroupAddress;
    use knxha_domain::entity::{
        CoverEntity, EntityPayload, LightEntity, SensorEntity, SwitchEntity, UnknownEntity,
    };

    use super::*;

    fn ga(raw: &str) -> GroupAddress {
        raw.parse().unwrap()
    }

    fn entities() -> HaEntities {
        let mut entities = HaEntities::new();
        entities.push(MappedEntity::new(
            EntityPayload::Unknown(UnknownEntity {
                name: "Spare".into(),
                address: ga("9/0/1"),
                dpt: Some("16.000".into()),
            }),
            vec!["u".into()],
        ));
        entities.push(MappedEntity::new(
            EntityPayload::Switch(SwitchEntity {
                name: "on".into(),
                address: ga("1/1/1"),
                state_address: Some(ga("1/1/2")),
                respond_to_read: false,
            }),
            vec!["a".into(), "b".into()],
        ));
        entities.push(MappedEntity::new(
            EntityPayload::Light(LightEntity {
                name: "Kitchen \"spots\"".into(),
                address: Some(ga("0/1/1")),
                brightness_address: Some(ga("0/3/1")),
                ..LightEntity::default()
            }),
            vec!["l".into()],
        ));
        entities.push(MappedEntity::new(
            EntityPayload::Sensor(SensorEntity {
                name: "Outside".into(),
                state_address: ga("4/0/1"),
                sensor_type: "temperature".into(),
            }),
            vec!["t".into()],
        ));
        entities
    }

    #[test]
    fn should_quote_names_and_addresses() {
        let yaml = render_entities(&entities()).unwrap();
        assert!(yaml.contains("  - name: \"on\"\n"));
        assert!(yaml.contains("    address: \"1/1/1\"\n"));
        assert!(yaml.contains("    state_address: \"1/1/2\"\n"));
        assert!(yaml.contains("    respond_to_read: false\n"));
        assert!(yaml.contains("    type: temperature\n"));
        assert!(yaml.contains("  - name: \"Kitchen \\\"spots\\\"\"\n"));
        for line in yaml.lines() {
            let Some((key, value)) = line.trim_start_matches([' ', '-']).split_once(": ") else {
                continue;
            };
            if is_quoted_key(key) {
                assert!(value.starts_with('"') && value.ends_with('"'), "{line}");
            }
        }
    }

    #[test]
    fn should_order_domains_and_omit_empty_ones() {
        let yaml = render_entities(&entities()).unwrap();
        let keys: Vec<&str> = yaml
            .lines()
            .filter(|l| !l.starts_with(' '))
            .collect();
        assert_eq!(keys, ["switch:", "light:", "sensor:", "unknown:"]);
    }

    #[test]
    fn should_produce_yaml_that_parses_back() {
        let yaml = render_entities(&entities()).unwrap();
        let value: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["switch"][0]["name"], Value::String("on".into()));
        assert_eq!(
            value["light"][0]["name"],
            Value::String("Kitchen \"spots\"".into())
        );
        assert_eq!(value["unknown"][0]["dpt"], Value::String("16.000".into()));
    }

    #[test]
    fn should_render_empty_entities_as_empty_mapping() {
        assert_eq!(render_entities(&HaEntities::new()).unwrap(), "{}\n");
    }

    #[test]
    fn should_keep_cover_booleans_unquoted() {
        let mut entities = HaEntities::new();
        entities.push(MappedEntity::new(
            EntityPayload::Cover(CoverEntity {
                name: "Blind".into(),
                move_long_address: Some(ga("3/0/1")),
                ..CoverEntity::default()
            }),
            vec!["c".into()],
        ));
        let yaml = render_entities(&entities).unwrap();
        assert_eq!(
            yaml,
            "cover:\n  - name: \"Blind\"\n    move_long_address: \"3/0/1\"\n    invert_updown: false\n    invert_position: false\n"
        );
    }

    #[test]
    fn should_render_catalog_sections() {
        let catalog = Catalog {
            project_name: Some("Villa".into()),
            ..Catalog::default()
        };
        let yaml = render_catalog(&catalog).unwrap();
        let value: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["project"], Value::String("Villa".into()));
        for section in ["stats", "tree", "devices", "indexes", "links"] {
            assert!(value.get(section).is_some(), "missing {section}");
        }
    }
}
