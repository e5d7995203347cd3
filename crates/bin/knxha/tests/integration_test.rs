//! End-to-end tests for the full knxha pipeline.
//!
//! Each test builds a `.knxproj` archive in memory and runs it through the
//! real scanner, assembler, router and YAML renderer; nothing touches the
//! filesystem.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use knxha_adapter_knxproj::{KnxprojSource, ScannerConfig};
use knxha_adapter_yaml::{render_catalog, render_entities};
use knxha_app::ports::NoopProgress;
use knxha_app::services::{ImportOutcome, ImportService};
use knxha_domain::entity::{EntityDomain, EntityPayload};
use knxha_domain::snapshot::{ClassifyOptions, Snapshot};
use serde_yaml::Value;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn archive(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn group_addresses(addresses: &[(&str, &str, &str, &str)]) -> String {
    let body: String = addresses
        .iter()
        .map(|(id, address, name, dpt)| {
            format!(
                r#"<GroupAddress Id="{id}" Address="{address}" Name="{name}" DatapointType="{dpt}" />"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<KNX xmlns="http://knx.org/xml/project/21">
  <Project Id="P-0001">
    <ProjectInformation Name="Villa" />
    <Installations><Installation Name="">
      <GroupAddresses><GroupRanges>
        <GroupRange Id="R-0" Name="Lights" RangeStart="0" RangeEnd="2047">{body}</GroupRange>
      </GroupRanges></GroupAddresses>
    </Installation></Installations>
  </Project>
</KNX>"#
    )
}

/// A project without device links, classified by naming and topology.
fn legacy_project() -> Vec<u8> {
    let document = group_addresses(&[
        ("GA-1", "0/1/1", "LA1 X", "DPST-1-1"),
        ("GA-2", "0/5/1", "LA1 X", "DPST-1-1"),
        ("GA-3", "0/2/1", "LA1 X", "DPST-3-7"),
        ("GA-4", "0/3/1", "LA1 X", "DPST-5-1"),
        ("GA-5", "0/4/1", "LA1 X", "DPST-5-1"),
        ("GA-6", "2/0/1", "Pump", "DPST-1-1"),
        ("GA-7", "2/0/2", "Pump status", "DPST-1-1"),
        ("GA-8", "3/0/1", "Rolluik keuken lang", "DPST-1-8"),
        ("GA-9", "3/0/2", "Rolluik keuken kort", "DPST-1-7"),
        ("GA-10", "4/0/1", "Outside", "DPST-9-1"),
        ("GA-11", "5/0/1", "Reserve", "DPST-1-1"),
        ("GA-12", "6/0/1", "Spare", ""),
    ]);
    // a later member redeclares GA-10 under a new name
    let update = group_addresses(&[("GA-10", "4/0/1", "Garden temperature", "DPST-9-1")]);
    archive(&[
        ("knx_master.xml", "<KNX><MasterData /></KNX>"),
        ("P-0001/0.xml", &document),
        ("P-0001/1.xml", &update),
    ])
}

async fn import(bytes: &[u8], options: ClassifyOptions) -> ImportOutcome {
    ImportService::new(KnxprojSource::new(ScannerConfig::default()))
        .import(bytes, options, &NoopProgress)
        .await
        .unwrap()
}

#[tokio::test]
async fn should_build_la_light_from_five_addresses() {
    let outcome = import(&legacy_project(), ClassifyOptions::default()).await;
    let lights = outcome.entities.domain(EntityDomain::Light);
    assert_eq!(lights.len(), 1);
    assert_eq!(lights[0].ids.len(), 5);
    let EntityPayload::Light(light) = &lights[0].payload else {
        panic!("expected a light");
    };
    assert_eq!(light.address.unwrap().to_string(), "0/1/1");
    assert_eq!(light.state_address.unwrap().to_string(), "0/5/1");
    assert_eq!(light.dimming_address.unwrap().to_string(), "0/2/1");
    assert_eq!(light.brightness_address.unwrap().to_string(), "0/3/1");
    assert_eq!(light.brightness_state_address.unwrap().to_string(), "0/4/1");
}

#[tokio::test]
async fn should_keep_later_record_for_duplicate_id() {
    let outcome = import(&legacy_project(), ClassifyOptions::default()).await;
    let sensor = outcome.catalog.address("GA-10").unwrap();
    assert_eq!(sensor.name, "Garden temperature");
    assert_eq!(outcome.catalog.addresses.len(), 12);
    assert_eq!(outcome.catalog.project_name.as_deref(), Some("Villa"));
}

#[tokio::test]
async fn should_claim_every_address_exactly_once() {
    let outcome = import(&legacy_project(), ClassifyOptions::default()).await;
    let mut seen = HashSet::new();
    for id in outcome.entities.iter().flat_map(|e| e.ids.iter()) {
        assert!(seen.insert(id.as_str()), "{id} claimed twice");
    }
    assert_eq!(seen.len(), outcome.catalog.addresses.len());
    assert_eq!(outcome.report.missing_dpts, ["GA-12"]);
}

#[tokio::test]
async fn should_render_quoted_home_assistant_yaml() {
    let outcome = import(&legacy_project(), ClassifyOptions::default()).await;
    let yaml = render_entities(&outcome.entities).unwrap();

    let keys: Vec<&str> = yaml.lines().filter(|l| !l.starts_with(' ')).collect();
    assert_eq!(keys, ["switch:", "light:", "sensor:", "cover:", "unknown:"]);
    for line in yaml.lines() {
        let field = line.trim_start_matches([' ', '-']);
        if let Some((key, value)) = field.split_once(": ")
            && (key == "name" || key.ends_with("address"))
        {
            assert!(value.starts_with('"') && value.ends_with('"'), "{line}");
        }
    }

    let value: Value = serde_yaml::from_str(&yaml).unwrap();
    let switches = value["switch"].as_sequence().unwrap();
    assert_eq!(switches.len(), 2);
    assert_eq!(switches[0]["name"], Value::String("Pump".into()));
    assert_eq!(switches[0]["state_address"], Value::String("2/0/2".into()));
    assert_eq!(switches[1]["respond_to_read"], Value::Bool(true));
    assert_eq!(
        value["sensor"][0]["name"],
        Value::String("Garden temperature".into())
    );
    assert_eq!(value["sensor"][0]["type"], Value::String("temperature".into()));
}

#[tokio::test]
async fn should_drop_reserve_entities() {
    let outcome = import(&legacy_project(), ClassifyOptions { drop_reserve: true }).await;
    assert!(
        outcome
            .entities
            .iter()
            .all(|e| !e.name().eq_ignore_ascii_case("reserve"))
    );
    assert_eq!(outcome.entities.domain(EntityDomain::Switch).len(), 1);
}

const LINKED_PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<KNX xmlns="http://knx.org/xml/project/21">
  <Project Id="P-0002">
    <ProjectInformation Name="Office" />
    <Installations><Installation Name="">
      <Topology><Area Address="1"><Line Address="1">
        <DeviceInstance Id="DI-1" Name="Switch actuator" Address="5">
          <ComObjectInstanceRefs>
            <ComObjectInstanceRef Id="O-1" Text="Output A" DatapointType="DPST-1-1" CommunicationFlag="Enabled" WriteFlag="Enabled" ReadFlag="Enabled">
              <Connectors>
                <Send GroupAddressRefId="GA-1" />
                <Receive GroupAddressRefId="GA-2" />
              </Connectors>
            </ComObjectInstanceRef>
            <ComObjectInstanceRef Id="O-2" Text="Temperature" DatapointType="DPST-9-1" TransmitFlag="Enabled">
              <Connectors><Send GroupAddressRefId="GA-3" /></Connectors>
            </ComObjectInstanceRef>
          </ComObjectInstanceRefs>
        </DeviceInstance>
      </Line></Area></Topology>
      <GroupAddresses><GroupRanges>
        <GroupRange Id="R-1" Name="Office" RangeStart="2048" RangeEnd="4095">
          <GroupAddress Id="GA-1" Address="2049" Name="Desk lamp" DatapointType="DPST-1-1" />
          <GroupAddress Id="GA-2" Address="2050" Name="Desk lamp status" DatapointType="DPST-1-1" />
          <GroupAddress Id="GA-3" Address="2051" Name="Office temperature" DatapointType="DPST-9-1" Security="Auto" />
          <GroupAddress Id="GA-4" Address="2052" Name="Unlinked" />
        </GroupRange>
      </GroupRanges></GroupAddresses>
    </Installation></Installations>
  </Project>
</KNX>"#;

#[tokio::test]
async fn should_map_linked_project_through_com_objects() {
    let bytes = archive(&[("P-0002/0.xml", LINKED_PROJECT)]);
    let outcome = import(&bytes, ClassifyOptions::default()).await;

    assert_eq!(outcome.catalog.devices.len(), 1);
    assert!(outcome.catalog.has_bindings());
    assert_eq!(outcome.catalog.stats.secure_addresses, 1);
    assert!(outcome.report.secure.hint.is_some());

    let switches = outcome.entities.domain(EntityDomain::Switch);
    assert_eq!(switches.len(), 1);
    let EntityPayload::Switch(switch) = &switches[0].payload else {
        panic!("expected a switch");
    };
    assert_eq!(switch.address.to_string(), "1/0/1");
    assert_eq!(switch.state_address.unwrap().to_string(), "1/0/2");
    assert_eq!(outcome.entities.domain(EntityDomain::Sensor).len(), 1);
    assert_eq!(outcome.entities.domain(EntityDomain::Unknown).len(), 1);

    let catalog_yaml = render_catalog(&outcome.catalog).unwrap();
    let catalog: Value = serde_yaml::from_str(&catalog_yaml).unwrap();
    assert_eq!(catalog["project"], Value::String("Office".into()));
    assert_eq!(
        catalog["devices"][0]["channels"][0]["com_objects"][0]["flags"]["write"],
        Value::Bool(true)
    );
}

#[tokio::test]
async fn should_reclassify_restored_snapshot() {
    let service = ImportService::new(KnxprojSource::default());
    let outcome = service
        .import(&legacy_project(), ClassifyOptions::default(), &NoopProgress)
        .await
        .unwrap();
    let before = render_entities(&outcome.entities).unwrap();

    let json = service
        .snapshot(outcome.catalog, ClassifyOptions::default())
        .to_json()
        .unwrap();
    let restored = Snapshot::from_json(&json).unwrap();
    let after = render_entities(&service.classify_snapshot(&restored)).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn should_reject_non_zip_input() {
    let result = ImportService::new(KnxprojSource::default())
        .import(b"PK but not really", ClassifyOptions::default(), &NoopProgress)
        .await;
    assert!(result.is_err());
}
