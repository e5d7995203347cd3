//! Versioned JSON envelope for persisting a catalog between runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::SnapshotError;

pub const SNAPSHOT_VERSION: u64 = 1;
pub const SNAPSHOT_TOOL: &str = "knxha";

const REQUIRED_CATALOG_FIELDS: [&str; 4] = ["addresses", "devices", "tree", "stats"];

/// Options that influence classification of a catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    /// Drop every entity whose trimmed name is `reserve` (any case).
    pub drop_reserve: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub tool: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub options: ClassifyOptions,
    pub catalog: Catalog,
    /// Free-form user overrides, carried through untouched.
    #[serde(default)]
    pub overrides: BTreeMap<String, serde_json::Value>,
}

impl Snapshot {
    #[must_use]
    pub fn new(catalog: Catalog, options: ClassifyOptions, timestamp: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            tool: SNAPSHOT_TOOL.to_string(),
            timestamp,
            project_name: catalog.project_name.clone(),
            options,
            catalog,
            overrides: BTreeMap::new(),
        }
    }

    /// Pretty-printed JSON form.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialization failures.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a snapshot.
    ///
    /// The envelope is checked field by field before deserializing so that a
    /// truncated or foreign file gets a precise message.
    ///
    /// # Errors
    ///
    /// Returns a [`SnapshotError`] naming the first problem found: invalid
    /// JSON, a missing envelope or catalog field, a wrong version or a
    /// foreign tool identifier.
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        let version = value
            .get("version")
            .ok_or(SnapshotError::MissingField("version"))?;
        match version.as_u64() {
            Some(SNAPSHOT_VERSION) => {}
            Some(other) => return Err(SnapshotError::UnsupportedVersion(other)),
            None => return Err(SnapshotError::MissingField("version")),
        }

        let tool = value
            .get("tool")
            .and_then(serde_json::Value::as_str)
            .ok_or(SnapshotError::MissingField("tool"))?;
        if tool != SNAPSHOT_TOOL {
            return Err(SnapshotError::UnexpectedTool(tool.to_string()));
        }

        if value.get("timestamp").is_none() {
            return Err(SnapshotError::MissingField("timestamp"));
        }

        let catalog = value
            .get("catalog")
            .and_then(serde_json::Value::as_object)
            .ok_or(SnapshotError::MissingField("catalog"))?;
        for field in REQUIRED_CATALOG_FIELDS {
            if !catalog.contains_key(field) {
                return Err(SnapshotError::MissingCatalogField(field));
            }
        }

        Ok(serde_json::from_value(value)?)
    }
}
