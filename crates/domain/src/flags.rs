//! Communication-object flags and their canonicalization.
//!
//! Project files spell flags under several historical attribute names
//! (`TransmitFlag` vs `SendFlag`, `UpdateFlag` vs `ResponseFlag`, …). The
//! scanner collects every `*Flag` attribute into [`RawFlags`] and folds them
//! into a single [`ComObjectFlags`] right away; nothing downstream looks at
//! the raw spelling again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A flag attribute value as found in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Text(String),
}

impl FlagValue {
    /// Coerce textual `"true"`/`"false"` into [`FlagValue::Bool`], keep
    /// anything else as text.
    #[must_use]
    pub fn from_attribute(value: &str) -> Self {
        match value.trim() {
            v if v.eq_ignore_ascii_case("true") => Self::Bool(true),
            v if v.eq_ignore_ascii_case("false") => Self::Bool(false),
            other => Self::Text(other.to_string()),
        }
    }

    /// Whether the flag counts as set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Text(text) => ["enabled", "true", "1", "yes"]
                .iter()
                .any(|on| text.eq_ignore_ascii_case(on)),
        }
    }
}

/// Flag attributes keyed by their attribute name as written.
pub type RawFlags = BTreeMap<String, FlagValue>;

/// Canonical flag set of a communication object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComObjectFlags {
    pub communicate: bool,
    pub read: bool,
    pub write: bool,
    pub transmit: bool,
    pub update: bool,
    pub read_on_init: bool,
    /// `*Flag` attributes with no canonical meaning, kept for visibility.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, FlagValue>,
}

#[derive(Clone, Copy)]
enum Canonical {
    Communicate,
    Read,
    Write,
    Transmit,
    Update,
    ReadOnInit,
}

fn canonical_name(attribute: &str) -> Option<Canonical> {
    let key = attribute.to_ascii_lowercase();
    let canonical = match key.as_str() {
        "communicationflag" | "commflag" => Canonical::Communicate,
        "readflag" => Canonical::Read,
        "writeflag" => Canonical::Write,
        "transmitflag" | "sendflag" => Canonical::Transmit,
        "updateflag" | "responseflag" => Canonical::Update,
        "readoninitflag" | "initflag" => Canonical::ReadOnInit,
        _ => return None,
    };
    Some(canonical)
}

impl ComObjectFlags {
    /// Fold raw flag attributes into the canonical set.
    ///
    /// A canonical flag is set if any of its spellings is set.
    #[must_use]
    pub fn from_raw(raw: &RawFlags) -> Self {
        let mut flags = Self::default();
        for (name, value) in raw {
            let Some(canonical) = canonical_name(name) else {
                flags.other.insert(name.clone(), value.clone());
                continue;
            };
            let slot = match canonical {
                Canonical::Communicate => &mut flags.communicate,
                Canonical::Read => &mut flags.read,
                Canonical::Write => &mut flags.write,
                Canonical::Transmit => &mut flags.transmit,
                Canonical::Update => &mut flags.update,
                Canonical::ReadOnInit => &mut flags.read_on_init,
            };
            *slot |= value.is_set();
        }
        flags
    }

    /// Any flag that marks the object as reporting its state.
    #[must_use]
    pub fn reports_state(&self) -> bool {
        self.read || self.update || self.transmit
    }
}
