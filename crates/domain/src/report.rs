//! Diagnostics collected while assembling a catalog.

use serde::{Deserialize, Serialize};

use crate::record::Role;

/// A com-object binding whose role stayed `unknown` after inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedRole {
    pub com_object: String,
    pub address_id: String,
}

/// Address and com object disagree on the datapoint type. The address wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DptConflict {
    pub address_id: String,
    pub address: String,
    pub address_dpt: String,
    pub com_object: String,
    pub com_object_dpt: String,
}

/// The same com object bound the same address under two roles. The first
/// role seen wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRoleBinding {
    pub address_id: String,
    pub com_object: String,
    pub kept: Role,
    pub dropped: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureSummary {
    pub secure_addresses: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl SecureSummary {
    #[must_use]
    pub fn from_count(secure_addresses: usize) -> Self {
        let hint = (secure_addresses > 0).then(|| {
            format!(
                "{secure_addresses} group address(es) use KNX Data Secure; \
                 Home Assistant needs the project keyring to talk to them"
            )
        });
        Self {
            secure_addresses,
            hint,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    /// Ids of addresses without a usable datapoint type.
    pub missing_dpts: Vec<String>,
    pub unresolved_roles: Vec<UnresolvedRole>,
    pub dpt_conflicts: Vec<DptConflict>,
    pub duplicate_role_bindings: Vec<DuplicateRoleBinding>,
    pub secure: SecureSummary,
    pub notes: Vec<String>,
}

impl ParseReport {
    /// Whether anything beyond plain notes was recorded.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        !(self.missing_dpts.is_empty()
            && self.unresolved_roles.is_empty()
            && self.dpt_conflicts.is_empty()
            && self.duplicate_role_bindings.is_empty()
            && self.secure.secure_addresses == 0)
    }

    /// Pretty-printed JSON form.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialization failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_add_hint_only_when_secure_addresses_exist() {
        assert!(SecureSummary::from_count(0).hint.is_none());
        let summary = SecureSummary::from_count(3);
        assert!(summary.hint.unwrap().starts_with("3 group address"));
    }

    #[test]
    fn should_report_no_findings_when_empty() {
        let mut report = ParseReport::default();
        report.notes.push("recovered foo.xml".into());
        assert!(!report.has_findings());
        report.missing_dpts.push("GA-1".into());
        assert!(report.has_findings());
    }

    #[test]
    fn should_serialize_roles_in_duplicate_bindings() {
        let report = ParseReport {
            duplicate_role_bindings: vec![DuplicateRoleBinding {
                address_id: "GA-1".into(),
                com_object: "CO-1".into(),
                kept: Role::Write,
                dropped: Role::Status,
            }],
            ..ParseReport::default()
        };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["duplicate_role_bindings"][0]["kept"], "write");
        assert_eq!(json["duplicate_role_bindings"][0]["dropped"], "status");
        assert_eq!(json["secure"]["secure_addresses"], 0);
    }
}
