//! ManagedClusterIntent CRD
//!
//! Hub-side record of a cluster that should be imported. Cluster-scoped:
//! the resource name is the cluster's unique name on the hub. Sources
//! (or an operator) create intents; the importer only mutates status.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type set by the importer once an import attempt finishes.
pub const CONDITION_IMPORTED: &str = "Imported";

/// Condition reason recorded on a successful import.
pub const REASON_IMPORT_SUCCEED: &str = "ImportSucceed";

/// Condition reason recorded on a failed import.
pub const REASON_IMPORT_ERROR: &str = "ImportError";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "fleet.microscaler.io",
    version = "v1alpha1",
    kind = "ManagedClusterIntent",
    status = "ManagedClusterIntentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterIntentSpec {
    /// Human-readable name of the cluster (defaults to the resource name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Name of the source that discovered this cluster; change events for
    /// this intent are routed back to that source's work keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Identifier of the cluster in the external system it was discovered from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterIntentStatus {
    /// Observed conditions, at most one entry per condition type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<IntentCondition>,
}

/// A single typed condition on a ManagedClusterIntent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntentCondition {
    /// Condition type, e.g. "Imported"
    #[serde(rename = "type")]
    pub type_: String,

    /// "True" or "False"
    pub status: String,

    /// Machine-readable reason for the last transition
    pub reason: String,

    /// Human-readable message carrying the underlying error text, if any
    pub message: String,

    /// When the status value last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl IntentCondition {
    /// Build a condition with the transition time set to now.
    pub fn new(type_: &str, status: bool, reason: &str, message: &str) -> Self {
        Self {
            type_: type_.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: Some(Utc::now()),
        }
    }
}

/// Upsert `condition` into `conditions`, keyed by condition type.
///
/// The transition time of an existing entry is preserved when the status
/// value is unchanged, so repeated identical writes do not churn the
/// resource history.
pub fn set_condition(conditions: &mut Vec<IntentCondition>, condition: IntentCondition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                existing.reason = condition.reason;
                existing.message = condition.message;
            } else {
                *existing = condition;
            }
        }
        None => conditions.push(condition),
    }
}

/// True when `conditions` carries `type_` with status "True".
pub fn is_condition_true(conditions: &[IntentCondition], type_: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.type_ == type_ && c.status == "True")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_condition_inserts_new_type() {
        let mut conditions = Vec::new();
        set_condition(
            &mut conditions,
            IntentCondition::new(CONDITION_IMPORTED, true, REASON_IMPORT_SUCCEED, "ok"),
        );

        assert_eq!(conditions.len(), 1);
        assert!(is_condition_true(&conditions, CONDITION_IMPORTED));
    }

    #[test]
    fn set_condition_replaces_on_status_flip() {
        let mut conditions = vec![IntentCondition::new(
            CONDITION_IMPORTED,
            false,
            REASON_IMPORT_ERROR,
            "boom",
        )];
        let old_time = conditions[0].last_transition_time;

        set_condition(
            &mut conditions,
            IntentCondition::new(CONDITION_IMPORTED, true, REASON_IMPORT_SUCCEED, "ok"),
        );

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, "True");
        assert_eq!(conditions[0].reason, REASON_IMPORT_SUCCEED);
        // Status flipped, so the transition time must move
        assert!(conditions[0].last_transition_time >= old_time);
    }

    #[test]
    fn set_condition_keeps_transition_time_when_status_unchanged() {
        let mut conditions = vec![IntentCondition {
            type_: CONDITION_IMPORTED.to_string(),
            status: "False".to_string(),
            reason: REASON_IMPORT_ERROR.to_string(),
            message: "first failure".to_string(),
            last_transition_time: Some(chrono::DateTime::UNIX_EPOCH),
        }];

        set_condition(
            &mut conditions,
            IntentCondition::new(CONDITION_IMPORTED, false, REASON_IMPORT_ERROR, "second failure"),
        );

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message, "second failure");
        assert_eq!(
            conditions[0].last_transition_time,
            Some(chrono::DateTime::UNIX_EPOCH)
        );
    }

    #[test]
    fn is_condition_true_ignores_other_types() {
        let conditions = vec![IntentCondition::new("Accepted", true, "Accepted", "")];
        assert!(!is_condition_true(&conditions, CONDITION_IMPORTED));
    }
}
