use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::edits::EditOutcome;
use crate::domain::table::{Feature, RowMap};
use crate::domain::value_objects::Fingerprint;

/// Columns of one target row that differ from the authoritative row.
/// Produced by the planner before the service identifier is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingUpdate {
    /// Business key of the row, as a string.
    pub key: String,
    /// Column → authoritative value. Never empty.
    pub changes: BTreeMap<String, Value>,
}

/// A pending update bound to the service row identifier it will be applied to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSet {
    pub key: String,
    pub object_id_field: String,
    pub object_id: Value,
    pub changes: BTreeMap<String, Value>,
}

impl ChangeSet {
    pub fn new(pending: PendingUpdate, object_id_field: &str, object_id: Value) -> Self {
        Self {
            key: pending.key,
            object_id_field: object_id_field.to_string(),
            object_id,
            changes: pending.changes,
        }
    }

    /// Wire record: the changed columns plus the identifier field.
    pub fn to_feature(&self) -> Feature {
        let mut attributes: RowMap = self.changes.clone();
        attributes.insert(self.object_id_field.clone(), self.object_id.clone());
        Feature::new(attributes)
    }
}

/// What the reconciler would change, computed without writing anything.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectPlan {
    pub key_column: String,
    /// Authoritative columns compared against the target, in table order.
    pub compared_columns: Vec<String>,
    pub rows_compared: usize,
    /// Authoritative keys with no target row. Reported, never inserted.
    pub unmatched_keys: Vec<String>,
    pub pending: Vec<PendingUpdate>,
    pub source_fingerprint: Fingerprint,
    pub target_fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedUpdate {
    pub change_set: ChangeSet,
    /// Raw `applyEdits` response for this row.
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub rows_compared: usize,
    /// Rows whose update the service accepted.
    pub rows_changed: usize,
    /// Column values written by the accepted updates.
    pub columns_changed: usize,
    pub unmatched_keys: usize,
    /// Updates whose response reported a rejected record.
    pub failed_updates: usize,
}

/// Result of one project-info reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSyncReport {
    pub sync_id: String,
    pub created_at: String,
    pub key_column: String,
    pub source_fingerprint: Fingerprint,
    pub target_fingerprint: Fingerprint,
    pub compared_columns: Vec<String>,
    pub unmatched_keys: Vec<String>,
    pub updates: Vec<AppliedUpdate>,
    pub summary: SyncSummary,
}

impl ProjectSyncReport {
    pub fn new(plan: ProjectPlan, updates: Vec<AppliedUpdate>) -> Self {
        let accepted: Vec<&AppliedUpdate> = updates
            .iter()
            .filter(|u| EditOutcome::from_response(&u.response).is_success())
            .collect();
        let columns_changed = accepted.iter().map(|u| u.change_set.changes.len()).sum();
        let rows_changed = accepted.len();
        let failed_updates = updates.len() - rows_changed;

        ProjectSyncReport {
            sync_id: format!(
                "ps_{}_{}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                Uuid::new_v4().simple()
            ),
            created_at: Utc::now().to_rfc3339(),
            key_column: plan.key_column,
            source_fingerprint: plan.source_fingerprint,
            target_fingerprint: plan.target_fingerprint,
            summary: SyncSummary {
                rows_compared: plan.rows_compared,
                rows_changed,
                columns_changed,
                unmatched_keys: plan.unmatched_keys.len(),
                failed_updates,
            },
            compared_columns: plan.compared_columns,
            unmatched_keys: plan.unmatched_keys,
            updates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn change_set_feature_carries_identifier() {
        let pending = PendingUpdate {
            key: "7".into(),
            changes: [("Status".to_string(), json!("Open"))].into_iter().collect(),
        };
        let cs = ChangeSet::new(pending, "OBJECTID", json!(42));
        assert_eq!(
            serde_json::to_value(cs.to_feature()).unwrap(),
            json!({"attributes": {"Status": "Open", "OBJECTID": 42}})
        );
    }

    #[test]
    fn unset_value_is_wire_null() {
        let pending = PendingUpdate {
            key: "7".into(),
            changes: [("Notes".to_string(), Value::Null)].into_iter().collect(),
        };
        let feature = ChangeSet::new(pending, "OBJECTID", json!(1)).to_feature();
        let wire = serde_json::to_string(&feature).unwrap();
        assert_eq!(wire, r#"{"attributes":{"Notes":null,"OBJECTID":1}}"#);
    }

    #[test]
    fn rejected_updates_do_not_count_as_changed() {
        let applied = |key: &str, success: bool| AppliedUpdate {
            change_set: ChangeSet::new(
                PendingUpdate {
                    key: key.into(),
                    changes: [("A".to_string(), json!(1)), ("B".to_string(), json!(2))]
                        .into_iter()
                        .collect(),
                },
                "OBJECTID",
                json!(1),
            ),
            response: json!({"updateResults": [{"objectId": 1, "success": success}]}),
        };
        let plan = ProjectPlan {
            key_column: "UID".into(),
            compared_columns: vec!["UID".into(), "A".into(), "B".into()],
            rows_compared: 2,
            unmatched_keys: vec![],
            pending: vec![],
            source_fingerprint: Fingerprint("s".into()),
            target_fingerprint: Fingerprint("t".into()),
        };

        let report = ProjectSyncReport::new(plan, vec![applied("1", true), applied("2", false)]);
        assert_eq!(report.summary.rows_changed, 1);
        assert_eq!(report.summary.columns_changed, 2);
        assert_eq!(report.summary.failed_updates, 1);
        assert_eq!(report.updates.len(), 2);
    }
}
