use serde::Serialize;
use serde_json::Value;

use crate::domain::table::Feature;

/// One `applyEdits` payload. Empty lists are not transmitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edits {
    pub adds: Vec<Feature>,
    pub updates: Vec<Feature>,
    pub deletes: Vec<i64>,
}

impl Edits {
    pub fn adds(adds: Vec<Feature>) -> Self {
        Self {
            adds,
            ..Self::default()
        }
    }

    pub fn updates(updates: Vec<Feature>) -> Self {
        Self {
            updates,
            ..Self::default()
        }
    }

    pub fn deletes(deletes: Vec<i64>) -> Self {
        Self {
            deletes,
            ..Self::default()
        }
    }
}

/// A single per-record entry of an `applyEdits` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditResult {
    pub kind: &'static str,
    pub object_id: Option<i64>,
    pub error: Option<String>,
}

/// Per-record reading of an `applyEdits` response.
///
/// The write gateway hands back the raw response; this is for callers that
/// want to know which records the service rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditOutcome {
    pub succeeded: Vec<EditResult>,
    pub failed: Vec<EditResult>,
}

impl EditOutcome {
    pub fn from_response(response: &Value) -> Self {
        let mut outcome = EditOutcome::default();
        for (key, kind) in [
            ("addResults", "add"),
            ("updateResults", "update"),
            ("deleteResults", "delete"),
        ] {
            let Some(entries) = response.get(key).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                let success = entry.get("success").and_then(Value::as_bool).unwrap_or(false);
                let result = EditResult {
                    kind,
                    object_id: entry.get("objectId").and_then(Value::as_i64),
                    error: entry
                        .get("error")
                        .and_then(|e| e.get("description"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                };
                if success {
                    outcome.succeeded.push(result);
                } else {
                    outcome.failed.push(result);
                }
            }
        }
        // A top-level error envelope means nothing was applied.
        if let Some(err) = response.get("error") {
            outcome.failed.push(EditResult {
                kind: "request",
                object_id: None,
                error: err
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
        outcome
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_successes_and_failures() {
        let outcome = EditOutcome::from_response(&json!({
            "addResults": [{"objectId": 10, "success": true}],
            "updateResults": [{
                "objectId": 4,
                "success": false,
                "error": {"code": 1019, "description": "Invalid field: Status"}
            }],
            "deleteResults": []
        }));
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.succeeded[0].object_id, Some(10));
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].kind, "update");
        assert_eq!(outcome.failed[0].error.as_deref(), Some("Invalid field: Status"));
        assert!(!outcome.is_success());
    }

    #[test]
    fn error_envelope_is_a_failure() {
        let outcome = EditOutcome::from_response(&json!({
            "error": {"code": 498, "message": "Invalid token."}
        }));
        assert!(!outcome.is_success());
        assert_eq!(outcome.failed[0].error.as_deref(), Some("Invalid token."));
    }
}
