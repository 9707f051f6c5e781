use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::changeset::PendingUpdate;
use crate::domain::table::{display_value, RowMap, Table};

/// Comparable form of a business key: strings raw, numbers in decimal.
pub fn key_string(v: &Value) -> String {
    display_value(v)
}

/// Result of diffing two tables on a business key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedDiff {
    /// Distinct authoritative keys that had a target row to compare with.
    pub rows_compared: usize,
    /// Distinct authoritative keys with no target row.
    pub unmatched_keys: Vec<String>,
    pub pending: Vec<PendingUpdate>,
}

/// Diff `source` (authoritative) against `target` on `key_column`, comparing
/// only `columns`.
///
/// Keys are visited in source order and each distinct key once; with duplicate
/// keys on either side the first row wins. Equality is strict JSON equality, so
/// `1` and `"1"` differ. A column a row lacks reads as null. The key column
/// itself is never part of a change. Keys only present in `target` are ignored,
/// and rows whose key is null or absent take no part on either side.
pub fn diff_by_key(
    source: &Table,
    target: &Table,
    key_column: &str,
    columns: &[String],
) -> KeyedDiff {
    let mut target_index: BTreeMap<String, &RowMap> = BTreeMap::new();
    for row in target.rows() {
        if let Some(key) = row.get(key_column).filter(|k| !k.is_null()) {
            target_index.entry(key_string(key)).or_insert(row);
        }
    }

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut diff = KeyedDiff::default();

    for source_row in source.rows() {
        let Some(key) = source_row
            .get(key_column)
            .filter(|k| !k.is_null())
            .map(key_string)
        else {
            continue;
        };
        if !seen.insert(key.clone()) {
            continue;
        }

        let Some(target_row) = target_index.get(&key) else {
            diff.unmatched_keys.push(key);
            continue;
        };
        diff.rows_compared += 1;

        let changes = diff_columns(source_row, target_row, key_column, columns);
        if !changes.is_empty() {
            diff.pending.push(PendingUpdate { key, changes });
        }
    }

    diff
}

fn diff_columns(
    source: &RowMap,
    target: &RowMap,
    key_column: &str,
    columns: &[String],
) -> BTreeMap<String, Value> {
    columns
        .iter()
        .filter(|col| col.as_str() != key_column)
        .filter_map(|col| {
            let source_val = source.get(col).unwrap_or(&Value::Null);
            let target_val = target.get(col).unwrap_or(&Value::Null);
            (source_val != target_val).then(|| (col.clone(), source_val.clone()))
        })
        .collect()
}
