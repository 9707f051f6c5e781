use serde_json::Value;

use crate::domain::error::SyncError;
use crate::domain::table::Table;

/// Check that `new` can be submitted in place of `original`: same number of
/// columns, same names in the same order, same type per column.
///
/// A column's type is its declared field type when both tables declare it,
/// otherwise the JSON kind of its first non-null value. Columns with no
/// non-null value match any type.
pub fn columns_compare(original: &Table, new: &Table) -> Result<(), SyncError> {
    let org_cols = original.columns();
    let new_cols = new.columns();

    if org_cols.len() != new_cols.len() {
        return Err(SyncError::SchemaMismatch(format!(
            "column count differs: {} has {}, {} has {}",
            original.name(),
            org_cols.len(),
            new.name(),
            new_cols.len()
        )));
    }

    if org_cols != new_cols {
        return Err(SyncError::SchemaMismatch(format!(
            "column names differ: [{}] vs [{}]",
            org_cols.join(", "),
            new_cols.join(", ")
        )));
    }

    for column in &org_cols {
        let (org_type, new_type) = match (original.field_type(column), new.field_type(column)) {
            (Some(a), Some(b)) => (Some(a.to_string()), Some(b.to_string())),
            _ => (inferred_kind(original, column), inferred_kind(new, column)),
        };
        if let (Some(a), Some(b)) = (org_type, new_type) {
            if a != b {
                return Err(SyncError::SchemaMismatch(format!(
                    "column `{}` type differs: {} vs {}",
                    column, a, b
                )));
            }
        }
    }

    Ok(())
}

fn inferred_kind(table: &Table, column: &str) -> Option<String> {
    let value = table
        .rows()
        .filter_map(|r| r.get(column))
        .find(|v| !v.is_null())?;
    let kind = match value {
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "null",
    };
    Some(kind.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{FieldDescriptor, FieldType};
    use crate::domain::table::{Feature, RowMap};
    use serde_json::json;

    fn table(rows: Value) -> Table {
        let rows: Vec<RowMap> = serde_json::from_value(rows).unwrap();
        Table::from_rows("t", rows)
    }

    #[test]
    fn matching_tables_pass() {
        let a = table(json!([{"UID": "1", "n": 1}]));
        let b = table(json!([{"UID": "2", "n": 5}, {"UID": "3", "n": null}]));
        assert_eq!(columns_compare(&a, &b), Ok(()));
    }

    #[test]
    fn count_mismatch() {
        let a = table(json!([{"UID": "1", "n": 1}]));
        let b = table(json!([{"UID": "1"}]));
        let err = columns_compare(&a, &b).unwrap_err();
        assert!(err.to_string().contains("column count differs"));
    }

    #[test]
    fn name_mismatch() {
        let a = table(json!([{"UID": "1", "n": 1}]));
        let b = table(json!([{"UID": "1", "m": 1}]));
        let err = columns_compare(&a, &b).unwrap_err();
        assert!(err.to_string().contains("column names differ"));
    }

    #[test]
    fn inferred_type_mismatch() {
        let a = table(json!([{"n": 1}]));
        let b = table(json!([{"n": "1"}]));
        let err = columns_compare(&a, &b).unwrap_err();
        assert!(err.to_string().contains("`n` type differs"));
    }

    #[test]
    fn declared_types_take_precedence() {
        let declared = |t: FieldType| {
            Table::new(
                "t",
                vec![FieldDescriptor::new("When", t)],
                vec![Feature::new(serde_json::from_value(json!({"When": 0})).unwrap())],
            )
        };
        let date = declared(FieldType::Date);
        assert!(columns_compare(&date, &declared(FieldType::Integer)).is_err());
        assert!(columns_compare(&date, &declared(FieldType::Date)).is_ok());
    }
}
