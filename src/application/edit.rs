use anyhow::Result;
use serde_json::Value;
use tracing::info;

use crate::domain::edits::Edits;
use crate::domain::ports::FeatureService;
use crate::domain::table::{display_value, Feature, Table};
use crate::domain::value_objects::LayerRef;

// ─── Record encoder ───

/// Turn a table into `{"attributes": {...}}` wire records, one per row.
///
/// Values of date-typed columns are sent as strings; everything else passes
/// through unchanged.
pub fn encode_table(table: &Table) -> Vec<Feature> {
    let date_columns = table.date_columns();
    table
        .features()
        .iter()
        .map(|feature| {
            let mut record = feature.clone();
            for column in &date_columns {
                if let Some(v) = record.attributes.get_mut(column) {
                    if !v.is_null() && !v.is_string() {
                        *v = Value::String(display_value(v));
                    }
                }
            }
            record
        })
        .collect()
}

// ─── Write gateway ───

/// One `applyEdits` call.
#[derive(Debug, Clone)]
pub enum EditOperation {
    /// Encode the table and submit it as a single add batch.
    Add(Table),
    /// Pre-built wire records; unset values are already JSON null.
    Update(Vec<Feature>),
    /// Service row identifiers.
    Delete(Vec<i64>),
}

impl EditOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            EditOperation::Add(_) => "add",
            EditOperation::Update(_) => "update",
            EditOperation::Delete(_) => "delete",
        }
    }

    fn into_edits(self) -> Edits {
        match self {
            EditOperation::Add(table) => Edits::adds(encode_table(&table)),
            EditOperation::Update(records) => Edits::updates(records),
            EditOperation::Delete(ids) => Edits::deletes(ids),
        }
    }
}

/// Submit `operation` and return the service response untouched. Inspecting
/// per-record results is up to the caller (see `EditOutcome`).
pub async fn apply_edit(
    service: &dyn FeatureService,
    layer: &LayerRef,
    operation: EditOperation,
) -> Result<Value> {
    let kind = operation.kind();
    let edits = operation.into_edits();
    let records = edits.adds.len() + edits.updates.len() + edits.deletes.len();

    let response = service.apply_edits(layer, &edits).await?;

    info!(layer = %layer, kind, records, "applyEdits submitted");
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{FieldDescriptor, FieldType};
    use crate::domain::table::RowMap;
    use crate::infrastructure::memory::InMemoryFeatureService;
    use serde_json::json;

    fn row(v: Value) -> RowMap {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn encoder_stringifies_date_columns_only() {
        let table = Table::new(
            "t",
            vec![
                FieldDescriptor::new("When", FieldType::Date),
                FieldDescriptor::new("Count", FieldType::Integer),
            ],
            vec![
                Feature::new(row(json!({"When": 1700000000000_i64, "Count": 3}))),
                Feature::new(row(json!({"When": null, "Count": 4}))),
            ],
        );
        let records = encode_table(&table);
        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([
                {"attributes": {"When": "1700000000000", "Count": 3}},
                {"attributes": {"When": null, "Count": 4}}
            ])
        );
    }

    #[tokio::test]
    async fn gateway_routes_each_kind() {
        let layer = LayerRef::new("memory://t", 0);
        let svc = InMemoryFeatureService::new().with_layer(
            layer.clone(),
            vec![FieldDescriptor::new("OBJECTID", FieldType::Oid)],
            vec![row(json!({"Name": "A"}))],
        );

        let added = apply_edit(
            &svc,
            &layer,
            EditOperation::Add(Table::from_rows("new", vec![row(json!({"Name": "B"}))])),
        )
        .await
        .unwrap();
        assert_eq!(added["addResults"][0]["objectId"], json!(2));

        let updated = apply_edit(
            &svc,
            &layer,
            EditOperation::Update(vec![Feature::new(row(json!({"OBJECTID": 1, "Name": null})))]),
        )
        .await
        .unwrap();
        assert_eq!(updated["updateResults"][0]["success"], json!(true));

        let deleted = apply_edit(&svc, &layer, EditOperation::Delete(vec![2]))
            .await
            .unwrap();
        assert_eq!(deleted["deleteResults"][0]["success"], json!(true));

        let rows = svc.rows(&layer);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Name"], Value::Null);
    }
}
