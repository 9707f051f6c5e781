use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::error::SyncError;
use crate::domain::field::{FieldDescriptor, FieldType};

/// Type alias for a hosted row: sorted map of column name → JSON value.
///
/// A missing value is JSON `null` everywhere in the pipeline.
pub type RowMap = BTreeMap<String, Value>;

/// Names the service uses for its row identifier, in the order they are tried
/// when stripping it from a fetched table.
pub const OBJECT_ID_SYNONYMS: [&str; 6] = ["ObjectId", "objectid", "OBJECTID", "Fid", "fid", "FID"];

/// One hosted row. Doubles as the `{"attributes": {...}}` wire record.
///
/// GeoJSON responses carry the attributes under `properties`; both spellings
/// deserialize into `attributes`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, alias = "properties", deserialize_with = "null_as_empty")]
    pub attributes: RowMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
}

impl Feature {
    pub fn new(attributes: RowMap) -> Self {
        Self {
            attributes,
            geometry: None,
        }
    }
}

impl From<RowMap> for Feature {
    fn from(attributes: RowMap) -> Self {
        Self::new(attributes)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<RowMap, D::Error> {
    Ok(Option::<RowMap>::deserialize(d)?.unwrap_or_default())
}

/// An in-memory hosted table: declared fields plus the rows in the order the
/// service returned them.
///
/// Rows are schema-less maps; the column set of the table is the declared
/// fields followed by any undeclared keys found in the rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    name: String,
    fields: Vec<FieldDescriptor>,
    features: Vec<Feature>,
}

impl Table {
    pub fn new(
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
        features: Vec<Feature>,
    ) -> Self {
        Self {
            name: name.into(),
            fields,
            features,
        }
    }

    /// Build an undeclared table straight from rows.
    pub fn from_rows(name: impl Into<String>, rows: impl IntoIterator<Item = RowMap>) -> Self {
        Self::new(name, Vec::new(), rows.into_iter().map(Feature::new).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn rows(&self) -> impl Iterator<Item = &RowMap> {
        self.features.iter().map(|f| &f.attributes)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Ordered column names: declared fields first, then undeclared row keys.
    pub fn columns(&self) -> Vec<String> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut cols = Vec::new();
        let declared = self.fields.iter().map(|f| f.name.as_str());
        let found = self.features.iter().flat_map(|f| f.attributes.keys().map(String::as_str));
        for name in declared.chain(found) {
            if seen.insert(name) {
                cols.push(name.to_string());
            }
        }
        cols
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.iter().any(|f| f.name == column)
            || self.features.iter().any(|f| f.attributes.contains_key(column))
    }

    pub fn require_column(&self, column: &str) -> Result<(), SyncError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(SyncError::missing_column(&self.name, column))
        }
    }

    pub fn field_type(&self, column: &str) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == column)
            .map(|f| &f.field_type)
    }

    /// Names of the columns declared as dates.
    pub fn date_columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.field_type.is_date())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Values of `column` in row order; rows lacking the key read as null.
    pub fn column_values(&self, column: &str) -> Result<Vec<&Value>, SyncError> {
        self.require_column(column)?;
        Ok(self
            .features
            .iter()
            .map(|f| f.attributes.get(column).unwrap_or(&Value::Null))
            .collect())
    }

    /// Remove the first present identifier synonym from rows and fields.
    ///
    /// Only one synonym is removed even if several coexist. Returns the
    /// removed name.
    pub fn drop_object_id(&mut self) -> Option<&'static str> {
        let found = OBJECT_ID_SYNONYMS
            .iter()
            .copied()
            .find(|name| self.has_column(name))?;
        self.remove_column(found);
        Some(found)
    }

    pub fn remove_column(&mut self, column: &str) {
        self.fields.retain(|f| f.name != column);
        for f in &mut self.features {
            f.attributes.remove(column);
        }
    }

    /// Keep only the listed columns.
    pub fn retain_columns(&mut self, keep: &BTreeSet<String>) {
        self.fields.retain(|f| keep.contains(&f.name));
        for f in &mut self.features {
            f.attributes.retain(|k, _| keep.contains(k));
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        for field in &mut self.fields {
            if field.name == from {
                field.name = to.to_string();
            }
        }
        for f in &mut self.features {
            if let Some(v) = f.attributes.remove(from) {
                f.attributes.insert(to.to_string(), v);
            }
        }
    }

    /// Add (or overwrite) a column computed from each row.
    pub fn insert_column(
        &mut self,
        column: &str,
        field_type: FieldType,
        mut value_of: impl FnMut(&RowMap) -> Value,
    ) {
        if !self.fields.is_empty() && self.field_type(column).is_none() {
            self.fields.push(FieldDescriptor::new(column, field_type));
        }
        for f in &mut self.features {
            let v = value_of(&f.attributes);
            f.attributes.insert(column.to_string(), v);
        }
    }

    /// Apply `convert` to every non-null value of `column`.
    pub fn map_column(&mut self, column: &str, mut convert: impl FnMut(&Value) -> Value) {
        for f in &mut self.features {
            if let Some(v) = f.attributes.get_mut(column) {
                if !v.is_null() {
                    *v = convert(v);
                }
            }
        }
    }

    /// Keep the rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&RowMap) -> bool) {
        self.features.retain(|f| keep(&f.attributes));
    }
}

/// Render a scalar the way it reads in a table cell: strings raw, null empty,
/// everything else as JSON text.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn drop_object_id_removes_only_first_synonym() {
        let mut t = Table::from_rows(
            "t",
            vec![row(&[("objectid", json!(1)), ("FID", json!(9)), ("Name", json!("A"))])],
        );
        assert_eq!(t.drop_object_id(), Some("objectid"));
        assert_eq!(t.columns(), vec!["FID", "Name"]);
    }

    #[test]
    fn drop_object_id_is_idempotent() {
        let fields = vec![
            FieldDescriptor::new("OBJECTID", FieldType::Oid),
            FieldDescriptor::new("Name", FieldType::String),
        ];
        let mut once = Table::new(
            "t",
            fields,
            vec![Feature::new(row(&[("OBJECTID", json!(1)), ("Name", json!("A"))]))],
        );
        once.drop_object_id();
        let mut twice = once.clone();
        twice.drop_object_id();
        assert_eq!(once, twice);
    }

    #[test]
    fn columns_keep_declared_order_then_extras() {
        let t = Table::new(
            "t",
            vec![
                FieldDescriptor::new("Zeta", FieldType::String),
                FieldDescriptor::new("Alpha", FieldType::String),
            ],
            vec![Feature::new(row(&[("Alpha", json!(1)), ("Extra", json!(2))]))],
        );
        assert_eq!(t.columns(), vec!["Zeta", "Alpha", "Extra"]);
    }

    #[test]
    fn require_column_reports_table_name() {
        let t = Table::from_rows("logs", vec![row(&[("a", json!(1))])]);
        assert_eq!(
            t.require_column("b"),
            Err(SyncError::missing_column("logs", "b"))
        );
    }

    #[test]
    fn geojson_feature_reads_properties_as_attributes() {
        let f: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "properties": {"Name": "A"},
            "geometry": {"type": "Point", "coordinates": [-149.9, 61.2]}
        }))
        .unwrap();
        assert_eq!(f.attributes["Name"], json!("A"));
        assert!(f.geometry.is_some());
    }

    #[test]
    fn wire_record_omits_absent_geometry() {
        let f = Feature::new(row(&[("Name", json!("A"))]));
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            json!({"attributes": {"Name": "A"}})
        );
    }
}
