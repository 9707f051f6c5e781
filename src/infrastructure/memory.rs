use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::edits::Edits;
use crate::domain::error::SyncError;
use crate::domain::field::{FieldDescriptor, FieldType};
use crate::domain::ports::FeatureService;
use crate::domain::query::{FeatureQuery, QueryResponse, ResponseFormat};
use crate::domain::table::{display_value, Feature, RowMap};
use crate::domain::value_objects::LayerRef;

const DEFAULT_OID_FIELD: &str = "OBJECTID";

/// In-process implementation of [`FeatureService`].
///
/// Understands the two filters this crate issues (`1=1` and
/// `<field> = '<value>'`), assigns identifiers on add, and records every
/// `applyEdits` call. Useful for dry runs against captured data and for tests.
#[derive(Default)]
pub struct InMemoryFeatureService {
    layers: Mutex<BTreeMap<LayerRef, MemoryLayer>>,
    edit_log: Mutex<Vec<(LayerRef, Edits)>>,
}

struct MemoryLayer {
    fields: Vec<FieldDescriptor>,
    features: Vec<Feature>,
    oid_field: String,
    next_oid: i64,
    read_only: bool,
}

impl MemoryLayer {
    fn position_of(&self, oid: i64) -> Option<usize> {
        self.features
            .iter()
            .position(|f| f.attributes.get(&self.oid_field).and_then(Value::as_i64) == Some(oid))
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn layer_missing(layer: &LayerRef) -> anyhow::Error {
    SyncError::RemoteQueryFailure {
        layer: layer.to_string(),
        status: 400,
        message: "Invalid URL".to_string(),
    }
    .into()
}

impl InMemoryFeatureService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer. Rows without an identifier get one assigned.
    pub fn with_layer(
        self,
        layer: LayerRef,
        fields: Vec<FieldDescriptor>,
        rows: Vec<RowMap>,
    ) -> Self {
        let oid_field = fields
            .iter()
            .find(|f| f.field_type == FieldType::Oid)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| DEFAULT_OID_FIELD.to_string());

        let mut next_oid = rows
            .iter()
            .filter_map(|r| r.get(&oid_field).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;

        let features = rows
            .into_iter()
            .map(|mut attributes| {
                attributes.entry(oid_field.clone()).or_insert_with(|| {
                    next_oid += 1;
                    json!(next_oid - 1)
                });
                Feature::new(attributes)
            })
            .collect();

        lock(&self.layers).insert(
            layer,
            MemoryLayer {
                fields,
                features,
                oid_field,
                next_oid,
                read_only: false,
            },
        );
        self
    }

    /// A read-only layer acknowledges edits with `success: false` and keeps
    /// its rows unchanged.
    pub fn set_read_only(&self, layer: &LayerRef, read_only: bool) {
        if let Some(l) = lock(&self.layers).get_mut(layer) {
            l.read_only = read_only;
        }
    }

    /// Current rows of `layer`, identifiers included.
    pub fn rows(&self, layer: &LayerRef) -> Vec<RowMap> {
        lock(&self.layers)
            .get(layer)
            .map(|l| l.features.iter().map(|f| f.attributes.clone()).collect())
            .unwrap_or_default()
    }

    /// Every `applyEdits` call received, in order.
    pub fn edit_log(&self) -> Vec<(LayerRef, Edits)> {
        lock(&self.edit_log).clone()
    }
}

/// Parsed form of the filters this crate builds.
enum Filter {
    All,
    Equals { field: String, literal: String },
}

fn parse_filter(where_clause: &str) -> Option<Filter> {
    let clause = where_clause.trim();
    if clause.replace(' ', "") == "1=1" {
        return Some(Filter::All);
    }
    let (field, rhs) = clause.split_once('=')?;
    let rhs = rhs.trim();
    let literal = match rhs.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => rhs.to_string(),
    };
    Some(Filter::Equals {
        field: field.trim().to_string(),
        literal,
    })
}

fn select_fields(row: &RowMap, out_fields: &str) -> RowMap {
    if out_fields.trim() == "*" {
        return row.clone();
    }
    let wanted: Vec<&str> = out_fields.split(',').map(str::trim).collect();
    row.iter()
        .filter(|(k, _)| wanted.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[async_trait]
impl FeatureService for InMemoryFeatureService {
    async fn query(&self, layer: &LayerRef, query: &FeatureQuery) -> Result<QueryResponse> {
        let layers = lock(&self.layers);
        let data = layers.get(layer).ok_or_else(|| layer_missing(layer))?;

        let filter = parse_filter(&query.where_clause).ok_or_else(|| SyncError::RemoteQueryFailure {
            layer: layer.to_string(),
            status: 400,
            message: format!("Invalid query: {}", query.where_clause),
        })?;

        let features = data
            .features
            .iter()
            .filter(|f| match &filter {
                Filter::All => true,
                Filter::Equals { field, literal } => f
                    .attributes
                    .get(field)
                    .is_some_and(|v| display_value(v) == *literal),
            })
            .map(|f| Feature {
                attributes: select_fields(&f.attributes, &query.out_fields),
                geometry: if query.return_geometry {
                    f.geometry.clone()
                } else {
                    None
                },
            })
            .collect();

        let fields = match query.format {
            ResponseFormat::Json => Some(data.fields.clone()),
            ResponseFormat::GeoJson => None,
        };

        Ok(QueryResponse { fields, features })
    }

    async fn layer_fields(&self, layer: &LayerRef) -> Result<Vec<FieldDescriptor>> {
        let layers = lock(&self.layers);
        let data = layers.get(layer).ok_or_else(|| layer_missing(layer))?;
        Ok(data.fields.clone())
    }

    async fn apply_edits(&self, layer: &LayerRef, edits: &Edits) -> Result<Value> {
        lock(&self.edit_log).push((layer.clone(), edits.clone()));

        let mut layers = lock(&self.layers);
        let data = layers.get_mut(layer).ok_or_else(|| layer_missing(layer))?;

        let rejected = |oid: Option<i64>, description: &str| {
            json!({
                "objectId": oid,
                "success": false,
                "error": {"code": 1000, "description": description}
            })
        };

        let mut add_results = Vec::with_capacity(edits.adds.len());
        for feature in &edits.adds {
            if data.read_only {
                add_results.push(rejected(None, "Layer is read-only."));
                continue;
            }
            let oid = data.next_oid;
            data.next_oid += 1;
            let mut stored = feature.clone();
            stored.attributes.insert(data.oid_field.clone(), json!(oid));
            data.features.push(stored);
            add_results.push(json!({"objectId": oid, "success": true}));
        }

        let mut update_results = Vec::with_capacity(edits.updates.len());
        for feature in &edits.updates {
            let oid = feature.attributes.get(&data.oid_field).and_then(Value::as_i64);
            match oid.and_then(|oid| data.position_of(oid)) {
                Some(_) if data.read_only => {
                    update_results.push(rejected(oid, "Layer is read-only."))
                }
                Some(idx) => {
                    let target = &mut data.features[idx];
                    for (k, v) in &feature.attributes {
                        target.attributes.insert(k.clone(), v.clone());
                    }
                    if feature.geometry.is_some() {
                        target.geometry = feature.geometry.clone();
                    }
                    update_results.push(json!({"objectId": oid, "success": true}));
                }
                None => update_results.push(rejected(oid, "Object is missing.")),
            }
        }

        let mut delete_results = Vec::with_capacity(edits.deletes.len());
        for &oid in &edits.deletes {
            match data.position_of(oid) {
                Some(_) if data.read_only => {
                    delete_results.push(rejected(Some(oid), "Layer is read-only."))
                }
                Some(idx) => {
                    data.features.remove(idx);
                    delete_results.push(json!({"objectId": oid, "success": true}));
                }
                None => delete_results.push(rejected(Some(oid), "Object is missing.")),
            }
        }

        Ok(json!({
            "addResults": add_results,
            "updateResults": update_results,
            "deleteResults": delete_results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::edits::EditOutcome;
    use crate::domain::query::equals_filter;

    fn layer() -> LayerRef {
        LayerRef::new("memory://projects", 0)
    }

    fn service() -> InMemoryFeatureService {
        let rows: Vec<RowMap> = vec![
            serde_json::from_value(json!({"UID": "7", "Name": "O'Hara"})).unwrap(),
            serde_json::from_value(json!({"UID": "8", "Name": "B"})).unwrap(),
        ];
        InMemoryFeatureService::new().with_layer(
            layer(),
            vec![
                FieldDescriptor::new("OBJECTID", FieldType::Oid),
                FieldDescriptor::new("UID", FieldType::String),
                FieldDescriptor::new("Name", FieldType::String),
            ],
            rows,
        )
    }

    #[tokio::test]
    async fn assigns_identifiers_and_filters_by_escaped_literal() {
        let svc = service();
        let q = FeatureQuery::matching(equals_filter("Name", "O'Hara")).out_fields("OBJECTID");
        let resp = svc.query(&layer(), &q).await.unwrap();
        assert_eq!(resp.features.len(), 1);
        let expected: RowMap = serde_json::from_value(json!({"OBJECTID": 1})).unwrap();
        assert_eq!(resp.features[0].attributes, expected);
    }

    #[tokio::test]
    async fn add_update_delete_round() {
        let svc = service();
        let add = Feature::new(serde_json::from_value(json!({"UID": "9"})).unwrap());
        let upd = Feature::new(
            serde_json::from_value(json!({"OBJECTID": 2, "Name": "C"})).unwrap(),
        );
        let resp = svc
            .apply_edits(
                &layer(),
                &Edits {
                    adds: vec![add],
                    updates: vec![upd],
                    deletes: vec![1, 99],
                },
            )
            .await
            .unwrap();

        let outcome = EditOutcome::from_response(&resp);
        assert_eq!(outcome.succeeded.len(), 3);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].object_id, Some(99));

        let rows = svc.rows(&layer());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Name"], json!("C"));
        assert_eq!(rows[1]["OBJECTID"], json!(3));
        assert_eq!(svc.edit_log().len(), 1);
    }

    #[tokio::test]
    async fn unknown_layer_is_a_query_failure() {
        let svc = service();
        let err = svc
            .query(&LayerRef::new("memory://nope", 0), &FeatureQuery::all())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::RemoteQueryFailure { status: 400, .. })
        ));
    }
}
