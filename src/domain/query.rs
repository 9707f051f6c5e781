use serde::Deserialize;

use crate::domain::field::FieldDescriptor;
use crate::domain::table::Feature;

/// Response encoding requested from the query endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    GeoJson,
}

impl ResponseFormat {
    pub fn as_param(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::GeoJson => "geojson",
        }
    }
}

/// One unpaged query against a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureQuery {
    pub where_clause: String,
    pub out_fields: String,
    pub format: ResponseFormat,
    pub return_geometry: bool,
}

impl FeatureQuery {
    /// Every row, every field: `where=1=1`, `outFields=*`.
    pub fn all() -> Self {
        Self::matching("1=1")
    }

    pub fn matching(where_clause: impl Into<String>) -> Self {
        Self {
            where_clause: where_clause.into(),
            out_fields: "*".to_string(),
            format: ResponseFormat::Json,
            return_geometry: false,
        }
    }

    pub fn out_fields(mut self, fields: impl Into<String>) -> Self {
        self.out_fields = fields.into();
        self
    }

    /// Ask for geometry, delivered as GeoJSON.
    pub fn with_geometry(mut self) -> Self {
        self.return_geometry = true;
        self.format = ResponseFormat::GeoJson;
        self
    }
}

/// Build `<field> = '<value>'` with single quotes in the value doubled.
pub fn equals_filter(field: &str, value: &str) -> String {
    format!("{} = '{}'", field, value.replace('\'', "''"))
}

/// Body of a successful query response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub fields: Option<Vec<FieldDescriptor>>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equals_filter_escapes_quotes() {
        assert_eq!(equals_filter("UID", "O'Brien"), "UID = 'O''Brien'");
        assert_eq!(
            equals_filter("UID", "x' OR '1'='1"),
            "UID = 'x'' OR ''1''=''1'"
        );
    }

    #[test]
    fn with_geometry_switches_to_geojson() {
        let q = FeatureQuery::all().with_geometry();
        assert!(q.return_geometry);
        assert_eq!(q.format.as_param(), "geojson");
        assert_eq!(q.where_clause, "1=1");
    }

    #[test]
    fn query_response_without_fields() {
        let r: QueryResponse = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "properties": {"UID": "7"}, "geometry": null}]
        }))
        .unwrap();
        assert!(r.fields.is_none());
        assert_eq!(r.features.len(), 1);
        assert!(r.features[0].geometry.is_none());
    }
}
