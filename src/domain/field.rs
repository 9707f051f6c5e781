use serde::{Deserialize, Serialize};

/// Declared type of a hosted field (`esriFieldType*`).
///
/// Unknown type names are kept verbatim in [`FieldType::Other`] so a schema
/// round-trips even when the service grows new types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Oid,
    Integer,
    SmallInteger,
    Double,
    Single,
    String,
    Date,
    GlobalId,
    Guid,
    Geometry,
    Blob,
    Raster,
    Xml,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Oid => "esriFieldTypeOID",
            FieldType::Integer => "esriFieldTypeInteger",
            FieldType::SmallInteger => "esriFieldTypeSmallInteger",
            FieldType::Double => "esriFieldTypeDouble",
            FieldType::Single => "esriFieldTypeSingle",
            FieldType::String => "esriFieldTypeString",
            FieldType::Date => "esriFieldTypeDate",
            FieldType::GlobalId => "esriFieldTypeGlobalID",
            FieldType::Guid => "esriFieldTypeGUID",
            FieldType::Geometry => "esriFieldTypeGeometry",
            FieldType::Blob => "esriFieldTypeBlob",
            FieldType::Raster => "esriFieldTypeRaster",
            FieldType::Xml => "esriFieldTypeXML",
            FieldType::Other(s) => s,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, FieldType::Date)
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "esriFieldTypeOID" => FieldType::Oid,
            "esriFieldTypeInteger" => FieldType::Integer,
            "esriFieldTypeSmallInteger" => FieldType::SmallInteger,
            "esriFieldTypeDouble" => FieldType::Double,
            "esriFieldTypeSingle" => FieldType::Single,
            "esriFieldTypeString" => FieldType::String,
            "esriFieldTypeDate" => FieldType::Date,
            "esriFieldTypeGlobalID" => FieldType::GlobalId,
            "esriFieldTypeGUID" => FieldType::Guid,
            "esriFieldTypeGeometry" => FieldType::Geometry,
            "esriFieldTypeBlob" => FieldType::Blob,
            "esriFieldTypeRaster" => FieldType::Raster,
            "esriFieldTypeXML" => FieldType::Xml,
            _ => FieldType::Other(s),
        }
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `{"name", "type"}` entry of a layer's `fields` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_service_field_list() {
        let fields: Vec<FieldDescriptor> = serde_json::from_value(json!([
            {"name": "OBJECTID", "type": "esriFieldTypeOID", "alias": "OBJECTID"},
            {"name": "Inspected", "type": "esriFieldTypeDate", "length": 8},
            {"name": "Notes", "type": "esriFieldTypeBigInteger"},
        ]))
        .unwrap();

        assert_eq!(fields[0].field_type, FieldType::Oid);
        assert!(fields[1].field_type.is_date());
        assert_eq!(
            fields[2].field_type,
            FieldType::Other("esriFieldTypeBigInteger".into())
        );
    }

    #[test]
    fn unknown_type_serializes_verbatim() {
        let f = FieldDescriptor::new("x", FieldType::Other("esriFieldTypeBigInteger".into()));
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            json!({"name": "x", "type": "esriFieldTypeBigInteger"})
        );
    }
}
