use anyhow::Result;
use tracing::{debug, info};

use crate::domain::dates::convert_date_value;
use crate::domain::ports::FeatureService;
use crate::domain::query::FeatureQuery;
use crate::domain::table::Table;
use crate::domain::value_objects::LayerRef;

/// Switches for [`fetch_table`]. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Request geometry (GeoJSON) and attachments.
    pub geometry: bool,
    /// Render date fields as Alaska local time strings.
    pub convert_dates: bool,
    /// Strip the service row identifier column.
    pub drop_object_id: bool,
}

impl FetchOptions {
    pub fn with_geometry(mut self) -> Self {
        self.geometry = true;
        self
    }

    pub fn convert_dates(mut self) -> Self {
        self.convert_dates = true;
        self
    }

    pub fn drop_object_id(mut self) -> Self {
        self.drop_object_id = true;
        self
    }
}

/// Pull every row of `layer` into a [`Table`] with one unpaged query.
///
/// Results the service truncates are not detected. Date conversion needs the
/// layer's field descriptors; GeoJSON responses do not carry them, so they are
/// read from the layer metadata in that case.
pub async fn fetch_table(
    service: &dyn FeatureService,
    layer: &LayerRef,
    options: FetchOptions,
) -> Result<Table> {
    let mut query = FeatureQuery::all();
    if options.geometry {
        query = query.with_geometry();
    }

    let response = service.query(layer, &query).await?;

    let fields = match response.fields {
        Some(fields) => fields,
        None if options.convert_dates => service.layer_fields(layer).await?,
        None => Vec::new(),
    };

    let mut table = Table::new(layer.to_string(), fields, response.features);

    if options.drop_object_id {
        if let Some(dropped) = table.drop_object_id() {
            debug!(layer = %layer, column = dropped, "Dropped identifier column");
        }
    }

    if options.convert_dates {
        for column in table.date_columns() {
            table.map_column(&column, convert_date_value);
        }
    }

    info!(layer = %layer, rows = table.len(), "Fetched table");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{FieldDescriptor, FieldType};
    use crate::domain::table::RowMap;
    use crate::infrastructure::memory::InMemoryFeatureService;
    use serde_json::json;

    fn layer() -> LayerRef {
        LayerRef::new("memory://inspections", 0)
    }

    fn service() -> InMemoryFeatureService {
        let row: RowMap =
            serde_json::from_value(json!({"Site": "A", "Inspected": 0, "Closed": null})).unwrap();
        InMemoryFeatureService::new().with_layer(
            layer(),
            vec![
                FieldDescriptor::new("OBJECTID", FieldType::Oid),
                FieldDescriptor::new("Site", FieldType::String),
                FieldDescriptor::new("Inspected", FieldType::Date),
                FieldDescriptor::new("Closed", FieldType::Date),
            ],
            vec![row],
        )
    }

    #[tokio::test]
    async fn plain_fetch_keeps_identifier_and_raw_dates() {
        let svc = service();
        let table = fetch_table(&svc, &layer(), FetchOptions::default()).await.unwrap();
        let row = table.rows().next().unwrap();
        assert_eq!(row["OBJECTID"], json!(1));
        assert_eq!(row["Inspected"], json!(0));
    }

    #[tokio::test]
    async fn converts_dates_and_drops_identifier() {
        let svc = service();
        let options = FetchOptions::default().convert_dates().drop_object_id();
        let table = fetch_table(&svc, &layer(), options).await.unwrap();

        assert!(!table.has_column("OBJECTID"));
        let row = table.rows().next().unwrap();
        assert_eq!(row["Inspected"], json!("December 31, 1969   14:00"));
        assert_eq!(row["Closed"], json!(null));
    }

    #[tokio::test]
    async fn geojson_fetch_reads_fields_from_layer_metadata() {
        let svc = service();
        let options = FetchOptions::default().with_geometry().convert_dates();
        let table = fetch_table(&svc, &layer(), options).await.unwrap();

        assert_eq!(table.field_type("Inspected"), Some(&FieldType::Date));
        let row = table.rows().next().unwrap();
        assert_eq!(row["Inspected"], json!("December 31, 1969   14:00"));
    }
}
