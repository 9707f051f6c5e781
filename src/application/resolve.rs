use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::domain::error::SyncError;
use crate::domain::ports::FeatureService;
use crate::domain::query::{equals_filter, FeatureQuery};
use crate::domain::value_objects::LayerRef;

/// Find the service row identifier of the row whose `key_field` equals `key`.
///
/// The key is escaped before it goes into the filter. With several matches the
/// first one wins; with none this fails with `SyncError::LookupMiss`.
pub async fn locate_object_id(
    service: &dyn FeatureService,
    layer: &LayerRef,
    key_field: &str,
    key: &str,
    object_id_field: &str,
) -> Result<Value> {
    let query = FeatureQuery::matching(equals_filter(key_field, key)).out_fields(object_id_field);
    let response = service.query(layer, &query).await?;

    let first = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| SyncError::LookupMiss {
            layer: layer.to_string(),
            field: key_field.to_string(),
            value: key.to_string(),
        })?;

    let object_id = first
        .attributes
        .get(object_id_field)
        .cloned()
        .ok_or_else(|| SyncError::missing_column(layer.to_string(), object_id_field))?;

    debug!(layer = %layer, key, %object_id, "Resolved row identifier");
    Ok(object_id)
}
