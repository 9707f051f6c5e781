use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{
    edits::Edits,
    field::FieldDescriptor,
    query::{FeatureQuery, QueryResponse},
    value_objects::{Credentials, LayerRef, Token},
};

/// Port: exchange operator credentials for a bearer token
/// (implemented by `ArcGisClient`).
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn generate_token(&self, credentials: &Credentials) -> Result<Token>;
}

/// Port: read and write access to hosted layers
/// (implemented by `ArcGisClient` and `InMemoryFeatureService`).
#[async_trait]
pub trait FeatureService: Send + Sync {
    /// Run one unpaged query. Non-success responses fail with
    /// `SyncError::RemoteQueryFailure`.
    async fn query(&self, layer: &LayerRef, query: &FeatureQuery) -> Result<QueryResponse>;

    /// Field descriptors from the layer metadata.
    async fn layer_fields(&self, layer: &LayerRef) -> Result<Vec<FieldDescriptor>>;

    /// Submit an `applyEdits` payload and return the decoded response as-is.
    async fn apply_edits(&self, layer: &LayerRef, edits: &Edits) -> Result<Value>;
}
