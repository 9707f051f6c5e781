use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::domain::edits::Edits;
use crate::domain::error::SyncError;
use crate::domain::field::FieldDescriptor;
use crate::domain::ports::{FeatureService, TokenProvider};
use crate::domain::query::{FeatureQuery, QueryResponse};
use crate::domain::value_objects::{Credentials, LayerRef, Token};
use crate::infrastructure::arcgis::params::{edit_form, query_params, token_form};
use crate::infrastructure::arcgis::response::{ErrorEnvelope, LayerInfo, TokenResponse};
use crate::infrastructure::config::{HttpConfig, PortalConfig};

/// REST client for a hosted portal and its feature services.
///
/// Holds at most one token; every request made after [`ArcGisClient::with_token`]
/// carries it.
pub struct ArcGisClient {
    http: Client,
    token_url: String,
    referer: String,
    token: Option<Token>,
}

/// Build an unauthenticated client for the portal described in `portal`.
pub fn connect(portal: &PortalConfig, http: &HttpConfig) -> Result<ArcGisClient> {
    let client = Client::builder()
        .timeout(http.timeout())
        .user_agent(concat!("layersync/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    debug!(token_url = %portal.token_url, timeout_secs = http.timeout_secs, "HTTP client ready");

    Ok(ArcGisClient {
        http: client,
        token_url: portal.token_url.clone(),
        referer: portal.referer.clone(),
        token: None,
    })
}

impl ArcGisClient {
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    async fn get_json(
        &self,
        url: &str,
        params: &[(&'static str, String)],
        layer: &LayerRef,
    ) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SyncError::RemoteQueryFailure {
                layer: layer.to_string(),
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            }
            .into());
        }

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to decode response from {}", url))?;

        if let Some(err) = ErrorEnvelope::from_body(&body) {
            return Err(SyncError::RemoteQueryFailure {
                layer: layer.to_string(),
                status: err.status(),
                message: err.describe(),
            }
            .into());
        }
        Ok(body)
    }
}

#[async_trait]
impl TokenProvider for ArcGisClient {
    async fn generate_token(&self, credentials: &Credentials) -> Result<Token> {
        debug!(url = %self.token_url, user = %credentials.username, "Requesting token");

        let body: Value = self
            .http
            .post(&self.token_url)
            .query(&[("f", "json")])
            .form(&token_form(credentials, &self.referer))
            .send()
            .await
            .context("Failed to reach token endpoint")?
            .error_for_status()
            .context("Token endpoint returned an error")?
            .json()
            .await
            .context("Failed to decode token response")?;

        if let Some(err) = ErrorEnvelope::from_body(&body) {
            return Err(anyhow!("Token generation failed: {}", err.describe()));
        }

        let parsed: TokenResponse =
            serde_json::from_value(body).context("Failed to parse token response")?;
        let token = parsed
            .token
            .ok_or_else(|| anyhow!("No token in token response"))?;

        debug!(expires = ?parsed.expires, "Token issued");
        Ok(Token(token))
    }
}

#[async_trait]
impl FeatureService for ArcGisClient {
    async fn query(&self, layer: &LayerRef, query: &FeatureQuery) -> Result<QueryResponse> {
        let url = layer.endpoint("query");
        debug!(
            url = %url,
            where_clause = %query.where_clause,
            out_fields = %query.out_fields,
            "Executing query"
        );

        let body = self
            .get_json(&url, &query_params(query, self.token.as_ref()), layer)
            .await?;
        serde_json::from_value(body)
            .with_context(|| format!("Failed to parse query response from {}", url))
    }

    async fn layer_fields(&self, layer: &LayerRef) -> Result<Vec<FieldDescriptor>> {
        let url = layer.base_url();
        let mut params = vec![("f", "json".to_string())];
        if let Some(token) = &self.token {
            params.push(("token", token.as_str().to_string()));
        }

        let body = self.get_json(&url, &params, layer).await?;
        let info: LayerInfo = serde_json::from_value(body)
            .with_context(|| format!("Failed to parse layer metadata from {}", url))?;
        info.fields
            .ok_or_else(|| SyncError::MissingFields(layer.to_string()).into())
    }

    async fn apply_edits(&self, layer: &LayerRef, edits: &Edits) -> Result<Value> {
        let url = layer.endpoint("applyEdits");
        debug!(
            url = %url,
            adds = edits.adds.len(),
            updates = edits.updates.len(),
            deletes = edits.deletes.len(),
            "Applying edits"
        );

        let form = edit_form(edits, self.token.as_ref())?;
        let body = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?
            .error_for_status()
            .with_context(|| format!("applyEdits on {} returned an error status", layer))?
            .json()
            .await
            .with_context(|| format!("Failed to decode applyEdits response from {}", url))?;
        Ok(body)
    }
}
