use anyhow::{Context, Result};

use crate::domain::edits::Edits;
use crate::domain::query::FeatureQuery;
use crate::domain::value_objects::{Credentials, Token};

// ─────────────────────────────────────────────────────────────────────────────
// Request parameter builders
// ─────────────────────────────────────────────────────────────────────────────

/// Query-string parameters for `{layer}/query`.
///
/// Geometry and attachments are only requested when the query asks for
/// geometry; otherwise the service default applies.
pub fn query_params(query: &FeatureQuery, token: Option<&Token>) -> Vec<(&'static str, String)> {
    let mut params = vec![("f", query.format.as_param().to_string())];
    if let Some(token) = token {
        params.push(("token", token.as_str().to_string()));
    }
    if query.return_geometry {
        params.push(("returnGeometry", "true".to_string()));
        params.push(("returnAttachments", "true".to_string()));
    }
    params.push(("where", query.where_clause.clone()));
    params.push(("outFields", query.out_fields.clone()));
    params
}

/// Form body for `{layer}/applyEdits`. Features are JSON-encoded lists of
/// `{"attributes": {...}}`; deletes are comma-separated identifiers.
pub fn edit_form(edits: &Edits, token: Option<&Token>) -> Result<Vec<(&'static str, String)>> {
    let mut form = vec![("f", "json".to_string())];
    if let Some(token) = token {
        form.push(("token", token.as_str().to_string()));
    }
    if !edits.adds.is_empty() {
        let adds = serde_json::to_string(&edits.adds).context("Failed to encode adds")?;
        form.push(("adds", adds));
    }
    if !edits.updates.is_empty() {
        let updates = serde_json::to_string(&edits.updates).context("Failed to encode updates")?;
        form.push(("updates", updates));
    }
    if !edits.deletes.is_empty() {
        let deletes: Vec<String> = edits.deletes.iter().map(i64::to_string).collect();
        form.push(("deletes", deletes.join(",")));
    }
    Ok(form)
}

/// Form body for the portal `generateToken` endpoint.
pub fn token_form(credentials: &Credentials, referer: &str) -> Vec<(&'static str, String)> {
    vec![
        ("username", credentials.username.clone()),
        ("password", credentials.password.clone()),
        ("referer", referer.to_string()),
    ]
}
