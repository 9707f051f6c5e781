use serde::{Deserialize, Serialize};

/// A hosted table or layer: the feature-service URL plus the numeric layer id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerRef {
    pub service_url: String,
    #[serde(default)]
    pub layer: u32,
}

impl LayerRef {
    pub fn new(service_url: impl Into<String>, layer: u32) -> Self {
        Self {
            service_url: service_url.into(),
            layer,
        }
    }

    /// Layer metadata endpoint, e.g. `https://host/FeatureServer/0`.
    pub fn base_url(&self) -> String {
        format!("{}/{}", self.service_url.trim_end_matches('/'), self.layer)
    }

    /// Endpoint for an operation on this layer (`query`, `applyEdits`, ...).
    pub fn endpoint(&self, operation: &str) -> String {
        format!("{}/{}", self.base_url(), operation)
    }
}

impl std::fmt::Display for LayerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// Operator identity exchanged for a [`Token`]. Never persisted.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque bearer token. Its lifetime belongs to the remote service and is not
/// tracked here.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(pub String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// SHA-256 hex fingerprint of a table's canonical row content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Returns the raw hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Columns removed from the authoritative table before comparison
/// (e.g. edit-tracking fields the target maintains itself).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludedColumns(pub Vec<String>);

impl ExcludedColumns {
    pub fn contains(&self, col: &str) -> bool {
        self.0.iter().any(|c| c == col)
    }
}

impl<S: Into<String>> FromIterator<S> for ExcludedColumns {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_trailing_slash() {
        let layer = LayerRef::new("https://host/arcgis/rest/services/Logs/FeatureServer/", 2);
        assert_eq!(
            layer.endpoint("query"),
            "https://host/arcgis/rest/services/Logs/FeatureServer/2/query"
        );
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let creds = Credentials::new("ops", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(!format!("{:?}", Token("abc123".into())).contains("abc123"));
    }
}
