use serde::Deserialize;
use serde_json::Value;

use crate::domain::field::FieldDescriptor;
use crate::domain::table::display_value;

/// `{"error": {"code": 498, "message": "Invalid token.", "details": []}}`
///
/// The REST API reports most failures with HTTP 200 and this envelope. Its
/// fields are loosely typed in practice (`code` as a number or a string,
/// `details` null or holding non-strings), so each is read leniently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<Vec<Value>>,
    #[serde(skip)]
    raw: Value,
}

impl ErrorEnvelope {
    /// Extract the envelope from a decoded body. Any top-level `error` key
    /// yields one, whatever its shape.
    pub fn from_body(body: &Value) -> Option<Self> {
        let error = body.get("error")?;
        let mut envelope: ErrorEnvelope =
            serde_json::from_value(error.clone()).unwrap_or_default();
        envelope.raw = error.clone();
        Some(envelope)
    }

    /// Numeric `code` as an HTTP-like status; 200 when absent or unreadable.
    pub fn status(&self) -> u16 {
        let code = match &self.code {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        code.and_then(|c| u16::try_from(c).ok()).unwrap_or(200)
    }

    pub fn describe(&self) -> String {
        let message = match self.message.as_deref() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => self.raw.to_string(),
        };
        let details: Vec<String> = self
            .details
            .iter()
            .flatten()
            .map(display_value)
            .filter(|d| !d.is_empty())
            .collect();
        if details.is_empty() {
            message
        } else {
            format!("{} ({})", message, details.join("; "))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
    pub expires: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LayerInfo {
    #[serde(default)]
    pub fields: Option<Vec<FieldDescriptor>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_error_envelope() {
        let body = json!({"error": {
            "code": 400,
            "message": "Unable to complete operation.",
            "details": ["Invalid query"]
        }});
        let err = ErrorEnvelope::from_body(&body).unwrap();
        assert_eq!(err.status(), 400);
        assert_eq!(err.describe(), "Unable to complete operation. (Invalid query)");
    }

    #[test]
    fn null_details_still_an_envelope() {
        let body = json!({"error": {"code": 400, "message": "Invalid query", "details": null}});
        let err = ErrorEnvelope::from_body(&body).unwrap();
        assert_eq!(err.status(), 400);
        assert_eq!(err.describe(), "Invalid query");
    }

    #[test]
    fn loosely_typed_fields_are_tolerated() {
        let body = json!({"error": {"code": "498", "message": "Invalid token.", "details": [7]}});
        let err = ErrorEnvelope::from_body(&body).unwrap();
        assert_eq!(err.status(), 498);
        assert_eq!(err.describe(), "Invalid token. (7)");
    }

    #[test]
    fn unreadable_envelope_falls_back_to_raw_json() {
        let err = ErrorEnvelope::from_body(&json!({"error": "quota exceeded"})).unwrap();
        assert_eq!(err.status(), 200);
        assert_eq!(err.describe(), "\"quota exceeded\"");

        let err = ErrorEnvelope::from_body(&json!({"error": {"code": 500}})).unwrap();
        assert_eq!(err.status(), 500);
        assert_eq!(err.describe(), r#"{"code":500}"#);
    }

    #[test]
    fn no_envelope_on_success() {
        assert!(ErrorEnvelope::from_body(&json!({"features": []})).is_none());
    }
}
