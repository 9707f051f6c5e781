use thiserror::Error;

/// Failures the sync routines raise themselves.
///
/// Functions in this crate return `anyhow::Result`; these variants travel
/// inside the `anyhow::Error` and can be recovered with
/// `err.downcast_ref::<SyncError>()`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    #[error("column `{column}` not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("failed to pull table {layer} - {status}: {message}")]
    RemoteQueryFailure {
        layer: String,
        status: u16,
        message: String,
    },

    #[error(
        "{} submitted record(s) missing from {layer} after write: {}",
        .missing.len(),
        .missing.join(", ")
    )]
    RemoteWriteUnconfirmed { layer: String, missing: Vec<String> },

    #[error("no row in {layer} where {field} = '{value}'")]
    LookupMiss {
        layer: String,
        field: String,
        value: String,
    },

    #[error("{0} returned no field descriptors")]
    MissingFields(String),
}

impl SyncError {
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}
