use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::edit::{apply_edit, EditOperation};
use crate::application::fetch::{fetch_table, FetchOptions};
use crate::domain::edits::EditOutcome;
use crate::domain::error::SyncError;
use crate::domain::field::FieldType;
use crate::domain::ports::FeatureService;
use crate::domain::table::{display_value, Table};
use crate::infrastructure::config::LogSyncConfig;

/// Add the composite `{id}-{date}` log id column to `table`.
///
/// A table that already has `log_id_field` is returned unchanged. Otherwise the
/// id column and then the date column must exist.
pub fn create_log_ids(
    mut table: Table,
    id_field: &str,
    date_field: &str,
    log_id_field: &str,
) -> Result<Table, SyncError> {
    if table.has_column(log_id_field) {
        return Ok(table);
    }
    table.require_column(id_field)?;
    table.require_column(date_field)?;

    table.insert_column(log_id_field, FieldType::String, |row| {
        let id = row.get(id_field).map(display_value).unwrap_or_default();
        let date = row.get(date_field).map(display_value).unwrap_or_default();
        Value::String(format!("{}-{}", id, date))
    });
    Ok(table)
}

/// Status of a log book sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSyncOutcome {
    AlreadyPresent,
    Added { count: usize },
}

impl std::fmt::Display for LogSyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSyncOutcome::AlreadyPresent => f.write_str("Log IDs Already Present in Log Book"),
            LogSyncOutcome::Added { .. } => {
                f.write_str("New Log Entries Successfully Added to Log Book")
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LogReconciler
// ─────────────────────────────────────────────────────────────────────────────

/// Appends new entries to a hosted log book, skipping entries whose log id is
/// already there, and confirms the write by reading the book back.
pub struct LogReconciler {
    service: Arc<dyn FeatureService>,
    settings: LogSyncConfig,
}

impl LogReconciler {
    pub fn new(service: Arc<dyn FeatureService>, settings: LogSyncConfig) -> Self {
        Self { service, settings }
    }

    pub async fn add_new_logs(&self, new_logs: Table) -> Result<LogSyncOutcome> {
        let s = &self.settings;
        let table = create_log_ids(new_logs, &s.id_field, &s.date_field, &s.log_id_field)?;

        let submitted: Vec<String> = table
            .column_values(&s.log_id_field)?
            .into_iter()
            .map(display_value)
            .collect();

        let existing = self.existing_log_ids().await?;

        let mut pending = table;
        pending.retain_rows(|row| {
            let id = row.get(&s.log_id_field).map(display_value).unwrap_or_default();
            !existing.contains(&id)
        });

        if pending.is_empty() {
            info!(layer = %s.layer, "No new log entries");
            return Ok(LogSyncOutcome::AlreadyPresent);
        }

        let count = pending.len();
        let response =
            apply_edit(self.service.as_ref(), &s.layer, EditOperation::Add(pending)).await?;
        for failed in EditOutcome::from_response(&response).failed {
            warn!(layer = %s.layer, error = ?failed.error, "Log entry rejected");
        }

        let after = self.existing_log_ids().await?;
        let mut seen = BTreeSet::new();
        let missing: Vec<String> = submitted
            .into_iter()
            .filter(|id| !after.contains(id) && seen.insert(id.clone()))
            .collect();

        if !missing.is_empty() {
            return Err(SyncError::RemoteWriteUnconfirmed {
                layer: s.layer.to_string(),
                missing,
            }
            .into());
        }

        info!(layer = %s.layer, added = count, "Log entries added");
        Ok(LogSyncOutcome::Added { count })
    }

    async fn existing_log_ids(&self) -> Result<BTreeSet<String>> {
        let table =
            fetch_table(self.service.as_ref(), &self.settings.layer, FetchOptions::default())
                .await?;
        if table.is_empty() {
            return Ok(BTreeSet::new());
        }
        Ok(table
            .column_values(&self.settings.log_id_field)?
            .into_iter()
            .map(display_value)
            .collect())
    }
}
