use anyhow::{anyhow, Result};
use serde_json::Value;
use std::sync::{Arc, Mutex};

pub mod application;
pub mod domain;
pub mod infrastructure;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of layersync's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                               |
/// |---------|-----------------|-------------------------------------------|
/// | `Error` | `error`         | Scheduled jobs, only failures matter      |
/// | `Info`  | `info`          | Default — shows per-call timings          |
/// | `Debug` | `debug`         | Shows request URLs and query filters too  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for layersync.
///
/// Respects `RUST_LOG` when set, falling back to `level` otherwise. Call this
/// **once** at startup. Library consumers who manage their own subscriber
/// should skip this.
///
/// Only available with the `subscriber` feature (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "subscriber")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "layersync=error",
        LogLevel::Info => "layersync=info",
        LogLevel::Debug => "layersync=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::compare::columns_compare;
pub use application::edit::{apply_edit, encode_table, EditOperation};
pub use application::fetch::{fetch_table, FetchOptions};
pub use application::logs::{create_log_ids, LogReconciler, LogSyncOutcome};
pub use application::monitoring::PerfReport;
pub use application::project::ProjectInfoReconciler;
pub use application::resolve::locate_object_id;
pub use domain::changeset::{
    ChangeSet, PendingUpdate, ProjectPlan, ProjectSyncReport, SyncSummary,
};
pub use domain::edits::{EditOutcome, Edits};
pub use domain::error::SyncError;
pub use domain::field::{FieldDescriptor, FieldType};
pub use domain::fingerprint::fingerprint;
pub use domain::ports::{FeatureService, TokenProvider};
pub use domain::table::{Feature, RowMap, Table};
pub use domain::value_objects::{Credentials, ExcludedColumns, Fingerprint, LayerRef, Token};
pub use infrastructure::config::{
    AppConfig, HttpConfig, LogSyncConfig, PortalConfig, ProjectSyncConfig,
};
pub use infrastructure::memory::InMemoryFeatureService;

use crate::application::monitoring::MonitoringFeatureService;
use crate::infrastructure::arcgis::client::connect;

// ─── Config-driven entry points ───

/// Exchange the configured portal credentials for a token.
pub async fn generate_token(cfg: &AppConfig) -> Result<Token> {
    let client = connect(&cfg.portal, &cfg.http)?;
    client.generate_token(&cfg.portal.credentials()).await
}

/// Fetch one hosted layer as a [`Table`].
pub async fn pull_table(
    cfg: &AppConfig,
    token: &Token,
    layer: &LayerRef,
    options: FetchOptions,
) -> Result<Table> {
    let service = build_service(cfg, token, PerfReport::new())?;
    fetch_table(service.as_ref(), layer, options).await
}

/// Submit one add / update / delete call and return the raw response.
pub async fn push_edits(
    cfg: &AppConfig,
    token: &Token,
    layer: &LayerRef,
    operation: EditOperation,
) -> Result<Value> {
    let service = build_service(cfg, token, PerfReport::new())?;
    apply_edit(service.as_ref(), layer, operation).await
}

/// Look up the service row identifier for a business key.
pub async fn find_object_id(
    cfg: &AppConfig,
    token: &Token,
    layer: &LayerRef,
    key_field: &str,
    key: &str,
    object_id_field: &str,
) -> Result<Value> {
    let service = build_service(cfg, token, PerfReport::new())?;
    locate_object_id(service.as_ref(), layer, key_field, key, object_id_field).await
}

/// Append `new_logs` to the configured log book (see [`LogReconciler`]).
pub async fn sync_logs(cfg: &AppConfig, token: &Token, new_logs: Table) -> Result<LogSyncOutcome> {
    let settings = cfg
        .logs
        .clone()
        .ok_or_else(|| anyhow!("Config has no [logs] section"))?;
    let service = build_service(cfg, token, PerfReport::new())?;
    LogReconciler::new(service, settings).add_new_logs(new_logs).await
}

/// Dry run of [`sync_project_info`]: the change sets that would be sent.
pub async fn plan_project_info(
    cfg: &AppConfig,
    token: &Token,
    excluded: &ExcludedColumns,
) -> Result<ProjectPlan> {
    let reconciler = build_project_reconciler(cfg, token, PerfReport::new())?;
    reconciler.plan(excluded).await
}

/// Bring the configured target table in line with the authoritative source.
pub async fn sync_project_info(
    cfg: &AppConfig,
    token: &Token,
    excluded: &ExcludedColumns,
) -> Result<ProjectSyncReport> {
    let (report, _) = sync_project_info_with_timing(cfg, token, excluded).await?;
    Ok(report)
}

/// [`sync_project_info`] plus a [`PerfReport`] of every remote call.
pub async fn sync_project_info_with_timing(
    cfg: &AppConfig,
    token: &Token,
    excluded: &ExcludedColumns,
) -> Result<(ProjectSyncReport, PerfReport)> {
    let report = PerfReport::new();
    let reconciler = build_project_reconciler(cfg, token, Arc::clone(&report))?;
    let sync_report = reconciler.run(excluded).await?;
    Ok((sync_report, PerfReport::snapshot(&report)))
}

// ─── Private helpers ───────────────────────────────────────────────────────────

/// Authenticated REST client wrapped in the monitoring decorator.
fn build_service(
    cfg: &AppConfig,
    token: &Token,
    report: Arc<Mutex<PerfReport>>,
) -> Result<Arc<dyn FeatureService>> {
    let client = Arc::new(connect(&cfg.portal, &cfg.http)?.with_token(token.clone()));
    Ok(Arc::new(MonitoringFeatureService::new(client, report)))
}

fn build_project_reconciler(
    cfg: &AppConfig,
    token: &Token,
    report: Arc<Mutex<PerfReport>>,
) -> Result<ProjectInfoReconciler> {
    let settings = cfg
        .project
        .clone()
        .ok_or_else(|| anyhow!("Config has no [project] section"))?;
    // Source and target may live on different hosts; one client serves both.
    let service = build_service(cfg, token, report)?;
    Ok(ProjectInfoReconciler::new(
        Arc::clone(&service),
        service,
        settings,
    ))
}
