//! # layersync — library usage example
//!
//! Shows three common patterns for consuming layersync as a Rust library:
//!
//! 1. **From a config file** — token, dry run, then the real sync
//! 2. **Offline** — run the reconcilers against `InMemoryFeatureService`
//! 3. **Inspect the report** — traverse the sync result for custom logic
//!
//! Run against a live portal (add `--apply` to write):
//!   cargo run --example sync_as_lib --features subscriber -- layersync.toml
//!
//! Run offline, no network needed:
//!   cargo run --example sync_as_lib --features subscriber

use std::sync::Arc;

use anyhow::Result;
use layersync::{
    infrastructure::config::KeyConfig, AppConfig, ExcludedColumns, FieldDescriptor, FieldType,
    InMemoryFeatureService, LayerRef, LogLevel, LogReconciler, LogSyncConfig,
    ProjectInfoReconciler, ProjectSyncConfig, ProjectSyncReport, RowMap, Table,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    layersync::init_tracing(LogLevel::Info);

    let args: Vec<String> = std::env::args().collect();
    let apply = args.iter().any(|a| a == "--apply");

    match args.get(1).map(String::as_str).filter(|a| !a.starts_with("--")) {
        Some(path) => from_config_file(path, apply).await,
        None => offline().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 1 — live portal, settings from a TOML file (+ LAYERSYNC_* env vars)
// ─────────────────────────────────────────────────────────────────────────────
async fn from_config_file(path: &str, apply: bool) -> Result<()> {
    println!("=== Pattern 1: from config file ({path}) ===\n");

    let cfg = AppConfig::load(path)?;
    let token = layersync::generate_token(&cfg).await?;
    let excluded = ExcludedColumns::default();

    let plan = layersync::plan_project_info(&cfg, &token, &excluded).await?;
    println!(
        "{} row(s) compared, {} would change, {} unmatched",
        plan.rows_compared,
        plan.pending.len(),
        plan.unmatched_keys.len()
    );
    for pending in &plan.pending {
        println!("  ~ {}  {:?}", pending.key, pending.changes.keys().collect::<Vec<_>>());
    }

    if !apply {
        println!("\nDry run only. Pass --apply to write.");
        return Ok(());
    }

    let (report, perf) = layersync::sync_project_info_with_timing(&cfg, &token, &excluded).await?;
    println!("{} remote call(s), {} ms total", perf.timings.len(), perf.total_ms);
    inspect_report(&report);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 2 — wire the reconcilers to the in-memory service.
// Useful for trying a sync against captured data before touching the portal.
// ─────────────────────────────────────────────────────────────────────────────
async fn offline() -> Result<()> {
    println!("=== Pattern 2: offline ===\n");

    let master = LayerRef::new("memory://Master/FeatureServer", 0);
    let projects = LayerRef::new("memory://Projects/FeatureServer", 0);
    let logbook = LayerRef::new("memory://Logbook/FeatureServer", 0);

    let rows = |v: serde_json::Value| -> Vec<RowMap> {
        serde_json::from_value(v).unwrap_or_default()
    };

    let service = Arc::new(
        InMemoryFeatureService::new()
            .with_layer(
                master.clone(),
                fields(&["UID", "Name", "Status", "Manager"]),
                rows(json!([
                    {"UID": "7", "Name": "Ship Creek Trail", "Status": "Open", "Manager": "R. Lee"},
                    {
                        "UID": "8",
                        "Name": "Glenn Hwy Culvert",
                        "Status": "Design",
                        "Manager": "J. Ortiz"
                    }
                ])),
            )
            .with_layer(
                projects.clone(),
                fields(&["UID", "Name", "Status"]),
                rows(json!([
                    {"UID": "7", "Name": "Ship Creek Trail", "Status": "Closed"},
                    {"UID": "8", "Name": "Glenn Hwy Culvert", "Status": "Design"}
                ])),
            )
            .with_layer(logbook.clone(), fields(&["SITE", "VISITED", "LOG_ID"]), vec![]),
    );

    let reconciler = ProjectInfoReconciler::new(
        service.clone(),
        service.clone(),
        ProjectSyncConfig {
            source: master,
            target: projects,
            key: KeyConfig::default(),
            object_id_field: "OBJECTID".into(),
            excluded_columns: ExcludedColumns::default(),
        },
    );
    let report = reconciler.run(&ExcludedColumns::default()).await?;

    let logs = LogReconciler::new(
        service.clone(),
        LogSyncConfig {
            layer: logbook,
            id_field: "SITE".into(),
            date_field: "VISITED".into(),
            log_id_field: "LOG_ID".into(),
        },
    );
    let visits = Table::from_rows("visits", rows(json!([{"SITE": "A1", "VISITED": "2024-05-01"}])));
    println!("{}", logs.add_new_logs(visits.clone()).await?);
    println!("{}\n", logs.add_new_logs(visits).await?);

    inspect_report(&report);
    Ok(())
}

fn fields(names: &[&str]) -> Vec<FieldDescriptor> {
    let mut out = vec![FieldDescriptor::new("OBJECTID", FieldType::Oid)];
    out.extend(names.iter().map(|n| FieldDescriptor::new(*n, FieldType::String)));
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 3 — inspect the report directly.
// It is plain serialisable Rust data; dump it to JSON for an audit trail.
// ─────────────────────────────────────────────────────────────────────────────
fn inspect_report(report: &ProjectSyncReport) {
    println!("=== Pattern 3: inspecting the report ===\n");
    println!("id       : {}", report.sync_id);
    println!("key      : {}", report.key_column);
    println!("columns  : {}", report.compared_columns.join(", "));
    println!("source fp: {}", report.source_fingerprint);
    println!("target fp: {}", report.target_fingerprint);
    println!();

    for update in &report.updates {
        let cs = &update.change_set;
        for (column, value) in &cs.changes {
            println!(
                "  ~ UPDATE  {}={} ({}={})  {} → {}",
                report.key_column, cs.key, cs.object_id_field, cs.object_id, column, value
            );
        }
    }

    for key in &report.unmatched_keys {
        println!("  ? {} not present in target", key);
    }

    if report.summary.failed_updates > 0 {
        eprintln!("⚠  {} update(s) rejected by the service.", report.summary.failed_updates);
    }

    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("\nFull report: {} bytes of JSON", json.len()),
        Err(e) => eprintln!("report not serialisable: {e}"),
    }

    println!("\n── summary ──────────────────────");
    println!("  compared : {}", report.summary.rows_compared);
    println!("  changed  : {}", report.summary.rows_changed);
    println!("  columns  : {}", report.summary.columns_changed);
    println!("  unmatched: {}", report.summary.unmatched_keys);
}
