use anyhow::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::diff::diff_by_key;
use crate::application::edit::{apply_edit, EditOperation};
use crate::application::fetch::{fetch_table, FetchOptions};
use crate::application::resolve::locate_object_id;
use crate::domain::changeset::{AppliedUpdate, ChangeSet, ProjectPlan, ProjectSyncReport};
use crate::domain::edits::EditOutcome;
use crate::domain::error::SyncError;
use crate::domain::fingerprint::fingerprint;
use crate::domain::ports::FeatureService;
use crate::domain::table::Table;
use crate::domain::value_objects::ExcludedColumns;
use crate::infrastructure::config::ProjectSyncConfig;

// ─────────────────────────────────────────────────────────────────────────────
// ProjectInfoReconciler
// ─────────────────────────────────────────────────────────────────────────────

/// Brings a target feature table in line with the authoritative project table.
///
/// # Algorithm
/// 1. Fetch both tables with their identifier columns stripped.
/// 2. If the source uses an alternate name for the business key, rename it to
///    the canonical name (on the target too, when the target uses it).
/// 3. Restrict the source to the columns the target also has, minus excluded
///    columns.
/// 4. Fail with `SchemaMismatch` unless both sides still have the key.
/// 5. Diff row by row on the key (see [`diff_by_key`]).
/// 6. For each changed row: resolve the target identifier and send one update.
///
/// Sync is one-directional. Target rows without a source counterpart are left
/// alone; source rows without a target counterpart are reported, not inserted.
pub struct ProjectInfoReconciler {
    source: Arc<dyn FeatureService>,
    target: Arc<dyn FeatureService>,
    settings: ProjectSyncConfig,
}

/// Name the target uses for the business key on the remote side.
struct KeyNames {
    canonical: String,
    remote_target: String,
}

impl ProjectInfoReconciler {
    pub fn new(
        source: Arc<dyn FeatureService>,
        target: Arc<dyn FeatureService>,
        settings: ProjectSyncConfig,
    ) -> Self {
        Self {
            source,
            target,
            settings,
        }
    }

    /// Compute the pending updates without writing anything.
    pub async fn plan(&self, excluded: &ExcludedColumns) -> Result<ProjectPlan> {
        let (plan, _) = self.plan_with_keys(excluded).await?;
        Ok(plan)
    }

    /// Plan, then apply one update per changed row.
    pub async fn run(&self, excluded: &ExcludedColumns) -> Result<ProjectSyncReport> {
        let (plan, keys) = self.plan_with_keys(excluded).await?;
        self.apply(plan, &keys).await
    }

    async fn plan_with_keys(&self, excluded: &ExcludedColumns) -> Result<(ProjectPlan, KeyNames)> {
        let s = &self.settings;
        let options = FetchOptions::default().drop_object_id();

        let mut source = fetch_table(self.source.as_ref(), &s.source, options).await?;
        let mut target = fetch_table(self.target.as_ref(), &s.target, options).await?;

        let keys = self.normalize_key(&mut source, &mut target);

        let keep: BTreeSet<String> = source
            .columns()
            .into_iter()
            .filter(|c| !excluded.contains(c) && !s.excluded_columns.contains(c))
            .filter(|c| target.has_column(c))
            .collect();
        source.retain_columns(&keep);

        for table in [&source, &target] {
            if !table.has_column(&keys.canonical) {
                return Err(SyncError::SchemaMismatch(format!(
                    "business key `{}` missing from {}",
                    keys.canonical,
                    table.name()
                ))
                .into());
            }
        }

        let compared_columns = source.columns();
        debug!(columns = ?compared_columns, "Comparing shared columns");

        let diff = diff_by_key(&source, &target, &keys.canonical, &compared_columns);

        info!(
            source_rows = source.len(),
            target_rows = target.len(),
            compared = diff.rows_compared,
            changed = diff.pending.len(),
            unmatched = diff.unmatched_keys.len(),
            "Project info diff computed"
        );

        let plan = ProjectPlan {
            key_column: keys.canonical.clone(),
            compared_columns,
            rows_compared: diff.rows_compared,
            unmatched_keys: diff.unmatched_keys,
            pending: diff.pending,
            source_fingerprint: fingerprint(&source),
            target_fingerprint: fingerprint(&target),
        };
        Ok((plan, keys))
    }

    fn normalize_key(&self, source: &mut Table, target: &mut Table) -> KeyNames {
        let canonical = self.settings.key.column.clone();
        let mut remote_target = canonical.clone();

        if !source.has_column(&canonical) {
            let alternate = self
                .settings
                .key
                .alternates
                .iter()
                .find(|alt| source.has_column(alt))
                .cloned();
            if let Some(alt) = alternate {
                debug!(from = %alt, to = %canonical, "Renaming business key column");
                source.rename_column(&alt, &canonical);
                if !target.has_column(&canonical) && target.has_column(&alt) {
                    target.rename_column(&alt, &canonical);
                    remote_target = alt;
                }
            }
        }

        KeyNames {
            canonical,
            remote_target,
        }
    }

    async fn apply(&self, plan: ProjectPlan, keys: &KeyNames) -> Result<ProjectSyncReport> {
        let s = &self.settings;
        let mut applied = Vec::with_capacity(plan.pending.len());

        for pending in &plan.pending {
            let object_id = locate_object_id(
                self.target.as_ref(),
                &s.target,
                &keys.remote_target,
                &pending.key,
                &s.object_id_field,
            )
            .await?;

            let change_set = ChangeSet::new(pending.clone(), &s.object_id_field, object_id);
            let response = apply_edit(
                self.target.as_ref(),
                &s.target,
                EditOperation::Update(vec![change_set.to_feature()]),
            )
            .await?;

            let outcome = EditOutcome::from_response(&response);
            if outcome.is_success() {
                info!(key = %change_set.key, columns = change_set.changes.len(), "Row updated");
            } else {
                for failed in &outcome.failed {
                    warn!(key = %change_set.key, error = ?failed.error, "Row update rejected");
                }
            }

            applied.push(AppliedUpdate {
                change_set,
                response,
            });
        }

        Ok(ProjectSyncReport::new(plan, applied))
    }
}
