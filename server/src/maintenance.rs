//! Offline maintenance: reconciling reference counters against external
//! reference counts.
//!
//! Applications that store ids from this database know how often they refer to
//! each file. Given those counts, [`plan_clean`] decides which records are
//! orphaned (no references) and which have drifted counters, and
//! [`apply_clean`] carries the plan out, asking a callback before each
//! deletion.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::store::{FileRecord, FileStore};

/// External reference counts keyed by record id.
///
/// Parsed from JSON of the form `{"17": 2, "18": 1}`. Ids that are absent
/// have zero references.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct References(HashMap<u64, u32>);

impl References {
    pub fn parse(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid references file: {e}"))
    }

    pub fn count(&self, id: u64) -> u32 {
        self.0.get(&id).copied().unwrap_or(0)
    }
}

impl FromIterator<(u64, u32)> for References {
    fn from_iter<I: IntoIterator<Item = (u64, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A hardlink counter to correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterUpdate {
    pub id: u64,
    pub old: u32,
    pub new: u32,
}

/// What a clean run would do.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanPlan {
    /// Records without references, to be removed.
    pub delete: Vec<FileRecord>,
    /// Records whose counter disagrees with their reference count.
    pub update: Vec<CounterUpdate>,
    /// Records left untouched.
    pub unchanged: usize,
}

/// Compare every record against `references`.
pub fn plan_clean(records: &[FileRecord], references: &References) -> CleanPlan {
    let mut plan = CleanPlan::default();
    for record in records {
        match references.count(record.id) {
            0 => plan.delete.push(record.clone()),
            n if n != record.hardlinks => plan.update.push(CounterUpdate {
                id: record.id,
                old: record.hardlinks,
                new: n,
            }),
            _ => plan.unchanged += 1,
        }
    }
    plan
}

/// Counts reported by [`apply_clean`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub deleted: usize,
    /// Unchanged records plus deletions that were declined.
    pub kept: usize,
    pub updated: usize,
    /// Deletions or updates the store refused.
    pub failed: usize,
}

/// Carry out `plan` against `store`.
///
/// `confirm` is asked before each deletion. With `simulate` the store is left
/// alone and the summary reports what would have been done.
pub async fn apply_clean(
    store: &FileStore,
    plan: &CleanPlan,
    simulate: bool,
    mut confirm: impl FnMut(&FileRecord) -> bool,
) -> CleanSummary {
    let mut summary = CleanSummary {
        kept: plan.unchanged,
        ..CleanSummary::default()
    };

    for record in &plan.delete {
        info!("File <{}> is not used.", record.id);
        if !confirm(record) {
            summary.kept += 1;
            info!("Keeping <{}>.", record.id);
            continue;
        }
        if !simulate {
            if let Err(e) = store.unlink(record.id, true).await {
                error!("Failed to delete <{}>: {e}", record.id);
                summary.failed += 1;
                continue;
            }
        }
        summary.deleted += 1;
        info!("DELETED <{}> ({}).", record.id, record.sha256sum);
    }

    for update in &plan.update {
        if !simulate {
            if let Err(e) = store.set_hardlinks(update.id, update.new).await {
                error!("Failed to update <{}>: {e}", update.id);
                summary.failed += 1;
                continue;
            }
        }
        summary.updated += 1;
        info!(
            "Updated hardlinks of <{}> from {} to {}.",
            update.id, update.old, update.new
        );
    }

    debug!(
        "Deleted: {}, kept: {}, updated: {}, failed: {}.",
        summary.deleted, summary.kept, summary.updated, summary.failed
    );
    summary
}
