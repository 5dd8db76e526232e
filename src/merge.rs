//! Merge membership: adding tasks to `@` (wip) and removing them (drop).

use crate::engine::Engine;
use crate::graph::{GraphStore, WORKING_COPY};
use crate::types::{BatchReport, ChangeId, Flag};
use eyre::{Context, Result};
use log::{info, warn};
use std::collections::VecDeque;

/// Revset naming the root revision.
const ROOT: &str = "root()";

/// What `wip` did to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipTask {
    pub change_id: ChangeId,
    /// The task is `@` itself; only its flag changed.
    pub in_place: bool,
    /// The task was newly added to `@`'s parents.
    pub added: bool,
}

/// How `drop` disposes of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropMode {
    /// Flag as standby and detach from `@`.
    #[default]
    Standby,
    /// Detach from `@` and destroy the revision.
    Abandon,
}

/// What `drop` did to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedTask {
    pub change_id: ChangeId,
    pub mode: DropMode,
    /// The task was a parent of `@` and has been detached.
    pub detached: bool,
}

impl<S: GraphStore> Engine<S> {
    /// Mark tasks wip and make each a parent of `@`.
    ///
    /// Tasks are processed in order; a failure does not undo earlier ones.
    pub fn wip(&mut self, revs: &[String]) -> BatchReport<WipTask> {
        let mut report = BatchReport::new();
        for rev in default_to_working_copy(revs) {
            match self.wip_one(&rev) {
                Ok(task) => report.completed.push(task),
                Err(e) => {
                    warn!("wip {} failed: {:#}", rev, e);
                    report.errors.push((rev, format!("{:#}", e)));
                }
            }
        }
        report
    }

    fn wip_one(&mut self, rev: &str) -> Result<WipTask> {
        let change_id = self
            .store
            .resolve(rev)
            .with_context(|| format!("resolving {}", rev))?;
        let working_copy = self.store.resolve(WORKING_COPY).context("resolving @")?;

        // Validate before touching anything: non-tasks are rejected.
        self.task(change_id.as_str())?;
        self.set_flag(change_id.as_str(), Flag::Wip)?;

        if change_id == working_copy {
            info!("{} is @, flagged wip in place", change_id);
            return Ok(WipTask {
                change_id,
                in_place: true,
                added: false,
            });
        }

        // A task created on top of @ must leave @'s subtree first.
        if self.store.is_ancestor(WORKING_COPY, change_id.as_str())? {
            let base = self.working_copy_base().context("finding base of @")?;
            info!("moving {} out from under @ onto {:?}", change_id, base);
            self.store
                .rebase_revision(change_id.as_str(), &base)
                .with_context(|| format!("moving {} beside @", change_id))?;
        }

        let added = self.store.add_to_merge(&change_id)?;
        info!("wip {}: added={}", change_id, added);
        Ok(WipTask {
            change_id,
            in_place: false,
            added,
        })
    }

    /// The nearest non-task ancestors of `@`, in parent order.
    ///
    /// Task parents are looked through, so a task moved here joins the
    /// merge beside them instead of on top of them.
    fn working_copy_base(&self) -> Result<Vec<ChangeId>> {
        let mut pending: VecDeque<ChangeId> = self.store.parents(WORKING_COPY)?.into();
        let mut seen = Vec::new();
        let mut base = Vec::new();

        while let Some(rev) = pending.pop_front() {
            if seen.contains(&rev) {
                continue;
            }
            seen.push(rev.clone());
            if self.store.is_task(rev.as_str())? {
                pending.extend(self.store.parents(rev.as_str())?);
            } else {
                base.push(rev);
            }
        }

        if base.is_empty() {
            base.push(self.store.resolve(ROOT)?);
        }
        Ok(base)
    }

    /// Remove tasks from `@`'s merge, as standby or by abandoning them.
    pub fn drop_tasks(&mut self, revs: &[String], mode: DropMode) -> BatchReport<DroppedTask> {
        let mut report = BatchReport::new();
        for rev in revs {
            match self.drop_one(rev, mode) {
                Ok(task) => report.completed.push(task),
                Err(e) => {
                    warn!("drop {} failed: {:#}", rev, e);
                    report.errors.push((rev.clone(), format!("{:#}", e)));
                }
            }
        }
        report
    }

    fn drop_one(&mut self, rev: &str, mode: DropMode) -> Result<DroppedTask> {
        let change_id = self
            .store
            .resolve(rev)
            .with_context(|| format!("resolving {}", rev))?;

        if mode == DropMode::Standby {
            self.set_flag(change_id.as_str(), Flag::Standby)?;
        }

        let detached = self
            .store
            .remove_from_merge(&change_id)
            .context("removing from merge")?;

        if mode == DropMode::Abandon {
            self.store
                .abandon(change_id.as_str())
                .with_context(|| format!("abandoning {}", change_id))?;
        }

        info!("dropped {} ({:?}, detached={})", change_id, mode, detached);
        Ok(DroppedTask {
            change_id,
            mode,
            detached,
        })
    }
}

/// The given revisions, or `@` when none were given.
pub(crate) fn default_to_working_copy(revs: &[String]) -> Vec<String> {
    if revs.is_empty() {
        vec![WORKING_COPY.to_string()]
    } else {
        revs.to_vec()
    }
}
