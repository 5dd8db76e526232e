//! Finishing tasks: flag them done and fold them into `@`'s linear ancestry.
//!
//! When a done task is one parent of a merge at `@`, the merge is rewritten
//! into a chain:
//!
//! ```text
//!   work... -> done task -> other tasks... -> @
//! ```
//!
//! Non-task parents ("work") stay at the bottom, tasks are stacked above them
//! in their original parent order. Each step re-reads the graph, so a run
//! interrupted halfway can be repeated and picks up from the current shape.

use crate::engine::Engine;
use crate::graph::{GraphStore, WORKING_COPY};
use crate::merge::default_to_working_copy;
use crate::revset::Revset;
use crate::tag;
use crate::types::{Advisory, BatchReport, ChangeId, Flag};
use eyre::{Context, Result};
use log::{debug, info, warn};

/// What `done` did to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneTask {
    pub change_id: ChangeId,
    /// Set when a merge at `@` was rewritten into a chain.
    pub linearized: Option<Linearization>,
    /// The task is not an ancestor of `@` after the operation.
    pub orphan: bool,
}

/// The chain produced by linearizing a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linearization {
    /// Non-task parent the chain was placed on, if any.
    pub work_tip: Option<ChangeId>,
    /// Revisions from bottom to top; `@` sits on the last one.
    pub chain: Vec<ChangeId>,
}

/// The other parents of `@`, split by whether they are tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentPartition {
    pub tasks: Vec<ChangeId>,
    pub work: Vec<ChangeId>,
}

impl<S: GraphStore> Engine<S> {
    /// Mark tasks done, linearizing any that are merge parents of `@`.
    ///
    /// Orphans are reported once, as a single advisory, after the batch.
    pub fn done(&mut self, revs: &[String]) -> BatchReport<DoneTask> {
        let mut report = BatchReport::new();
        let mut orphans = Vec::new();

        for rev in default_to_working_copy(revs) {
            match self.done_one(&rev, &mut report.advisories) {
                Ok(task) => {
                    if task.orphan {
                        orphans.push(task.change_id.clone());
                    }
                    report.completed.push(task);
                }
                Err(e) => {
                    warn!("done {} failed: {:#}", rev, e);
                    report.errors.push((rev, format!("failed to mark done: {:#}", e)));
                }
            }
        }

        if !orphans.is_empty() {
            report.advisories.push(Advisory::Orphans(orphans));
        }
        report
    }

    fn done_one(&mut self, rev: &str, advisories: &mut Vec<Advisory>) -> Result<DoneTask> {
        let change_id = self
            .store
            .resolve(rev)
            .with_context(|| format!("resolving {}", rev))?;

        let parents = self.store.parents(WORKING_COPY).context("getting @ parents")?;
        let is_parent = parents.contains(&change_id);
        let other_parents: Vec<ChangeId> = parents.into_iter().filter(|p| *p != change_id).collect();

        self.check_empty_task(&change_id, advisories);
        self.check_working_copy_changes(&change_id, advisories);

        self.set_flag(change_id.as_str(), Flag::Done)
            .context("setting flag")?;

        let linearized = if is_parent && !other_parents.is_empty() {
            Some(
                self.linearize(&change_id, &other_parents)
                    .context("linearizing")?,
            )
        } else {
            None
        };

        let orphan = match self.store.is_ancestor(change_id.as_str(), WORKING_COPY) {
            Ok(in_ancestry) => !in_ancestry,
            Err(e) => {
                debug!("skipping orphan check for {}: {:#}", change_id, e);
                false
            }
        };

        info!("done {}: linearized={} orphan={}", change_id, linearized.is_some(), orphan);
        Ok(DoneTask {
            change_id,
            linearized,
            orphan,
        })
    }

    /// Split parents into tasks and plain work revisions.
    pub fn partition_parents(&self, parents: &[ChangeId]) -> ParentPartition {
        let mut partition = ParentPartition::default();
        for parent in parents {
            let is_task = self
                .store
                .description(parent.as_str())
                .map(|desc| tag::parse_flag(&desc).is_some())
                .unwrap_or(false);
            if is_task {
                partition.tasks.push(parent.clone());
            } else {
                partition.work.push(parent.clone());
            }
        }
        partition
    }

    /// Rewrite `@`'s merge into a chain rooted at the work tip.
    fn linearize(&mut self, done: &ChangeId, other_parents: &[ChangeId]) -> Result<Linearization> {
        let partition = self.partition_parents(other_parents);

        let (work_tip, stacked) = if partition.work.is_empty() {
            (None, other_parents.to_vec())
        } else {
            let tip = self.find_work_tip(&partition.work);
            self.store
                .rebase_source(done.as_str(), std::slice::from_ref(&tip))
                .with_context(|| format!("rebasing done task {} onto {}", done, tip))?;
            (Some(tip), partition.tasks)
        };

        let mut chain = vec![done.clone()];
        let mut tip = done.clone();
        for next in stacked {
            self.store
                .rebase_source(next.as_str(), std::slice::from_ref(&tip))
                .with_context(|| format!("rebasing {} onto {}", next, tip))?;
            chain.push(next.clone());
            tip = next;
        }

        self.store
            .rebase_source(WORKING_COPY, std::slice::from_ref(&tip))
            .with_context(|| format!("rebasing @ onto {}", tip))?;

        info!("linearized {} into chain {:?}", done, chain);
        Ok(Linearization { work_tip, chain })
    }

    /// The head among work parents.
    ///
    /// Several heads are possible when work parents are unrelated; the first
    /// one the store returns wins. The store's order is not otherwise
    /// specified.
    pub fn find_work_tip(&self, work: &[ChangeId]) -> ChangeId {
        if let [single] = work {
            return single.clone();
        }
        let heads = Revset::any_of(work).heads();
        match self.store.revisions(&heads, Some(1)) {
            Ok(found) if !found.is_empty() => found[0].clone(),
            Ok(_) => work[0].clone(),
            Err(e) => {
                warn!("head query failed, using first work parent: {:#}", e);
                work[0].clone()
            }
        }
    }

    fn check_empty_task(&self, task: &ChangeId, advisories: &mut Vec<Advisory>) {
        match self.store.is_empty(task.as_str()) {
            Ok(true) => advisories.push(Advisory::EmptyTask(task.clone())),
            Ok(false) => {}
            Err(e) => debug!("empty check for {} failed: {:#}", task, e),
        }
    }

    fn check_working_copy_changes(&self, task: &ChangeId, advisories: &mut Vec<Advisory>) {
        let Ok(working_copy) = self.store.resolve(WORKING_COPY) else {
            return;
        };
        if working_copy == *task {
            return;
        }
        match self.store.is_empty(WORKING_COPY) {
            Ok(false) => advisories.push(Advisory::UncommittedChanges {
                task: task.clone(),
                action: "done",
            }),
            Ok(true) => {}
            Err(e) => debug!("change check for @ failed: {:#}", e),
        }
    }
}
