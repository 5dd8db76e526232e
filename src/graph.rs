//! The seam between the task engine and the revision graph store.

use crate::revset::Revset;
use crate::tag;
use crate::types::{ChangeId, Revision};
use eyre::{Context, Result};
use log::debug;

/// The working-copy revision expression.
pub const WORKING_COPY: &str = "@";

/// Operations the engine needs from a revision graph store.
///
/// Revision arguments are revset expressions naming exactly one revision
/// (a change id, `@`, ...). Implementations own all DAG semantics; the
/// engine only sequences calls.
pub trait GraphStore {
    /// Resolve an expression to the change id of a single revision.
    fn resolve(&self, rev: &str) -> Result<ChangeId>;

    /// List revisions matching a revset in store order.
    fn log(&self, revset: &Revset, limit: Option<usize>) -> Result<Vec<Revision>>;

    /// Read a revision's description.
    fn description(&self, rev: &str) -> Result<String>;

    /// Replace a revision's description.
    fn set_description(&mut self, rev: &str, text: &str) -> Result<()>;

    /// Direct parents, in parent order.
    fn parents(&self, rev: &str) -> Result<Vec<ChangeId>>;

    /// Whether `ancestor` is in `::descendant` (inclusive).
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Whether the revision changes no files relative to its parents.
    fn is_empty(&self, rev: &str) -> Result<bool>;

    /// Create a child of `parent` without moving `@`.
    fn new_child(&mut self, parent: &str, message: &str) -> Result<ChangeId>;

    /// Move `source` and its descendants onto `onto`.
    fn rebase_source(&mut self, source: &str, onto: &[ChangeId]) -> Result<()>;

    /// Move only `rev` onto `onto`; its children take its former parents.
    fn rebase_revision(&mut self, rev: &str, onto: &[ChangeId]) -> Result<()>;

    /// Permanently remove a revision.
    fn abandon(&mut self, rev: &str) -> Result<()>;

    /// Fold every parent of `@` into `@` with the given description.
    ///
    /// Afterwards `@` sits on the former parents' own parents. Whether the
    /// emptied revisions survive is up to the store; they are no longer
    /// parents of `@` either way.
    fn squash_parents(&mut self, message: &str) -> Result<()>;

    /// Identifier of the latest operation in the store's operation log.
    fn operation_id(&self) -> Result<String>;

    /// Ids of revisions matching a revset.
    fn revisions(&self, revset: &Revset, limit: Option<usize>) -> Result<Vec<ChangeId>> {
        Ok(self
            .log(revset, limit)?
            .into_iter()
            .map(|rev| rev.change_id)
            .collect())
    }

    /// Whether the revision's description carries a task tag.
    fn is_task(&self, rev: &str) -> Result<bool> {
        Ok(tag::parse_flag(&self.description(rev)?).is_some())
    }

    /// Add `rev` as a parent of `@`, keeping `@`'s own changes.
    ///
    /// Non-task parents that are ancestors of `rev` are dropped since `rev`
    /// already reaches them. Task parents always stay. Returns false if
    /// `rev` was already a parent.
    fn add_to_merge(&mut self, rev: &ChangeId) -> Result<bool> {
        let parents = self.parents(WORKING_COPY).context("reading @ parents")?;
        if parents.contains(rev) {
            return Ok(false);
        }

        let mut onto = Vec::with_capacity(parents.len() + 1);
        for parent in parents {
            if self.is_ancestor(parent.as_str(), rev.as_str())? && !self.is_task(parent.as_str())? {
                debug!("dropping redundant parent {} of @", parent);
                continue;
            }
            onto.push(parent);
        }
        onto.push(rev.clone());

        self.rebase_source(WORKING_COPY, &onto)
            .with_context(|| format!("rebasing @ onto parents + {}", rev))?;
        Ok(true)
    }

    /// Remove `rev` from `@`'s parents, keeping `@`'s own changes.
    ///
    /// When `rev` is the only parent, `@` moves onto `rev`'s parents.
    /// Returns false if `rev` was not a parent.
    fn remove_from_merge(&mut self, rev: &ChangeId) -> Result<bool> {
        let parents = self.parents(WORKING_COPY).context("reading @ parents")?;
        if !parents.contains(rev) {
            return Ok(false);
        }

        let mut onto: Vec<ChangeId> = parents.into_iter().filter(|p| p != rev).collect();
        if onto.is_empty() {
            onto = self
                .parents(rev.as_str())
                .with_context(|| format!("reading parents of {}", rev))?;
        }

        self.rebase_source(WORKING_COPY, &onto)
            .with_context(|| format!("rebasing @ without {}", rev))?;
        Ok(true)
    }
}
