//! Finding where the next task in a chain belongs.

use crate::engine::Engine;
use crate::graph::GraphStore;
use crate::revset::{self, Revset, TaskStatus};
use crate::types::ChangeId;
use log::{debug, warn};

impl<S: GraphStore> Engine<S> {
    /// The deepest pending task at or below `rev`.
    ///
    /// Returns the first candidate (in store order) with no pending
    /// children, else the last candidate, else `None` when nothing below
    /// `rev` is pending or the query fails. This is a placement heuristic,
    /// not a global deepest-node search.
    pub fn deepest_pending_descendant(&self, rev: &str) -> Option<ChangeId> {
        let start = Revset::expr(rev);
        let query = start.clone().union(start.descendants()).intersect(revset::tasks_pending());
        let candidates: Vec<ChangeId> = match self.store.log(&query, None) {
            Ok(found) => found
                .into_iter()
                .filter(|rev| TaskStatus::Pending.matches(&rev.description))
                .map(|rev| rev.change_id)
                .collect(),
            Err(e) => {
                warn!("finding pending descendants of {} failed: {:#}", rev, e);
                return None;
            }
        };

        for candidate in &candidates {
            let children = Revset::change(candidate).children().intersect(revset::tasks_pending());
            match self.store.log(&children, None) {
                Ok(found) if !found.iter().any(|rev| TaskStatus::Pending.matches(&rev.description)) => {
                    debug!("chain leaf under {}: {}", rev, candidate);
                    return Some(candidate.clone());
                }
                Ok(_) => {}
                Err(e) => debug!("child query for {} failed: {:#}", candidate, e),
            }
        }

        candidates.last().cloned()
    }
}
