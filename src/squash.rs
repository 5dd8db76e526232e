//! Flattening the `@` merge into a single revision for pushing.

use crate::engine::Engine;
use crate::graph::{GraphStore, WORKING_COPY};
use crate::tag;
use crate::types::{ChangeId, Flag};
use eyre::{Context, Result};
use log::{debug, info};

/// Header line of a squashed description.
pub const SQUASH_HEADER: &str = "Squashed tasks:";

/// Result of `squash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashOutcome {
    /// `@` has no parents.
    NoParents,
    /// `@` has a single parent; there is no merge to flatten.
    SingleParent(ChangeId),
    /// Parents were folded into `@`.
    Squashed {
        parents: Vec<ChangeId>,
        message: String,
        /// Former wip parents now flagged done.
        completed: Vec<ChangeId>,
    },
}

/// Combine parent descriptions into one message.
///
/// Each non-empty description contributes its first line, tag removed, as a
/// bullet.
pub fn combined_message<'a>(descriptions: impl IntoIterator<Item = &'a str>) -> String {
    let mut message = String::from(SQUASH_HEADER);
    for description in descriptions {
        let summary = tag::strip_tag(description);
        if !summary.is_empty() {
            message.push_str("\n- ");
            message.push_str(summary);
        }
    }
    message
}

impl<S: GraphStore> Engine<S> {
    /// Flatten all parents of `@` into `@`.
    ///
    /// `@` always ends up off the merge. Unless `keep_tasks` is set, any
    /// former wip parent the store kept around is flagged done.
    pub fn squash(&mut self, keep_tasks: bool) -> Result<SquashOutcome> {
        let parents = self.store.parents(WORKING_COPY).context("failed to get parents")?;

        match parents.as_slice() {
            [] => return Ok(SquashOutcome::NoParents),
            [single] => return Ok(SquashOutcome::SingleParent(single.clone())),
            _ => {}
        }

        let mut descriptions = Vec::with_capacity(parents.len());
        for parent in &parents {
            match self.store.description(parent.as_str()) {
                Ok(desc) => descriptions.push(desc),
                Err(e) => debug!("no description for {}: {:#}", parent, e),
            }
        }
        let message = combined_message(descriptions.iter().map(String::as_str));

        self.store
            .squash_parents(&message)
            .context("failed to squash")?;
        info!("squashed {} parents into @", parents.len());

        let mut completed = Vec::new();
        if !keep_tasks {
            for parent in &parents {
                // Abandoned parents are gone; only survivors can be updated.
                let Ok(desc) = self.store.description(parent.as_str()) else {
                    continue;
                };
                if tag::parse_flag(&desc) != Some(Flag::Wip) {
                    continue;
                }
                match self.set_flag(parent.as_str(), Flag::Done) {
                    Ok(()) => completed.push(parent.clone()),
                    Err(e) => debug!("could not flag {} done: {:#}", parent, e),
                }
            }
        }

        Ok(SquashOutcome::Squashed {
            parents,
            message,
            completed,
        })
    }
}
