//! Task engine: the operations jjtask performs on a revision graph.
//!
//! Merge membership lives in `merge.rs`, linearization in `linearize.rs`,
//! flattening in `squash.rs` and chain discovery in `chain.rs`. All of them
//! extend [`Engine`].

use crate::graph::{GraphStore, WORKING_COPY};
use crate::revset::{self, Revset, TaskStatus};
use crate::tag::{self, TaskDescription};
use crate::types::{Advisory, ChangeId, Flag, Revision};
use eyre::{Context, Result};
use log::info;
use serde::Serialize;

/// Errors raised by engine preconditions.
#[derive(Debug)]
pub enum EngineError {
    /// The revision's description carries no task tag.
    NotATask(String),
    /// Parallel creation needs at least two titles.
    NotEnoughTitles(usize),
    /// Task title is empty.
    EmptyTitle,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotATask(rev) => write!(f, "{} is not a task (no [task:*] tag)", rev),
            EngineError::NotEnoughTitles(n) => {
                write!(f, "parallel needs at least 2 titles, got {}", n)
            }
            EngineError::EmptyTitle => write!(f, "task title cannot be empty"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Options for creating a task.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Parent revision (default `@`)
    pub parent: Option<String>,
    /// Place under the deepest pending descendant of the parent
    pub chain: bool,
    /// Start as draft instead of todo
    pub draft: bool,
}

/// A newly created task.
#[derive(Debug, Clone)]
pub struct CreatedTask {
    pub change_id: ChangeId,
    pub parent: String,
    pub description: TaskDescription,
    pub advisories: Vec<Advisory>,
}

/// A done task that is not an ancestor of `@`.
pub type StaleTask = Revision;

/// Description of a revision, as shown by `show-desc`.
#[derive(Debug, Clone, Serialize)]
pub struct ShownDescription {
    pub revision: String,
    pub change_id: ChangeId,
    pub description: String,
    pub first_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_flag: Option<Flag>,
}

/// A recorded point in the store's operation log.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub operation_id: String,
    pub message: Option<String>,
}

/// The task engine over a graph store.
pub struct Engine<S> {
    pub(crate) store: S,
}

impl<S: GraphStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Read and decode a task, failing if the revision is not one.
    pub fn task(&self, rev: &str) -> Result<TaskDescription> {
        let description = self
            .store
            .description(rev)
            .with_context(|| format!("reading description of {}", rev))?;
        tag::parse(&description).ok_or_else(|| eyre::eyre!(EngineError::NotATask(rev.to_string())))
    }

    /// Set a task's flag, leaving title and body untouched.
    pub fn set_flag(&mut self, rev: &str, flag: Flag) -> Result<()> {
        let description = self
            .store
            .description(rev)
            .with_context(|| format!("reading description of {}", rev))?;
        let updated = tag::replace_flag(&description, flag)
            .ok_or_else(|| eyre::eyre!(EngineError::NotATask(rev.to_string())))?;
        if updated != description {
            self.store
                .set_description(rev, &updated)
                .with_context(|| format!("setting flag {} on {}", flag, rev))?;
        }
        info!("Flagged {} as {}", rev, flag);
        Ok(())
    }

    /// Create a task as a child of `@` or of the given parent.
    pub fn create(&mut self, title: &str, body: Option<&str>, options: &CreateOptions) -> Result<CreatedTask> {
        if title.trim().is_empty() {
            return Err(eyre::eyre!(EngineError::EmptyTitle));
        }

        let mut advisories = Vec::new();
        let mut parent = options.parent.clone().unwrap_or_else(|| WORKING_COPY.to_string());

        if parent != WORKING_COPY
            && let Some(advisory) = self.working_copy_wip_advisory()
        {
            advisories.push(advisory);
        }

        if options.chain
            && let Some(leaf) = self.deepest_pending_descendant(&parent)
        {
            parent = leaf.to_string();
        }

        let flag = if options.draft { Flag::Draft } else { Flag::Todo };
        let description = TaskDescription::new(flag, title).with_body(body.unwrap_or_default());
        let change_id = self
            .store
            .new_child(&parent, &description.render())
            .with_context(|| format!("creating task under {}", parent))?;

        info!("Created task {} under {}", change_id, parent);
        Ok(CreatedTask {
            change_id,
            parent,
            description,
            advisories,
        })
    }

    /// Create sibling tasks under one parent.
    pub fn parallel(&mut self, titles: &[String], parent: Option<&str>, draft: bool) -> Result<Vec<CreatedTask>> {
        if titles.len() < 2 {
            return Err(eyre::eyre!(EngineError::NotEnoughTitles(titles.len())));
        }
        let options = CreateOptions {
            parent: Some(parent.unwrap_or(WORKING_COPY).to_string()),
            chain: false,
            draft,
        };
        let mut created = Vec::with_capacity(titles.len());
        for title in titles {
            let mut task = self
                .create(title, None, &options)
                .with_context(|| format!("failed to create task {:?}", title))?;
            // The wip hint is the same for every sibling; report it once.
            if !created.is_empty() {
                task.advisories.clear();
            }
            created.push(task);
        }
        Ok(created)
    }

    /// List tasks in a status category, optionally within a user revset.
    pub fn find(&self, status: TaskStatus, within: Option<&str>) -> Result<Vec<Revision>> {
        let mut query = status.revset();
        if let Some(expr) = within {
            query = query.intersect(Revset::expr(expr));
        }
        let found = self.store.log(&query, None).context("querying tasks")?;
        Ok(found
            .into_iter()
            .filter(|rev| status.matches(&rev.description))
            .collect())
    }

    /// Done tasks that are not in `@`'s ancestry.
    pub fn stale(&self) -> Result<Vec<StaleTask>> {
        let query = revset::tasks_done().minus(Revset::WorkingCopy.ancestors());
        let found = self.store.log(&query, None).context("finding stale tasks")?;
        Ok(found
            .into_iter()
            .filter(|rev| rev.flag() == Some(Flag::Done))
            .collect())
    }

    /// Read a revision's description with its decoded parts.
    pub fn show(&self, rev: &str) -> Result<ShownDescription> {
        let change_id = self.store.resolve(rev)?;
        let description = self.store.description(rev)?;
        let first_line = description.lines().next().unwrap_or("").to_string();
        let task_flag = tag::parse_flag(&description);
        Ok(ShownDescription {
            revision: rev.to_string(),
            change_id,
            description,
            first_line,
            task_flag,
        })
    }

    /// Record the current operation id so the graph can be restored later.
    pub fn checkpoint(&self, message: Option<&str>) -> Result<Checkpoint> {
        let operation_id = self.store.operation_id().context("reading operation log")?;
        Ok(Checkpoint {
            operation_id,
            message: message.map(String::from),
        })
    }

    /// Advisory when `@` is itself a wip task; None on any read failure.
    fn working_copy_wip_advisory(&self) -> Option<Advisory> {
        let description = self.store.description(WORKING_COPY).ok()?;
        if tag::parse_flag(&description) != Some(Flag::Wip) {
            return None;
        }
        let id = self.store.resolve(WORKING_COPY).ok()?;
        Some(Advisory::WorkingCopyIsWip(id))
    }
}
