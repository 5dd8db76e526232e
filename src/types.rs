//! Core data types for jjtask.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle flag carried in a task's description tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Draft,
    Todo,
    Wip,
    Done,
    Blocked,
    Standby,
    Review,
    Untested,
}

impl Flag {
    /// Every flag, happy path first.
    pub const ALL: [Flag; 8] = [
        Flag::Draft,
        Flag::Todo,
        Flag::Wip,
        Flag::Done,
        Flag::Blocked,
        Flag::Standby,
        Flag::Review,
        Flag::Untested,
    ];

    /// Flags that still need work.
    pub const PENDING: [Flag; 3] = [Flag::Draft, Flag::Todo, Flag::Wip];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Draft => "draft",
            Flag::Todo => "todo",
            Flag::Wip => "wip",
            Flag::Done => "done",
            Flag::Blocked => "blocked",
            Flag::Standby => "standby",
            Flag::Review => "review",
            Flag::Untested => "untested",
        }
    }

    /// Returns true for draft, todo and wip.
    pub fn is_pending(&self) -> bool {
        Flag::PENDING.contains(self)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = UnknownFlag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flag::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| UnknownFlag(s.to_string()))
    }
}

/// A flag name that is not part of the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFlag(pub String);

impl fmt::Display for UnknownFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown flag '{}' (expected one of: {})",
            self.0,
            Flag::ALL.map(|flag| flag.as_str()).join(", ")
        )
    }
}

impl std::error::Error for UnknownFlag {}

/// Logical identity of a revision. Survives rebase and description edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChangeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChangeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A revision as read from the graph store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub change_id: ChangeId,
    pub description: String,
}

impl Revision {
    /// First line of the description.
    pub fn first_line(&self) -> &str {
        self.description.lines().next().unwrap_or("")
    }

    /// The task flag, if the description carries one.
    pub fn flag(&self) -> Option<Flag> {
        crate::tag::parse_flag(&self.description)
    }
}

/// Non-fatal findings surfaced alongside an operation's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// The task has no content of its own.
    EmptyTask(ChangeId),
    /// `@` carries changes that are not part of the task being finished.
    UncommittedChanges { task: ChangeId, action: &'static str },
    /// A new task was placed away from `@` while `@` is itself a wip task.
    WorkingCopyIsWip(ChangeId),
    /// Tasks marked done that are not ancestors of `@`.
    Orphans(Vec<ChangeId>),
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::EmptyTask(id) => write!(f, "task {} has no changes", id),
            Advisory::UncommittedChanges { task, action } => write!(
                f,
                "@ has changes that are not part of {}; they stay in @ after '{}'",
                task, action
            ),
            Advisory::WorkingCopyIsWip(id) => write!(
                f,
                "current revision ({}) is a wip task; `jjtask create --chain` chains from it",
                id
            ),
            Advisory::Orphans(ids) => {
                let list: Vec<&str> = ids.iter().map(ChangeId::as_str).collect();
                write!(f, "{} marked done but not in @'s ancestry (orphan tasks)", list.join(" "))
            }
        }
    }
}

/// Outcome of running one operation over several revisions.
///
/// Batches are not transactional: `completed` holds what was applied before
/// and after any failure listed in `errors`.
#[derive(Debug)]
pub struct BatchReport<T> {
    /// Successfully processed revisions.
    pub completed: Vec<T>,
    /// Errors that occurred (revision, error message).
    pub errors: Vec<(String, String)>,
    /// Warnings collected across the batch.
    pub advisories: Vec<Advisory>,
}

impl<T> BatchReport<T> {
    pub fn new() -> Self {
        Self {
            completed: Vec::new(),
            errors: Vec::new(),
            advisories: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self::new()
    }
}
