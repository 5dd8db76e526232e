//! Revset expressions for task queries.
//!
//! Queries are built as a small typed tree and rendered to jj's revset
//! language only when handed to the store.

use crate::tag;
use crate::types::{ChangeId, Flag};
use std::fmt;
use std::str::FromStr;

/// A revset expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revset {
    /// The working-copy revision, `@`.
    WorkingCopy,
    /// Every revision.
    All,
    /// A user-supplied expression, passed through verbatim.
    Expr(String),
    /// A single revision by change id.
    Change(ChangeId),
    /// Revisions tagged with any of the given flags.
    Flagged(Vec<Flag>),
    /// Revisions carrying any task tag.
    Tasks,
    Union(Vec<Revset>),
    Intersection(Box<Revset>, Box<Revset>),
    Difference(Box<Revset>, Box<Revset>),
    Parents(Box<Revset>),
    Children(Box<Revset>),
    /// Descendants, inclusive.
    Descendants(Box<Revset>),
    /// Ancestors, inclusive.
    Ancestors(Box<Revset>),
    Heads(Box<Revset>),
    /// Most recently committed member.
    Latest(Box<Revset>),
}

impl Revset {
    pub fn expr(expr: impl Into<String>) -> Self {
        Revset::Expr(expr.into())
    }

    pub fn change(id: &ChangeId) -> Self {
        Revset::Change(id.clone())
    }

    pub fn union(self, other: Revset) -> Self {
        match self {
            Revset::Union(mut members) => {
                members.push(other);
                Revset::Union(members)
            }
            first => Revset::Union(vec![first, other]),
        }
    }

    pub fn intersect(self, other: Revset) -> Self {
        Revset::Intersection(Box::new(self), Box::new(other))
    }

    pub fn minus(self, other: Revset) -> Self {
        Revset::Difference(Box::new(self), Box::new(other))
    }

    pub fn parents(self) -> Self {
        Revset::Parents(Box::new(self))
    }

    pub fn children(self) -> Self {
        Revset::Children(Box::new(self))
    }

    pub fn descendants(self) -> Self {
        Revset::Descendants(Box::new(self))
    }

    pub fn ancestors(self) -> Self {
        Revset::Ancestors(Box::new(self))
    }

    pub fn heads(self) -> Self {
        Revset::Heads(Box::new(self))
    }

    pub fn latest(self) -> Self {
        Revset::Latest(Box::new(self))
    }

    /// Union of the given change ids.
    pub fn any_of(ids: &[ChangeId]) -> Self {
        match ids {
            [single] => Revset::change(single),
            _ => Revset::Union(ids.iter().map(Revset::change).collect()),
        }
    }
}

fn description_substring(f: &mut fmt::Formatter<'_>, needle: &str) -> fmt::Result {
    write!(f, "description(substring:{:?})", needle)
}

impl fmt::Display for Revset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revset::WorkingCopy => f.write_str("@"),
            Revset::All => f.write_str("all()"),
            Revset::Expr(expr) => write!(f, "({})", expr),
            Revset::Change(id) => f.write_str(id.as_str()),
            Revset::Flagged(flags) => match flags.as_slice() {
                [] => f.write_str("none()"),
                [flag] => description_substring(f, &tag::tag(*flag)),
                _ => {
                    f.write_str("(")?;
                    for (i, flag) in flags.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" | ")?;
                        }
                        description_substring(f, &tag::tag(*flag))?;
                    }
                    f.write_str(")")
                }
            },
            Revset::Tasks => description_substring(f, "[task:"),
            Revset::Union(members) => match members.as_slice() {
                [] => f.write_str("none()"),
                [single] => write!(f, "{}", single),
                _ => {
                    f.write_str("(")?;
                    for (i, member) in members.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" | ")?;
                        }
                        write!(f, "{}", member)?;
                    }
                    f.write_str(")")
                }
            },
            Revset::Intersection(a, b) => write!(f, "({} & {})", a, b),
            Revset::Difference(a, b) => write!(f, "({} ~ {})", a, b),
            Revset::Parents(inner) => write!(f, "parents({})", inner),
            Revset::Children(inner) => write!(f, "children({})", inner),
            Revset::Descendants(inner) => write!(f, "descendants({})", inner),
            Revset::Ancestors(inner) => write!(f, "ancestors({})", inner),
            Revset::Heads(inner) => write!(f, "heads({})", inner),
            Revset::Latest(inner) => write!(f, "latest({})", inner),
        }
    }
}

/// Logical task categories used for listing and discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// draft, todo or wip
    Pending,
    /// A single flag
    Only(Flag),
    /// Any task at all
    All,
}

impl TaskStatus {
    /// Build the revset selecting tasks in this category.
    pub fn revset(&self) -> Revset {
        match self {
            TaskStatus::Pending => Revset::Flagged(Flag::PENDING.to_vec()),
            TaskStatus::Only(flag) => Revset::Flagged(vec![*flag]),
            TaskStatus::All => Revset::Tasks,
        }
    }

    /// Whether a description falls into this category.
    pub fn matches(&self, description: &str) -> bool {
        match (self, tag::parse_flag(description)) {
            (_, None) => false,
            (TaskStatus::Pending, Some(flag)) => flag.is_pending(),
            (TaskStatus::Only(want), Some(flag)) => *want == flag,
            (TaskStatus::All, Some(_)) => true,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "all" => Ok(TaskStatus::All),
            other => other
                .parse::<Flag>()
                .map(TaskStatus::Only)
                .map_err(|_| format!("unknown status '{}' (expected pending, all, or a flag name)", other)),
        }
    }
}

/// Tasks that still need work.
pub fn tasks_pending() -> Revset {
    TaskStatus::Pending.revset()
}

/// Finished tasks.
pub fn tasks_done() -> Revset {
    TaskStatus::Only(Flag::Done).revset()
}

/// Any task.
pub fn tasks() -> Revset {
    TaskStatus::All.revset()
}
