//! Encoding of task state in revision descriptions.
//!
//! A task description looks like:
//!
//! ```text
//! [task:todo] Title
//!
//! Optional body
//! ```
//!
//! The tag must be the leading token of the first line. Anything else is
//! not a task.

use crate::types::Flag;

const TAG_OPEN: &str = "[task:";
const TAG_CLOSE: char = ']';

/// A decoded task description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescription {
    pub flag: Flag,
    pub title: String,
    pub body: Option<String>,
}

impl TaskDescription {
    pub fn new(flag: Flag, title: impl Into<String>) -> Self {
        Self {
            flag,
            title: title.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    /// Render to description text.
    pub fn render(&self) -> String {
        let mut text = format!("{} {}", tag(self.flag), self.title);
        if let Some(body) = &self.body {
            text.push_str("\n\n");
            text.push_str(body);
        }
        text
    }
}

/// The bracketed tag for a flag, e.g. `[task:wip]`.
pub fn tag(flag: Flag) -> String {
    format!("{}{}{}", TAG_OPEN, flag, TAG_CLOSE)
}

/// Split the first line into (flag, text after the closing bracket).
fn split_tag(first_line: &str) -> Option<(Flag, &str)> {
    let rest = first_line.strip_prefix(TAG_OPEN)?;
    let (name, after) = rest.split_once(TAG_CLOSE)?;
    let flag = name.parse().ok()?;
    Some((flag, after))
}

/// Split off the first line, without its line ending.
fn first_line(description: &str) -> (&str, &str) {
    let (first, rest) = description.split_once('\n').unwrap_or((description, ""));
    (first.strip_suffix('\r').unwrap_or(first), rest)
}

/// Decode a description, or `None` if it carries no task tag.
pub fn parse(description: &str) -> Option<TaskDescription> {
    let (first, rest) = first_line(description);
    let (flag, after) = split_tag(first)?;
    let title = after.strip_prefix(' ').unwrap_or(after).to_string();

    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest)
        .trim_end_matches(['\r', '\n']);
    let body = if body.trim().is_empty() {
        None
    } else {
        Some(body.to_string())
    };

    Some(TaskDescription { flag, title, body })
}

/// The flag of a description, if it is a task.
pub fn parse_flag(description: &str) -> Option<Flag> {
    split_tag(first_line(description).0).map(|(flag, _)| flag)
}

/// Replace the flag token, leaving every other byte untouched.
///
/// Returns `None` when the description is not a task.
pub fn replace_flag(description: &str, flag: Flag) -> Option<String> {
    let (first, _) = first_line(description);
    let (_, after) = split_tag(first)?;
    let tail_start = first.len() - after.len();
    Some(format!("{}{}", tag(flag), &description[tail_start..]))
}

/// First line with the tag removed, for summaries.
pub fn strip_tag(description: &str) -> &str {
    let trimmed = description.trim();
    let (first, _) = first_line(trimmed);
    match first.strip_prefix(TAG_OPEN).and_then(|rest| rest.split_once(TAG_CLOSE)) {
        Some((_, after)) => after.trim(),
        None => first.trim(),
    }
}
