//! Graph store backed by the `jj` executable.

use crate::config::JjConfig;
use crate::graph::{GraphStore, WORKING_COPY};
use crate::revset::Revset;
use crate::types::{ChangeId, Revision};
use eyre::{Context, Result, bail};
use log::{debug, warn};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Template printing one change id per line.
const ID_TEMPLATE: &str = r#"change_id.short() ++ "\n""#;

/// Template printing id, newline, description, NUL per revision.
const LOG_TEMPLATE: &str = r#"change_id.short() ++ "\n" ++ description ++ "\0""#;

/// Template printing a revision's parents in order.
const PARENTS_TEMPLATE: &str = r#"parents.map(|c| c.change_id().short()).join(" ") ++ "\n""#;

/// Poll interval while waiting on a jj process.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A jj repository accessed through the command line.
#[derive(Debug, Clone)]
pub struct JjStore {
    binary: String,
    repository: Option<PathBuf>,
    timeout: Duration,
}

impl JjStore {
    /// Create a store for the repository containing the current directory.
    pub fn new(config: &JjConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            repository: None,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Point the store at an explicit repository path.
    pub fn with_repository(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository = Some(path.into());
        self
    }

    /// Run jj and return stdout.
    fn run(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command.args(["--no-pager", "--color=never"]);
        if let Some(repo) = &self.repository {
            command.arg("-R").arg(repo);
        }
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("{} {}", self.binary, args.join(" "));

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().context("Failed to wait on jj")? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                bail!(
                    "jj {} timed out after {}s",
                    args.join(" "),
                    self.timeout.as_secs()
                );
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if !status.success() {
            bail!("jj {} failed: {}", args.join(" "), stderr.trim());
        }
        if !stderr.trim().is_empty() {
            debug!("jj stderr: {}", stderr.trim());
        }
        Ok(stdout)
    }

    fn log_template(&self, rev: &str, template: &str) -> Result<String> {
        self.run(&["log", "-r", rev, "--no-graph", "-T", template])
    }

    fn rebase(&mut self, mode: &str, rev: &str, onto: &[ChangeId]) -> Result<()> {
        if onto.is_empty() {
            bail!("rebase of {} needs at least one destination", rev);
        }
        let mut args = vec!["rebase", mode, rev];
        for dest in onto {
            args.push("-d");
            args.push(dest.as_str());
        }
        self.run(&args)?;
        Ok(())
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf) {
            warn!("Failed to read jj output: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Parse newline separated ids.
fn parse_ids(output: &str) -> Vec<ChangeId> {
    output
        .split_whitespace()
        .map(ChangeId::new)
        .collect()
}

/// Parse output produced with [`LOG_TEMPLATE`].
fn parse_log(output: &str) -> Result<Vec<Revision>> {
    let mut revisions = Vec::new();
    for record in output.split('\0') {
        if record.trim().is_empty() {
            continue;
        }
        let (id, description) = record
            .split_once('\n')
            .ok_or_else(|| eyre::eyre!("malformed jj log record: {:?}", record))?;
        revisions.push(Revision {
            change_id: ChangeId::new(id.trim()),
            description: description.to_string(),
        });
    }
    Ok(revisions)
}

/// Exactly one id, or an error naming the expression.
fn single_id(rev: &str, output: &str) -> Result<ChangeId> {
    match parse_ids(output).as_slice() {
        [id] => Ok(id.clone()),
        [] => bail!("revision '{}' matched nothing", rev),
        many => bail!(
            "revision '{}' is ambiguous: matches {} revisions",
            rev,
            many.len()
        ),
    }
}

impl GraphStore for JjStore {
    fn resolve(&self, rev: &str) -> Result<ChangeId> {
        let output = self.log_template(rev, ID_TEMPLATE)?;
        single_id(rev, &output)
    }

    fn log(&self, revset: &Revset, limit: Option<usize>) -> Result<Vec<Revision>> {
        let expr = revset.to_string();
        let limit = limit.map(|n| n.to_string());
        let mut args = vec!["log", "-r", expr.as_str(), "--no-graph", "-T", LOG_TEMPLATE];
        if let Some(limit) = &limit {
            args.push("--limit");
            args.push(limit);
        }
        let output = self.run(&args)?;
        parse_log(&output)
    }

    fn description(&self, rev: &str) -> Result<String> {
        self.resolve(rev)?;
        self.log_template(rev, "description")
    }

    fn set_description(&mut self, rev: &str, text: &str) -> Result<()> {
        self.run(&["describe", rev, "-m", text])?;
        Ok(())
    }

    fn parents(&self, rev: &str) -> Result<Vec<ChangeId>> {
        self.resolve(rev)?;
        let output = self.log_template(rev, PARENTS_TEMPLATE)?;
        Ok(parse_ids(&output))
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let expr = format!("({}) & ::({})", ancestor, descendant);
        let output = self.log_template(&expr, ID_TEMPLATE)?;
        Ok(!output.trim().is_empty())
    }

    fn is_empty(&self, rev: &str) -> Result<bool> {
        let output = self.log_template(rev, r#"if(empty, "empty", "changed")"#)?;
        Ok(output.trim() == "empty")
    }

    fn new_child(&mut self, parent: &str, message: &str) -> Result<ChangeId> {
        self.run(&["new", "--no-edit", parent, "-m", message])?;
        let created = Revset::expr(parent).children().latest();
        self.revisions(&created, Some(1))?
            .into_iter()
            .next()
            .ok_or_else(|| eyre::eyre!("created revision under {} not found", parent))
    }

    fn rebase_source(&mut self, source: &str, onto: &[ChangeId]) -> Result<()> {
        self.rebase("-s", source, onto)
    }

    fn rebase_revision(&mut self, rev: &str, onto: &[ChangeId]) -> Result<()> {
        self.rebase("-r", rev, onto)
    }

    fn abandon(&mut self, rev: &str) -> Result<()> {
        self.run(&["abandon", rev])?;
        Ok(())
    }

    fn squash_parents(&mut self, message: &str) -> Result<()> {
        let parents = self.parents(WORKING_COPY)?;
        let mut bases: Vec<ChangeId> = Vec::new();
        for parent in &parents {
            for base in self.parents(parent.as_str())? {
                if !parents.contains(&base) && !bases.contains(&base) {
                    bases.push(base);
                }
            }
        }

        self.run(&["squash", "--from", "parents(@)", "--into", WORKING_COPY, "-m", message])?;

        // Sources that jj kept are still parents of @.
        if !bases.is_empty() && self.parents(WORKING_COPY)? != bases {
            debug!("moving squashed @ onto {:?}", bases);
            self.rebase("-s", WORKING_COPY, &bases)?;
        }
        Ok(())
    }

    fn operation_id(&self) -> Result<String> {
        let output = self.run(&["op", "log", "--no-graph", "-T", r#"id.short() ++ "\n""#, "--limit", "1"])?;
        let id = output.trim();
        if id.is_empty() {
            bail!("operation log is empty");
        }
        Ok(id.to_string())
    }
}
