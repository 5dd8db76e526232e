//! Shared test infrastructure for jjtask integration tests.
//!
//! Provides an in-memory revision graph with jj-like semantics and a
//! TestEnv helper wrapping an engine over it.

#![allow(dead_code)]

use eyre::{Result, bail, eyre};
use jjtask::{BatchReport, ChangeId, CreateOptions, DoneTask, Engine, Flag, GraphStore, Revision, Revset, WipTask, tag};
use std::collections::{BTreeMap, BTreeSet};

/// Change id of the root revision.
pub const ROOT: &str = "root";

#[derive(Debug, Clone)]
pub struct Node {
    pub parents: Vec<String>,
    pub description: String,
    pub files: BTreeMap<String, String>,
    pub created: u64,
    pub committed: u64,
}

/// A graph mutation, recorded in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Describe(String),
    NewChild(String),
    RebaseSource { source: String, onto: Vec<String> },
    /// `rewired` lists the children moved onto the revision's old parents.
    RebaseRevision { rev: String, onto: Vec<String>, rewired: Vec<String> },
    Abandon(String),
    Squash { into: String, sources: Vec<String> },
}

/// In-memory revision graph keyed by stable change ids.
///
/// Rebases only rewrite parent edges, so descendants follow automatically.
/// Descriptions get a trailing newline like jj stores them.
#[derive(Debug)]
pub struct MemoryGraph {
    nodes: BTreeMap<String, Node>,
    working_copy: String,
    next_id: u64,
    clock: u64,
    mutations: Vec<Mutation>,
    /// Keep squashed sources (emptied) instead of abandoning them.
    pub keep_squashed_sources: bool,
    /// Make `rebase_source` fail for this change id.
    pub fail_rebase_of: Option<String>,
    /// Make every `is_ancestor` call fail.
    pub fail_ancestry: bool,
}

fn normalize(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

fn dedup(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

impl MemoryGraph {
    /// Root plus an empty working copy on top of it.
    pub fn new() -> Self {
        let mut graph = Self::bare();
        let wc = graph.insert(vec![ROOT.to_string()], "");
        graph.working_copy = wc;
        graph
    }

    /// A graph whose working copy is the parentless root.
    pub fn bare() -> Self {
        let mut graph = Self {
            nodes: BTreeMap::new(),
            working_copy: ROOT.to_string(),
            next_id: 0,
            clock: 0,
            mutations: Vec::new(),
            keep_squashed_sources: false,
            fail_rebase_of: None,
            fail_ancestry: false,
        };
        graph.nodes.insert(
            ROOT.to_string(),
            Node {
                parents: Vec::new(),
                description: String::new(),
                files: BTreeMap::new(),
                created: 0,
                committed: 0,
            },
        );
        graph
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, parents: Vec<String>, description: &str) -> String {
        self.next_id += 1;
        let id = format!("c{:02}", self.next_id);
        let stamp = self.tick();
        self.nodes.insert(
            id.clone(),
            Node {
                parents: dedup(parents),
                description: normalize(description),
                files: BTreeMap::new(),
                created: stamp,
                committed: stamp,
            },
        );
        id
    }

    fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| eyre!("revision '{}' doesn't exist", id))
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| eyre!("revision '{}' doesn't exist", id))
    }

    fn resolve_id(&self, rev: &str) -> Result<String> {
        let id = match rev {
            "@" => self.working_copy.clone(),
            "root()" => ROOT.to_string(),
            other => other.to_string(),
        };
        self.node(&id)?;
        Ok(id)
    }

    fn children_of(&self, id: &str) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parents.iter().any(|p| p == id))
            .map(|(child, _)| child.clone())
            .collect()
    }

    fn ancestors_of(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(next) = stack.pop() {
            if seen.insert(next.clone())
                && let Some(node) = self.nodes.get(&next)
            {
                stack.extend(node.parents.iter().cloned());
            }
        }
        seen
    }

    fn descendants_of(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                stack.extend(self.children_of(&next));
            }
        }
        seen
    }

    /// Children before parents; among ready nodes, newest first.
    fn log_order(&self) -> Vec<String> {
        let mut remaining: BTreeMap<String, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.parents.len()))
            .collect();
        let mut ready: Vec<String> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| id.clone())
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while !ready.is_empty() {
            ready.sort_by_key(|id| self.nodes[id].created);
            let id = ready.remove(0);
            for child in self.children_of(&id) {
                if let Some(count) = remaining.get_mut(&child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(child);
                    }
                }
            }
            order.push(id);
        }

        order.reverse();
        order
    }

    fn contains_tag(&self, id: &str, needle: &str) -> bool {
        self.nodes[id].description.contains(needle)
    }

    fn eval(&self, revset: &Revset) -> Result<BTreeSet<String>> {
        let all = || self.nodes.keys().cloned().collect::<BTreeSet<_>>();
        Ok(match revset {
            Revset::WorkingCopy => BTreeSet::from([self.working_copy.clone()]),
            Revset::All => all(),
            Revset::Expr(expr) if expr == "all()" => all(),
            Revset::Expr(expr) => BTreeSet::from([self.resolve_id(expr)?]),
            Revset::Change(id) => BTreeSet::from([self.resolve_id(id.as_str())?]),
            Revset::Flagged(flags) => {
                let needles: Vec<String> = flags.iter().map(|f| tag::tag(*f)).collect();
                all()
                    .into_iter()
                    .filter(|id| needles.iter().any(|n| self.contains_tag(id, n)))
                    .collect()
            }
            Revset::Tasks => all()
                .into_iter()
                .filter(|id| self.contains_tag(id, "[task:"))
                .collect(),
            Revset::Union(members) => {
                let mut out = BTreeSet::new();
                for member in members {
                    out.extend(self.eval(member)?);
                }
                out
            }
            Revset::Intersection(a, b) => {
                let b = self.eval(b)?;
                self.eval(a)?.into_iter().filter(|id| b.contains(id)).collect()
            }
            Revset::Difference(a, b) => {
                let b = self.eval(b)?;
                self.eval(a)?.into_iter().filter(|id| !b.contains(id)).collect()
            }
            Revset::Parents(inner) => self
                .eval(inner)?
                .iter()
                .flat_map(|id| self.nodes[id].parents.clone())
                .collect(),
            Revset::Children(inner) => self
                .eval(inner)?
                .iter()
                .flat_map(|id| self.children_of(id))
                .collect(),
            Revset::Descendants(inner) => self
                .eval(inner)?
                .iter()
                .flat_map(|id| self.descendants_of(id))
                .collect(),
            Revset::Ancestors(inner) => self
                .eval(inner)?
                .iter()
                .flat_map(|id| self.ancestors_of(id))
                .collect(),
            Revset::Heads(inner) => {
                let members = self.eval(inner)?;
                members
                    .iter()
                    .filter(|id| {
                        !members
                            .iter()
                            .any(|other| other != *id && self.ancestors_of(other).contains(*id))
                    })
                    .cloned()
                    .collect()
            }
            Revset::Latest(inner) => self
                .eval(inner)?
                .into_iter()
                .max_by_key(|id| self.nodes[id].committed)
                .into_iter()
                .collect(),
        })
    }

    fn abandon_id(&mut self, id: &str) -> Result<()> {
        if id == ROOT {
            bail!("cannot abandon the root revision");
        }
        let old_parents = self.node(id)?.parents.clone();
        for child in self.children_of(id) {
            let node = self.node_mut(&child)?;
            let rewired = node
                .parents
                .iter()
                .flat_map(|p| if p == id { old_parents.clone() } else { vec![p.clone()] });
            node.parents = dedup(rewired);
        }
        self.nodes.remove(id);
        if self.working_copy == id {
            self.working_copy = self.insert(old_parents, "");
        }
        Ok(())
    }

    // Test helpers

    /// Create a plain commit under `parent` with one file.
    pub fn commit(&mut self, parent: &str, description: &str, file: &str) -> ChangeId {
        let parent = self.resolve_id(parent).expect("parent exists");
        let id = self.insert(vec![parent], description);
        self.write_file(&id, file, description);
        ChangeId::new(id)
    }

    /// Set a file in a revision's own changes.
    pub fn write_file(&mut self, rev: &str, path: &str, content: &str) {
        let id = self.resolve_id(rev).expect("revision exists");
        self.nodes
            .get_mut(&id)
            .expect("revision exists")
            .files
            .insert(path.to_string(), content.to_string());
    }

    /// A revision's own changes.
    pub fn files(&self, rev: &str) -> BTreeMap<String, String> {
        let id = self.resolve_id(rev).expect("revision exists");
        self.nodes[&id].files.clone()
    }

    pub fn exists(&self, id: &ChangeId) -> bool {
        self.nodes.contains_key(id.as_str())
    }

    pub fn working_copy_id(&self) -> ChangeId {
        ChangeId::new(self.working_copy.clone())
    }

    /// Number of mutations applied so far.
    pub fn operation_count(&self) -> usize {
        self.mutations.len()
    }

    /// Every mutation applied so far.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryGraph {
    fn resolve(&self, rev: &str) -> Result<ChangeId> {
        self.resolve_id(rev).map(ChangeId::new)
    }

    fn log(&self, revset: &Revset, limit: Option<usize>) -> Result<Vec<Revision>> {
        let members = self.eval(revset)?;
        Ok(self
            .log_order()
            .into_iter()
            .filter(|id| members.contains(id))
            .take(limit.unwrap_or(usize::MAX))
            .map(|id| Revision {
                description: self.nodes[&id].description.clone(),
                change_id: ChangeId::new(id),
            })
            .collect())
    }

    fn description(&self, rev: &str) -> Result<String> {
        let id = self.resolve_id(rev)?;
        Ok(self.nodes[&id].description.clone())
    }

    fn set_description(&mut self, rev: &str, text: &str) -> Result<()> {
        let id = self.resolve_id(rev)?;
        let stamp = self.tick();
        let node = self.node_mut(&id)?;
        node.description = normalize(text);
        node.committed = stamp;
        self.mutations.push(Mutation::Describe(id));
        Ok(())
    }

    fn parents(&self, rev: &str) -> Result<Vec<ChangeId>> {
        let id = self.resolve_id(rev)?;
        Ok(self.nodes[&id].parents.iter().map(|p| ChangeId::new(p.clone())).collect())
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        if self.fail_ancestry {
            bail!("injected ancestry failure");
        }
        let ancestor = self.resolve_id(ancestor)?;
        let descendant = self.resolve_id(descendant)?;
        Ok(self.ancestors_of(&descendant).contains(&ancestor))
    }

    fn is_empty(&self, rev: &str) -> Result<bool> {
        let id = self.resolve_id(rev)?;
        Ok(self.nodes[&id].files.is_empty())
    }

    fn new_child(&mut self, parent: &str, message: &str) -> Result<ChangeId> {
        let parent = self.resolve_id(parent)?;
        let id = self.insert(vec![parent], message);
        self.mutations.push(Mutation::NewChild(id.clone()));
        Ok(ChangeId::new(id))
    }

    fn rebase_source(&mut self, source: &str, onto: &[ChangeId]) -> Result<()> {
        let id = self.resolve_id(source)?;
        if self.fail_rebase_of.as_deref() == Some(id.as_str()) {
            bail!("injected rebase failure for {}", id);
        }
        if onto.is_empty() {
            bail!("rebase of {} needs at least one destination", id);
        }
        let moving = self.descendants_of(&id);
        for dest in onto {
            self.node(dest.as_str())?;
            if moving.contains(dest.as_str()) {
                bail!("cannot rebase {} onto its descendant {}", id, dest);
            }
        }

        let stamp = self.tick();
        for member in &moving {
            self.node_mut(member)?.committed = stamp;
        }
        let onto = dedup(onto.iter().map(|d| d.to_string()));
        self.node_mut(&id)?.parents = onto.clone();
        self.mutations.push(Mutation::RebaseSource { source: id, onto });
        Ok(())
    }

    fn rebase_revision(&mut self, rev: &str, onto: &[ChangeId]) -> Result<()> {
        let id = self.resolve_id(rev)?;
        if onto.is_empty() {
            bail!("rebase of {} needs at least one destination", id);
        }
        if onto.iter().any(|d| d.as_str() == id) {
            bail!("cannot rebase {} onto itself", id);
        }
        for dest in onto {
            self.node(dest.as_str())?;
        }

        let old_parents = self.node(&id)?.parents.clone();
        let children = self.children_of(&id);
        for child in &children {
            let node = self.node_mut(child)?;
            let rewired = node
                .parents
                .iter()
                .flat_map(|p| if *p == id { old_parents.clone() } else { vec![p.clone()] });
            node.parents = dedup(rewired);
        }

        let stamp = self.tick();
        let onto = dedup(onto.iter().map(|d| d.to_string()));
        let node = self.node_mut(&id)?;
        node.parents = onto.clone();
        node.committed = stamp;
        self.mutations.push(Mutation::RebaseRevision {
            rev: id,
            onto,
            rewired: children,
        });
        Ok(())
    }

    fn abandon(&mut self, rev: &str) -> Result<()> {
        let id = self.resolve_id(rev)?;
        self.abandon_id(&id)?;
        self.mutations.push(Mutation::Abandon(id));
        Ok(())
    }

    fn squash_parents(&mut self, message: &str) -> Result<()> {
        let wc = self.working_copy.clone();
        let parents = self.node(&wc)?.parents.clone();
        if parents.is_empty() || parents.iter().any(|p| p == ROOT) {
            bail!("cannot squash the root revision");
        }
        let bases = dedup(
            parents
                .iter()
                .flat_map(|p| self.nodes[p].parents.clone())
                .filter(|base| !parents.contains(base)),
        );

        let mut files = BTreeMap::new();
        for parent in &parents {
            let node = self.node_mut(parent)?;
            files.extend(std::mem::take(&mut node.files));
        }
        let stamp = self.tick();
        let node = self.node_mut(&wc)?;
        files.extend(std::mem::take(&mut node.files));
        node.files = files;
        node.description = normalize(message);
        node.committed = stamp;

        if !self.keep_squashed_sources {
            for parent in &parents {
                self.abandon_id(parent)?;
            }
        }
        self.node_mut(&wc)?.parents = bases;
        self.mutations.push(Mutation::Squash {
            into: wc,
            sources: parents,
        });
        Ok(())
    }

    fn operation_id(&self) -> Result<String> {
        Ok(format!("op{:04}", self.mutations.len()))
    }
}

/// Test environment over an in-memory graph.
pub struct TestEnv {
    pub engine: Engine<MemoryGraph>,
}

impl TestEnv {
    /// Root with an empty working copy on top.
    pub fn new() -> Self {
        Self {
            engine: Engine::new(MemoryGraph::new()),
        }
    }

    /// A "Base commit" holding base.txt, with the working copy on top.
    pub fn with_base() -> (Self, ChangeId) {
        let mut env = Self::new();
        let base = env.graph_mut().commit("root()", "Base commit", "base.txt");
        env.graph_mut()
            .rebase_source("@", std::slice::from_ref(&base))
            .expect("Failed to move @ onto base");
        (env, base)
    }

    pub fn graph(&self) -> &MemoryGraph {
        self.engine.store()
    }

    pub fn graph_mut(&mut self) -> &mut MemoryGraph {
        self.engine.store_mut()
    }

    /// Create a todo task as a child of @.
    pub fn create_task(&mut self, title: &str) -> ChangeId {
        self.engine
            .create(title, None, &CreateOptions::default())
            .expect("Failed to create task")
            .change_id
    }

    /// Create a todo task under an explicit parent.
    pub fn create_task_under(&mut self, parent: &ChangeId, title: &str) -> ChangeId {
        let options = CreateOptions {
            parent: Some(parent.to_string()),
            ..CreateOptions::default()
        };
        self.engine
            .create(title, None, &options)
            .expect("Failed to create task")
            .change_id
    }

    /// Run wip and assert every task succeeded.
    pub fn wip(&mut self, tasks: &[&ChangeId]) -> BatchReport<WipTask> {
        let report = self.engine.wip(&revs(tasks));
        assert!(report.is_success(), "wip failed: {:?}", report.errors);
        report
    }

    /// Run done and assert every task succeeded.
    pub fn done(&mut self, tasks: &[&ChangeId]) -> BatchReport<DoneTask> {
        let report = self.engine.done(&revs(tasks));
        assert!(report.is_success(), "done failed: {:?}", report.errors);
        report
    }

    pub fn wc_parents(&self) -> Vec<ChangeId> {
        self.graph().parents("@").expect("Failed to read @ parents")
    }

    pub fn parents_of(&self, id: &ChangeId) -> Vec<ChangeId> {
        self.graph().parents(id.as_str()).expect("Failed to read parents")
    }

    pub fn flag(&self, id: &ChangeId) -> Option<Flag> {
        let desc = self.graph().description(id.as_str()).expect("Failed to read description");
        tag::parse_flag(&desc)
    }

    pub fn description(&self, id: &ChangeId) -> String {
        self.graph().description(id.as_str()).expect("Failed to read description")
    }

    /// Assert that since mutation `mark`, `working_copy` was only ever moved
    /// with `rebase_source` on itself: never squashed, abandoned,
    /// re-described or re-parented as a side effect.
    pub fn assert_working_copy_only_rebased(&self, mark: usize, working_copy: &ChangeId) {
        let wc = working_copy.as_str();
        assert_eq!(self.graph().working_copy_id(), *working_copy, "@ was replaced");
        for mutation in &self.graph().mutations()[mark..] {
            let touches = match mutation {
                Mutation::RebaseSource { .. } | Mutation::NewChild(_) => false,
                Mutation::Describe(id) | Mutation::Abandon(id) => id == wc,
                Mutation::RebaseRevision { rev, rewired, .. } => {
                    rev == wc || rewired.iter().any(|child| child == wc)
                }
                Mutation::Squash { .. } => true,
            };
            assert!(!touches, "@ rewritten by {:?}", mutation);
        }
    }

    /// Assert that `a` is in `::b`.
    pub fn assert_ancestor(&self, a: &ChangeId, b: &str) {
        assert!(
            self.graph().is_ancestor(a.as_str(), b).expect("ancestry query"),
            "Expected {} to be an ancestor of {}",
            a,
            b
        );
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Change ids as revision arguments.
pub fn revs(ids: &[&ChangeId]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}
