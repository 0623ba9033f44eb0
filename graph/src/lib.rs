// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]
// Arc<Mutex> can be more clear than needing to grok Orderings:
#![allow(clippy::mutex_atomic)]

pub mod node;
pub mod rule;
pub mod ruleset;

pub use crate::node::{Datedness, EntryId, JobStatus, Node};
pub use crate::rule::{
    JobContext, JobValue, LeafRule, Recipe, Rule, RuleFactory, SourceRule, TrivialRule,
};
pub use crate::ruleset::{RuleSet, RuleSetBuilder};

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};
use petgraph::stable_graph::StableDiGraph;
use petgraph::Direction;

use targets::{Stamp, TargetHandle, TargetId};

use crate::node::TraversalState;

type PGraph = StableDiGraph<Node, (), u32>;
type Nodes = HashMap<TargetId, EntryId>;

///
/// An error raised while materializing the dependency graph. All of these are fatal to the build:
/// they surface before any recipe for the affected subgraph runs.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpansionError {
    /// No static rule and no factory matches a required target.
    NoRuleMatch { id: TargetId },
    /// More than one factory matches a target.
    AmbiguousTarget {
        id: TargetId,
        factories: Vec<String>,
    },
    /// Expansion found a back-edge. The path runs from the re-entered target back to itself.
    CyclicDependency { path: Vec<TargetId> },
    /// A rule's `deps` failed while the named target was being expanded.
    GraphExpansion { id: TargetId, cause: String },
}

impl fmt::Display for ExpansionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionError::NoRuleMatch { id } => {
                write!(f, "No rule found matching target ID {id}.")
            }
            ExpansionError::AmbiguousTarget { id, factories } => {
                write!(
                    f,
                    "Ambiguous target ID {id} corresponds to several rule factories:"
                )?;
                for name in factories {
                    write!(f, "\n - {name}")?;
                }
                Ok(())
            }
            ExpansionError::CyclicDependency { path } => {
                write!(f, "Cyclic dependency:")?;
                let mut sep = "\n\t   ";
                for id in path {
                    write!(f, "{sep}{id}")?;
                    sep = "\n\t-> ";
                }
                Ok(())
            }
            ExpansionError::GraphExpansion { id, cause } => {
                write!(f, "Failed to expand dependencies of {id}: {cause}")
            }
        }
    }
}

impl Error for ExpansionError {}

///
/// Which timestamp comparison marks a target out of date relative to its newest dependency.
///
/// `NewerDeps` uses strict `<`: a dependency with a timestamp equal to the target's does not
/// force a rebuild, which suits coarse filesystem clocks and matches common build-tool behavior.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StalenessPolicy {
    NewerDeps,
    NewerOrEqualDeps,
}

impl StalenessPolicy {
    fn is_stale(self, own: Stamp, newest_dep: Stamp) -> bool {
        match self {
            StalenessPolicy::NewerDeps => own < newest_dep,
            StalenessPolicy::NewerOrEqualDeps => own <= newest_dep,
        }
    }
}

///
/// The scheduler surface exposed to `Rule::on_success`. The hook runs on the scheduler thread and
/// may re-expand part of the graph to graft in dependencies discovered by a recipe.
///
pub trait BuildSession {
    fn dep_graph(&self) -> &DependencyGraph;

    /// Re-expands the subgraph rooted at `entry`, scheduling any newly ready leaves.
    fn expand(&mut self, entry: EntryId) -> Result<(), ExpansionError>;
}

/// Propagated while unwinding a failed expansion. Cycle paths grow one entry per frame until the
/// re-entered target closes the loop; other errors pass through untouched.
enum Unwind {
    Cycle { path: Vec<TargetId>, closed: bool },
    Failed(ExpansionError),
}

///
/// A lazily materialized DAG of build targets, indexed by canonical target id.
///
/// The graph is the cache for rule resolution: the first reference to a target id resolves a rule
/// and creates a node, and every later reference shares it. Expansion walks `Rule::deps`
/// depth-first from a root, detecting cycles via traversal marks, and reports the set of newly
/// discovered schedulable leaves.
///
pub struct DependencyGraph {
    ruleset: Arc<RuleSet>,
    pg: PGraph,
    nodes: Nodes,
    staleness_policy: StalenessPolicy,
}

impl DependencyGraph {
    pub fn new(ruleset: Arc<RuleSet>) -> DependencyGraph {
        DependencyGraph {
            ruleset,
            pg: StableDiGraph::default(),
            nodes: HashMap::default(),
            staleness_policy: StalenessPolicy::NewerDeps,
        }
    }

    pub fn set_staleness_policy(&mut self, policy: StalenessPolicy) {
        self.staleness_policy = policy;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The node for the given target id, if the target has been referenced.
    pub fn entry_id(&self, id: &TargetId) -> Option<EntryId> {
        self.nodes.get(id).copied()
    }

    pub fn node(&self, entry: EntryId) -> &Node {
        &self.pg[entry]
    }

    pub fn node_mut(&mut self, entry: EntryId) -> &mut Node {
        &mut self.pg[entry]
    }

    /// The nodes that depend on `entry`.
    pub fn predecessors(&self, entry: EntryId) -> Vec<EntryId> {
        self.pg
            .neighbors_directed(entry, Direction::Incoming)
            .collect()
    }

    ///
    /// Returns the existing node for the target's id, or resolves a rule and creates one.
    ///
    pub fn ensure_node(&mut self, target: &TargetHandle) -> Result<EntryId, ExpansionError> {
        if let Some(&entry) = self.nodes.get(target.id()) {
            return Ok(entry);
        }

        let rule = self.ruleset.find_or_make_rule(target)?;
        let entry = self.pg.add_node(Node::new(rule));
        self.nodes.insert(target.id().clone(), entry);
        Ok(entry)
    }

    ///
    /// Expands the dependency subgraph reachable from `root`, returning the new leaves discovered
    /// by this traversal: nodes whose dependencies are absent or already terminal, and which are
    /// therefore ready for the scheduler.
    ///
    /// The root's traversal mark is reset first, so an already-expanded node can be re-expanded
    /// to pick up a changed `deps` list; descendants that were visited before are skipped.
    ///
    pub fn expand(&mut self, root: EntryId) -> Result<HashSet<EntryId>, ExpansionError> {
        self.pg[root].traversal_state = TraversalState::Unvisited;
        let mut leaves = HashSet::default();
        match self.expand_inner(root, &mut leaves) {
            Ok(()) => Ok(leaves),
            Err(Unwind::Cycle { mut path, .. }) => {
                // The path accumulated bottom-up; report it in dependency order.
                path.reverse();
                Err(ExpansionError::CyclicDependency { path })
            }
            Err(Unwind::Failed(err)) => Err(err),
        }
    }

    fn expand_inner(
        &mut self,
        entry: EntryId,
        leaves: &mut HashSet<EntryId>,
    ) -> Result<(), Unwind> {
        match self.pg[entry].traversal_state {
            TraversalState::Visited => return Ok(()),
            TraversalState::Visiting => {
                return Err(Unwind::Cycle {
                    path: vec![self.pg[entry].target_id().clone()],
                    closed: false,
                });
            }
            TraversalState::Unvisited => {}
        }
        self.pg[entry].traversal_state = TraversalState::Visiting;

        let rule = self.pg[entry].rule().clone();
        let dep_targets = rule.deps().map_err(|cause| {
            Unwind::Failed(ExpansionError::GraphExpansion {
                id: self.pg[entry].target_id().clone(),
                cause,
            })
        })?;

        let mut successors = Vec::with_capacity(dep_targets.len());
        for dep in &dep_targets {
            successors.push(self.ensure_node(dep).map_err(Unwind::Failed)?);
        }
        self.replace_successors(entry, successors);

        for successor in self.pg[entry].successors.clone() {
            self.expand_inner(successor, leaves)
                .map_err(|unwind| self.unwound_through(entry, unwind))?;
        }

        self.pg[entry].traversal_state = TraversalState::Visited;
        if self.all_deps_done(entry) {
            log::trace!("Found leaf {}", self.pg[entry].target_id());
            leaves.insert(entry);
        }
        Ok(())
    }

    ///
    /// Installs a freshly computed dependency list, replacing the previous one. Edges are
    /// reconciled rather than appended: a dependency dropped by the latest `deps` call loses its
    /// predecessor edge, and newly discovered dependencies gain one.
    ///
    fn replace_successors(&mut self, entry: EntryId, successors: Vec<EntryId>) {
        let old: HashSet<EntryId> = self.pg[entry].successors.iter().copied().collect();
        let new: HashSet<EntryId> = successors.iter().copied().collect();

        for &removed in old.difference(&new) {
            if let Some(edge) = self.pg.find_edge(entry, removed) {
                self.pg.remove_edge(edge);
            }
        }
        for &added in new.difference(&old) {
            self.pg.add_edge(entry, added, ());
        }

        self.pg[entry].successors = successors;
    }

    fn unwound_through(&self, entry: EntryId, unwind: Unwind) -> Unwind {
        match unwind {
            Unwind::Cycle { mut path, closed } => {
                if !closed {
                    let own = self.pg[entry].target_id().clone();
                    let closes = own == path[0];
                    path.push(own);
                    return Unwind::Cycle {
                        path,
                        closed: closes,
                    };
                }
                Unwind::Cycle { path, closed }
            }
            failed @ Unwind::Failed(_) => failed,
        }
    }

    ///
    /// The staleness oracle: classifies a node against its dependencies' timestamps.
    /// Dependencies that do not exist are excluded from the comparison - a phony dependency does
    /// not force a rebuild by virtue of its absence.
    ///
    pub fn datedness(&self, entry: EntryId) -> Datedness {
        let node = &self.pg[entry];
        let own = match node.target().timestamp() {
            Some(stamp) => stamp,
            None => return Datedness::NeverBuilt,
        };

        let newest_dep = node
            .successors
            .iter()
            .filter_map(|&successor| self.pg[successor].target().timestamp())
            .max();

        match newest_dep {
            Some(newest) if self.staleness_policy.is_stale(own, newest) => Datedness::OutOfDate,
            _ => Datedness::UpToDate,
        }
    }

    pub fn has_failed_dep(&self, entry: EntryId) -> bool {
        self.pg[entry]
            .successors
            .iter()
            .any(|&successor| self.pg[successor].job_status == JobStatus::Failure)
    }

    /// Whether every dependency has reached a terminal status, making `entry` schedulable.
    pub fn all_deps_done(&self, entry: EntryId) -> bool {
        self.pg[entry]
            .successors
            .iter()
            .all(|&successor| self.pg[successor].job_status != JobStatus::Initial)
    }

    ///
    /// Clears per-run node state (job outcomes and traversal marks) so the graph can drive a
    /// fresh build.
    ///
    pub fn reset_run_state(&mut self) {
        for node in self.pg.node_weights_mut() {
            node.traversal_state = TraversalState::Unvisited;
            node.job_status = JobStatus::Initial;
            node.job_result = None;
        }
    }
}

#[cfg(test)]
mod tests;
