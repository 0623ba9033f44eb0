// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use petgraph::stable_graph;

use targets::{TargetHandle, TargetId};

use crate::rule::{JobValue, Rule};

// 2^32 Nodes ought to be more than enough for anyone!
pub type EntryId = stable_graph::NodeIndex<u32>;

///
/// Traversal marks consulted only while expanding the graph. `Visiting` on re-entry means a
/// back-edge, i.e. a dependency cycle.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TraversalState {
    Unvisited,
    Visiting,
    Visited,
}

///
/// The outcome assigned to a node during one build run.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// No outcome has been assigned yet.
    Initial,
    /// The recipe ran successfully, or there was no recipe to run.
    Success,
    /// The recipe ran and failed, or a dependency failed.
    Failure,
    /// The recipe was not run because the target was already up to date.
    Skipped,
}

///
/// A node's freshness relative to its dependencies.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Datedness {
    NeverBuilt,
    OutOfDate,
    UpToDate,
}

///
/// Runtime state for one target in the graph. Nodes are created on first reference and never
/// destroyed during a run; all mutation happens on the scheduler thread.
///
pub struct Node {
    rule: Arc<dyn Rule>,
    /// Dependencies, in `Rule::deps` order. Replaced wholesale on re-expansion.
    pub(crate) successors: Vec<EntryId>,
    pub(crate) traversal_state: TraversalState,
    pub(crate) job_status: JobStatus,
    pub(crate) job_result: Option<Result<Option<JobValue>, String>>,
}

impl Node {
    pub(crate) fn new(rule: Arc<dyn Rule>) -> Node {
        Node {
            rule,
            successors: Vec::new(),
            traversal_state: TraversalState::Unvisited,
            job_status: JobStatus::Initial,
            job_result: None,
        }
    }

    pub fn rule(&self) -> &Arc<dyn Rule> {
        &self.rule
    }

    pub fn target(&self) -> &TargetHandle {
        self.rule.target()
    }

    pub fn target_id(&self) -> &TargetId {
        self.rule.target().id()
    }

    pub fn successors(&self) -> &[EntryId] {
        &self.successors
    }

    pub fn job_status(&self) -> JobStatus {
        self.job_status
    }

    pub fn set_job_status(&mut self, status: JobStatus) {
        self.job_status = status;
    }

    pub fn job_result(&self) -> Option<&Result<Option<JobValue>, String>> {
        self.job_result.as_ref()
    }

    pub fn set_job_result(&mut self, result: Result<Option<JobValue>, String>) {
        self.job_result = Some(result);
    }

    /// The value produced by this node's recipe, if it ran successfully and returned one.
    pub fn job_value(&self) -> Option<JobValue> {
        match &self.job_result {
            Some(Ok(Some(value))) => Some(value.clone()),
            _ => None,
        }
    }
}
