// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use log::{debug, info};

use graph::{
    BuildSession, Datedness, DependencyGraph, EntryId, ExpansionError, JobContext, JobStatus,
    JobValue, RuleSet, StalenessPolicy,
};
use targets::TargetHandle;
use worker_pool::{Job, WorkerPool};

/// How long the collect phase waits for a first result before looking for new dispatchable work.
const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

type Pool = WorkerPool<EntryId, Option<JobValue>>;

///
/// Drives builds against a ruleset: expands root targets into the dependency graph, dispatches
/// ready leaves to a worker pool, consumes results, and propagates success and failure through
/// predecessors until no work remains.
///
/// All graph and node state is owned and mutated by the scheduler thread; workers only ever see
/// the recipe closures and their results.
///
pub struct GraphExecutor {
    graph: DependencyGraph,
    worker_count: usize,
    base_working_dir: PathBuf,
    ready_leaves: IndexSet<EntryId>,
    jobs_in_flight: usize,
    successful: bool,
}

impl GraphExecutor {
    ///
    /// `working_dir` is the base directory recipes run in; a target may carry a relative override
    /// which is resolved against it per job.
    ///
    pub fn new(
        ruleset: RuleSet,
        worker_count: usize,
        working_dir: impl Into<PathBuf>,
    ) -> GraphExecutor {
        GraphExecutor {
            graph: DependencyGraph::new(Arc::new(ruleset)),
            worker_count,
            base_working_dir: working_dir.into(),
            ready_leaves: IndexSet::new(),
            jobs_in_flight: 0,
            successful: true,
        }
    }

    pub fn set_staleness_policy(&mut self, policy: StalenessPolicy) {
        self.graph.set_staleness_policy(policy);
    }

    /// The graph, for programmatic inspection of per-node outcomes after a build.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    ///
    /// Builds the given targets. `Ok(true)` means every reached node succeeded or was skipped;
    /// `Ok(false)` means at least one recipe failed (independent subgraphs still completed).
    /// `Err` is reserved for failures to materialize the graph itself, which abort the build.
    ///
    pub fn build<I>(&mut self, targets: I) -> Result<bool, ExpansionError>
    where
        I: IntoIterator<Item = TargetHandle>,
    {
        self.graph.reset_run_state();
        self.ready_leaves.clear();
        self.jobs_in_flight = 0;
        self.successful = true;

        for target in targets {
            let root = self.graph.ensure_node(&target)?;
            self.expand(root)?;
        }

        let mut pool = WorkerPool::new(self.worker_count);
        pool.start();

        let finished = loop {
            if let Err(err) = self.dispatch(&pool) {
                break Err(err);
            }
            if self.jobs_in_flight == 0 {
                break Ok(self.successful);
            }
            if let Err(err) = self.collect(&pool) {
                break Err(err);
            }
        };

        pool.stop();
        finished
    }

    fn dispatch(&mut self, pool: &Pool) -> Result<(), ExpansionError> {
        while let Some(entry) = self.ready_leaves.pop() {
            // A node is dispatched at most once per build; readiness refreshes are conservative.
            if self.graph.node(entry).job_status() == JobStatus::Initial {
                self.dispatch_one(entry, pool)?;
            }
        }
        Ok(())
    }

    fn dispatch_one(&mut self, entry: EntryId, pool: &Pool) -> Result<(), ExpansionError> {
        let id = self.graph.node(entry).target_id().clone();

        if !self.graph.node(entry).rule().has_recipe() {
            debug!("No recipe for {id}");
            self.graph.node_mut(entry).set_job_status(JobStatus::Success);
            return self.node_succeeded(entry);
        }

        if self.graph.has_failed_dep(entry) {
            info!("Cannot build {id}: target has failed dependencies");
            self.graph.node_mut(entry).set_job_status(JobStatus::Failure);
            self.node_failed(entry);
            return Ok(());
        }

        match self.graph.datedness(entry) {
            Datedness::UpToDate => {
                info!("Skipping up-to-date {id}");
                self.graph.node_mut(entry).set_job_status(JobStatus::Skipped);
                self.node_succeeded(entry)
            }
            datedness => match self.graph.node(entry).rule().recipe() {
                Some(recipe) => {
                    match datedness {
                        Datedness::NeverBuilt => info!("Building {id}"),
                        _ => info!("Rebuilding out-of-date {id}"),
                    }
                    let job_context = JobContext {
                        working_dir: self.job_working_dir(entry),
                    };
                    pool.push_job(Job {
                        context: entry,
                        work: Box::new(move || recipe(job_context)),
                    });
                    self.jobs_in_flight += 1;
                    Ok(())
                }
                None => {
                    // The rule claims a recipe but produced none; complete it like a trivial one.
                    debug!("No recipe for {id}");
                    self.graph.node_mut(entry).set_job_status(JobStatus::Success);
                    self.node_succeeded(entry)
                }
            },
        }
    }

    fn collect(&mut self, pool: &Pool) -> Result<(), ExpansionError> {
        // Block briefly for the first result to avoid spinning, then drain without blocking.
        let mut timeout = Some(RESULT_POLL_INTERVAL);
        while let Some(job_result) = pool.pop_result(timeout) {
            timeout = None;
            self.jobs_in_flight -= 1;

            let entry = job_result.context;
            let id = self.graph.node(entry).target_id().clone();
            match job_result.result {
                Ok(value) => {
                    info!("Built {id}");
                    let node = self.graph.node_mut(entry);
                    node.set_job_result(Ok(value));
                    node.set_job_status(JobStatus::Success);
                    self.node_succeeded(entry)?;
                }
                Err(cause) => {
                    info!("Recipe failed for {id}: {cause}");
                    self.successful = false;
                    let node = self.graph.node_mut(entry);
                    node.set_job_result(Err(cause));
                    node.set_job_status(JobStatus::Failure);
                    self.node_failed(entry);
                }
            }
        }
        Ok(())
    }

    ///
    /// Runs the rule's `on_success` hook - which may re-expand part of the graph - and then
    /// re-evaluates the readiness of every predecessor. The hook always sees the node's final
    /// status, and always runs before any predecessor can be dispatched.
    ///
    fn node_succeeded(&mut self, entry: EntryId) -> Result<(), ExpansionError> {
        let rule = self.graph.node(entry).rule().clone();
        let value = self.graph.node(entry).job_value();
        rule.on_success(self, entry, value)?;
        self.refresh_predecessors(entry);
        Ok(())
    }

    /// There is no `on_failure` hook; failure only propagates readiness so that dependents can
    /// cascade to failure without running their recipes.
    fn node_failed(&mut self, entry: EntryId) {
        self.refresh_predecessors(entry);
    }

    fn refresh_predecessors(&mut self, entry: EntryId) {
        for predecessor in self.graph.predecessors(entry) {
            if self.graph.node(predecessor).job_status() == JobStatus::Initial
                && self.graph.all_deps_done(predecessor)
            {
                self.ready_leaves.insert(predecessor);
            }
        }
    }

    fn job_working_dir(&self, entry: EntryId) -> PathBuf {
        match self.graph.node(entry).target().working_dir() {
            None => self.base_working_dir.clone(),
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.base_working_dir.join(path),
        }
    }
}

impl BuildSession for GraphExecutor {
    fn dep_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    fn expand(&mut self, entry: EntryId) -> Result<(), ExpansionError> {
        let leaves = self.graph.expand(entry)?;
        self.ready_leaves.extend(leaves);
        Ok(())
    }
}
