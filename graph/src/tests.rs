// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use targets::{Stamp, Target, TargetHandle, TargetId};

use crate::rule::{Recipe, Rule, RuleFactory};
use crate::{
    Datedness, DependencyGraph, ExpansionError, JobStatus, RuleSet, RuleSetBuilder,
    StalenessPolicy,
};

struct TestTarget {
    id: TargetId,
    stamp: Option<Stamp>,
}

impl Target for TestTarget {
    fn id(&self) -> &TargetId {
        &self.id
    }

    fn timestamp(&self) -> Option<Stamp> {
        self.stamp
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn tid(name: &str) -> TargetId {
    TargetId::builder("TestTarget").attr("name", name).build()
}

fn target(name: &str) -> TargetHandle {
    Arc::new(TestTarget {
        id: tid(name),
        stamp: None,
    })
}

fn stamped_target(name: &str, stamp: Stamp) -> TargetHandle {
    Arc::new(TestTarget {
        id: tid(name),
        stamp: Some(stamp),
    })
}

fn at(secs: u64) -> Stamp {
    Stamp::Mtime(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

struct TestRule {
    target: TargetHandle,
    deps: Mutex<Vec<TargetHandle>>,
    deps_error: Option<String>,
}

impl TestRule {
    fn new(target: TargetHandle, deps: Vec<TargetHandle>) -> Arc<TestRule> {
        Arc::new(TestRule {
            target,
            deps: Mutex::new(deps),
            deps_error: None,
        })
    }

    fn failing(target: TargetHandle, cause: &str) -> Arc<TestRule> {
        Arc::new(TestRule {
            target,
            deps: Mutex::new(Vec::new()),
            deps_error: Some(cause.to_owned()),
        })
    }

    fn set_deps(&self, deps: Vec<TargetHandle>) {
        *self.deps.lock() = deps;
    }
}

impl Rule for TestRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        if let Some(cause) = &self.deps_error {
            return Err(cause.clone());
        }
        Ok(self.deps.lock().clone())
    }

    fn has_recipe(&self) -> bool {
        false
    }

    fn recipe(&self) -> Option<Recipe> {
        None
    }
}

fn ruleset(rules: Vec<Arc<TestRule>>) -> Arc<RuleSet> {
    let mut builder = RuleSetBuilder::new();
    for rule in rules {
        builder.static_rule(rule);
    }
    Arc::new(builder.build())
}

struct MatchAllFactory {
    name: &'static str,
}

impl RuleFactory for MatchAllFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn matches(&self, _target: &TargetHandle) -> bool {
        true
    }

    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule> {
        TestRule::new(target, Vec::new())
    }
}

#[test]
fn shares_nodes_by_target_id() {
    let leaf = target("leaf");
    let leaf_twin = target("leaf");
    let root = target("root");
    let rules = ruleset(vec![
        TestRule::new(root.clone(), vec![leaf.clone(), leaf_twin]),
        TestRule::new(leaf.clone(), Vec::new()),
    ]);

    let mut graph = DependencyGraph::new(rules);
    let root_entry = graph.ensure_node(&root).unwrap();
    let leaves = graph.expand(root_entry).unwrap();

    assert_eq!(graph.len(), 2);
    let leaf_entry = graph.entry_id(leaf.id()).unwrap();
    assert_eq!(graph.node(root_entry).successors(), &[leaf_entry, leaf_entry]);
    assert_eq!(leaves.into_iter().collect::<Vec<_>>(), vec![leaf_entry]);
}

#[test]
fn expansion_returns_only_the_deepest_leaves() {
    let (leaf, mid, root) = (target("leaf"), target("mid"), target("root"));
    let rules = ruleset(vec![
        TestRule::new(root.clone(), vec![mid.clone()]),
        TestRule::new(mid.clone(), vec![leaf.clone()]),
        TestRule::new(leaf.clone(), Vec::new()),
    ]);

    let mut graph = DependencyGraph::new(rules);
    let root_entry = graph.ensure_node(&root).unwrap();
    let leaves = graph.expand(root_entry).unwrap();

    let leaf_entry = graph.entry_id(leaf.id()).unwrap();
    assert_eq!(leaves.into_iter().collect::<Vec<_>>(), vec![leaf_entry]);
}

#[test]
fn reexpansion_reports_nodes_whose_deps_are_all_terminal() {
    let (leaf, root) = (target("leaf"), target("root"));
    let rules = ruleset(vec![
        TestRule::new(root.clone(), vec![leaf.clone()]),
        TestRule::new(leaf.clone(), Vec::new()),
    ]);

    let mut graph = DependencyGraph::new(rules);
    let root_entry = graph.ensure_node(&root).unwrap();
    graph.expand(root_entry).unwrap();

    let leaf_entry = graph.entry_id(leaf.id()).unwrap();
    graph.node_mut(leaf_entry).set_job_status(JobStatus::Success);

    // The leaf was already visited, so only the root (now schedulable) is newly discovered.
    let leaves = graph.expand(root_entry).unwrap();
    assert_eq!(leaves.into_iter().collect::<Vec<_>>(), vec![root_entry]);
}

#[test]
fn cycle_reports_a_closed_path() {
    let (x, y, z) = (target("x"), target("y"), target("z"));
    let rules = ruleset(vec![
        TestRule::new(x.clone(), vec![y.clone()]),
        TestRule::new(y.clone(), vec![z.clone()]),
        TestRule::new(z.clone(), vec![x.clone()]),
    ]);

    let mut graph = DependencyGraph::new(rules);
    let x_entry = graph.ensure_node(&x).unwrap();
    let err = graph.expand(x_entry).unwrap_err();

    assert_eq!(
        err,
        ExpansionError::CyclicDependency {
            path: vec![tid("x"), tid("y"), tid("z"), tid("x")],
        }
    );
}

#[test]
fn cycle_path_excludes_nodes_above_the_cycle() {
    let (root, x, y) = (target("root"), target("x"), target("y"));
    let rules = ruleset(vec![
        TestRule::new(root.clone(), vec![x.clone()]),
        TestRule::new(x.clone(), vec![y.clone()]),
        TestRule::new(y.clone(), vec![x.clone()]),
    ]);

    let mut graph = DependencyGraph::new(rules);
    let root_entry = graph.ensure_node(&root).unwrap();
    let err = graph.expand(root_entry).unwrap_err();

    assert_eq!(
        err,
        ExpansionError::CyclicDependency {
            path: vec![tid("x"), tid("y"), tid("x")],
        }
    );
}

#[test]
fn deps_failure_names_the_failing_target() {
    let (root, broken) = (target("root"), target("broken"));
    let rules = ruleset(vec![
        TestRule::new(root.clone(), vec![broken.clone()]),
        TestRule::failing(broken.clone(), "scan exploded"),
    ]);

    let mut graph = DependencyGraph::new(rules);
    let root_entry = graph.ensure_node(&root).unwrap();
    let err = graph.expand(root_entry).unwrap_err();

    assert_eq!(
        err,
        ExpansionError::GraphExpansion {
            id: tid("broken"),
            cause: "scan exploded".to_owned(),
        }
    );
}

#[test]
fn unmatched_target_is_an_error() {
    let rules = Arc::new(RuleSetBuilder::new().build());
    let mut graph = DependencyGraph::new(rules);
    let orphan = target("orphan");

    let err = graph.ensure_node(&orphan).unwrap_err();
    assert_eq!(err, ExpansionError::NoRuleMatch { id: tid("orphan") });
}

#[test]
fn ambiguous_target_lists_the_matching_factories() {
    let mut builder = RuleSetBuilder::new();
    builder.factory(Arc::new(MatchAllFactory { name: "first" }));
    builder.factory(Arc::new(MatchAllFactory { name: "second" }));
    let mut graph = DependencyGraph::new(Arc::new(builder.build()));

    let err = graph.ensure_node(&target("contested")).unwrap_err();
    assert_eq!(
        err,
        ExpansionError::AmbiguousTarget {
            id: tid("contested"),
            factories: vec!["first".to_owned(), "second".to_owned()],
        }
    );
}

#[test]
fn static_rules_win_over_factories() {
    let t = target("t");
    let static_rule = TestRule::new(t.clone(), Vec::new());
    let mut builder = RuleSetBuilder::new();
    builder.static_rule(static_rule.clone());
    builder.factory(Arc::new(MatchAllFactory { name: "generic" }));
    let mut graph = DependencyGraph::new(Arc::new(builder.build()));

    let entry = graph.ensure_node(&t).unwrap();
    let expected: Arc<dyn Rule> = static_rule;
    assert!(Arc::ptr_eq(graph.node(entry).rule(), &expected));
}

#[test]
fn a_single_matching_factory_instantiates() {
    let mut builder = RuleSetBuilder::new();
    builder.factory(Arc::new(MatchAllFactory { name: "generic" }));
    let mut graph = DependencyGraph::new(Arc::new(builder.build()));

    let t = target("made");
    let entry = graph.ensure_node(&t).unwrap();
    assert_eq!(graph.node(entry).target_id(), &tid("made"));
}

#[test]
fn reexpansion_replaces_successors_and_reconciles_edges() {
    let (first, second, root) = (target("first"), target("second"), target("root"));
    let root_rule = TestRule::new(root.clone(), vec![first.clone()]);
    let rules = ruleset(vec![
        root_rule.clone(),
        TestRule::new(first.clone(), Vec::new()),
        TestRule::new(second.clone(), Vec::new()),
    ]);

    let mut graph = DependencyGraph::new(rules);
    let root_entry = graph.ensure_node(&root).unwrap();
    graph.expand(root_entry).unwrap();

    let first_entry = graph.entry_id(first.id()).unwrap();
    assert_eq!(graph.predecessors(first_entry), vec![root_entry]);

    root_rule.set_deps(vec![second.clone()]);
    graph.expand(root_entry).unwrap();

    let second_entry = graph.entry_id(second.id()).unwrap();
    assert_eq!(graph.node(root_entry).successors(), &[second_entry]);
    assert!(graph.predecessors(first_entry).is_empty());
    assert_eq!(graph.predecessors(second_entry), vec![root_entry]);
}

#[test]
fn missing_target_is_never_built() {
    let root = target("root");
    let rules = ruleset(vec![TestRule::new(root.clone(), Vec::new())]);
    let mut graph = DependencyGraph::new(rules);
    let entry = graph.ensure_node(&root).unwrap();
    graph.expand(entry).unwrap();

    assert_eq!(graph.datedness(entry), Datedness::NeverBuilt);
}

fn dated_graph(own: Stamp, dep: Option<Stamp>) -> (DependencyGraph, crate::EntryId) {
    let dep_target = match dep {
        Some(stamp) => stamped_target("dep", stamp),
        None => target("dep"),
    };
    let root = stamped_target("root", own);
    let rules = ruleset(vec![
        TestRule::new(root.clone(), vec![dep_target.clone()]),
        TestRule::new(dep_target, Vec::new()),
    ]);
    let mut graph = DependencyGraph::new(rules);
    let entry = graph.ensure_node(&root).unwrap();
    graph.expand(entry).unwrap();
    (graph, entry)
}

#[test]
fn newer_dependency_marks_out_of_date() {
    let (graph, entry) = dated_graph(at(10), Some(at(20)));
    assert_eq!(graph.datedness(entry), Datedness::OutOfDate);
}

#[test]
fn older_dependency_is_up_to_date() {
    let (graph, entry) = dated_graph(at(20), Some(at(10)));
    assert_eq!(graph.datedness(entry), Datedness::UpToDate);
}

#[test]
fn equal_stamps_are_up_to_date_by_default() {
    let (graph, entry) = dated_graph(at(10), Some(at(10)));
    assert_eq!(graph.datedness(entry), Datedness::UpToDate);
}

#[test]
fn equal_stamps_rebuild_under_the_inclusive_policy() {
    let (mut graph, entry) = dated_graph(at(10), Some(at(10)));
    graph.set_staleness_policy(StalenessPolicy::NewerOrEqualDeps);
    assert_eq!(graph.datedness(entry), Datedness::OutOfDate);
}

#[test]
fn absent_dependencies_are_excluded_from_the_comparison() {
    let (graph, entry) = dated_graph(at(10), None);
    assert_eq!(graph.datedness(entry), Datedness::UpToDate);
}

#[test]
fn oldest_dependency_never_forces_a_rebuild() {
    let (graph, entry) = dated_graph(at(0), Some(Stamp::Oldest));
    assert_eq!(graph.datedness(entry), Datedness::UpToDate);
}

#[test]
fn dependency_status_queries() {
    let (a, b, root) = (target("a"), target("b"), target("root"));
    let rules = ruleset(vec![
        TestRule::new(root.clone(), vec![a.clone(), b.clone()]),
        TestRule::new(a.clone(), Vec::new()),
        TestRule::new(b.clone(), Vec::new()),
    ]);
    let mut graph = DependencyGraph::new(rules);
    let root_entry = graph.ensure_node(&root).unwrap();
    graph.expand(root_entry).unwrap();

    let a_entry = graph.entry_id(a.id()).unwrap();
    let b_entry = graph.entry_id(b.id()).unwrap();

    assert!(!graph.has_failed_dep(root_entry));
    assert!(!graph.all_deps_done(root_entry));

    graph.node_mut(a_entry).set_job_status(JobStatus::Failure);
    assert!(graph.has_failed_dep(root_entry));
    assert!(!graph.all_deps_done(root_entry));

    graph.node_mut(b_entry).set_job_status(JobStatus::Skipped);
    assert!(graph.all_deps_done(root_entry));
}

#[test]
fn reset_clears_outcomes_and_traversal_marks() {
    let (leaf, root) = (target("leaf"), target("root"));
    let rules = ruleset(vec![
        TestRule::new(root.clone(), vec![leaf.clone()]),
        TestRule::new(leaf.clone(), Vec::new()),
    ]);
    let mut graph = DependencyGraph::new(rules);
    let root_entry = graph.ensure_node(&root).unwrap();
    graph.expand(root_entry).unwrap();

    let leaf_entry = graph.entry_id(leaf.id()).unwrap();
    graph.node_mut(leaf_entry).set_job_status(JobStatus::Success);
    graph.node_mut(root_entry).set_job_status(JobStatus::Success);

    graph.reset_run_state();
    assert_eq!(graph.node(leaf_entry).job_status(), JobStatus::Initial);
    assert_eq!(graph.node(root_entry).job_status(), JobStatus::Initial);

    // A fresh expansion walks the whole subgraph again.
    let leaves = graph.expand(root_entry).unwrap();
    assert_eq!(leaves.into_iter().collect::<Vec<_>>(), vec![leaf_entry]);
}
