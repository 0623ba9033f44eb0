// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use targets::TargetHandle;

use crate::node::EntryId;
use crate::{BuildSession, ExpansionError};

///
/// Data produced by a recipe, forwarded to `Rule::on_success` for downstream use (e.g. the list
/// of headers a dependency scan discovered).
///
pub type JobValue = Arc<dyn Any + Send + Sync>;

///
/// The context a recipe runs with. The working directory is resolved per job by the executor;
/// recipes run commands there rather than mutating the process-wide current directory.
///
#[derive(Clone, Debug)]
pub struct JobContext {
    pub working_dir: PathBuf,
}

///
/// A side-effecting procedure that produces or refreshes a target on a worker thread.
///
pub type Recipe = Box<dyn FnOnce(JobContext) -> Result<Option<JobValue>, String> + Send>;

///
/// Associates a single target with its dependencies and the recipe that produces it.
///
pub trait Rule: Send + Sync + 'static {
    /// The target this rule produces.
    fn target(&self) -> &TargetHandle;

    ///
    /// The targets this rule's target depends on. Called on every expansion of the node: a rule
    /// may return a different list on later calls (dynamically discovered dependencies), and the
    /// graph reconciles its edges against the latest list.
    ///
    fn deps(&self) -> Result<Vec<TargetHandle>, String>;

    ///
    /// Whether this rule has a recipe. Most rules do, so the default is `true`; rules without one
    /// complete immediately when dispatched.
    ///
    fn has_recipe(&self) -> bool {
        true
    }

    ///
    /// The recipe to run when the target is missing or out of date. Only consulted when
    /// `has_recipe` is true. Each call must return a fresh closure, because a graph may drive
    /// more than one build.
    ///
    fn recipe(&self) -> Option<Recipe>;

    ///
    /// Invoked on the scheduler thread once the node has reached a successful state (recipe ran,
    /// target was skipped, or there was no recipe), before any predecessor is dispatched. The
    /// hook may call `session.expand` to graft in dependencies discovered by the recipe.
    ///
    fn on_success(
        &self,
        _session: &mut dyn BuildSession,
        _entry: EntryId,
        _value: Option<JobValue>,
    ) -> Result<(), ExpansionError> {
        Ok(())
    }
}

///
/// A rule with dependencies but no recipe: its target exists purely to group others.
///
pub struct TrivialRule {
    target: TargetHandle,
    deps: Vec<TargetHandle>,
}

impl TrivialRule {
    pub fn new(target: TargetHandle, deps: Vec<TargetHandle>) -> TrivialRule {
        TrivialRule { target, deps }
    }
}

impl Rule for TrivialRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        Ok(self.deps.clone())
    }

    fn has_recipe(&self) -> bool {
        false
    }

    fn recipe(&self) -> Option<Recipe> {
        None
    }
}

///
/// A rule for targets that exist on their own, such as hand-written source files: no
/// dependencies and nothing to run.
///
pub struct SourceRule {
    target: TargetHandle,
}

impl SourceRule {
    pub fn new(target: TargetHandle) -> SourceRule {
        SourceRule { target }
    }
}

impl Rule for SourceRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        Ok(Vec::new())
    }

    fn has_recipe(&self) -> bool {
        false
    }

    fn recipe(&self) -> Option<Recipe> {
        None
    }
}

type RecipeFn = dyn Fn(JobContext) -> Result<Option<JobValue>, String> + Send + Sync;

///
/// A dependency-less rule that produces its target with the given function.
///
pub struct LeafRule {
    target: TargetHandle,
    run: Arc<RecipeFn>,
}

impl LeafRule {
    pub fn new(
        target: TargetHandle,
        run: impl Fn(JobContext) -> Result<Option<JobValue>, String> + Send + Sync + 'static,
    ) -> LeafRule {
        LeafRule {
            target,
            run: Arc::new(run),
        }
    }
}

impl Rule for LeafRule {
    fn target(&self) -> &TargetHandle {
        &self.target
    }

    fn deps(&self) -> Result<Vec<TargetHandle>, String> {
        Ok(Vec::new())
    }

    fn recipe(&self) -> Option<Recipe> {
        let run = self.run.clone();
        Some(Box::new(move |context| run(context)))
    }
}

///
/// Decides whether it can produce a rule for a given target, and if so constructs one. Factories
/// back the generic half of a `RuleSet`; a well-formed ruleset has exactly one factory matching
/// any target it is asked about.
///
pub trait RuleFactory: Send + Sync + 'static {
    /// A short name for diagnostics; ambiguity reports list it.
    fn name(&self) -> &str;

    fn matches(&self, target: &TargetHandle) -> bool;

    /// Produces the rule. Only called when `matches` returned true.
    fn instantiate(&self, target: TargetHandle) -> Arc<dyn Rule>;
}
