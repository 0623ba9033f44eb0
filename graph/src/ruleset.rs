// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use fnv::FnvHashMap as HashMap;

use targets::{TargetHandle, TargetId};

use crate::rule::{Rule, RuleFactory};
use crate::ExpansionError;

///
/// A repository of rules and rule factories used while materializing the dependency graph.
///
/// Static rules answer for exactly their own target id; factories answer for whole families of
/// targets. The resolver does not cache the rules factories produce - the graph is the cache,
/// keyed by target id.
///
pub struct RuleSet {
    static_rules: HashMap<TargetId, Arc<dyn Rule>>,
    factories: Vec<Arc<dyn RuleFactory>>,
}

impl RuleSet {
    ///
    /// Resolves a target to the unique rule that can produce it: a static rule if one was
    /// registered for the id, and otherwise the single matching factory. Zero matching factories
    /// or more than one are both errors.
    ///
    pub fn find_or_make_rule(
        &self,
        target: &TargetHandle,
    ) -> Result<Arc<dyn Rule>, ExpansionError> {
        if let Some(rule) = self.static_rules.get(target.id()) {
            return Ok(rule.clone());
        }

        let matching: Vec<_> = self
            .factories
            .iter()
            .filter(|factory| factory.matches(target))
            .collect();

        match matching.as_slice() {
            [] => Err(ExpansionError::NoRuleMatch {
                id: target.id().clone(),
            }),
            [factory] => Ok(factory.instantiate(target.clone())),
            _ => Err(ExpansionError::AmbiguousTarget {
                id: target.id().clone(),
                factories: matching
                    .iter()
                    .map(|factory| factory.name().to_owned())
                    .collect(),
            }),
        }
    }
}

///
/// Accumulates rule registrations and finalizes them into a `RuleSet`.
///
pub struct RuleSetBuilder {
    static_rules: HashMap<TargetId, Arc<dyn Rule>>,
    factories: Vec<Arc<dyn RuleFactory>>,
}

impl RuleSetBuilder {
    pub fn new() -> RuleSetBuilder {
        RuleSetBuilder {
            static_rules: HashMap::default(),
            factories: Vec::new(),
        }
    }

    ///
    /// Registers a rule for exactly the rule's own target. Registering a second rule for the same
    /// target id replaces the first.
    ///
    pub fn static_rule(&mut self, rule: Arc<dyn Rule>) -> &mut RuleSetBuilder {
        let id = rule.target().id().clone();
        if self.static_rules.insert(id.clone(), rule).is_some() {
            log::warn!("Replacing static rule for {id}");
        }
        self
    }

    /// Registers a generic rule factory. Factories are consulted in registration order.
    pub fn factory(&mut self, factory: Arc<dyn RuleFactory>) -> &mut RuleSetBuilder {
        self.factories.push(factory);
        self
    }

    pub fn build(self) -> RuleSet {
        RuleSet {
            static_rules: self.static_rules,
            factories: self.factories,
        }
    }
}
