//! # Rule System
//!
//! A rule is a declarative operand pattern plus a rewrite. When the planner
//! finds a node matching the pattern it builds a [`RuleCall`] holding the
//! bound nodes and invokes [`Rule::on_match`].
//!
//! ## Firing
//!
//! `on_match` either registers one or more equivalent replacements for
//! `rels[0]` through [`RuleCall::transform_to`], or returns without doing so.
//! Declining is normal control flow, not an error. New nodes are allocated
//! in the call's arena; nodes a rule allocates but never passes to
//! `transform_to` are unreachable and collected with the rest of the garbage.
//!
//! A replacement must have the same row type as the node it replaces, field
//! names aside. A mismatch is a defect in the rule and panics.
//!
//! ## Rule Registry
//!
//! The [`RuleRegistry`] holds the base rules plus named rule sets, and
//! resolves rules by name for programs and the HTTP service.

use crate::error::{RelOptError, RelOptResult};
use crate::pattern::Operand;
use crate::rel::{RelArena, RelId};
use crate::traits::RelTraitSet;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A rule rewrites a matched subgraph into an equivalent one.
pub trait Rule: Send + Sync {
    /// Unique name of this rule.
    fn name(&self) -> &str;

    /// Pattern that this rule matches against.
    fn operand(&self) -> Operand;

    fn on_match(&self, call: &mut RuleCall<'_>);
}

/// One firing of a rule against a matched subgraph.
pub struct RuleCall<'a> {
    rule_name: &'a str,
    arena: &'a mut RelArena,
    rels: Vec<RelId>,
    results: Vec<RelId>,
}

impl<'a> RuleCall<'a> {
    pub fn new(rule_name: &'a str, arena: &'a mut RelArena, rels: Vec<RelId>) -> Self {
        assert!(!rels.is_empty(), "a rule call binds at least one node");
        Self {
            rule_name,
            arena,
            rels,
            results: Vec::new(),
        }
    }

    pub fn rule_name(&self) -> &str {
        self.rule_name
    }

    /// The node bound to operand `ordinal`, in preorder.
    pub fn rel(&self, ordinal: usize) -> RelId {
        self.rels[ordinal]
    }

    pub fn rels(&self) -> &[RelId] {
        &self.rels
    }

    pub fn arena(&self) -> &RelArena {
        self.arena
    }

    pub fn arena_mut(&mut self) -> &mut RelArena {
        self.arena
    }

    /// Declare `rel` equivalent to `rels[0]`.
    ///
    /// # Panics
    ///
    /// Panics if the row types differ other than by field names.
    pub fn transform_to(&mut self, rel: RelId) {
        let original = self.rels[0];
        let (old_type, new_type) = (self.arena.row_type(original), self.arena.row_type(rel));
        assert!(
            old_type.equal_sans_field_names(new_type),
            "{} changed the row type of {} from {} to {}",
            self.rule_name,
            self.arena.description(original),
            old_type.full_type_string(),
            new_type.full_type_string()
        );
        trace!(
            "{} proposes {} for {}",
            self.rule_name,
            self.arena.description(rel),
            self.arena.description(original)
        );
        self.results.push(rel);
    }

    pub fn results(&self) -> &[RelId] {
        &self.results
    }

    /// `rel` with the given traits: `rel` itself when its traits already
    /// satisfy them, otherwise a copy carrying them.
    pub fn convert(&mut self, rel: RelId, traits: &RelTraitSet) -> RelId {
        if traits.satisfied_by(self.arena.node(rel).traits()) {
            return rel;
        }
        let inputs = self.arena.inputs(rel).to_vec();
        self.arena.copy(rel, traits.clone(), inputs)
    }
}

/// A named set of rules.
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<Arc<dyn Rule>>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, rules: Vec<Arc<dyn Rule>>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }
}

/// Registry of transformation rules.
pub struct RuleRegistry {
    pub base_rules: Vec<Arc<dyn Rule>>,
    pub rule_sets: HashMap<String, RuleSet>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            base_rules: Vec::new(),
            rule_sets: HashMap::new(),
        }
    }

    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        self.base_rules.push(rule);
    }

    pub fn add_rule_set(&mut self, rule_set: RuleSet) {
        self.rule_sets.insert(rule_set.name.clone(), rule_set);
    }

    /// Base rules, followed by the rules of `rule_set` when one is named.
    pub fn active_rules(&self, rule_set: Option<&str>) -> RelOptResult<Vec<Arc<dyn Rule>>> {
        let mut rules = self.base_rules.clone();
        if let Some(name) = rule_set {
            let set = self
                .rule_sets
                .get(name)
                .ok_or_else(|| RelOptError::RuleNotFound(name.to_string()))?;
            for rule in &set.rules {
                if !rules.iter().any(|r| r.name() == rule.name()) {
                    rules.push(rule.clone());
                }
            }
        }
        Ok(rules)
    }

    /// Look a rule up by name among the base rules and every rule set.
    pub fn rule_by_name(&self, name: &str) -> Option<Arc<dyn Rule>> {
        self.base_rules
            .iter()
            .chain(self.rule_sets.values().flat_map(|s| s.rules.iter()))
            .find(|r| r.name() == name)
            .cloned()
    }

    pub fn resolve(&self, names: &[String]) -> RelOptResult<Vec<Arc<dyn Rule>>> {
        names
            .iter()
            .map(|name| {
                self.rule_by_name(name)
                    .ok_or_else(|| RelOptError::RuleNotFound(name.clone()))
            })
            .collect()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
