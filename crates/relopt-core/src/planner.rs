//! # Heuristic Planner
//!
//! [`HepPlanner`] rewrites a plan by applying rules in the order given by a
//! [`HepProgram`], without any search over alternatives. Every rewrite
//! replaces the matched node in place, so at any time the graph holds exactly
//! one plan.
//!
//! ## Graph
//!
//! The planner keeps a set of *vertices*: canonical nodes whose inputs are
//! themselves vertices. Two nodes with the same digest are the same vertex,
//! which gives common subexpression elimination for free. A rule's result is
//! registered bottom-up through [`RelArena::on_register`], then the matched
//! vertex is *contracted* into it: every parent is re-pointed at the new
//! vertex and the root moves with it. Old vertices stay in the graph until the
//! next garbage collection.
//!
//! ## Programs
//!
//! A program is an instruction list. Rule instructions run their rules to a
//! fixpoint, visiting vertices in the current match order, until no rule
//! matches or the match limit is reached. A subprogram is repeated until a
//! full pass makes no transformation.

use crate::config::{HepMatchOrder, PlannerConfig};
use crate::cost::{CostCache, CostModel, DefaultCostModel};
use crate::rel::{RelArena, RelId, RelOp};
use crate::rule::{Rule, RuleCall};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Clone)]
pub enum HepInstruction {
    RuleInstance(Arc<dyn Rule>),
    /// Resolved against the rules added to the planner when executed.
    RuleByName(String),
    RuleCollection(Vec<Arc<dyn Rule>>),
    MatchOrder(HepMatchOrder),
    MatchLimit(Option<usize>),
    Subprogram(HepProgram),
}

#[derive(Clone, Default)]
pub struct HepProgram {
    pub instructions: Vec<HepInstruction>,
}

impl HepProgram {
    pub fn builder() -> HepProgramBuilder {
        HepProgramBuilder::default()
    }

    /// One instruction applying all of `rules` together.
    pub fn of_rules(rules: Vec<Arc<dyn Rule>>) -> Self {
        HepProgram::builder().add_rule_collection(rules).build()
    }
}

#[derive(Default)]
pub struct HepProgramBuilder {
    instructions: Vec<HepInstruction>,
}

impl HepProgramBuilder {
    pub fn add_rule_instance(mut self, rule: Arc<dyn Rule>) -> Self {
        self.instructions.push(HepInstruction::RuleInstance(rule));
        self
    }

    pub fn add_rule_by_name(mut self, name: impl Into<String>) -> Self {
        self.instructions.push(HepInstruction::RuleByName(name.into()));
        self
    }

    pub fn add_rule_collection(mut self, rules: Vec<Arc<dyn Rule>>) -> Self {
        self.instructions.push(HepInstruction::RuleCollection(rules));
        self
    }

    pub fn add_match_order(mut self, order: HepMatchOrder) -> Self {
        self.instructions.push(HepInstruction::MatchOrder(order));
        self
    }

    pub fn add_match_limit(mut self, limit: usize) -> Self {
        self.instructions.push(HepInstruction::MatchLimit(Some(limit)));
        self
    }

    pub fn add_subprogram(mut self, program: HepProgram) -> Self {
        self.instructions.push(HepInstruction::Subprogram(program));
        self
    }

    pub fn build(self) -> HepProgram {
        HepProgram {
            instructions: self.instructions,
        }
    }
}

/// Canonical vertices plus the digest index over them.
#[derive(Default)]
struct HepGraph {
    vertices: HashSet<RelId>,
    digest_to_vertex: HashMap<String, RelId>,
    validate_programs: bool,
}

impl HepGraph {
    /// Register `rel` and, recursively, its inputs. Returns the vertex that
    /// now stands for `rel`: `rel` itself, or an existing vertex with the
    /// same digest.
    fn add_rel(&mut self, arena: &mut RelArena, rel: RelId) -> RelId {
        if self.vertices.contains(&rel) {
            return rel;
        }
        arena.on_register(rel, |arena, input| self.add_rel(arena, input));
        let digest = arena.digest(rel).to_string();
        if let Some(existing) = self.digest_to_vertex.get(&digest) {
            trace!("{} is a duplicate of {}", rel, existing);
            return *existing;
        }
        if self.validate_programs {
            if let RelOp::Calc { program } = arena.op(rel) {
                assert!(program.is_valid(true), "invalid program in {}", arena.description(rel));
            }
        }
        trace!("new vertex {}", arena.description(rel));
        self.vertices.insert(rel);
        self.digest_to_vertex.insert(digest, rel);
        rel
    }

    fn parents_of(&self, arena: &RelArena, vertex: RelId) -> Vec<RelId> {
        let mut parents: Vec<RelId> = self
            .vertices
            .iter()
            .copied()
            .filter(|v| arena.inputs(*v).contains(&vertex))
            .collect();
        parents.sort();
        parents
    }

    fn forget(&mut self, arena: &RelArena, vertex: RelId) {
        self.vertices.remove(&vertex);
        let digest = arena.digest(vertex);
        if self.digest_to_vertex.get(digest) == Some(&vertex) {
            self.digest_to_vertex.remove(digest);
        }
    }
}

/// Rule-driven planner over a [`HepProgram`].
pub struct HepPlanner {
    arena: RelArena,
    program: HepProgram,
    config: PlannerConfig,
    cost_model: Arc<dyn CostModel>,
    graph: HepGraph,
    root: Option<RelId>,
    rules: Vec<Arc<dyn Rule>>,
    match_order: HepMatchOrder,
    match_limit: Option<usize>,
    n_transformations: usize,
    n_transformations_last_gc: usize,
    graph_size_last_gc: usize,
}

impl HepPlanner {
    pub fn new(program: HepProgram, arena: RelArena, config: PlannerConfig) -> Self {
        let graph = HepGraph {
            validate_programs: config.validate_programs,
            ..HepGraph::default()
        };
        Self {
            arena,
            program,
            match_order: config.match_order,
            match_limit: config.match_limit,
            config,
            cost_model: Arc::new(DefaultCostModel::default()),
            graph,
            root: None,
            rules: Vec::new(),
            n_transformations: 0,
            n_transformations_last_gc: 0,
            graph_size_last_gc: 0,
        }
    }

    pub fn with_cost_model(mut self, cost_model: Arc<dyn CostModel>) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Make `rule` available to `RuleByName` instructions. Returns false if a
    /// rule with the same name was already added.
    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) -> bool {
        if self.rules.iter().any(|r| r.name() == rule.name()) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    pub fn set_root(&mut self, rel: RelId) {
        let root = self.graph.add_rel(&mut self.arena, rel);
        debug!("root set to {}", self.arena.description(root));
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<RelId> {
        self.root
    }

    pub fn arena(&self) -> &RelArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut RelArena {
        &mut self.arena
    }

    pub fn into_arena(self) -> RelArena {
        self.arena
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn cost_model(&self) -> &dyn CostModel {
        self.cost_model.as_ref()
    }

    /// Number of rule results applied so far.
    pub fn transformations(&self) -> usize {
        self.n_transformations
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.vertices.len()
    }

    /// Run the program and return the root of the rewritten plan.
    ///
    /// # Panics
    ///
    /// Panics if no root has been set.
    pub fn find_best_exp(&mut self) -> RelId {
        assert!(self.root.is_some(), "set_root must be called before find_best_exp");
        let program = self.program.clone();
        self.execute_program(&program);
        self.collect_garbage();
        let root = self.current_root();
        debug!(
            "final plan after {} transformations:\n{}",
            self.n_transformations,
            self.arena.explain_plan(root)
        );
        root
    }

    fn current_root(&self) -> RelId {
        match self.root {
            Some(root) => root,
            None => panic!("planner has no root"),
        }
    }

    fn execute_program(&mut self, program: &HepProgram) {
        let saved = (self.match_order, self.match_limit);
        self.match_order = self.config.match_order;
        self.match_limit = self.config.match_limit;
        for instruction in &program.instructions {
            self.execute_instruction(instruction);
            let delta = self.n_transformations - self.n_transformations_last_gc;
            if delta > self.graph_size_last_gc {
                self.collect_garbage();
            }
        }
        (self.match_order, self.match_limit) = saved;
    }

    fn execute_instruction(&mut self, instruction: &HepInstruction) {
        match instruction {
            HepInstruction::RuleInstance(rule) => self.apply_rules(&[rule.clone()]),
            HepInstruction::RuleByName(name) => {
                match self.rules.iter().find(|r| r.name() == name).cloned() {
                    Some(rule) => self.apply_rules(&[rule]),
                    None => debug!("no rule named {}; skipping", name),
                }
            }
            HepInstruction::RuleCollection(rules) => self.apply_rules(rules),
            HepInstruction::MatchOrder(order) => self.match_order = *order,
            HepInstruction::MatchLimit(limit) => self.match_limit = *limit,
            HepInstruction::Subprogram(program) => loop {
                let before = self.n_transformations;
                self.execute_program(program);
                if self.n_transformations == before {
                    break;
                }
            },
        }
    }

    fn apply_rules(&mut self, rules: &[Arc<dyn Rule>]) {
        if rules.is_empty() {
            return;
        }
        let full_restart = self.match_order != HepMatchOrder::Arbitrary;
        let mut n_matches = 0;
        loop {
            let mut fixpoint = true;
            let mut order = self.graph_iterator(self.current_root());
            let mut position = 0;
            while position < order.len() {
                let vertex = order[position];
                position += 1;
                trace!("visiting {}", vertex);
                for rule in rules {
                    if let Some(new_vertex) = self.apply_rule(rule.as_ref(), vertex) {
                        n_matches += 1;
                        if self.match_limit.is_some_and(|limit| n_matches >= limit) {
                            debug!("match limit {} reached", n_matches);
                            return;
                        }
                        let start = if full_restart {
                            self.current_root()
                        } else {
                            fixpoint = false;
                            new_vertex
                        };
                        order = self.graph_iterator(start);
                        position = 0;
                        break;
                    }
                }
            }
            if fixpoint {
                return;
            }
        }
    }

    /// Vertices reachable from `start` in the current match order.
    fn graph_iterator(&self, start: RelId) -> Vec<RelId> {
        match self.match_order {
            HepMatchOrder::Arbitrary => self.arena.reachable(start),
            HepMatchOrder::TopDown => self.topological_order(start),
            HepMatchOrder::BottomUp => {
                let mut order = self.topological_order(start);
                order.reverse();
                order
            }
        }
    }

    /// Parents before inputs; shared vertices appear after all their parents.
    fn topological_order(&self, start: RelId) -> Vec<RelId> {
        let reachable = self.arena.reachable(start);
        let mut in_degree: HashMap<RelId, usize> = reachable.iter().map(|v| (*v, 0)).collect();
        for v in &reachable {
            for input in self.arena.inputs(*v) {
                *in_degree.entry(*input).or_default() += 1;
            }
        }
        let mut ready: Vec<RelId> = vec![start];
        let mut order = Vec::with_capacity(reachable.len());
        while let Some(v) = ready.pop() {
            order.push(v);
            for input in self.arena.inputs(v).iter().rev() {
                let degree = in_degree.entry(*input).or_default();
                *degree -= 1;
                if *degree == 0 {
                    ready.push(*input);
                }
            }
        }
        order
    }

    fn apply_rule(&mut self, rule: &dyn Rule, vertex: RelId) -> Option<RelId> {
        let rels = rule.operand().bind(&self.arena, vertex)?;
        let results = {
            let mut call = RuleCall::new(rule.name(), &mut self.arena, rels);
            rule.on_match(&mut call);
            call.results().to_vec()
        };
        if results.is_empty() {
            return None;
        }
        debug!("rule {} fired on {}", rule.name(), self.arena.description(vertex));
        self.apply_transformation_results(vertex, &results)
    }

    fn apply_transformation_results(&mut self, vertex: RelId, results: &[RelId]) -> Option<RelId> {
        let best = if results.len() == 1 {
            results[0]
        } else {
            // Candidates usually share most of their inputs.
            let mut costs = CostCache::default();
            let mut best = results[0];
            let mut best_cost = self.cost_model.cumulative_cost_in(&self.arena, best, &mut costs);
            for candidate in &results[1..] {
                let cost = self.cost_model.cumulative_cost_in(&self.arena, *candidate, &mut costs);
                trace!("candidate {} costs {}", candidate, cost);
                if cost.is_lt(&best_cost) {
                    best = *candidate;
                    best_cost = cost;
                }
            }
            best
        };
        let parents = self.graph.parents_of(&self.arena, vertex);
        let new_vertex = self.graph.add_rel(&mut self.arena, best);
        if new_vertex == vertex || parents.contains(&new_vertex) {
            trace!("{} already in place; no transformation", new_vertex);
            return None;
        }
        self.n_transformations += 1;
        debug!(
            "transformation {}: {} -> {}",
            self.n_transformations,
            self.arena.description(vertex),
            self.arena.description(new_vertex)
        );
        self.contract_vertices(new_vertex, vertex, &parents);
        Some(new_vertex)
    }

    /// Re-point `parents` of `discarded` at `preserved`. `discarded` itself is
    /// left for garbage collection since it may still be reachable from
    /// `preserved`.
    fn contract_vertices(&mut self, preserved: RelId, discarded: RelId, parents: &[RelId]) {
        for parent in parents {
            if !self.graph.vertices.contains(parent) {
                continue;
            }
            let old_digest = self.arena.digest(*parent).to_string();
            let inputs = self.arena.inputs(*parent).to_vec();
            for (ordinal, input) in inputs.into_iter().enumerate() {
                if input == discarded {
                    self.arena.replace_input(*parent, ordinal, preserved);
                }
            }
            self.update_vertex(*parent, &old_digest);
        }
        if self.root == Some(discarded) {
            self.root = Some(preserved);
        }
    }

    /// Re-index `vertex` after its inputs changed, merging it into an
    /// existing vertex that now has the same digest.
    fn update_vertex(&mut self, vertex: RelId, old_digest: &str) {
        if self.graph.digest_to_vertex.get(old_digest) == Some(&vertex) {
            self.graph.digest_to_vertex.remove(old_digest);
        }
        let digest = self.arena.digest(vertex).to_string();
        match self.graph.digest_to_vertex.get(&digest).copied() {
            Some(existing) if existing != vertex => {
                trace!("{} merges into {}", vertex, existing);
                let parents = self.graph.parents_of(&self.arena, vertex);
                self.contract_vertices(existing, vertex, &parents);
                self.graph.vertices.remove(&vertex);
            }
            _ => {
                self.graph.digest_to_vertex.insert(digest, vertex);
            }
        }
    }

    fn collect_garbage(&mut self) {
        let root = self.current_root();
        let live: HashSet<RelId> = self.arena.reachable(root).into_iter().collect();
        let dead: Vec<RelId> = self
            .graph
            .vertices
            .iter()
            .copied()
            .filter(|v| !live.contains(v))
            .collect();
        for vertex in &dead {
            self.graph.forget(&self.arena, *vertex);
        }
        if !dead.is_empty() {
            debug!("collected {} vertices", dead.len());
        }
        self.n_transformations_last_gc = self.n_transformations;
        self.graph_size_last_gc = self.graph.vertices.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, InMemoryCatalog};
    use crate::pattern::Operand;
    use crate::rel::RelKind;
    use crate::rex::STD;

    struct DropDistinct;

    impl Rule for DropDistinct {
        fn name(&self) -> &str {
            "DropDistinct"
        }

        fn operand(&self) -> Operand {
            Operand::distinct()
        }

        fn on_match(&self, call: &mut RuleCall<'_>) {
            let child = call.arena().inputs(call.rel(0))[0];
            call.transform_to(child);
        }
    }

    /// Proposes both the upper filter's input and a fused filter, letting
    /// the planner pick the fused one by cost.
    struct FuseFilters;

    impl Rule for FuseFilters {
        fn name(&self) -> &str {
            "FuseFilters"
        }

        fn operand(&self) -> Operand {
            Operand::rel(RelKind::Filter, vec![Operand::filter()])
        }

        fn on_match(&self, call: &mut RuleCall<'_>) {
            let (top, bottom) = (call.rel(0), call.rel(1));
            let conditions: Vec<_> = [top, bottom]
                .iter()
                .map(|id| match call.arena().op(*id) {
                    RelOp::Filter { condition } => condition.clone(),
                    _ => unreachable!(),
                })
                .collect();
            let input = call.arena().inputs(bottom)[0];
            let rex = call.arena().rex_builder().clone();
            let fused = rex.make_call(&STD.and, conditions);
            let bloated = {
                let arena = call.arena_mut();
                let inner = arena.filter(input, fused.clone());
                arena.filter(inner, fused.clone())
            };
            let merged = call.arena_mut().filter(input, fused);
            call.transform_to(bloated);
            call.transform_to(merged);
        }
    }

    fn emp(arena: &mut RelArena) -> RelId {
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap())
    }

    fn sal_over(arena: &mut RelArena, input: RelId, amount: i64) -> RelId {
        let rex = arena.rex_builder().clone();
        let row = arena.row_type(input).clone();
        let cond = rex.make_call(
            &STD.greater_than,
            vec![rex.make_input_ref_for(&row, 5), rex.make_exact_literal(amount)],
        );
        arena.filter(input, cond)
    }

    #[test]
    fn test_removes_nested_distincts() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let d1 = arena.distinct(scan);
        let d2 = arena.distinct(d1);
        let filter = sal_over(&mut arena, d2, 1000);
        let program = HepProgram::builder()
            .add_rule_instance(Arc::new(DropDistinct))
            .build();
        let mut planner = HepPlanner::new(program, arena, PlannerConfig::default());
        planner.set_root(filter);
        let best = planner.find_best_exp();
        assert_eq!(planner.transformations(), 2);
        assert_eq!(planner.arena().inputs(best), &[scan]);
        assert_eq!(planner.vertex_count(), 2);
    }

    #[test]
    fn test_duplicate_subtrees_share_a_vertex() {
        let mut arena = RelArena::default();
        let left = emp(&mut arena);
        let right = emp(&mut arena);
        let rex = arena.rex_builder().clone();
        let t = rex.make_bool_literal(true);
        let join = arena.join(left, right, t, crate::rel::JoinType::Inner, Default::default());
        let mut planner = HepPlanner::new(HepProgram::default(), arena, PlannerConfig::default());
        planner.set_root(join);
        let best = planner.find_best_exp();
        let inputs = planner.arena().inputs(best);
        assert_eq!(inputs[0], inputs[1]);
        assert_eq!(planner.vertex_count(), 2);
    }

    #[test]
    fn test_cheapest_result_wins() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let lower = sal_over(&mut arena, scan, 1000);
        let upper = sal_over(&mut arena, lower, 2000);
        let program = HepProgram::builder()
            .add_rule_instance(Arc::new(FuseFilters))
            .build();
        let mut planner = HepPlanner::new(program, arena, PlannerConfig::default());
        planner.set_root(upper);
        let best = planner.find_best_exp();
        assert_eq!(planner.transformations(), 1);
        assert_eq!(planner.arena().inputs(best), &[scan]);
    }

    #[test]
    fn test_match_limit_bounds_rewrites() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let mut top = scan;
        for _ in 0..3 {
            top = arena.distinct(top);
        }
        let program = HepProgram::builder()
            .add_match_order(HepMatchOrder::BottomUp)
            .add_match_limit(1)
            .add_rule_instance(Arc::new(DropDistinct))
            .build();
        let mut planner = HepPlanner::new(program, arena, PlannerConfig::default());
        planner.set_root(top);
        let best = planner.find_best_exp();
        assert_eq!(planner.transformations(), 1);
        assert_eq!(planner.arena().node(best).kind(), RelKind::Distinct);
    }

    #[test]
    fn test_rule_by_name_and_subprogram() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let d = arena.distinct(scan);
        let root = arena.distinct(d);
        let inner = HepProgram::builder()
            .add_match_limit(1)
            .add_rule_by_name("DropDistinct")
            .add_rule_by_name("Missing")
            .build();
        let program = HepProgram::builder().add_subprogram(inner).build();
        let mut planner = HepPlanner::new(program, arena, PlannerConfig::default());
        assert!(planner.add_rule(Arc::new(DropDistinct)));
        assert!(!planner.add_rule(Arc::new(DropDistinct)));
        planner.set_root(root);
        let best = planner.find_best_exp();
        assert_eq!(best, scan);
        assert_eq!(planner.transformations(), 2);
    }

    #[test]
    fn test_top_down_order_puts_parents_first() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let t = arena.rex_builder().make_bool_literal(true);
        let join = arena.join(scan, scan, t, crate::rel::JoinType::Inner, Default::default());
        let root = arena.distinct(join);
        let config = PlannerConfig {
            match_order: HepMatchOrder::TopDown,
            ..PlannerConfig::default()
        };
        let mut planner = HepPlanner::new(HepProgram::default(), arena, config);
        planner.set_root(root);
        assert_eq!(planner.graph_iterator(root), vec![root, join, scan]);
    }
}
