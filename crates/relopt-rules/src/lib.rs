//! # Built-in Rewrite Rules
//!
//! This crate provides the default rule set for the heuristic planner. Every
//! rule is a logical-to-logical rewrite that preserves the matched node's row
//! type.
//!
//! ## Base Rules
//!
//! - **`RemoveDistinctAggregateRule`**: Rewrites `COUNT(DISTINCT x)` and
//!   friends into plain aggregates over a `SELECT DISTINCT`, joining one
//!   branch per distinct argument list.
//! - **`RemoveTrivialProjectRule`**: Drops a projection that returns its
//!   input unchanged.
//! - **`RemoveDistinctRule`**: Drops a `Distinct` over an input that is
//!   already distinct, otherwise turns it into a group-by on every column.
//! - **`MergeFilterRule`**: Fuses two stacked filters into one.
//! - **`PullUpProjectsAboveJoinRule`**: Moves projections from below a join
//!   to above it (both inputs, left only, right only).
//!
//! ## The `calc` Rule Set
//!
//! - **`FilterToCalcRule`** and **`ProjectToCalcRule`**: Express filters and
//!   projections as calcs.
//! - **`MergeCalcRule`**: Fuses two stacked calcs into one by merging their
//!   programs.

pub mod filter_to_calc;
pub mod merge_calc;
pub mod merge_filter;
pub mod project_to_calc;
pub mod pull_up_projects;
pub mod remove_distinct;
pub mod remove_distinct_aggregate;
pub mod remove_trivial_project;
pub mod util;

use relopt_core::rule::{RuleRegistry, RuleSet};
use std::sync::Arc;

/// Name of the rule set that converts filters and projections to calcs and
/// merges them.
pub const CALC_RULE_SET: &str = "calc";

/// Create a rule registry with all built-in rules.
pub fn default_rule_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    registry.add_rule(Arc::new(remove_distinct_aggregate::RemoveDistinctAggregateRule));
    registry.add_rule(Arc::new(remove_trivial_project::RemoveTrivialProjectRule));
    registry.add_rule(Arc::new(remove_distinct::RemoveDistinctRule));
    registry.add_rule(Arc::new(merge_filter::MergeFilterRule));
    registry.add_rule(Arc::new(pull_up_projects::PullUpProjectsAboveJoinRule::both()));
    registry.add_rule(Arc::new(pull_up_projects::PullUpProjectsAboveJoinRule::left()));
    registry.add_rule(Arc::new(pull_up_projects::PullUpProjectsAboveJoinRule::right()));

    registry.add_rule_set(RuleSet::new(
        CALC_RULE_SET,
        vec![
            Arc::new(filter_to_calc::FilterToCalcRule),
            Arc::new(project_to_calc::ProjectToCalcRule),
            Arc::new(merge_calc::MergeCalcRule),
        ],
    ));

    registry
}
