//! # Distinct Aggregate Removal
//!
//! Rewrites an aggregate containing `DISTINCT` calls into aggregates without
//! them, by computing each distinct argument list's values with a
//! `SELECT DISTINCT` first.
//!
//! ## Single Argument List
//!
//! When every call is distinct and all use the same arguments, one extra
//! level suffices:
//!
//! ```text
//! Before: Aggregate(group=[deptno], COUNT(DISTINCT sal), SUM(DISTINCT sal))
//! After:  Aggregate(group=[deptno], COUNT(sal), SUM(sal),
//!           SelectDistinct(deptno, sal))
//! ```
//!
//! ## General Case
//!
//! Otherwise the non-distinct calls are aggregated over the original input,
//! and each distinct argument list gets its own branch
//! `Aggregate(SelectDistinct(group columns + args))`. The branches are inner
//! joined on the group columns using `IS NOT DISTINCT FROM`, so a NULL group
//! still meets itself, and a final projection restores the original field
//! order. With no non-distinct calls the first distinct branch seeds the
//! join chain.

use crate::util::{create_project, create_select_distinct};
use relopt_core::pattern::Operand;
use relopt_core::rel::{AggregateCall, JoinType, RelArena, RelId, RelOp};
use relopt_core::rex::{RexNode, STD};
use relopt_core::rule::{Rule, RuleCall};
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

pub struct RemoveDistinctAggregateRule;

impl Rule for RemoveDistinctAggregateRule {
    fn name(&self) -> &str {
        "RemoveDistinctAggregate"
    }

    fn operand(&self) -> Operand {
        Operand::aggregate()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) {
        let aggregate = call.rel(0);
        let RelOp::Aggregate {
            group_count,
            agg_calls,
        } = call.arena().op(aggregate).clone()
        else {
            panic!("{} matched {}", self.name(), call.arena().description(aggregate));
        };
        if !agg_calls.iter().any(|c| c.distinct) {
            return;
        }

        // Distinct argument lists in order of first appearance.
        let mut arg_lists: Vec<Vec<usize>> = Vec::new();
        let mut non_distinct_count = 0;
        for agg_call in &agg_calls {
            if !agg_call.distinct {
                non_distinct_count += 1;
            } else if !arg_lists.contains(&agg_call.args) {
                arg_lists.push(agg_call.args.clone());
            }
        }

        let child = call.arena().inputs(aggregate)[0];
        if non_distinct_count == 0 && arg_lists.len() == 1 {
            let converted =
                convert_monopole(call.arena_mut(), child, group_count, &agg_calls, &arg_lists[0]);
            call.transform_to(converted);
            return;
        }

        let row_type = call.arena().row_type(aggregate).clone();
        let fields = row_type.fields();
        let mut refs: Vec<Option<RexNode>> = vec![None; fields.len()];
        for (i, field) in fields.iter().enumerate().take(group_count) {
            refs[i] = Some(RexNode::input_ref(i, field.ty.clone()));
        }
        let mut non_distinct = Vec::new();
        for (i, agg_call) in agg_calls.iter().enumerate() {
            if agg_call.distinct {
                continue;
            }
            refs[group_count + i] = Some(RexNode::input_ref(
                group_count + non_distinct.len(),
                fields[group_count + i].ty.clone(),
            ));
            non_distinct.push(agg_call.clone());
        }

        let arena = call.arena_mut();
        let mut rel = if non_distinct.is_empty() {
            None
        } else {
            Some(arena.aggregate(child, group_count, non_distinct))
        };
        for args in &arg_lists {
            rel = Some(rewrite_arg_list(arena, child, group_count, &agg_calls, rel, args, &mut refs));
        }
        let Some(rel) = rel else {
            unreachable!("at least one distinct argument list");
        };

        let exprs = refs
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.unwrap_or_else(|| panic!("output field {} was not mapped", i)))
            .collect();
        let names = fields.iter().map(|f| Some(f.name.clone())).collect();
        let project = create_project(arena, rel, exprs, names);
        call.transform_to(project);
    }
}

/// One distinct argument list and no other calls: aggregate non-distinct
/// versions of the calls over a `SELECT DISTINCT`.
fn convert_monopole(
    arena: &mut RelArena,
    child: RelId,
    group_count: usize,
    agg_calls: &[AggregateCall],
    args: &[usize],
) -> RelId {
    let (distinct, source_of) = create_select_distinct(arena, child, group_count, args);
    let calls = agg_calls
        .iter()
        .map(|c| {
            if c.distinct && c.args == args {
                remap(c, &source_of)
            } else {
                c.clone()
            }
        })
        .collect();
    arena.aggregate(distinct, group_count, calls)
}

/// Build the branch for the calls over `args` and join it to `left`, the
/// branches built so far. Updates `refs` to point at the branch's outputs.
fn rewrite_arg_list(
    arena: &mut RelArena,
    child: RelId,
    group_count: usize,
    agg_calls: &[AggregateCall],
    left: Option<RelId>,
    args: &[usize],
    refs: &mut [Option<RexNode>],
) -> RelId {
    let left_width = left.map_or(0, |l| arena.row_type(l).field_count());
    let (distinct, source_of) = create_select_distinct(arena, child, group_count, args);

    let mut calls = Vec::new();
    for (i, agg_call) in agg_calls.iter().enumerate() {
        if !agg_call.distinct || agg_call.args != args {
            continue;
        }
        let rewritten = remap(agg_call, &source_of);
        assert!(refs[group_count + i].is_none(), "call {} rewritten twice", i);
        refs[group_count + i] = Some(RexNode::input_ref(
            left_width + group_count + calls.len(),
            rewritten.ty.clone(),
        ));
        calls.push(rewritten);
    }
    let branch = arena.aggregate(distinct, group_count, calls);
    let Some(left) = left else {
        return branch;
    };

    let rex = arena.rex_builder().clone();
    let left_row = arena.row_type(left).clone();
    let right_row = arena.row_type(branch).clone();
    let conditions = (0..group_count)
        .map(|i| {
            let right = source_of[&i];
            rex.make_call(
                &STD.is_not_distinct_from,
                vec![
                    rex.make_input_ref_for(&left_row, i),
                    RexNode::input_ref(left_width + right, right_row.fields()[right].ty.clone()),
                ],
            )
        })
        .collect();
    let condition = rex
        .compose_conjunction(conditions)
        .unwrap_or_else(|| rex.make_bool_literal(true));
    trace!("joining distinct branch on {}", condition);
    arena.join(left, branch, condition, JoinType::Inner, BTreeSet::new())
}

/// `call` without `DISTINCT`, reading its arguments from the positions given
/// by `source_of`.
fn remap(call: &AggregateCall, source_of: &HashMap<usize, usize>) -> AggregateCall {
    let args = call.args.iter().map(|a| source_of[a]).collect();
    call.with_distinct(false).with_args(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::catalog::{Catalog, InMemoryCatalog};
    use relopt_core::rel::RelKind;

    fn emp(arena: &mut RelArena) -> RelId {
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap())
    }

    fn count(arena: &RelArena, distinct: bool, args: Vec<usize>) -> AggregateCall {
        let bigint = arena
            .type_factory()
            .create_sql_type(relopt_core::types::SqlTypeName::Bigint);
        AggregateCall::new(STD.count.clone(), distinct, args, bigint, None)
    }

    fn fire(arena: &mut RelArena, aggregate: RelId) -> Vec<RelId> {
        let rule = RemoveDistinctAggregateRule;
        let rels = rule.operand().bind(arena, aggregate).unwrap();
        let mut call = RuleCall::new(rule.name(), arena, rels);
        rule.on_match(&mut call);
        call.results().to_vec()
    }

    #[test]
    fn test_declines_without_distinct_calls() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let calls = vec![count(&arena, false, vec![5])];
        let aggregate = arena.aggregate(scan, 1, calls);
        assert!(fire(&mut arena, aggregate).is_empty());
    }

    #[test]
    fn test_single_argument_list_uses_one_level() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let calls = vec![count(&arena, true, vec![5])];
        // group by EMPNO
        let aggregate = arena.aggregate(scan, 1, calls);
        let results = fire(&mut arena, aggregate);
        assert_eq!(results.len(), 1);
        let rewritten = results[0];
        assert_eq!(
            arena.digest(rewritten),
            format!(
                "AggregateRel.NONE(child={},groupCount=1,agg#0=COUNT($1))",
                arena.inputs(rewritten)[0]
            )
        );
        let distinct = arena.inputs(rewritten)[0];
        assert!(arena.is_distinct(distinct));
        assert_eq!(arena.row_type(distinct).field_names(), vec!["EMPNO", "SAL"]);
    }

    #[test]
    fn test_mixed_calls_join_branches() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let calls = vec![
            count(&arena, true, vec![5]),
            count(&arena, false, vec![]),
            count(&arena, true, vec![6]),
        ];
        let aggregate = arena.aggregate(scan, 1, calls);
        let results = fire(&mut arena, aggregate);
        let project = results[0];
        assert_eq!(arena.node(project).kind(), RelKind::Project);
        let outer = arena.inputs(project)[0];
        let RelOp::Join { condition, .. } = arena.op(outer) else {
            panic!("expected a join");
        };
        assert_eq!(condition.to_string(), "IS NOT DISTINCT FROM($0, $4)");
        let inner = arena.inputs(outer)[0];
        let RelOp::Join { condition, .. } = arena.op(inner) else {
            panic!("expected a join");
        };
        assert_eq!(condition.to_string(), "IS NOT DISTINCT FROM($0, $2)");
        let RelOp::Project { exprs, .. } = arena.op(project) else {
            unreachable!();
        };
        let rendered: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
        assert_eq!(rendered, vec!["$0", "$3", "$1", "$5"]);
    }
}
