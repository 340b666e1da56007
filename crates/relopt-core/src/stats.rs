//! # Statistics and Cardinality Estimation
//!
//! Row counts and distinct-value counts drive the cost model. Base tables
//! contribute their catalog row counts; every other node derives its
//! estimate from its inputs.
//!
//! ## Row Counts
//!
//! - **Filter**: input rows times the guessed selectivity of the condition.
//! - **Join**: product of input rows times the selectivity of the condition.
//! - **Aggregate**: one row without grouping, otherwise input rows scaled by
//!   `1 - 0.5^group_count`.
//! - **Union**: sum of inputs, halved without `ALL`. **Intersect**: a quarter
//!   of the smallest input. **Minus**: the first input less half of the rest.
//!
//! ## Selectivity
//!
//! Without column statistics selectivity is guessed from the predicate's
//! shape, conjunct by conjunct: `IS NOT NULL` 0.9, `=` 0.15, other
//! comparisons 0.5, anything else 0.25. Conjuncts are assumed independent.
//!
//! ## Distinct Row Counts
//!
//! [`distinct_row_count`] estimates how many distinct values a set of columns
//! takes, optionally under a predicate. It returns `None` when nothing can be
//! said, which callers treat as "unknown" rather than zero.

use crate::rel::{RelArena, RelId, RelOp, SetOpKind};
use crate::rex::{InputFinder, RexKind, RexNode, STD};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Table-level statistics, as gathered by an ANALYZE pass and held by the
/// catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    pub total_size_bytes: f64,
    pub column_stats: HashMap<String, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64, total_size_bytes: f64) -> Self {
        Self {
            row_count,
            total_size_bytes,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(name.into(), stats);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub distinct_count: f64,
    /// Fraction of rows that are NULL, in `[0, 1]`.
    pub null_fraction: f64,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
        }
    }
}

/// Selectivity of a predicate nobody has statistics for.
pub fn guess_selectivity(predicate: Option<&RexNode>) -> f64 {
    let Some(predicate) = predicate else {
        return 1.0;
    };
    predicate
        .conjunctions()
        .into_iter()
        .map(|conjunct| {
            if conjunct.is_always_true() {
                1.0
            } else if conjunct.as_call().is_some_and(|c| c.op == STD.is_not_null) {
                0.9
            } else if conjunct.is_a(RexKind::Equals) {
                0.15
            } else if conjunct.is_a(RexKind::Comparison) {
                0.5
            } else {
                0.25
            }
        })
        .product()
}

/// Expected number of distinct values when `num_selected` values are drawn
/// uniformly from a domain of `domain_size` values: `n * (1 - e^(-k/n))`,
/// capped by both inputs.
pub fn num_distinct_vals(domain_size: f64, num_selected: f64) -> f64 {
    let n = domain_size.min(f64::MAX);
    let k = num_selected.min(f64::MAX);
    let res = if n > 0.0 { (1.0 - (-k / n).exp()) * n } else { 0.0 };
    res.min(n).min(k).max(0.0)
}

/// Estimated number of rows `id` produces.
pub fn row_count(arena: &RelArena, id: RelId) -> f64 {
    RowCountCache::default().row_count(arena, id)
}

/// Row counts memoized by node for one costing pass, so a subtree shared by
/// several parents is estimated once. Entries go stale when an input of a
/// cached node is replaced.
#[derive(Debug, Default)]
pub struct RowCountCache {
    counts: HashMap<RelId, f64>,
}

impl RowCountCache {
    pub fn row_count(&mut self, arena: &RelArena, id: RelId) -> f64 {
        if let Some(rows) = self.counts.get(&id) {
            return *rows;
        }
        let rows = self.estimate(arena, id);
        self.counts.insert(id, rows);
        rows
    }

    fn estimate(&mut self, arena: &RelArena, id: RelId) -> f64 {
        let inputs = arena.inputs(id);
        let mut input_rows = |i: usize| self.row_count(arena, inputs[i]);
        match arena.op(id) {
            RelOp::TableAccess { table } => table.row_count(),
            RelOp::Values { tuples, .. } => tuples.len() as f64,
            RelOp::Filter { condition } => input_rows(0) * guess_selectivity(Some(condition)),
            RelOp::Calc { program } => {
                input_rows(0) * guess_selectivity(program.expanded_condition().as_ref())
            }
            RelOp::Project { .. }
            | RelOp::Sort { .. }
            | RelOp::Uncollect
            | RelOp::TableModification { .. } => input_rows(0),
            RelOp::Join { condition, .. } => {
                input_rows(0) * input_rows(1) * guess_selectivity(Some(condition))
            }
            RelOp::Aggregate { group_count, .. } => {
                if *group_count == 0 {
                    1.0
                } else {
                    input_rows(0) * (1.0 - 0.5f64.powi(*group_count as i32))
                }
            }
            RelOp::Distinct => {
                let width = arena.row_type(id).field_count();
                input_rows(0) * (1.0 - 0.5f64.powi(width as i32))
            }
            RelOp::SetOp { kind, all } => {
                let rows: Vec<f64> = (0..inputs.len()).map(input_rows).collect();
                match kind {
                    SetOpKind::Union => {
                        let sum: f64 = rows.iter().sum();
                        if *all {
                            sum
                        } else {
                            sum * 0.5
                        }
                    }
                    SetOpKind::Intersect => rows.iter().cloned().fold(f64::MAX, f64::min) * 0.25,
                    SetOpKind::Minus => {
                        let rest: f64 = rows[1..].iter().sum();
                        (rows[0] - 0.5 * rest).max(0.0)
                    }
                }
            }
            RelOp::TableFunction { .. } => (0..inputs.len()).map(input_rows).fold(1.0, f64::max),
        }
    }
}

/// Whether the columns `group_key` of `id` are known to be unique.
pub fn are_columns_unique(arena: &RelArena, id: RelId, group_key: &BTreeSet<usize>) -> bool {
    match arena.op(id) {
        RelOp::TableAccess { table } => table.is_key(group_key),
        RelOp::Aggregate { group_count, .. } => (0..*group_count).all(|i| group_key.contains(&i)),
        RelOp::Distinct => (0..arena.row_type(id).field_count()).all(|i| group_key.contains(&i)),
        RelOp::Filter { .. } | RelOp::Sort { .. } => {
            are_columns_unique(arena, arena.inputs(id)[0], group_key)
        }
        _ => false,
    }
}

/// Estimated number of distinct values of the columns `group_key` among the
/// rows of `id` that satisfy `predicate`.
pub fn distinct_row_count(
    arena: &RelArena,
    id: RelId,
    group_key: &BTreeSet<usize>,
    predicate: Option<&RexNode>,
) -> Option<f64> {
    let inputs = arena.inputs(id);
    match arena.op(id) {
        RelOp::SetOp {
            kind: SetOpKind::Union,
            ..
        } => inputs
            .iter()
            .map(|input| distinct_row_count(arena, *input, group_key, predicate))
            .sum(),
        RelOp::Sort { .. } => distinct_row_count(arena, inputs[0], group_key, predicate),
        RelOp::Filter { condition } => {
            let combined = match predicate {
                Some(p) => arena
                    .rex_builder()
                    .compose_conjunction(vec![p.clone(), condition.clone()]),
                None => Some(condition.clone()),
            };
            distinct_row_count(arena, inputs[0], group_key, combined.as_ref())
        }
        RelOp::Aggregate {
            group_count,
            agg_calls,
        } => {
            let (pushable, not_pushable): (Vec<&RexNode>, Vec<&RexNode>) = predicate
                .map(|p| p.conjunctions())
                .unwrap_or_default()
                .into_iter()
                .partition(|c| {
                    InputFinder::bits(&[(*c).clone()])
                        .iter()
                        .all(|bit| bit < group_count)
                });
            let mut child_key = BTreeSet::new();
            for &bit in group_key {
                if bit < *group_count {
                    child_key.insert(bit);
                } else if let Some(call) = agg_calls.get(bit - group_count) {
                    child_key.extend(call.args.iter().copied());
                }
            }
            let child_pred = arena
                .rex_builder()
                .compose_conjunction(pushable.into_iter().cloned().collect());
            let distinct = distinct_row_count(arena, inputs[0], &child_key, child_pred.as_ref())?;
            let rest = arena
                .rex_builder()
                .compose_conjunction(not_pushable.into_iter().cloned().collect());
            Some(distinct * guess_selectivity(rest.as_ref()))
        }
        RelOp::Values { .. } => {
            let half = row_count(arena, id) / 2.0;
            Some(num_distinct_vals(half, half * guess_selectivity(predicate)))
        }
        RelOp::Project { exprs, .. } => {
            let mut base_cols = BTreeSet::new();
            let mut proj_cols = Vec::new();
            for &bit in group_key {
                match &exprs[bit] {
                    RexNode::InputRef(r) => {
                        base_cols.insert(r.index);
                    }
                    other => proj_cols.push(other),
                }
            }
            let mut distinct = distinct_row_count(arena, inputs[0], &base_cols, None)?
                * guess_selectivity(predicate);
            for expr in proj_cols {
                if expr.as_literal().is_some() {
                    continue;
                }
                let cols = InputFinder::bits(&[expr.clone()]);
                distinct *= distinct_row_count(arena, inputs[0], &cols, None)?;
            }
            Some(num_distinct_vals(distinct, row_count(arena, id)))
        }
        _ => {
            if are_columns_unique(arena, id, group_key) {
                Some(row_count(arena, id) * guess_selectivity(predicate))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, InMemoryCatalog};
    use crate::rel::AggregateCall;
    use crate::types::SqlTypeName;

    fn emp(arena: &mut RelArena) -> RelId {
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let table = catalog.lookup_table(&["SALES", "EMP"]).unwrap();
        arena.table_access(table)
    }

    #[test]
    fn test_guess_selectivity() {
        let arena = RelArena::default();
        let rex = arena.rex_builder();
        let int = rex.type_factory().create_sql_type(SqlTypeName::Integer);
        let nullable = rex.type_factory().create_type_with_nullability(&int, true);
        let x = RexNode::input_ref(0, nullable);
        let eq = rex.make_call(&STD.equals, vec![x.clone(), rex.make_exact_literal(1)]);
        let lt = rex.make_call(&STD.less_than, vec![x.clone(), rex.make_exact_literal(1)]);
        let not_null = rex.make_call(&STD.is_not_null, vec![x.clone()]);
        let is_null = rex.make_call(&STD.is_null, vec![x]);
        assert_eq!(guess_selectivity(None), 1.0);
        assert_eq!(guess_selectivity(Some(&eq)), 0.15);
        assert_eq!(guess_selectivity(Some(&lt)), 0.5);
        assert_eq!(guess_selectivity(Some(&not_null)), 0.9);
        assert_eq!(guess_selectivity(Some(&is_null)), 0.25);
        let both = rex.make_call(&STD.and, vec![eq, lt]);
        assert!((guess_selectivity(Some(&both)) - 0.075).abs() < 1e-12);
    }

    #[test]
    fn test_num_distinct_vals_is_capped() {
        assert_eq!(num_distinct_vals(0.0, 10.0), 0.0);
        assert!(num_distinct_vals(100.0, 5.0) <= 5.0);
        assert!(num_distinct_vals(5.0, 1000.0) <= 5.0);
        let v = num_distinct_vals(100.0, 100.0);
        assert!((v - 63.21).abs() < 0.01);
    }

    #[test]
    fn test_row_counts() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        let rex = arena.rex_builder().clone();
        let cond = rex.make_call(
            &STD.equals,
            vec![rex.make_input_ref_for(arena.row_type(scan), 7), rex.make_exact_literal(10)],
        );
        let filter = arena.filter(scan, cond);
        assert!((row_count(&arena, filter) - 2.1).abs() < 1e-9);
        let agg = arena.aggregate(scan, 0, vec![]);
        assert_eq!(row_count(&arena, agg), 1.0);
        let t = rex.make_bool_literal(true);
        let join = arena.join(scan, scan, t, crate::rel::JoinType::Inner, BTreeSet::new());
        assert_eq!(row_count(&arena, join), 196.0);
        let union = arena.set_op(SetOpKind::Union, vec![scan, scan], false);
        assert_eq!(row_count(&arena, union), 14.0);
    }

    #[test]
    fn test_row_count_of_shared_subtrees() {
        let mut arena = RelArena::default();
        let mut rel = emp(&mut arena);
        for _ in 0..40 {
            rel = arena.set_op(SetOpKind::Union, vec![rel, rel], true);
        }
        assert_eq!(row_count(&arena, rel), 14.0 * 2f64.powi(40));
    }

    #[test]
    fn test_distinct_row_count_of_unique_key() {
        let mut arena = RelArena::default();
        let scan = emp(&mut arena);
        assert_eq!(distinct_row_count(&arena, scan, &BTreeSet::from([0]), None), Some(14.0));
        assert_eq!(distinct_row_count(&arena, scan, &BTreeSet::from([7]), None), None);

        let bigint = arena.type_factory().create_sql_type(SqlTypeName::Bigint);
        let count = AggregateCall::new(STD.count.clone(), false, vec![], bigint, None);
        let agg = arena.aggregate(scan, 1, vec![count]);
        assert_eq!(distinct_row_count(&arena, agg, &BTreeSet::from([0]), None), Some(14.0));
        assert!(are_columns_unique(&arena, agg, &BTreeSet::from([0, 1])));
    }
}
