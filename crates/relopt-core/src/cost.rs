//! # Cost Model
//!
//! Plans are compared by a three-dimensional cost vector: rows produced, CPU
//! work and I/O. A cost is only "less" than another when it is no worse in
//! every dimension, so two costs can be incomparable; the planner picks the
//! first of several incomparable alternatives.
//!
//! ## Self Cost and Cumulative Cost
//!
//! Each node has a self cost computed by a [`CostModel`] from its operator and
//! the estimated row counts of its inputs (see [`crate::stats`]). The
//! cumulative cost of a plan is its root's self cost plus the cumulative
//! costs of its inputs.
//!
//! ## Default Formulas
//!
//! | Node          | rows            | cpu                       |
//! |---------------|-----------------|---------------------------|
//! | TableAccess   | table rows      | rows + 1                  |
//! | Filter        | filtered rows   | input rows                |
//! | Project       | input rows      | input rows * expressions  |
//! | Calc          | filtered rows   | input rows * expressions  |
//! | Join          | joined rows     | 0                         |
//! | Sort          | input rows      | n log n                   |
//! | TableFunction | huge            | huge                      |
//!
//! Everything else costs `(rows, rows, 0)`. I/O is zero throughout since the
//! logical operators here do not model storage.

use crate::rel::{RelArena, RelId, RelOp};
use crate::stats::RowCountCache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Costs closer than this in every dimension are treated as equal.
pub const EPSILON: f64 = 1.0e-5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelOptCost {
    pub rows: f64,
    pub cpu: f64,
    pub io: f64,
}

impl RelOptCost {
    pub fn new(rows: f64, cpu: f64, io: f64) -> Self {
        Self { rows, cpu, io }
    }

    pub fn infinite() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY, f64::INFINITY)
    }

    /// Larger than any real cost, but still finite.
    pub fn huge() -> Self {
        Self::new(f64::MAX, f64::MAX, f64::MAX)
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn tiny() -> Self {
        Self::new(1.0, 1.0, 0.0)
    }

    pub fn is_infinite(&self) -> bool {
        self.rows == f64::INFINITY || self.cpu == f64::INFINITY || self.io == f64::INFINITY
    }

    /// No worse than `other` in every dimension.
    pub fn is_le(&self, other: &RelOptCost) -> bool {
        self.rows <= other.rows && self.cpu <= other.cpu && self.io <= other.io
    }

    pub fn is_lt(&self, other: &RelOptCost) -> bool {
        self.is_le(other) && self != other
    }

    pub fn is_eq_with_epsilon(&self, other: &RelOptCost) -> bool {
        (self.rows - other.rows).abs() < EPSILON
            && (self.cpu - other.cpu).abs() < EPSILON
            && (self.io - other.io).abs() < EPSILON
    }

    pub fn plus(&self, other: &RelOptCost) -> RelOptCost {
        if self.is_infinite() || other.is_infinite() {
            return Self::infinite();
        }
        Self::new(self.rows + other.rows, self.cpu + other.cpu, self.io + other.io)
    }

    pub fn minus(&self, other: &RelOptCost) -> RelOptCost {
        if self.is_infinite() {
            return *self;
        }
        Self::new(self.rows - other.rows, self.cpu - other.cpu, self.io - other.io)
    }

    pub fn multiply_by(&self, factor: f64) -> RelOptCost {
        if self.is_infinite() {
            return *self;
        }
        Self::new(self.rows * factor, self.cpu * factor, self.io * factor)
    }

    /// How many times larger `self` is than `other`: the geometric mean of
    /// the ratios of the dimensions that are finite and non-zero in both.
    /// Returns 1 when no dimension qualifies.
    pub fn divide_by(&self, other: &RelOptCost) -> f64 {
        let usable = |a: f64, b: f64| a != 0.0 && a.is_finite() && b != 0.0 && b.is_finite();
        let mut d = 1.0;
        let mut n = 0;
        for (a, b) in [(self.rows, other.rows), (self.cpu, other.cpu), (self.io, other.io)] {
            if usable(a, b) {
                d *= a / b;
                n += 1;
            }
        }
        if n == 0 {
            return 1.0;
        }
        d.powf(1.0 / n as f64)
    }
}

impl fmt::Display for RelOptCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            f.write_str("{inf}")
        } else if *self == Self::huge() {
            f.write_str("{huge}")
        } else if *self == Self::zero() {
            f.write_str("{0}")
        } else {
            write!(f, "{{{} rows, {} cpu, {} io}}", self.rows, self.cpu, self.io)
        }
    }
}

/// Costs and row counts memoized by node for one costing pass.
#[derive(Debug, Default)]
pub struct CostCache {
    pub rows: RowCountCache,
    cumulative: HashMap<RelId, RelOptCost>,
}

/// Trait for pluggable cost models.
pub trait CostModel: Send + Sync {
    fn self_cost(&self, arena: &RelArena, id: RelId, rows: &mut RowCountCache) -> RelOptCost;

    /// Self cost of `id` plus the cumulative cost of each of its inputs. A
    /// subtree with several parents counts once per parent.
    fn cumulative_cost(&self, arena: &RelArena, id: RelId) -> RelOptCost {
        self.cumulative_cost_in(arena, id, &mut CostCache::default())
    }

    /// [`CostModel::cumulative_cost`] reusing the estimates in `cache`.
    fn cumulative_cost_in(&self, arena: &RelArena, id: RelId, cache: &mut CostCache) -> RelOptCost {
        if let Some(cost) = cache.cumulative.get(&id) {
            return *cost;
        }
        let mut cost = self.self_cost(arena, id, &mut cache.rows);
        for input in arena.inputs(id) {
            cost = cost.plus(&self.cumulative_cost_in(arena, *input, cache));
        }
        cache.cumulative.insert(id, cost);
        cost
    }
}

pub struct DefaultCostModel {
    /// Multiplier applied to the CPU dimension.
    pub cpu_weight: f64,
    /// Multiplier applied to the I/O dimension.
    pub io_weight: f64,
}

impl Default for DefaultCostModel {
    fn default() -> Self {
        Self {
            cpu_weight: 1.0,
            io_weight: 1.0,
        }
    }
}

impl CostModel for DefaultCostModel {
    fn self_cost(&self, arena: &RelArena, id: RelId, cache: &mut RowCountCache) -> RelOptCost {
        let rows = cache.row_count(arena, id);
        let mut input_rows = |i: usize| cache.row_count(arena, arena.inputs(id)[i]);
        let (rows, cpu, io) = match arena.op(id) {
            RelOp::TableAccess { .. } => (rows, rows + 1.0, 0.0),
            RelOp::Filter { .. } => (rows, input_rows(0), 0.0),
            RelOp::Project { exprs, .. } => {
                let child = input_rows(0);
                (child, child * exprs.len() as f64, 0.0)
            }
            RelOp::Calc { program } => (rows, input_rows(0) * program.expr_list().len() as f64, 0.0),
            RelOp::Join { .. } => (rows, 0.0, 0.0),
            RelOp::Sort { .. } => {
                let child = input_rows(0);
                let cpu = if child > 1.0 { child * child.log2() } else { 1.0 };
                (child, cpu, 0.0)
            }
            RelOp::TableFunction { .. } => return RelOptCost::huge(),
            _ => (rows, rows, 0.0),
        };
        RelOptCost::new(rows, cpu * self.cpu_weight, io * self.io_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, InMemoryCatalog};
    use crate::rex::STD;

    #[test]
    fn test_vector_comparison() {
        let a = RelOptCost::new(10.0, 5.0, 0.0);
        let b = RelOptCost::new(10.0, 8.0, 0.0);
        let c = RelOptCost::new(5.0, 9.0, 0.0);
        assert!(a.is_le(&b) && a.is_lt(&b));
        assert!(!a.is_lt(&a) && a.is_le(&a));
        // incomparable
        assert!(!b.is_le(&c) && !c.is_le(&b));
        assert!(a.is_eq_with_epsilon(&RelOptCost::new(10.0, 5.000001, 0.0)));
    }

    #[test]
    fn test_arithmetic() {
        let a = RelOptCost::new(10.0, 4.0, 0.0);
        let b = RelOptCost::new(5.0, 1.0, 0.0);
        assert_eq!(a.plus(&b), RelOptCost::new(15.0, 5.0, 0.0));
        assert_eq!(a.minus(&b), RelOptCost::new(5.0, 3.0, 0.0));
        assert_eq!(b.multiply_by(2.0), RelOptCost::new(10.0, 2.0, 0.0));
        // sqrt(2 * 4); io is zero in both and ignored
        assert!((a.divide_by(&b) - 8f64.sqrt()).abs() < 1e-12);
        assert_eq!(RelOptCost::zero().divide_by(&b), 1.0);
        assert!(a.plus(&RelOptCost::infinite()).is_infinite());
    }

    #[test]
    fn test_display() {
        assert_eq!(RelOptCost::infinite().to_string(), "{inf}");
        assert_eq!(RelOptCost::huge().to_string(), "{huge}");
        assert_eq!(RelOptCost::zero().to_string(), "{0}");
        assert_eq!(RelOptCost::tiny().to_string(), "{1 rows, 1 cpu, 0 io}");
    }

    #[test]
    fn test_self_costs() {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let scan = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
        let rex = arena.rex_builder().clone();
        let row = arena.row_type(scan).clone();
        let cond = rex.make_call(&STD.greater_than, vec![rex.make_input_ref_for(&row, 5), rex.make_exact_literal(0)]);
        let filter = arena.filter(scan, cond);
        let project = arena.project(
            filter,
            vec![rex.make_input_ref_for(&row, 0), rex.make_input_ref_for(&row, 1)],
            vec![None, None],
        );
        let model = DefaultCostModel::default();
        let mut rows = RowCountCache::default();
        assert_eq!(model.self_cost(&arena, scan, &mut rows), RelOptCost::new(14.0, 15.0, 0.0));
        assert_eq!(model.self_cost(&arena, filter, &mut rows), RelOptCost::new(7.0, 14.0, 0.0));
        assert_eq!(model.self_cost(&arena, project, &mut rows), RelOptCost::new(7.0, 14.0, 0.0));
        assert_eq!(
            model.cumulative_cost(&arena, project),
            RelOptCost::new(28.0, 43.0, 0.0)
        );
    }

    #[test]
    fn test_cumulative_cost_counts_shared_inputs_per_parent() {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let mut rel = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
        let levels = 40;
        for _ in 0..levels {
            rel = arena.set_op(crate::rel::SetOpKind::Union, vec![rel, rel], true);
        }
        let scale = 2f64.powi(levels);
        assert_eq!(
            DefaultCostModel::default().cumulative_cost(&arena, rel),
            RelOptCost::new(
                14.0 * scale * (levels + 1) as f64,
                scale * (15.0 + 14.0 * levels as f64),
                0.0
            )
        );
    }
}
