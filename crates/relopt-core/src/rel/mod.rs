//! # Relational Expressions
//!
//! Relational expressions form a DAG of operators: scans, filters,
//! projections, joins, aggregates and so on. Each node carries a derived row
//! type, a trait set and a digest that identifies it structurally.
//!
//! ## Ownership
//!
//! Every node of one optimization session lives in a [`RelArena`] and is
//! referenced by a [`RelId`]. Children are ids, not owned boxes, so a node's
//! input slot can be replaced in place ([`RelArena::replace_input`]) while the
//! same child is shared by several parents. Ids are allocated by the arena,
//! which is the only place a node counter exists.
//!
//! ## Row Types
//!
//! A node's row type is derived from its operator and inputs on first access
//! and cached for the life of the node. It is never recomputed: replacing an
//! input with one of a different row type is a defect and panics.
//!
//! ## Digests
//!
//! The digest is the node's explain output rendered at digest level:
//!
//! ```text
//! FilterRel.NONE(child=rel#0,condition=>($0, 1))
//! ```
//!
//! Inputs appear by id, so two nodes with equal digests compute the same
//! result over the same inputs. The digest is recomputed whenever an input is
//! replaced or the node is registered with a planner.

pub mod explain;

pub use explain::{DigestWriter, PlanWriter, RelWriter};

use crate::catalog::RelOptTable;
use crate::program::RexProgram;
use crate::rex::{InputFinder, RexBuilder, RexLiteral, RexNode, SqlOperator};
use crate::traits::{RelFieldCollation, RelTraitSet};
use crate::types::{RelDataType, RelDataTypeField, SqlTypeName, TypeFactory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Identifier of a node within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelId(pub usize);

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rel#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn name(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "full",
        }
    }

    /// Whether the join emits rows with nulls in place of left fields.
    pub fn generates_nulls_on_left(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }

    /// Whether the join emits rows with nulls in place of right fields.
    pub fn generates_nulls_on_right(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOpKind {
    Union,
    Intersect,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableModificationOp {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for TableModificationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TableModificationOp::Insert => "INSERT",
            TableModificationOp::Update => "UPDATE",
            TableModificationOp::Delete => "DELETE",
        })
    }
}

/// One aggregate function applied within an [`RelOp::Aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateCall {
    pub op: Arc<SqlOperator>,
    pub distinct: bool,
    /// Ordinals of the aggregate's input fields passed as arguments.
    pub args: Vec<usize>,
    pub ty: RelDataType,
    pub name: Option<String>,
}

impl AggregateCall {
    pub fn new(
        op: Arc<SqlOperator>,
        distinct: bool,
        args: Vec<usize>,
        ty: RelDataType,
        name: Option<String>,
    ) -> Self {
        assert!(op.is_aggregate, "{} is not an aggregate function", op.name);
        Self {
            op,
            distinct,
            args,
            ty,
            name,
        }
    }

    /// The same call with its arguments renumbered.
    pub fn with_args(&self, args: Vec<usize>) -> Self {
        Self {
            args,
            ..self.clone()
        }
    }

    pub fn with_distinct(&self, distinct: bool) -> Self {
        Self {
            distinct,
            ..self.clone()
        }
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op.name)?;
        if self.distinct {
            f.write_str(if self.args.is_empty() { "DISTINCT" } else { "DISTINCT " })?;
        }
        let args: Vec<String> = self.args.iter().map(|a| format!("${}", a)).collect();
        write!(f, "{})", args.join(", "))
    }
}

/// Operator-level discriminant, used by rule operands to match a node's
/// kind without inspecting its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelKind {
    TableAccess,
    Values,
    Filter,
    Project,
    Calc,
    Join,
    Aggregate,
    Distinct,
    Sort,
    Union,
    Intersect,
    Minus,
    Uncollect,
    TableModification,
    TableFunction,
}

/// An operator together with its scalar payload.
#[derive(Debug, Clone)]
pub enum RelOp {
    TableAccess {
        table: RelOptTable,
    },
    Values {
        row_type: RelDataType,
        tuples: Vec<Vec<RexLiteral>>,
    },
    Filter {
        condition: RexNode,
    },
    /// A boxed projection produces a record; an unboxed one has exactly one
    /// expression and produces its value directly.
    Project {
        exprs: Vec<RexNode>,
        names: Vec<String>,
        boxed: bool,
    },
    Calc {
        program: RexProgram,
    },
    Join {
        condition: RexNode,
        join_type: JoinType,
        system_fields: Vec<RelDataTypeField>,
    },
    /// Groups on the first `group_count` input fields.
    Aggregate {
        group_count: usize,
        agg_calls: Vec<AggregateCall>,
    },
    Distinct,
    Sort {
        collations: Vec<RelFieldCollation>,
    },
    SetOp {
        kind: SetOpKind,
        all: bool,
    },
    Uncollect,
    TableModification {
        table: RelOptTable,
        operation: TableModificationOp,
        update_columns: Vec<String>,
    },
    TableFunction {
        call: RexNode,
        row_type: RelDataType,
    },
}

impl RelOp {
    pub fn kind(&self) -> RelKind {
        match self {
            RelOp::TableAccess { .. } => RelKind::TableAccess,
            RelOp::Values { .. } => RelKind::Values,
            RelOp::Filter { .. } => RelKind::Filter,
            RelOp::Project { .. } => RelKind::Project,
            RelOp::Calc { .. } => RelKind::Calc,
            RelOp::Join { .. } => RelKind::Join,
            RelOp::Aggregate { .. } => RelKind::Aggregate,
            RelOp::Distinct => RelKind::Distinct,
            RelOp::Sort { .. } => RelKind::Sort,
            RelOp::SetOp { kind: SetOpKind::Union, .. } => RelKind::Union,
            RelOp::SetOp { kind: SetOpKind::Intersect, .. } => RelKind::Intersect,
            RelOp::SetOp { kind: SetOpKind::Minus, .. } => RelKind::Minus,
            RelOp::Uncollect => RelKind::Uncollect,
            RelOp::TableModification { .. } => RelKind::TableModification,
            RelOp::TableFunction { .. } => RelKind::TableFunction,
        }
    }

    /// The name that leads the node's digest.
    pub fn rel_type_name(&self) -> &'static str {
        match self.kind() {
            RelKind::TableAccess => "TableAccessRel",
            RelKind::Values => "ValuesRel",
            RelKind::Filter => "FilterRel",
            RelKind::Project => "ProjectRel",
            RelKind::Calc => "CalcRel",
            RelKind::Join => "JoinRel",
            RelKind::Aggregate => "AggregateRel",
            RelKind::Distinct => "DistinctRel",
            RelKind::Sort => "SortRel",
            RelKind::Union => "UnionRel",
            RelKind::Intersect => "IntersectRel",
            RelKind::Minus => "MinusRel",
            RelKind::Uncollect => "UncollectRel",
            RelKind::TableModification => "TableModificationRel",
            RelKind::TableFunction => "TableFunctionRel",
        }
    }

    /// Number of inputs, or `None` for operators that take any number.
    pub fn arity(&self) -> Option<usize> {
        match self {
            RelOp::TableAccess { .. } | RelOp::Values { .. } => Some(0),
            RelOp::Join { .. } => Some(2),
            RelOp::SetOp { .. } | RelOp::TableFunction { .. } => None,
            _ => Some(1),
        }
    }

    /// Scalar expressions the node evaluates, in explain order.
    pub fn child_exps(&self) -> Vec<RexNode> {
        match self {
            RelOp::Filter { condition } | RelOp::Join { condition, .. } => vec![condition.clone()],
            RelOp::Project { exprs, .. } => exprs.clone(),
            RelOp::TableFunction { call, .. } => vec![call.clone()],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelNode {
    id: RelId,
    op: RelOp,
    inputs: Vec<RelId>,
    traits: RelTraitSet,
    variables_stopped: BTreeSet<String>,
    correl_variable: Option<String>,
    row_type: OnceLock<RelDataType>,
    digest: String,
}

impl RelNode {
    pub fn id(&self) -> RelId {
        self.id
    }

    pub fn op(&self) -> &RelOp {
        &self.op
    }

    pub fn kind(&self) -> RelKind {
        self.op.kind()
    }

    pub fn inputs(&self) -> &[RelId] {
        &self.inputs
    }

    pub fn input(&self, ordinal: usize) -> RelId {
        self.inputs[ordinal]
    }

    pub fn traits(&self) -> &RelTraitSet {
        &self.traits
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn rel_type_name(&self) -> &'static str {
        self.op.rel_type_name()
    }

    /// Correlation variables that are bound by this node and therefore not
    /// visible above it.
    pub fn variables_stopped(&self) -> &BTreeSet<String> {
        &self.variables_stopped
    }

    /// The variable through which nested expressions refer to this node's
    /// current row, if any.
    pub fn correl_variable(&self) -> Option<&str> {
        self.correl_variable.as_deref()
    }

    pub fn child_exps(&self) -> Vec<RexNode> {
        self.op.child_exps()
    }

    /// Emit the node's terms to `pw`: first one per input, then one per child
    /// expression, then one per value.
    pub fn explain(&self, arena: &RelArena, pw: &mut dyn RelWriter) {
        let mut terms: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();
        let child_terms = |terms: &mut Vec<String>| {
            if self.inputs.len() == 1 {
                terms.push("child".into());
            }
        };
        match &self.op {
            RelOp::TableAccess { table } => {
                terms.push("table".into());
                values.push(table.to_string());
            }
            RelOp::Values { row_type, tuples } => {
                terms.push("type".into());
                terms.push("tuples".into());
                values.push(row_type.full_type_string().to_string());
                let rendered: Vec<String> = tuples
                    .iter()
                    .map(|tuple| {
                        let literals: Vec<String> = tuple.iter().map(|l| l.to_string()).collect();
                        format!("{{ {} }}", literals.join(", "))
                    })
                    .collect();
                values.push(format!("[{}]", rendered.join(", ")));
            }
            RelOp::Filter { .. } => {
                child_terms(&mut terms);
                terms.push("condition".into());
            }
            RelOp::Project { names, .. } => {
                child_terms(&mut terms);
                terms.extend(names.iter().cloned());
            }
            RelOp::Calc { program } => {
                child_terms(&mut terms);
                for (i, expr) in program.expr_list().iter().enumerate() {
                    terms.push(format!("expr#{}", i));
                    values.push(expr.to_string());
                }
                for (project, field) in program
                    .project_list()
                    .iter()
                    .zip(program.output_row_type().fields())
                {
                    terms.push(field.name.clone());
                    values.push(project.to_string());
                }
                if let Some(condition) = program.condition() {
                    terms.push("$condition".into());
                    values.push(condition.to_string());
                }
            }
            RelOp::Join {
                join_type,
                system_fields,
                ..
            } => {
                terms.extend(["left".into(), "right".into(), "condition".into(), "joinType".into()]);
                values.push(join_type.name().to_string());
                if !system_fields.is_empty() {
                    terms.push("systemFields".into());
                    let names: Vec<&str> = system_fields.iter().map(|f| f.name.as_str()).collect();
                    values.push(format!("[{}]", names.join(", ")));
                }
            }
            RelOp::Aggregate {
                group_count,
                agg_calls,
            } => {
                child_terms(&mut terms);
                terms.push("groupCount".into());
                values.push(group_count.to_string());
                for (i, call) in agg_calls.iter().enumerate() {
                    terms.push(format!("agg#{}", i));
                    values.push(call.to_string());
                }
            }
            RelOp::Distinct | RelOp::Uncollect => child_terms(&mut terms),
            RelOp::Sort { collations } => {
                child_terms(&mut terms);
                for (i, collation) in collations.iter().enumerate() {
                    terms.push(format!("sort{}", i));
                    values.push(collation.to_string());
                }
            }
            RelOp::SetOp { all, .. } => {
                terms.extend((0..self.inputs.len()).map(|i| format!("input#{}", i)));
                terms.push("all".into());
                values.push(all.to_string());
            }
            RelOp::TableModification {
                table,
                operation,
                update_columns,
            } => {
                child_terms(&mut terms);
                terms.extend(["table".into(), "operation".into(), "updateColumnList".into()]);
                values.push(table.to_string());
                values.push(operation.to_string());
                values.push(format!("[{}]", update_columns.join(", ")));
            }
            RelOp::TableFunction { row_type, .. } => {
                terms.extend((0..self.inputs.len()).map(|i| format!("input#{}", i)));
                terms.push("invocation".into());
                terms.push("rowType".into());
                values.push(row_type.to_string());
            }
        }
        pw.explain(arena, self, &terms, &values);
    }
}

/// Owns the nodes of one optimization session and the scalar builder their
/// expressions are made with.
#[derive(Debug, Clone, Default)]
pub struct RelArena {
    nodes: Vec<RelNode>,
    rex: RexBuilder,
}

impl RelArena {
    pub fn new(rex: RexBuilder) -> Self {
        Self {
            nodes: Vec::new(),
            rex,
        }
    }

    pub fn rex_builder(&self) -> &RexBuilder {
        &self.rex
    }

    pub fn type_factory(&self) -> &TypeFactory {
        self.rex.type_factory()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: RelId) -> &RelNode {
        &self.nodes[id.0]
    }

    pub fn op(&self, id: RelId) -> &RelOp {
        &self.nodes[id.0].op
    }

    pub fn inputs(&self, id: RelId) -> &[RelId] {
        &self.nodes[id.0].inputs
    }

    pub fn digest(&self, id: RelId) -> &str {
        &self.nodes[id.0].digest
    }

    /// `rel#<id>:<digest>`, the form used in log output.
    pub fn description(&self, id: RelId) -> String {
        format!("{}:{}", id, self.digest(id))
    }

    /// Allocate a node.
    ///
    /// # Panics
    ///
    /// Panics if the number of inputs does not match the operator's arity.
    pub fn add(&mut self, op: RelOp, inputs: Vec<RelId>, traits: RelTraitSet) -> RelId {
        if let Some(arity) = op.arity() {
            assert_eq!(
                inputs.len(),
                arity,
                "{} takes {} inputs",
                op.rel_type_name(),
                arity
            );
        }
        for input in &inputs {
            assert!(input.0 < self.nodes.len(), "unknown input {}", input);
        }
        let id = RelId(self.nodes.len());
        self.nodes.push(RelNode {
            id,
            op,
            inputs,
            traits,
            variables_stopped: BTreeSet::new(),
            correl_variable: None,
            row_type: OnceLock::new(),
            digest: String::new(),
        });
        self.recompute_digest(id);
        id
    }

    /// A new node with the same operator as `id` and the given traits and inputs.
    pub fn copy(&mut self, id: RelId, traits: RelTraitSet, inputs: Vec<RelId>) -> RelId {
        let node = self.node(id);
        let op = node.op.clone();
        let stopped = node.variables_stopped.clone();
        let copy = self.add(op, inputs, traits);
        self.nodes[copy.0].variables_stopped = stopped;
        self.recompute_digest(copy);
        copy
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    pub fn table_access(&mut self, table: RelOptTable) -> RelId {
        self.add(RelOp::TableAccess { table }, vec![], RelTraitSet::none())
    }

    pub fn values(&mut self, row_type: RelDataType, tuples: Vec<Vec<RexLiteral>>) -> RelId {
        for tuple in &tuples {
            assert_eq!(
                tuple.len(),
                row_type.field_count(),
                "tuple width does not match {}",
                row_type
            );
        }
        self.add(RelOp::Values { row_type, tuples }, vec![], RelTraitSet::none())
    }

    pub fn filter(&mut self, child: RelId, condition: RexNode) -> RelId {
        assert_eq!(
            condition.ty().sql_type_name(),
            SqlTypeName::Boolean,
            "condition must be boolean: {}",
            condition
        );
        self.check_input_refs(&[condition.clone()], self.row_type(child).field_count());
        self.add(RelOp::Filter { condition }, vec![child], RelTraitSet::none())
    }

    /// A boxed projection. Missing names become `$f<ordinal>`.
    pub fn project(&mut self, child: RelId, exprs: Vec<RexNode>, names: Vec<Option<String>>) -> RelId {
        assert_eq!(exprs.len(), names.len(), "one name per expression");
        self.check_input_refs(&exprs, self.row_type(child).field_count());
        let names = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| name.unwrap_or_else(|| format!("$f{}", i)))
            .collect();
        self.add(
            RelOp::Project {
                exprs,
                names,
                boxed: true,
            },
            vec![child],
            RelTraitSet::none(),
        )
    }

    /// An unboxed projection of a single expression.
    pub fn project_unboxed(&mut self, child: RelId, expr: RexNode, name: impl Into<String>) -> RelId {
        self.check_input_refs(&[expr.clone()], self.row_type(child).field_count());
        self.add(
            RelOp::Project {
                exprs: vec![expr],
                names: vec![name.into()],
                boxed: false,
            },
            vec![child],
            RelTraitSet::none(),
        )
    }

    pub fn calc(&mut self, child: RelId, program: RexProgram) -> RelId {
        let traits = self.node(child).traits.clone().with_collation(Vec::new());
        self.calc_with_traits(child, program, traits)
    }

    pub fn calc_with_traits(&mut self, child: RelId, program: RexProgram, traits: RelTraitSet) -> RelId {
        assert!(
            program.input_row_type().equal_sans_field_names(self.row_type(child)),
            "program input {} does not match child row type {}",
            program.input_row_type(),
            self.row_type(child)
        );
        self.add(RelOp::Calc { program }, vec![child], traits)
    }

    /// # Panics
    ///
    /// Panics on [`JoinType::Right`]: express a right join as a left join
    /// with the inputs swapped.
    pub fn join(
        &mut self,
        left: RelId,
        right: RelId,
        condition: RexNode,
        join_type: JoinType,
        variables_stopped: BTreeSet<String>,
    ) -> RelId {
        assert!(join_type != JoinType::Right, "RIGHT joins are not allowed; swap the inputs");
        assert_eq!(
            condition.ty().sql_type_name(),
            SqlTypeName::Boolean,
            "condition must be boolean: {}",
            condition
        );
        let width = self.row_type(left).field_count() + self.row_type(right).field_count();
        self.check_input_refs(&[condition.clone()], width);
        let id = self.add(
            RelOp::Join {
                condition,
                join_type,
                system_fields: Vec::new(),
            },
            vec![left, right],
            RelTraitSet::none(),
        );
        self.nodes[id.0].variables_stopped = variables_stopped;
        id
    }

    pub fn aggregate(&mut self, child: RelId, group_count: usize, agg_calls: Vec<AggregateCall>) -> RelId {
        let width = self.row_type(child).field_count();
        assert!(group_count <= width, "group count {} exceeds {} fields", group_count, width);
        for call in &agg_calls {
            for &arg in &call.args {
                assert!(arg < width, "aggregate argument ${} out of range 0..{}", arg, width);
            }
        }
        self.add(
            RelOp::Aggregate {
                group_count,
                agg_calls,
            },
            vec![child],
            RelTraitSet::none(),
        )
    }

    pub fn distinct(&mut self, child: RelId) -> RelId {
        self.add(RelOp::Distinct, vec![child], RelTraitSet::none())
    }

    pub fn sort(&mut self, child: RelId, collations: Vec<RelFieldCollation>) -> RelId {
        let width = self.row_type(child).field_count();
        for c in &collations {
            assert!(c.field_index < width, "sort key {} out of range", c.field_index);
        }
        let traits = RelTraitSet::none().with_collation(collations.clone());
        self.add(RelOp::Sort { collations }, vec![child], traits)
    }

    pub fn set_op(&mut self, kind: SetOpKind, inputs: Vec<RelId>, all: bool) -> RelId {
        assert!(!inputs.is_empty(), "set operation needs at least one input");
        let width = self.row_type(inputs[0]).field_count();
        for input in &inputs {
            assert_eq!(self.row_type(*input).field_count(), width, "set operation inputs differ in width");
        }
        self.add(RelOp::SetOp { kind, all }, inputs, RelTraitSet::none())
    }

    /// # Panics
    ///
    /// Panics unless the child produces a single multiset field.
    pub fn uncollect(&mut self, child: RelId) -> RelId {
        let child_type = self.row_type(child);
        assert_eq!(child_type.field_count(), 1, "expected 1 field in {}", child_type);
        assert!(
            child_type.fields()[0].ty.component_type().is_some(),
            "{} is not a collection",
            child_type.fields()[0].ty
        );
        self.add(RelOp::Uncollect, vec![child], RelTraitSet::none())
    }

    pub fn table_modification(
        &mut self,
        child: RelId,
        table: RelOptTable,
        operation: TableModificationOp,
        update_columns: Vec<String>,
    ) -> RelId {
        for column in &update_columns {
            assert!(table.row_type.field(column).is_some(), "{} has no column {}", table, column);
        }
        self.add(
            RelOp::TableModification {
                table,
                operation,
                update_columns,
            },
            vec![child],
            RelTraitSet::none(),
        )
    }

    pub fn table_function(&mut self, inputs: Vec<RelId>, call: RexNode, row_type: RelDataType) -> RelId {
        self.add(RelOp::TableFunction { call, row_type }, inputs, RelTraitSet::none())
    }

    fn check_input_refs(&self, exprs: &[RexNode], width: usize) {
        if let Some(&max) = InputFinder::bits(exprs).iter().next_back() {
            assert!(max < width, "input ${} out of range 0..{}", max, width);
        }
    }

    // ------------------------------------------------------------------
    // Derived properties
    // ------------------------------------------------------------------

    /// The node's row type, derived on first access.
    pub fn row_type(&self, id: RelId) -> &RelDataType {
        let node = &self.nodes[id.0];
        node.row_type.get_or_init(|| self.derive_row_type(node))
    }

    fn derive_row_type(&self, node: &RelNode) -> RelDataType {
        let tf = self.type_factory();
        match &node.op {
            RelOp::TableAccess { table } => table.row_type.clone(),
            RelOp::Values { row_type, .. } | RelOp::TableFunction { row_type, .. } => row_type.clone(),
            RelOp::Filter { .. } | RelOp::Distinct | RelOp::Sort { .. } => {
                self.row_type(node.inputs[0]).clone()
            }
            RelOp::Project { exprs, names, .. } => tf.create_struct_type(
                names
                    .iter()
                    .cloned()
                    .zip(exprs.iter().map(|e| e.ty().clone()))
                    .collect(),
            ),
            RelOp::Calc { program } => program.output_row_type().clone(),
            RelOp::Join {
                join_type,
                system_fields,
                ..
            } => derive_join_row_type(
                tf,
                self.row_type(node.inputs[0]),
                self.row_type(node.inputs[1]),
                *join_type,
                system_fields,
            ),
            RelOp::Aggregate {
                group_count,
                agg_calls,
            } => {
                let child = self.row_type(node.inputs[0]);
                let mut fields: Vec<(String, RelDataType)> = child.fields()[..*group_count]
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.clone()))
                    .collect();
                for (i, call) in agg_calls.iter().enumerate() {
                    let name = call
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("$f{}", group_count + i));
                    fields.push((name, call.ty.clone()));
                }
                tf.create_struct_type(fields)
            }
            RelOp::SetOp { .. } => {
                let types: Vec<RelDataType> =
                    node.inputs.iter().map(|i| self.row_type(*i).clone()).collect();
                tf.least_restrictive(&types)
                    .unwrap_or_else(|| types[0].clone())
            }
            RelOp::Uncollect => {
                let child = self.row_type(node.inputs[0]);
                let element = child.fields()[0]
                    .ty
                    .component_type()
                    .cloned()
                    .unwrap_or_else(|| panic!("{} is not a collection", child.fields()[0].ty));
                if element.is_struct() {
                    element
                } else {
                    tf.create_struct_type(vec![("EXPR$0".into(), element)])
                }
            }
            RelOp::TableModification { .. } => tf.create_struct_type(vec![(
                "ROWCOUNT".into(),
                tf.create_sql_type(SqlTypeName::Bigint),
            )]),
        }
    }

    /// The row type a table modification expects from its input: the table's
    /// row type, followed for UPDATE by the new values of the updated columns.
    pub fn expected_input_row_type(&self, id: RelId, ordinal: usize) -> RelDataType {
        assert_eq!(ordinal, 0);
        match self.op(id) {
            RelOp::TableModification {
                table,
                operation: TableModificationOp::Update,
                update_columns,
            } => {
                let tf = self.type_factory();
                let projected = tf.create_struct_type(
                    update_columns
                        .iter()
                        .filter_map(|c| table.row_type.field(c))
                        .map(|f| (f.name.clone(), f.ty.clone()))
                        .collect(),
                );
                tf.create_join_type(&[&table.row_type, &projected])
            }
            RelOp::TableModification { table, .. } => table.row_type.clone(),
            _ => self.row_type(self.inputs(id)[ordinal]).clone(),
        }
    }

    /// Whether the node is known to produce no duplicate rows.
    pub fn is_distinct(&self, id: RelId) -> bool {
        match self.op(id) {
            RelOp::Distinct => true,
            RelOp::Aggregate { agg_calls, .. } => agg_calls.is_empty(),
            RelOp::SetOp {
                kind: SetOpKind::Union,
                all,
            } => !all,
            RelOp::Filter { .. } | RelOp::Sort { .. } => self.is_distinct(self.inputs(id)[0]),
            RelOp::TableAccess { table } => !table.unique_keys.is_empty(),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Point input `ordinal` of `id` at `input` and recompute the digest.
    ///
    /// # Panics
    ///
    /// Panics if the node has no inputs or `ordinal` is out of range.
    pub fn replace_input(&mut self, id: RelId, ordinal: usize, input: RelId) {
        let node = &self.nodes[id.0];
        if node.inputs.is_empty() {
            panic!("replace_input called on {}", self.description(id));
        }
        assert!(
            ordinal < node.inputs.len(),
            "input ordinal {} out of range for {}",
            ordinal,
            self.description(id)
        );
        self.nodes[id.0].inputs[ordinal] = input;
        self.recompute_digest(id);
    }

    /// Canonicalize the inputs of `id` through `ensure_registered`, then
    /// recompute its digest.
    ///
    /// # Panics
    ///
    /// Panics if a canonical input has a different row type from the input it
    /// replaces.
    pub fn on_register<F>(&mut self, id: RelId, mut ensure_registered: F)
    where
        F: FnMut(&mut RelArena, RelId) -> RelId,
    {
        let inputs = self.inputs(id).to_vec();
        for (ordinal, input) in inputs.into_iter().enumerate() {
            let canonical = ensure_registered(self, input);
            if canonical != input {
                assert_eq!(
                    self.row_type(input),
                    self.row_type(canonical),
                    "row type of {} changed on registration as {}",
                    self.description(input),
                    self.description(canonical)
                );
                self.replace_input(id, ordinal, canonical);
            }
        }
        self.recompute_digest(id);
    }

    pub fn recompute_digest(&mut self, id: RelId) -> String {
        let mut writer = DigestWriter::default();
        self.nodes[id.0].explain(self, &mut writer);
        let digest = writer.into_digest();
        self.nodes[id.0].digest = digest.clone();
        digest
    }

    pub fn register_stopped_variable(&mut self, id: RelId, name: impl Into<String>) {
        self.nodes[id.0].variables_stopped.insert(name.into());
        self.recompute_digest(id);
    }

    /// # Panics
    ///
    /// Panics if the node already has a correlation variable.
    pub fn register_correl_variable(&mut self, id: RelId, name: impl Into<String>) {
        let node = &mut self.nodes[id.0];
        assert!(node.correl_variable.is_none(), "{} already has a correlation variable", id);
        node.correl_variable = Some(name.into());
    }

    /// Ids of every node reachable from `root`, parents before children.
    pub fn reachable(&self, root: RelId) -> Vec<RelId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            for input in self.inputs(id).iter().rev() {
                stack.push(*input);
            }
        }
        order
    }

    /// Indented explain output of the tree rooted at `id`.
    pub fn explain_plan(&self, id: RelId) -> String {
        let mut writer = PlanWriter::default();
        self.node(id).explain(self, &mut writer);
        writer.into_string()
    }
}

/// The row type of a join: system fields, then left fields, then right
/// fields, with the side(s) an outer join pads with nulls made nullable and
/// colliding names given a numeric suffix.
pub fn derive_join_row_type(
    type_factory: &TypeFactory,
    left: &RelDataType,
    right: &RelDataType,
    join_type: JoinType,
    system_fields: &[RelDataTypeField],
) -> RelDataType {
    let left = if join_type.generates_nulls_on_left() {
        type_factory.create_type_with_nullability(left, true)
    } else {
        left.clone()
    };
    let right = if join_type.generates_nulls_on_right() {
        type_factory.create_type_with_nullability(right, true)
    } else {
        right.clone()
    };
    let system = type_factory.create_struct_type(
        system_fields
            .iter()
            .map(|f| (f.name.clone(), f.ty.clone()))
            .collect(),
    );
    type_factory.create_join_type(&[&system, &left, &right])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, InMemoryCatalog};
    use crate::rex::STD;

    fn arena_with_emp() -> (RelArena, RelId) {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let emp = catalog.lookup_table(&["SALES", "EMP"]).unwrap();
        let scan = arena.table_access(emp);
        (arena, scan)
    }

    fn struct_of(tf: &TypeFactory, names: &[&str]) -> RelDataType {
        let int = tf.create_sql_type(SqlTypeName::Integer);
        tf.create_struct_type(names.iter().map(|n| (n.to_string(), int.clone())).collect())
    }

    #[test]
    fn test_digest_format() {
        let (mut arena, scan) = arena_with_emp();
        assert_eq!(arena.digest(scan), "TableAccessRel.NONE(table=[SALES, EMP])");
        let rex = arena.rex_builder().clone();
        let cond = rex.make_call(
            &STD.greater_than,
            vec![rex.make_input_ref_for(arena.row_type(scan), 5), rex.make_exact_literal(1000)],
        );
        let filter = arena.filter(scan, cond);
        assert_eq!(arena.digest(filter), "FilterRel.NONE(child=rel#0,condition=>($5, 1000))");
        assert_eq!(arena.description(filter), "rel#1:FilterRel.NONE(child=rel#0,condition=>($5, 1000))");
        assert_eq!(arena.recompute_digest(filter), arena.digest(filter));
    }

    #[test]
    fn test_join_row_type_nullability() {
        let tf = TypeFactory::default();
        let left = struct_of(&tf, &["A", "B"]);
        let right = struct_of(&tf, &["B", "C"]);
        let cases = [
            (JoinType::Inner, [false, false, false, false]),
            (JoinType::Left, [false, false, true, true]),
            (JoinType::Right, [true, true, false, false]),
            (JoinType::Full, [true, true, true, true]),
        ];
        for (join_type, nullable) in cases {
            let ty = derive_join_row_type(&tf, &left, &right, join_type, &[]);
            assert_eq!(ty.field_names(), vec!["A", "B", "B0", "C"]);
            let actual: Vec<bool> = ty.fields().iter().map(|f| f.ty.is_nullable()).collect();
            assert_eq!(actual, nullable, "{}", join_type);
        }
    }

    #[test]
    fn test_join_system_fields_come_first() {
        let tf = TypeFactory::default();
        let system = struct_of(&tf, &["A"]).fields().to_vec();
        let ty = derive_join_row_type(&tf, &struct_of(&tf, &["A"]), &struct_of(&tf, &["A"]), JoinType::Inner, &system);
        assert_eq!(ty.field_names(), vec!["A", "A0", "A1"]);
    }

    #[test]
    #[should_panic(expected = "RIGHT joins are not allowed")]
    fn test_right_join_is_rejected() {
        let (mut arena, scan) = arena_with_emp();
        let t = arena.rex_builder().make_bool_literal(true);
        arena.join(scan, scan, t, JoinType::Right, BTreeSet::new());
    }

    #[test]
    fn test_aggregate_row_type_and_explain() {
        let (mut arena, scan) = arena_with_emp();
        let project = {
            let rex = arena.rex_builder().clone();
            let row = arena.row_type(scan).clone();
            arena.project(
                scan,
                vec![rex.make_input_ref_for(&row, 7), rex.make_input_ref_for(&row, 5)],
                vec![Some("DEPTNO".into()), None],
            )
        };
        assert_eq!(arena.row_type(project).field_names(), vec!["DEPTNO", "$f1"]);
        let bigint = arena.type_factory().create_sql_type(SqlTypeName::Bigint);
        let count = AggregateCall::new(STD.count.clone(), true, vec![1], bigint, None);
        let agg = arena.aggregate(project, 1, vec![count]);
        assert_eq!(arena.row_type(agg).field_names(), vec!["DEPTNO", "$f1"]);
        assert_eq!(
            arena.digest(agg),
            "AggregateRel.NONE(child=rel#1,groupCount=1,agg#0=COUNT(DISTINCT $1))"
        );
        assert!(!arena.is_distinct(agg));
        let group_only = arena.aggregate(project, 2, vec![]);
        assert!(arena.is_distinct(group_only));
    }

    #[test]
    fn test_table_modification_types() {
        let (mut arena, scan) = arena_with_emp();
        let table = match arena.op(scan) {
            RelOp::TableAccess { table } => table.clone(),
            _ => unreachable!(),
        };
        let modify =
            arena.table_modification(scan, table, TableModificationOp::Update, vec!["SAL".into()]);
        assert_eq!(arena.row_type(modify).to_string(), "RecordType(BIGINT ROWCOUNT)");
        let expected = arena.expected_input_row_type(modify, 0);
        assert_eq!(expected.field_count(), 10);
        assert_eq!(expected.fields()[9].name, "SAL0");
    }

    #[test]
    fn test_uncollect_wraps_scalar_element() {
        let mut arena = RelArena::default();
        let tf = arena.type_factory().clone();
        let int = tf.create_sql_type(SqlTypeName::Integer);
        let multiset = tf.create_multiset_type(int);
        let row_type = tf.create_struct_type(vec![("M".into(), multiset)]);
        let values = arena.values(row_type, vec![]);
        let uncollect = arena.uncollect(values);
        assert_eq!(arena.row_type(uncollect).field_names(), vec!["EXPR$0"]);
    }

    #[test]
    fn test_replace_input_updates_digest() {
        let (mut arena, scan) = arena_with_emp();
        let other = arena.copy(scan, RelTraitSet::none(), vec![]);
        let distinct = arena.distinct(scan);
        assert_eq!(arena.digest(distinct), "DistinctRel.NONE(child=rel#0)");
        arena.replace_input(distinct, 0, other);
        assert_eq!(arena.digest(distinct), "DistinctRel.NONE(child=rel#1)");
    }

    #[test]
    #[should_panic(expected = "replace_input called on rel#0")]
    fn test_replace_input_on_leaf_is_fatal() {
        let (mut arena, scan) = arena_with_emp();
        arena.replace_input(scan, 0, scan);
    }

    #[test]
    fn test_on_register_substitutes_canonical_inputs() {
        let (mut arena, scan) = arena_with_emp();
        let twin = arena.copy(scan, RelTraitSet::none(), vec![]);
        let distinct = arena.distinct(twin);
        arena.on_register(distinct, |_, input| if input == twin { scan } else { input });
        assert_eq!(arena.inputs(distinct), &[scan]);
        assert_eq!(arena.digest(distinct), "DistinctRel.NONE(child=rel#0)");
    }

    #[test]
    fn test_explain_plan_indents_children() {
        let (mut arena, scan) = arena_with_emp();
        let distinct = arena.distinct(scan);
        let sorted = arena.sort(distinct, vec![RelFieldCollation::descending(5)]);
        assert_eq!(
            arena.explain_plan(sorted),
            "SortRel(sort0=[5 DESC])\n  DistinctRel\n    TableAccessRel(table=[[SALES, EMP]])\n"
        );
        assert_eq!(arena.digest(sorted), "SortRel.NONE.[5 DESC](child=rel#1,sort0=5 DESC)");
    }
}
