//! # JSON Plan Protocol
//!
//! Clients describe a logical plan as a tree of JSON objects, each keyed by
//! its operator:
//!
//! ```json
//! {"filter": {
//!     "input": {"scan": {"table": ["SALES", "EMP"]}},
//!     "condition": {"call": ">", "operands": [{"input": 5}, {"literal": 1000}]}
//! }}
//! ```
//!
//! Scalar expressions are one of `{"input": i}`, `{"literal": v, "type": T}`
//! (the type is optional) and `{"call": OP, "operands": [...]}`. Operators are
//! looked up by name in the standard operator table.
//!
//! A [`PlanBuilder`] validates the tree while it builds it: every reference,
//! type name and operator call is checked, so a malformed request is reported
//! as a [`RelOptError`] instead of reaching the planner.

use bigdecimal::BigDecimal;
use relopt_core::catalog::Catalog;
use relopt_core::error::{RelOptError, RelOptResult};
use relopt_core::rel::{derive_join_row_type, AggregateCall, JoinType, RelArena, RelId, SetOpKind};
use relopt_core::rex::{RexNode, STD};
use relopt_core::traits::RelFieldCollation;
use relopt_core::types::{RelDataType, SqlTypeName, MAX_NUMERIC_PRECISION};
use relopt_core::typing::CallBinding;
use relopt_rules::util::create_project;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSpec {
    Scan {
        table: Vec<String>,
    },
    Values {
        fields: Vec<FieldSpec>,
        #[serde(default)]
        rows: Vec<Vec<Value>>,
    },
    Filter {
        input: Box<PlanSpec>,
        condition: ExprSpec,
    },
    Project {
        input: Box<PlanSpec>,
        exprs: Vec<ExprSpec>,
        /// Output names; missing or null entries are derived.
        #[serde(default)]
        names: Vec<Option<String>>,
    },
    Aggregate {
        input: Box<PlanSpec>,
        group_count: usize,
        #[serde(default)]
        calls: Vec<AggCallSpec>,
    },
    Join {
        left: Box<PlanSpec>,
        right: Box<PlanSpec>,
        /// Defaults to `TRUE`.
        condition: Option<ExprSpec>,
        #[serde(default = "default_join_type")]
        join_type: JoinType,
    },
    Distinct {
        input: Box<PlanSpec>,
    },
    Sort {
        input: Box<PlanSpec>,
        keys: Vec<SortKeySpec>,
    },
    Union {
        inputs: Vec<PlanSpec>,
        #[serde(default)]
        all: bool,
    },
}

fn default_join_type() -> JoinType {
    JoinType::Inner
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ExprSpec {
    Input {
        input: usize,
    },
    Literal {
        literal: Value,
        #[serde(rename = "type")]
        ty: Option<String>,
    },
    Call {
        call: String,
        #[serde(default)]
        operands: Vec<ExprSpec>,
    },
}

#[derive(Debug, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Deserialize)]
pub struct AggCallSpec {
    pub function: String,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub args: Vec<usize>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SortKeySpec {
    pub field: usize,
    #[serde(default)]
    pub descending: bool,
}

// ---------------------------------------------------------------------------
// Plan construction
// ---------------------------------------------------------------------------

fn invalid(message: impl Into<String>) -> RelOptError {
    RelOptError::InvalidPlan(message.into())
}

pub struct PlanBuilder<'a> {
    arena: &'a mut RelArena,
    catalog: &'a dyn Catalog,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(arena: &'a mut RelArena, catalog: &'a dyn Catalog) -> Self {
        Self { arena, catalog }
    }

    pub fn build(&mut self, spec: &PlanSpec) -> RelOptResult<RelId> {
        match spec {
            PlanSpec::Scan { table } => {
                let name: Vec<&str> = table.iter().map(String::as_str).collect();
                let table = self.catalog.lookup_table(&name)?;
                Ok(self.arena.table_access(table))
            }
            PlanSpec::Values { fields, rows } => self.values(fields, rows),
            PlanSpec::Filter { input, condition } => {
                let input = self.build(input)?;
                let condition = self.expr(condition, &self.arena.row_type(input).clone())?;
                expect_boolean(&condition, "filter condition")?;
                Ok(self.arena.filter(input, condition))
            }
            PlanSpec::Project { input, exprs, names } => {
                let input = self.build(input)?;
                let row = self.arena.row_type(input).clone();
                let exprs = exprs
                    .iter()
                    .map(|e| self.expr(e, &row))
                    .collect::<RelOptResult<Vec<_>>>()?;
                if names.len() > exprs.len() {
                    return Err(invalid(format!("{} names for {} expressions", names.len(), exprs.len())));
                }
                let mut names = names.clone();
                names.resize(exprs.len(), None);
                Ok(create_project(self.arena, input, exprs, names))
            }
            PlanSpec::Aggregate {
                input,
                group_count,
                calls,
            } => {
                let input = self.build(input)?;
                let row = self.arena.row_type(input).clone();
                if *group_count > row.field_count() {
                    return Err(invalid(format!(
                        "group count {} exceeds {} input fields",
                        group_count,
                        row.field_count()
                    )));
                }
                let calls = calls
                    .iter()
                    .map(|c| self.agg_call(c, &row))
                    .collect::<RelOptResult<Vec<_>>>()?;
                Ok(self.arena.aggregate(input, *group_count, calls))
            }
            PlanSpec::Join {
                left,
                right,
                condition,
                join_type,
            } => {
                if *join_type == JoinType::Right {
                    return Err(invalid("RIGHT joins are not supported; swap the inputs and use LEFT"));
                }
                let left = self.build(left)?;
                let right = self.build(right)?;
                let row = derive_join_row_type(
                    self.arena.type_factory(),
                    self.arena.row_type(left),
                    self.arena.row_type(right),
                    *join_type,
                    &[],
                );
                let condition = match condition {
                    Some(c) => self.expr(c, &row)?,
                    None => self.arena.rex_builder().make_bool_literal(true),
                };
                expect_boolean(&condition, "join condition")?;
                Ok(self.arena.join(left, right, condition, *join_type, BTreeSet::new()))
            }
            PlanSpec::Distinct { input } => {
                let input = self.build(input)?;
                Ok(self.arena.distinct(input))
            }
            PlanSpec::Sort { input, keys } => {
                let input = self.build(input)?;
                let width = self.arena.row_type(input).field_count();
                let collations = keys
                    .iter()
                    .map(|k| {
                        if k.field >= width {
                            return Err(invalid(format!("sort key {} out of range 0..{}", k.field, width)));
                        }
                        Ok(if k.descending {
                            RelFieldCollation::descending(k.field)
                        } else {
                            RelFieldCollation::ascending(k.field)
                        })
                    })
                    .collect::<RelOptResult<Vec<_>>>()?;
                Ok(self.arena.sort(input, collations))
            }
            PlanSpec::Union { inputs, all } => {
                let inputs = inputs
                    .iter()
                    .map(|i| self.build(i))
                    .collect::<RelOptResult<Vec<_>>>()?;
                let first = inputs.first().ok_or_else(|| invalid("union needs at least one input"))?;
                let row = self.arena.row_type(*first).clone();
                for input in &inputs[1..] {
                    if !self.arena.row_type(*input).equal_sans_field_names(&row) {
                        return Err(invalid(format!(
                            "union input {} does not match {}",
                            self.arena.row_type(*input),
                            row
                        )));
                    }
                }
                Ok(self.arena.set_op(SetOpKind::Union, inputs, *all))
            }
        }
    }

    fn values(&mut self, fields: &[FieldSpec], rows: &[Vec<Value>]) -> RelOptResult<RelId> {
        let tf = self.arena.type_factory();
        let types = fields
            .iter()
            .map(|f| Ok(tf.create_type_with_nullability(&parse_type(self.arena, &f.ty)?, f.nullable)))
            .collect::<RelOptResult<Vec<_>>>()?;
        let row_type = tf.create_struct_type(fields.iter().map(|f| f.name.clone()).zip(types.clone()).collect());
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != fields.len() {
                return Err(invalid(format!("row of {} values for {} fields", row.len(), fields.len())));
            }
            let mut tuple = Vec::with_capacity(row.len());
            for (value, (field, ty)) in row.iter().zip(fields.iter().zip(&types)) {
                if value.is_null() && !field.nullable {
                    return Err(invalid(format!("NULL in NOT NULL field {}", field.name)));
                }
                match self.typed_literal(value, ty)? {
                    RexNode::Literal(literal) => tuple.push(literal),
                    other => return Err(invalid(format!("{} is not a literal", other))),
                }
            }
            tuples.push(tuple);
        }
        Ok(self.arena.values(row_type, tuples))
    }

    fn agg_call(&self, spec: &AggCallSpec, row: &RelDataType) -> RelOptResult<AggregateCall> {
        let op = STD.lookup(&spec.function, spec.args.len())?;
        if !op.is_aggregate {
            return Err(invalid(format!("{} is not an aggregate function", op.name)));
        }
        let types = spec
            .args
            .iter()
            .map(|&arg| {
                row.fields()
                    .get(arg)
                    .map(|f| f.ty.clone())
                    .ok_or_else(|| invalid(format!("aggregate argument ${} out of range", arg)))
            })
            .collect::<RelOptResult<Vec<_>>>()?;
        let ty = op.derive_type(&CallBinding::with_types(self.arena.type_factory(), &op, types))?;
        Ok(AggregateCall::new(op.clone(), spec.distinct, spec.args.clone(), ty, spec.name.clone()))
    }

    fn expr(&self, spec: &ExprSpec, row: &RelDataType) -> RelOptResult<RexNode> {
        let rex = self.arena.rex_builder();
        match spec {
            ExprSpec::Input { input } => {
                if *input >= row.field_count() {
                    return Err(invalid(format!("input ${} out of range 0..{}", input, row.field_count())));
                }
                Ok(rex.make_input_ref_for(row, *input))
            }
            ExprSpec::Literal { literal, ty: Some(ty) } => {
                let ty = parse_type(self.arena, ty)?;
                self.typed_literal(literal, &ty)
            }
            ExprSpec::Literal { literal, ty: None } => match literal {
                Value::Bool(b) => Ok(rex.make_bool_literal(*b)),
                Value::Number(n) => {
                    let value = BigDecimal::from_str(&n.to_string())
                        .map_err(|_| invalid(format!("cannot read {} as a number", n)))?;
                    Ok(if n.is_f64() {
                        rex.make_approx_literal(value)
                    } else {
                        rex.make_decimal_literal(value)
                    })
                }
                Value::String(s) => Ok(rex.make_char_literal(s)),
                Value::Null => Ok(rex.make_null_literal(SqlTypeName::Null)),
                other => Err(invalid(format!("{} is not a scalar literal", other))),
            },
            ExprSpec::Call { call, operands } => {
                let op = STD.lookup(call, operands.len())?;
                if op.is_aggregate {
                    return Err(invalid(format!("aggregate {} used as a scalar", op.name)));
                }
                let operands = operands
                    .iter()
                    .map(|o| self.expr(o, row))
                    .collect::<RelOptResult<Vec<_>>>()?;
                rex.validate_call(&op, operands)
            }
        }
    }

    fn typed_literal(&self, value: &Value, ty: &RelDataType) -> RelOptResult<RexNode> {
        let rex = self.arena.rex_builder();
        match value {
            Value::Null => Ok(rex.make_null_literal_of(ty)),
            Value::String(s) => rex.make_literal_from_string(s, ty),
            Value::Bool(_) | Value::Number(_) => rex.make_literal_from_string(&value.to_string(), ty),
            other => Err(invalid(format!("{} is not a scalar literal", other))),
        }
    }
}

fn expect_boolean(condition: &RexNode, what: &str) -> RelOptResult<()> {
    if condition.ty().sql_type_name() != SqlTypeName::Boolean {
        return Err(invalid(format!("{} {} is not boolean", what, condition)));
    }
    Ok(())
}

/// Parses `INTEGER`, `VARCHAR(20)` or `DECIMAL(10, 2)`.
fn parse_type(arena: &RelArena, text: &str) -> RelOptResult<RelDataType> {
    let (name, args) = match text.split_once('(') {
        Some((name, rest)) => {
            let args = rest
                .strip_suffix(')')
                .ok_or_else(|| RelOptError::UnknownDatatype(text.to_string()))?;
            let args = args
                .split(',')
                .map(|a| a.trim().parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| RelOptError::UnknownDatatype(text.to_string()))?;
            (name.trim(), args)
        }
        None => (text.trim(), Vec::new()),
    };
    let (precision, scale) = match args[..] {
        [] => (None, None),
        [p] => (Some(p), None),
        [p, s] if (1..=MAX_NUMERIC_PRECISION).contains(&p) && s <= p => (Some(p), Some(s)),
        _ => return Err(RelOptError::UnknownDatatype(text.to_string())),
    };
    arena.type_factory().create_type_by_name(name, precision, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::catalog::InMemoryCatalog;
    use relopt_core::rel::RelOp;

    fn build(json: &str) -> (RelArena, RelOptResult<RelId>) {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let spec: PlanSpec = serde_json::from_str(json).unwrap();
        let result = PlanBuilder::new(&mut arena, &catalog).build(&spec);
        (arena, result)
    }

    #[test]
    fn test_filter_over_scan() {
        let (arena, root) = build(
            r#"{"filter": {
                "input": {"scan": {"table": ["SALES", "EMP"]}},
                "condition": {"call": ">", "operands": [{"input": 5}, {"literal": 1000}]}
            }}"#,
        );
        let root = root.unwrap();
        assert_eq!(arena.digest(root), "FilterRel.NONE(child=rel#0,condition=>($5, 1000))");
    }

    #[test]
    fn test_project_names_default_to_fields() {
        let (arena, root) = build(
            r#"{"project": {
                "input": {"scan": {"table": ["SALES", "DEPT"]}},
                "exprs": [{"input": 1}, {"call": "+", "operands": [{"input": 0}, {"literal": 1}]}],
                "names": [null, "NEXT"]
            }}"#,
        );
        assert_eq!(arena.row_type(root.unwrap()).field_names(), vec!["NAME", "NEXT"]);
    }

    #[test]
    fn test_values_with_typed_literals() {
        let (arena, root) = build(
            r#"{"values": {
                "fields": [{"name": "X", "type": "INTEGER"}, {"name": "D", "type": "DECIMAL(5, 2)", "nullable": true}],
                "rows": [[1, "2.50"], [2, null]]
            }}"#,
        );
        let root = root.unwrap();
        let RelOp::Values { tuples, .. } = arena.op(root) else {
            panic!("expected values");
        };
        assert_eq!(tuples.len(), 2);
        assert!(tuples[1][1].is_null());
        assert!(arena.row_type(root).fields()[1].ty.is_nullable());
    }

    #[test]
    fn test_aggregate_call_types_are_derived() {
        let (arena, root) = build(
            r#"{"aggregate": {
                "input": {"project": {"input": {"scan": {"table": ["SALES", "EMP"]}}, "exprs": [{"input": 7}, {"input": 5}]}},
                "group_count": 1,
                "calls": [{"function": "COUNT", "distinct": true, "args": [1], "name": "C"}, {"function": "SUM", "args": [1]}]
            }}"#,
        );
        let row = arena.row_type(root.unwrap()).clone();
        assert_eq!(row.fields()[1].ty.sql_type_name(), SqlTypeName::Bigint);
        assert!(row.fields()[2].ty.is_nullable());
    }

    #[test]
    fn test_rejects_bad_requests() {
        let cases = [
            r#"{"scan": {"table": ["SALES", "NOPE"]}}"#,
            r#"{"filter": {"input": {"scan": {"table": ["SALES", "DEPT"]}}, "condition": {"input": 0}}}"#,
            r#"{"filter": {"input": {"scan": {"table": ["SALES", "DEPT"]}}, "condition": {"call": "=", "operands": [{"input": 9}, {"literal": 1}]}}}"#,
            r#"{"filter": {"input": {"scan": {"table": ["SALES", "DEPT"]}}, "condition": {"call": "=", "operands": [{"input": 1}, {"literal": true}]}}}"#,
            r#"{"join": {"left": {"scan": {"table": ["SALES", "EMP"]}}, "right": {"scan": {"table": ["SALES", "DEPT"]}}, "join_type": "right"}}"#,
            r#"{"values": {"fields": [{"name": "X", "type": "BLOB2"}], "rows": []}}"#,
            r#"{"sort": {"input": {"scan": {"table": ["SALES", "DEPT"]}}, "keys": [{"field": 2}]}}"#,
        ];
        for case in cases {
            let (_, result) = build(case);
            let err = result.unwrap_err();
            assert!(err.is_validation(), "{}: {}", case, err);
        }
    }
}
