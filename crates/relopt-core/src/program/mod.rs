//! # Row-Expression Programs
//!
//! A [`RexProgram`] is the scalar payload of a calculator node: a list of
//! common expressions over an input row, a list of projections and an optional
//! condition, both pointing into the expression list.
//!
//! ## Canonical form
//!
//! A normalized program satisfies:
//!
//! - The first `n` expressions are the `n` input fields in order.
//! - Every later expression is a call or literal whose operands are local
//!   references to earlier expressions.
//! - No expression appears twice and none is unused.
//!
//! Programs are immutable. Use [`RexProgramBuilder`] to make or change one.

pub mod builder;

pub use builder::RexProgramBuilder;

use std::fmt;

use crate::error::RelOptResult;
use crate::rex::eval::{eval_in, Datum};
use crate::rex::{RexBuilder, RexLocalRef, RexNode, RexShuttle};
use crate::types::{RelDataType, SqlTypeName};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RexProgram {
    input_row_type: RelDataType,
    exprs: Vec<RexNode>,
    projects: Vec<RexLocalRef>,
    condition: Option<RexLocalRef>,
    output_row_type: RelDataType,
}

impl RexProgram {
    pub fn new(
        input_row_type: RelDataType,
        exprs: Vec<RexNode>,
        projects: Vec<RexLocalRef>,
        condition: Option<RexLocalRef>,
        output_row_type: RelDataType,
    ) -> Self {
        Self {
            input_row_type,
            exprs,
            projects,
            condition,
            output_row_type,
        }
    }

    /// A normalized program projecting `project_exprs` (in terms of the
    /// inputs) under the field names of `output_row_type`.
    pub fn create(
        input_row_type: &RelDataType,
        project_exprs: &[RexNode],
        condition: Option<&RexNode>,
        output_row_type: &RelDataType,
        rex: &RexBuilder,
    ) -> RexProgram {
        let mut builder = RexProgramBuilder::new(input_row_type.clone(), rex.clone());
        for (expr, field) in project_exprs.iter().zip(output_row_type.fields()) {
            builder.add_project(expr.clone(), Some(field.name.as_str()));
        }
        if let Some(condition) = condition {
            builder.add_condition(condition.clone());
        }
        builder.get_program(true)
    }

    /// A program that returns its input unchanged.
    pub fn create_identity(row_type: &RelDataType, rex: &RexBuilder) -> RexProgram {
        let mut builder = RexProgramBuilder::new(row_type.clone(), rex.clone());
        builder.add_identity();
        builder.get_program(false)
    }

    pub fn input_row_type(&self) -> &RelDataType {
        &self.input_row_type
    }

    pub fn output_row_type(&self) -> &RelDataType {
        &self.output_row_type
    }

    pub fn expr_list(&self) -> &[RexNode] {
        &self.exprs
    }

    pub fn project_list(&self) -> &[RexLocalRef] {
        &self.projects
    }

    pub fn condition(&self) -> Option<&RexLocalRef> {
        self.condition.as_ref()
    }

    /// Rewrite a local reference as a tree over the inputs.
    pub fn expand_local_ref(&self, local: &RexLocalRef) -> RexNode {
        self.exprs[local.index].accept(&mut ExpandShuttle { exprs: &self.exprs })
    }

    /// The projections as trees over the inputs.
    pub fn expanded_projects(&self) -> Vec<RexNode> {
        self.projects.iter().map(|p| self.expand_local_ref(p)).collect()
    }

    pub fn expanded_condition(&self) -> Option<RexNode> {
        self.condition.as_ref().map(|c| self.expand_local_ref(c))
    }

    /// Whether the program's references are in range and agree on types.
    ///
    /// # Panics
    ///
    /// With `fail`, panics instead of returning `false`.
    pub fn is_valid(&self, fail: bool) -> bool {
        match self.check() {
            Ok(()) => true,
            Err(message) if fail => panic!("invalid program {}: {}", self, message),
            Err(_) => false,
        }
    }

    fn check(&self) -> Result<(), String> {
        let fields = self.input_row_type.fields();
        if self.exprs.len() < fields.len() {
            return Err("fewer expressions than input fields".to_string());
        }
        for (i, field) in fields.iter().enumerate() {
            match &self.exprs[i] {
                RexNode::InputRef(r) if r.index == i && r.ty == field.ty => {}
                other => return Err(format!("expression {} should be input ${} but is {}", i, i, other)),
            }
        }
        for (i, expr) in self.exprs.iter().enumerate() {
            self.check_refs(expr, i)?;
        }
        if self.projects.len() != self.output_row_type.field_count() {
            return Err(format!(
                "{} projections for {} output fields",
                self.projects.len(),
                self.output_row_type.field_count()
            ));
        }
        for (project, field) in self.projects.iter().zip(self.output_row_type.fields()) {
            self.check_local(project, self.exprs.len())?;
            if project.ty != field.ty {
                return Err(format!("projection {} does not match output field {}", project, field.name));
            }
        }
        if let Some(condition) = &self.condition {
            self.check_local(condition, self.exprs.len())?;
            if condition.ty.sql_type_name() != SqlTypeName::Boolean {
                return Err(format!("condition {} is not boolean", condition));
            }
        }
        Ok(())
    }

    fn check_local(&self, local: &RexLocalRef, limit: usize) -> Result<(), String> {
        if local.index >= limit {
            return Err(format!("{} refers to a later or missing expression", local));
        }
        if local.ty != *self.exprs[local.index].ty() {
            return Err(format!("{} has inconsistent type", local));
        }
        Ok(())
    }

    fn check_refs(&self, node: &RexNode, ordinal: usize) -> Result<(), String> {
        match node {
            RexNode::InputRef(r) => match self.input_row_type.fields().get(r.index) {
                Some(field) if field.ty == r.ty => Ok(()),
                Some(_) => Err(format!("input ${} has inconsistent type", r.index)),
                None => Err(format!("input ${} is out of bounds", r.index)),
            },
            RexNode::LocalRef(local) => self.check_local(local, ordinal),
            RexNode::Call(call) => call.operands.iter().try_for_each(|o| self.check_refs(o, ordinal)),
            RexNode::FieldAccess(access) => self.check_refs(&access.expr, ordinal),
            _ => Ok(()),
        }
    }

    /// Whether normalizing would leave the program unchanged.
    pub fn is_normalized(&self, rex: &RexBuilder) -> bool {
        RexProgramBuilder::normalize(rex.clone(), self) == *self
    }

    pub fn normalize(&self, rex: &RexBuilder) -> RexProgram {
        RexProgramBuilder::normalize(rex.clone(), self)
    }

    /// Whether the program projects exactly its inputs, in order, with no condition.
    pub fn is_trivial(&self) -> bool {
        self.condition.is_none()
            && self.projects.len() == self.input_row_type.field_count()
            && self.projects.iter().enumerate().all(|(i, p)| p.index == i)
    }

    pub fn contains_aggs(&self) -> bool {
        self.exprs
            .iter()
            .any(|e| e.as_call().is_some_and(|c| c.op.is_aggregate))
    }

    /// The input field that output field `output` copies, if it copies one.
    pub fn get_source_field(&self, output: usize) -> Option<usize> {
        let mut node = &self.exprs[self.projects.get(output)?.index];
        loop {
            match node {
                RexNode::InputRef(r) => return Some(r.index),
                RexNode::LocalRef(local) => node = &self.exprs[local.index],
                _ => return None,
            }
        }
    }

    /// Apply the program to one row. `None` means the condition rejected it.
    pub fn evaluate(&self, row: &[Datum]) -> RelOptResult<Option<Vec<Datum>>> {
        let mut locals = Vec::with_capacity(self.exprs.len());
        for expr in &self.exprs {
            let value = eval_in(expr, row, &locals)?;
            locals.push(value);
        }
        if let Some(condition) = &self.condition {
            if locals[condition.index] != Datum::Boolean(true) {
                return Ok(None);
            }
        }
        Ok(Some(self.projects.iter().map(|p| locals[p.index].clone()).collect()))
    }
}

impl fmt::Display for RexProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, expr) in self.exprs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "expr#{}=[{}]", i, expr)?;
        }
        for (project, field) in self.projects.iter().zip(self.output_row_type.fields()) {
            write!(f, ", {}=[{}]", field.name, project)?;
        }
        if let Some(condition) = &self.condition {
            write!(f, ", $condition=[{}]", condition)?;
        }
        f.write_str(")")
    }
}

struct ExpandShuttle<'a> {
    exprs: &'a [RexNode],
}

impl RexShuttle for ExpandShuttle<'_> {
    fn visit_local_ref(&mut self, local: &RexLocalRef) -> RexNode {
        self.exprs[local.index].accept(self)
    }
}
