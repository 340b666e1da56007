//! # Operand Checking and Type Inference
//!
//! Each [`SqlOperator`] carries three strategies:
//!
//! - an [`OperandTypeChecker`] that validates the operand types of a call and
//!   produces the user-facing "Cannot apply ..." diagnostic on failure,
//! - a [`ReturnTypeInference`] that computes the call's result type, and
//! - optionally an [`OperandTypeInference`] that assigns types to operands
//!   whose type is still unknown (a bare `NULL` or a dynamic parameter).
//!
//! Strategies are plain enums composed by value. Checkers combine with
//! `AND`, `OR` and `SEQUENCE`; return-type rules combine by chaining (first
//! rule that yields a type wins) and by cascading through type transforms.
//!
//! A [`CallBinding`] ties an operator to the operand types (and, when
//! available, the operand expressions themselves) for one call site.

pub mod checker;
pub mod inference;

pub use checker::{Composition, OperandCountRange, OperandTypeChecker};
pub use inference::{OperandTypeInference, ReturnTypeInference, TypeTransform};

use crate::error::RelOptError;
use crate::rex::{RexKind, RexLiteral, RexNode, SqlOperator, SqlSyntax};
use crate::types::{RelDataType, SqlTypeName, TypeFactory};

/// Operator, operand types, and optionally operand expressions for one call.
pub struct CallBinding<'a> {
    type_factory: &'a TypeFactory,
    operator: &'a SqlOperator,
    operand_types: Vec<RelDataType>,
    operands: Option<&'a [RexNode]>,
}

impl<'a> CallBinding<'a> {
    pub fn new(type_factory: &'a TypeFactory, operator: &'a SqlOperator, operands: &'a [RexNode]) -> Self {
        Self {
            type_factory,
            operator,
            operand_types: operands.iter().map(|o| o.ty().clone()).collect(),
            operands: Some(operands),
        }
    }

    /// A binding that only knows operand types, such as one built for an aggregate call.
    pub fn with_types(
        type_factory: &'a TypeFactory,
        operator: &'a SqlOperator,
        operand_types: Vec<RelDataType>,
    ) -> Self {
        Self {
            type_factory,
            operator,
            operand_types,
            operands: None,
        }
    }

    /// The same call site seen with substituted operand types.
    pub fn with_operand_types(&self, operand_types: Vec<RelDataType>) -> CallBinding<'a> {
        CallBinding {
            type_factory: self.type_factory,
            operator: self.operator,
            operand_types,
            operands: None,
        }
    }

    pub fn type_factory(&self) -> &'a TypeFactory {
        self.type_factory
    }

    pub fn operator(&self) -> &'a SqlOperator {
        self.operator
    }

    pub fn operand_count(&self) -> usize {
        self.operand_types.len()
    }

    pub fn operand_type(&self, ordinal: usize) -> &RelDataType {
        &self.operand_types[ordinal]
    }

    pub fn operand_types(&self) -> &[RelDataType] {
        &self.operand_types
    }

    pub fn operand(&self, ordinal: usize) -> Option<&'a RexNode> {
        self.operands.and_then(|ops| ops.get(ordinal))
    }

    pub fn operand_literal(&self, ordinal: usize) -> Option<&'a RexLiteral> {
        self.operand(ordinal).and_then(|o| o.as_literal())
    }

    /// Whether the operand is a null literal, optionally looking through `CAST`.
    pub fn is_operand_null(&self, ordinal: usize, allow_cast: bool) -> bool {
        let Some(node) = self.operand(ordinal) else {
            return self.operand_types[ordinal].sql_type_name() == SqlTypeName::Null;
        };
        is_null_literal(node, allow_cast)
    }

    /// Whether the operand is a `NULL` whose type is still unknown.
    ///
    /// A typed null literal is an ordinary value of its type; only an untyped
    /// one is rejected by family and same-type checks.
    pub fn is_operand_untyped_null(&self, ordinal: usize) -> bool {
        self.operand_types[ordinal].sql_type_name() == SqlTypeName::Null
    }

    /// Whether the operand is a literal, possibly wrapped in `CAST` or unary minus.
    pub fn is_operand_literal(&self, ordinal: usize) -> bool {
        self.operand(ordinal).is_some_and(|o| o.find_value().is_some())
    }

    /// The signature of this call as written, e.g. `'<INTEGER> + <BOOLEAN>'`.
    pub fn call_signature(&self) -> String {
        let types: Vec<String> = self.operand_types.iter().map(|t| t.to_string()).collect();
        aliased_signature(self.operator, &self.operator.name, &types)
    }

    pub fn new_validation_signature_error(&self) -> RelOptError {
        RelOptError::CannotApply {
            operator: self.operator.name.clone(),
            actual: self.call_signature(),
            allowed: self.operator.allowed_signatures(),
        }
    }
}

fn is_null_literal(node: &RexNode, allow_cast: bool) -> bool {
    match node {
        RexNode::Literal(l) => l.is_null(),
        RexNode::Call(c) if allow_cast && c.is_a(RexKind::Cast) => {
            c.operands.first().is_some_and(|o| is_null_literal(o, false))
        }
        _ => false,
    }
}

/// Format a signature for `op` applied to the given operand type names.
///
/// Binary operators render as `'<A> op <B>'`, prefix as `'op<A>'`, postfix as
/// `'<A> op'`, and everything else in function form `'op(<A>, <B>)'`.
pub fn aliased_signature(op: &SqlOperator, op_name: &str, type_names: &[String]) -> String {
    let values: Vec<String> = type_names
        .iter()
        .map(|t| format!("<{}>", t.to_uppercase()))
        .collect();
    let body = match (op.syntax, values.len()) {
        (SqlSyntax::Binary, 2) => format!("{} {} {}", values[0], op_name, values[1]),
        (SqlSyntax::Prefix, 1) => format!("{}{}", op_name, values[0]),
        (SqlSyntax::Postfix, 1) => format!("{} {}", values[0], op_name),
        _ => format!("{}({})", op_name, values.join(", ")),
    };
    format!("'{}'", body)
}
