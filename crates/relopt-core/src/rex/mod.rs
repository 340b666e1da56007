//! # Row Expressions
//!
//! A [`RexNode`] is an immutable scalar expression evaluated against a row:
//! a literal, a reference to an input field (`$0`), a reference into a
//! program's common-expression list (`$t3`), a correlation variable, a field
//! access, a dynamic parameter, or a call of an operator on operands.
//!
//! ## Identity
//!
//! Equality and hashing are structural: operator, operands and (for calls)
//! the result type. Literals compare by value only, so `1:INTEGER` equals
//! `1:BIGINT`; callers that must distinguish them key on `(type, node)`, as
//! the program builder does. The textual digest (`+($0, 1):INTEGER NOT NULL`)
//! is computed lazily for display and explain output and is never required
//! for an equality check.
//!
//! ## Display
//!
//! - `$i` for input references, `$ti` for local references.
//! - Calls print `OP(operand, ...)`. Niladic function-id operators such as
//!   `CURRENT_USER` print without parentheses.
//! - A call's digest appends `:` and the full type string. `Display` omits the
//!   type except for `CAST` and `NEW`, whose target type is part of the call.

pub mod builder;
pub mod eval;
pub mod kind;
pub mod literal;
pub mod operator;
pub mod shuttle;

pub use builder::RexBuilder;
pub use kind::{sql_kind_to_rex_kind, RexKind, SqlKind};
pub use literal::{LiteralValue, NlsString, RexLiteral};
pub use operator::{SqlOperator, SqlSyntax, StdOperatorTable, STD};
pub use shuttle::{walk_call, InputFinder, RexPermuteInputsShuttle, RexShiftInputsShuttle, RexShuttle};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::types::{RelDataType, RelDataTypeField};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RexInputRef {
    pub index: usize,
    pub ty: RelDataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RexLocalRef {
    pub index: usize,
    pub ty: RelDataType,
}

impl RexLocalRef {
    pub fn new(index: usize, ty: RelDataType) -> Self {
        Self { index, ty }
    }
}

impl fmt::Display for RexLocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$t{}", self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RexCorrelVariable {
    pub name: String,
    pub ty: RelDataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RexFieldAccess {
    pub expr: Box<RexNode>,
    pub field: RelDataTypeField,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RexDynamicParam {
    pub index: usize,
    pub ty: RelDataType,
}

/// An operator applied to operands.
#[derive(Debug)]
pub struct RexCall {
    pub op: Arc<SqlOperator>,
    pub operands: Vec<RexNode>,
    pub ty: RelDataType,
    pub kind: RexKind,
    digest: OnceLock<String>,
}

impl RexCall {
    /// # Panics
    ///
    /// Panics if a binary operator is given anything other than two operands,
    /// or if the operator's kind has no row-expression counterpart.
    pub fn new(ty: RelDataType, op: Arc<SqlOperator>, operands: Vec<RexNode>) -> Self {
        if op.syntax == SqlSyntax::Binary {
            assert_eq!(
                operands.len(),
                2,
                "binary operator '{}' requires 2 operands",
                op.name
            );
        }
        let kind = sql_kind_to_rex_kind(op.kind);
        Self {
            op,
            operands,
            ty,
            kind,
            digest: OnceLock::new(),
        }
    }

    pub fn is_a(&self, kind: RexKind) -> bool {
        self.kind.is_a(kind)
    }

    fn compute_digest(&self, with_type: bool) -> String {
        let mut sb = String::from(self.op.name.as_str());
        if !(self.operands.is_empty() && self.op.syntax == SqlSyntax::FunctionId) {
            sb.push('(');
            for (i, operand) in self.operands.iter().enumerate() {
                if i > 0 {
                    sb.push_str(", ");
                }
                sb.push_str(&operand.to_string());
            }
            sb.push(')');
        }
        if with_type {
            sb.push(':');
            sb.push_str(self.ty.full_type_string());
        }
        sb
    }

    /// Canonical text including the full result type.
    pub fn digest(&self) -> &str {
        self.digest.get_or_init(|| self.compute_digest(true))
    }

    pub fn clone_with_operands(&self, operands: Vec<RexNode>) -> RexCall {
        RexCall::new(self.ty.clone(), self.op.clone(), operands)
    }
}

impl Clone for RexCall {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            operands: self.operands.clone(),
            ty: self.ty.clone(),
            kind: self.kind,
            digest: self.digest.clone(),
        }
    }
}

impl PartialEq for RexCall {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.ty == other.ty && self.operands == other.operands
    }
}

impl Eq for RexCall {}

impl Hash for RexCall {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.op.hash(state);
        self.ty.hash(state);
        self.operands.hash(state);
    }
}

impl fmt::Display for RexCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_type = self.is_a(RexKind::Cast) || self.is_a(RexKind::NewSpecification);
        if with_type {
            f.write_str(self.digest())
        } else {
            f.write_str(&self.compute_digest(false))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RexNode {
    Literal(RexLiteral),
    InputRef(RexInputRef),
    LocalRef(RexLocalRef),
    CorrelVariable(RexCorrelVariable),
    FieldAccess(RexFieldAccess),
    DynamicParam(RexDynamicParam),
    Call(Arc<RexCall>),
}

impl RexNode {
    pub fn input_ref(index: usize, ty: RelDataType) -> Self {
        RexNode::InputRef(RexInputRef { index, ty })
    }

    pub fn local_ref(index: usize, ty: RelDataType) -> Self {
        RexNode::LocalRef(RexLocalRef { index, ty })
    }

    pub fn call(call: RexCall) -> Self {
        RexNode::Call(Arc::new(call))
    }

    pub fn ty(&self) -> &RelDataType {
        match self {
            RexNode::Literal(lit) => lit.ty(),
            RexNode::InputRef(r) => &r.ty,
            RexNode::LocalRef(r) => &r.ty,
            RexNode::CorrelVariable(v) => &v.ty,
            RexNode::FieldAccess(a) => &a.field.ty,
            RexNode::DynamicParam(p) => &p.ty,
            RexNode::Call(c) => &c.ty,
        }
    }

    pub fn kind(&self) -> RexKind {
        match self {
            RexNode::Literal(_) => RexKind::Literal,
            RexNode::InputRef(_) => RexKind::Identifier,
            RexNode::LocalRef(_) => RexKind::LocalRef,
            RexNode::CorrelVariable(_) => RexKind::Correlation,
            RexNode::FieldAccess(_) => RexKind::FieldAccess,
            RexNode::DynamicParam(_) => RexKind::DynamicParam,
            RexNode::Call(c) => c.kind,
        }
    }

    pub fn is_a(&self, kind: RexKind) -> bool {
        self.kind().is_a(kind)
    }

    pub fn as_call(&self) -> Option<&RexCall> {
        match self {
            RexNode::Call(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&RexLiteral> {
        match self {
            RexNode::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_local_ref(&self) -> Option<&RexLocalRef> {
        match self {
            RexNode::LocalRef(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_always_true(&self) -> bool {
        self.as_literal().is_some_and(|l| l.is_always_true())
    }

    pub fn is_null_literal(&self) -> bool {
        self.as_literal().is_some_and(|l| l.is_null())
    }

    /// Canonical text: the display form, with full types on calls.
    pub fn digest(&self) -> String {
        match self {
            RexNode::Call(c) => c.digest().to_string(),
            other => other.to_string(),
        }
    }

    /// The literal value behind this expression, looking through `CAST` and unary minus.
    pub fn find_value(&self) -> Option<LiteralValue> {
        match self {
            RexNode::Literal(l) => Some(l.value().clone()),
            RexNode::Call(c) if c.is_a(RexKind::Cast) => c.operands.first()?.find_value(),
            RexNode::Call(c) if c.is_a(RexKind::MinusPrefix) => {
                match c.operands.first()?.find_value()? {
                    LiteralValue::Decimal(d) => Some(LiteralValue::Decimal(-d)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The operands of a tree of ANDs, flattened; any other expression is
    /// its own single conjunct.
    pub fn conjunctions(&self) -> Vec<&RexNode> {
        match self {
            RexNode::Call(c) if c.is_a(RexKind::And) => {
                c.operands.iter().flat_map(|o| o.conjunctions()).collect()
            }
            other => vec![other],
        }
    }
}

impl fmt::Display for RexNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RexNode::Literal(l) => l.fmt(f),
            RexNode::InputRef(r) => write!(f, "${}", r.index),
            RexNode::LocalRef(r) => r.fmt(f),
            RexNode::CorrelVariable(v) => f.write_str(&v.name),
            RexNode::FieldAccess(a) => write!(f, "{}.{}", a.expr, a.field.name),
            RexNode::DynamicParam(p) => write!(f, "?{}", p.index),
            RexNode::Call(c) => c.fmt(f),
        }
    }
}

impl From<RexLiteral> for RexNode {
    fn from(lit: RexLiteral) -> Self {
        RexNode::Literal(lit)
    }
}

impl From<RexLocalRef> for RexNode {
    fn from(r: RexLocalRef) -> Self {
        RexNode::LocalRef(r)
    }
}
