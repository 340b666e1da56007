//! Rewriting and inspection of row expressions.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{
    RexCall, RexCorrelVariable, RexDynamicParam, RexFieldAccess, RexInputRef, RexLiteral,
    RexLocalRef, RexNode,
};

/// A visitor that rebuilds an expression bottom-up.
///
/// The defaults return each leaf unchanged and rebuild a call or field access
/// only when one of its children changed, so an identity shuttle returns a
/// tree that shares every call with its input.
pub trait RexShuttle {
    fn visit_input_ref(&mut self, input: &RexInputRef) -> RexNode {
        RexNode::InputRef(input.clone())
    }

    fn visit_local_ref(&mut self, local: &RexLocalRef) -> RexNode {
        RexNode::LocalRef(local.clone())
    }

    fn visit_literal(&mut self, literal: &RexLiteral) -> RexNode {
        RexNode::Literal(literal.clone())
    }

    fn visit_correl_variable(&mut self, var: &RexCorrelVariable) -> RexNode {
        RexNode::CorrelVariable(var.clone())
    }

    fn visit_dynamic_param(&mut self, param: &RexDynamicParam) -> RexNode {
        RexNode::DynamicParam(param.clone())
    }

    fn visit_field_access(&mut self, access: &RexFieldAccess) -> RexNode {
        let expr = access.expr.accept(self);
        if expr == *access.expr {
            RexNode::FieldAccess(access.clone())
        } else {
            RexNode::FieldAccess(RexFieldAccess {
                expr: Box::new(expr),
                field: access.field.clone(),
            })
        }
    }

    fn visit_call(&mut self, call: &Arc<RexCall>) -> RexNode {
        walk_call(self, call)
    }
}

/// Visit the operands of `call` and rebuild it if any changed.
pub fn walk_call<S: RexShuttle + ?Sized>(shuttle: &mut S, call: &Arc<RexCall>) -> RexNode {
    let mut changed = false;
    let operands: Vec<RexNode> = call
        .operands
        .iter()
        .map(|operand| {
            let visited = operand.accept(shuttle);
            if visited != *operand {
                changed = true;
            }
            visited
        })
        .collect();
    if changed {
        RexNode::call(call.clone_with_operands(operands))
    } else {
        RexNode::Call(call.clone())
    }
}

impl RexNode {
    pub fn accept<S: RexShuttle + ?Sized>(&self, shuttle: &mut S) -> RexNode {
        match self {
            RexNode::Literal(l) => shuttle.visit_literal(l),
            RexNode::InputRef(r) => shuttle.visit_input_ref(r),
            RexNode::LocalRef(r) => shuttle.visit_local_ref(r),
            RexNode::CorrelVariable(v) => shuttle.visit_correl_variable(v),
            RexNode::FieldAccess(a) => shuttle.visit_field_access(a),
            RexNode::DynamicParam(p) => shuttle.visit_dynamic_param(p),
            RexNode::Call(c) => shuttle.visit_call(c),
        }
    }
}

/// Renumbers input references: `$i` becomes `$mapping[i]`.
pub struct RexPermuteInputsShuttle {
    mapping: Vec<usize>,
}

impl RexPermuteInputsShuttle {
    pub fn new(mapping: Vec<usize>) -> Self {
        Self { mapping }
    }
}

impl RexShuttle for RexPermuteInputsShuttle {
    fn visit_input_ref(&mut self, input: &RexInputRef) -> RexNode {
        match self.mapping.get(input.index) {
            Some(&target) => RexNode::input_ref(target, input.ty.clone()),
            None => panic!(
                "input ${} is outside the permutation of {} fields",
                input.index,
                self.mapping.len()
            ),
        }
    }
}

/// Adds `offset` to every input reference, as when an expression over the
/// right input of a join is moved above the join.
pub struct RexShiftInputsShuttle {
    offset: usize,
}

impl RexShiftInputsShuttle {
    pub fn new(offset: usize) -> Self {
        Self { offset }
    }
}

impl RexShuttle for RexShiftInputsShuttle {
    fn visit_input_ref(&mut self, input: &RexInputRef) -> RexNode {
        RexNode::input_ref(input.index + self.offset, input.ty.clone())
    }
}

/// Collects the ordinals of input fields referenced by expressions.
#[derive(Debug, Default)]
pub struct InputFinder {
    pub input_bits: BTreeSet<usize>,
}

impl InputFinder {
    pub fn bits(nodes: &[RexNode]) -> BTreeSet<usize> {
        let mut finder = InputFinder::default();
        for node in nodes {
            finder.visit(node);
        }
        finder.input_bits
    }

    pub fn visit(&mut self, node: &RexNode) {
        match node {
            RexNode::InputRef(r) => {
                self.input_bits.insert(r.index);
            }
            RexNode::FieldAccess(a) => self.visit(&a.expr),
            RexNode::Call(c) => c.operands.iter().for_each(|o| self.visit(o)),
            _ => {}
        }
    }
}
