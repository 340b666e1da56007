//! # Rule Operands
//!
//! Each rule declares an [`Operand`] tree describing the shape of the
//! subgraph it rewrites. The planner tests the tree against a node before
//! firing the rule, so `on_match` only sees shapes it asked for.
//!
//! ## Operand Language
//!
//! - `Operand::Rel(matcher, children)`: matches a node accepted by `matcher`
//!   whose inputs match `children` position by position. An empty child list
//!   leaves the inputs unconstrained.
//! - `Operand::Any`: matches any node and binds nothing.
//! - `Operand::Leaf`: matches a node without inputs.
//!
//! ## Bindings
//!
//! A successful match binds one node per `Rel` and `Leaf` operand, in
//! preorder. `rels[0]` of the resulting call is always the node being
//! matched; for `Calc(Calc(Any))` `rels[1]` is the lower calc.

use crate::rel::{RelArena, RelId, RelKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Rel(RelMatcher, Vec<Operand>),
    Any,
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelMatcher {
    Kind(RelKind),
    OneOf(Vec<RelKind>),
    AnyRel,
}

impl RelMatcher {
    pub fn accepts(&self, kind: RelKind) -> bool {
        match self {
            RelMatcher::Kind(k) => *k == kind,
            RelMatcher::OneOf(kinds) => kinds.contains(&kind),
            RelMatcher::AnyRel => true,
        }
    }
}

impl Operand {
    /// A node of `kind` over inputs matching `children`.
    pub fn rel(kind: RelKind, children: Vec<Operand>) -> Self {
        Operand::Rel(RelMatcher::Kind(kind), children)
    }

    /// A node of `kind` over one unconstrained input.
    pub fn single(kind: RelKind) -> Self {
        Operand::rel(kind, vec![Operand::Any])
    }

    pub fn project() -> Self {
        Operand::single(RelKind::Project)
    }

    pub fn filter() -> Self {
        Operand::single(RelKind::Filter)
    }

    pub fn aggregate() -> Self {
        Operand::single(RelKind::Aggregate)
    }

    pub fn distinct() -> Self {
        Operand::single(RelKind::Distinct)
    }

    pub fn calc() -> Self {
        Operand::single(RelKind::Calc)
    }

    pub fn join(left: Operand, right: Operand) -> Self {
        Operand::rel(RelKind::Join, vec![left, right])
    }

    /// Test the operand against `id`, appending bound nodes to `bindings`.
    ///
    /// On failure `bindings` may hold a partial match and should be
    /// discarded.
    pub fn matches(&self, arena: &RelArena, id: RelId, bindings: &mut Vec<RelId>) -> bool {
        match self {
            Operand::Any => true,
            Operand::Leaf => {
                if !arena.inputs(id).is_empty() {
                    return false;
                }
                bindings.push(id);
                true
            }
            Operand::Rel(matcher, children) => {
                if !matcher.accepts(arena.node(id).kind()) {
                    return false;
                }
                let inputs = arena.inputs(id);
                if !children.is_empty() && inputs.len() != children.len() {
                    return false;
                }
                bindings.push(id);
                children
                    .iter()
                    .zip(inputs.iter())
                    .all(|(child, input)| child.matches(arena, *input, bindings))
            }
        }
    }

    /// Match from `id`, returning the bound nodes.
    pub fn bind(&self, arena: &RelArena, id: RelId) -> Option<Vec<RelId>> {
        let mut bindings = Vec::new();
        self.matches(arena, id, &mut bindings).then_some(bindings)
    }
}

/// Renders the operand tree, e.g. `Calc(Calc(any))`.
impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Any => f.write_str("any"),
            Operand::Leaf => f.write_str("leaf"),
            Operand::Rel(matcher, children) => {
                match matcher {
                    RelMatcher::Kind(kind) => write!(f, "{:?}", kind)?,
                    RelMatcher::OneOf(kinds) => {
                        let names: Vec<String> = kinds.iter().map(|k| format!("{:?}", k)).collect();
                        write!(f, "{}", names.join("|"))?
                    }
                    RelMatcher::AnyRel => f.write_str("Rel")?,
                }
                if !children.is_empty() {
                    let rendered: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                    write!(f, "({})", rendered.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, InMemoryCatalog};
    use crate::program::RexProgram;
    use crate::rel::JoinType;
    use std::collections::BTreeSet;

    fn scan(arena: &mut RelArena) -> RelId {
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        arena.table_access(catalog.lookup_table(&["SALES", "DEPT"]).unwrap())
    }

    #[test]
    fn test_binds_in_preorder() {
        let mut arena = RelArena::default();
        let base = scan(&mut arena);
        let row = arena.row_type(base).clone();
        let program = RexProgram::create_identity(&row, arena.rex_builder());
        let lower = arena.calc(base, program.clone());
        let upper = arena.calc(lower, program);
        let operand = Operand::rel(RelKind::Calc, vec![Operand::calc()]);
        assert_eq!(operand.bind(&arena, upper), Some(vec![upper, lower]));
        assert_eq!(operand.bind(&arena, lower), None);
        assert_eq!(operand.to_string(), "Calc(Calc(any))");
    }

    #[test]
    fn test_leaf_and_child_count() {
        let mut arena = RelArena::default();
        let left = scan(&mut arena);
        let right = scan(&mut arena);
        let t = arena.rex_builder().make_bool_literal(true);
        let join = arena.join(left, right, t, JoinType::Inner, BTreeSet::new());
        let operand = Operand::join(Operand::Leaf, Operand::Any);
        assert_eq!(operand.bind(&arena, join), Some(vec![join, left]));
        let wrong_arity = Operand::rel(RelKind::Join, vec![Operand::Any]);
        assert_eq!(wrong_arity.bind(&arena, join), None);
        assert!(Operand::Rel(RelMatcher::AnyRel, vec![]).bind(&arena, join).is_some());
        assert!(Operand::Leaf.bind(&arena, join).is_none());
    }
}
