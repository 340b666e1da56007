//! # Relational Traits
//!
//! A trait set describes physical properties of a relational expression's
//! output: the calling convention it is implemented in and the order its rows
//! arrive in. Every node carries one, and it is part of the node's digest
//! (`FilterRel.NONE(...)`), so two nodes that differ only in traits are
//! distinct alternatives.
//!
//! Logical nodes are created in [`CallingConvention::None`]. A rule that
//! replaces a node with one of its inputs converts the input to the replaced
//! node's traits, which is a no-op when the input already satisfies them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a relational expression is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CallingConvention {
    /// A logical expression that has not been implemented yet.
    None,
    /// Rows are produced by a pull-based iterator.
    Iterator,
    /// Rows are produced by generated code.
    Generated,
}

impl CallingConvention {
    pub fn name(&self) -> &'static str {
        match self {
            CallingConvention::None => "NONE",
            CallingConvention::Iterator => "ITERATOR",
            CallingConvention::Generated => "GENERATED",
        }
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering of one field in a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelFieldCollation {
    pub field_index: usize,
    pub direction: Direction,
}

impl RelFieldCollation {
    pub fn ascending(field_index: usize) -> Self {
        Self {
            field_index,
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field_index: usize) -> Self {
        Self {
            field_index,
            direction: Direction::Descending,
        }
    }
}

impl fmt::Display for RelFieldCollation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Ascending => write!(f, "{}", self.field_index),
            Direction::Descending => write!(f, "{} DESC", self.field_index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelTraitSet {
    pub convention: CallingConvention,
    /// Sort order of the output; empty when the order is unknown.
    pub collation: Vec<RelFieldCollation>,
}

impl Default for RelTraitSet {
    fn default() -> Self {
        Self::none()
    }
}

impl RelTraitSet {
    /// The traits of a freshly built logical expression.
    pub fn none() -> Self {
        Self::of(CallingConvention::None)
    }

    pub fn of(convention: CallingConvention) -> Self {
        Self {
            convention,
            collation: Vec::new(),
        }
    }

    pub fn with_collation(mut self, collation: Vec<RelFieldCollation>) -> Self {
        self.collation = collation;
        self
    }

    pub fn with_convention(mut self, convention: CallingConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Whether output with the `provided` traits can stand where `self` is
    /// required.
    ///
    /// The conventions must be equal. The required collation must be a prefix
    /// of the provided one: rows sorted on `(a, b, c)` are also sorted on
    /// `(a, b)`. An empty required collation is always satisfied.
    pub fn satisfied_by(&self, provided: &RelTraitSet) -> bool {
        self.convention == provided.convention
            && self.collation.len() <= provided.collation.len()
            && self
                .collation
                .iter()
                .zip(provided.collation.iter())
                .all(|(r, p)| r == p)
    }
}

/// Renders each trait prefixed with a dot, the form used in digests.
impl fmt::Display for RelTraitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.convention)?;
        if !self.collation.is_empty() {
            let keys: Vec<String> = self.collation.iter().map(|c| c.to_string()).collect();
            write!(f, ".[{}]", keys.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(RelTraitSet::none().to_string(), ".NONE");
        let sorted = RelTraitSet::of(CallingConvention::Iterator)
            .with_collation(vec![RelFieldCollation::ascending(0), RelFieldCollation::descending(2)]);
        assert_eq!(sorted.to_string(), ".ITERATOR.[0, 2 DESC]");
    }

    #[test]
    fn test_collation_prefix_is_satisfied() {
        let required = RelTraitSet::none().with_collation(vec![RelFieldCollation::ascending(0)]);
        let provided = RelTraitSet::none()
            .with_collation(vec![RelFieldCollation::ascending(0), RelFieldCollation::ascending(1)]);
        assert!(required.satisfied_by(&provided));
        assert!(!provided.satisfied_by(&required));
        assert!(RelTraitSet::none().satisfied_by(&provided));
    }

    #[test]
    fn test_convention_must_match() {
        let logical = RelTraitSet::none();
        let physical = RelTraitSet::of(CallingConvention::Iterator);
        assert!(!logical.satisfied_by(&physical));
        assert!(!physical.satisfied_by(&logical));
    }
}
