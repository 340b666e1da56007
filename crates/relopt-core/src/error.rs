//! # Validation Errors
//!
//! Errors in this module are the user-facing tier: bad operand types, unknown
//! type names, tables the catalog does not know. Internal consistency failures
//! (a forward local reference, a row type that changes under substitution, an
//! operator kind with no scalar counterpart) are not represented here. They
//! indicate a defect in the optimizer and panic at the point of detection.
//!
//! Rule inapplicability is not an error at all: a rule that declines simply
//! returns from `on_match` without registering a transformation.

use std::fmt;

/// Source position attached to a validation error, when the caller has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParserPos {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for ParserPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RelOptError {
    #[error("Cannot apply '{operator}' to arguments of type {actual}. Supported form(s): {allowed}")]
    CannotApply {
        operator: String,
        actual: String,
        allowed: String,
    },
    #[error("Invalid number of arguments to function '{operator}'. Was expecting {expected} arguments")]
    WrongNumberOfArgs { operator: String, expected: String },
    #[error("Argument to function '{0}' must be a positive integer literal")]
    ArgumentMustBePositiveInteger(String),
    #[error("Argument to function '{0}' must be a literal")]
    ArgumentMustBeLiteral(String),
    #[error("Argument to function '{0}' must not be NULL")]
    ArgumentMustNotBeNull(String),
    #[error("Type '{0}' is not comparable to '{1}'")]
    TypeNotComparable(String, String),
    #[error("Parameters must be of the same type")]
    NeedSameTypeParameter,
    #[error("Illegal use of 'NULL'")]
    IllegalNull,
    #[error("Two explicit different collations ('{0}', '{1}') are illegal")]
    DifferentCollations(String, String),
    #[error("Unknown datatype name '{0}'")]
    UnknownDatatype(String),
    #[error("No operator named '{0}'")]
    UnknownOperator(String),
    #[error("Table '{0}' not found")]
    TableNotFound(String),
    #[error("Rule '{0}' not found")]
    RuleNotFound(String),
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("At {pos}: {source}")]
    Positioned {
        pos: ParserPos,
        #[source]
        source: Box<RelOptError>,
    },
}

impl RelOptError {
    /// Attach a source position to this error.
    pub fn at(self, pos: ParserPos) -> Self {
        match self {
            RelOptError::Positioned { source, .. } => RelOptError::Positioned { pos, source },
            other => RelOptError::Positioned {
                pos,
                source: Box::new(other),
            },
        }
    }

    /// The error with any position stripped.
    pub fn root(&self) -> &RelOptError {
        match self {
            RelOptError::Positioned { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the error is a validation error a user can act on.
    pub fn is_validation(&self) -> bool {
        !matches!(self.root(), RelOptError::Unsupported(_))
    }
}

pub type RelOptResult<T> = Result<T, RelOptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cannot_apply_message() {
        let err = RelOptError::CannotApply {
            operator: "+".into(),
            actual: "<BOOLEAN> + <DATE>".into(),
            allowed: "'<NUMERIC> + <NUMERIC>'\n'<INTERVAL> + <INTERVAL>'".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Cannot apply '+' to arguments of type <BOOLEAN> + <DATE>."));
        assert!(msg.contains("'<NUMERIC> + <NUMERIC>'\n'<INTERVAL> + <INTERVAL>'"));
    }

    #[test]
    fn test_position_wraps_once() {
        let err = RelOptError::UnknownDatatype("BLOB2".into())
            .at(ParserPos { line: 1, column: 8 })
            .at(ParserPos { line: 2, column: 3 });
        assert_eq!(err.to_string(), "At line 2, column 3: Unknown datatype name 'BLOB2'");
        assert_eq!(err.root(), &RelOptError::UnknownDatatype("BLOB2".into()));
    }
}
