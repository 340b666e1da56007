//! Syntactic and scalar-expression kind enumerations.
//!
//! [`SqlKind`] classifies operators as the parser sees them. [`RexKind`] is
//! the reduced classification used for fast dispatch on row expressions,
//! including group kinds (`Comparison`, `Logical`, `Arithmetic`) that several
//! concrete kinds belong to.

/// Kind of a syntactic operator or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    Other,
    Select,
    Join,
    Identifier,
    Literal,
    OtherFunction,
    Explain,
    Insert,
    Delete,
    Update,
    DynamicParam,
    OrderBy,
    Union,
    Except,
    Intersect,
    As,
    Over,
    Window,
    Merge,
    TableSample,
    Times,
    Divide,
    Plus,
    Minus,
    In,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equals,
    NotEquals,
    Or,
    And,
    Dot,
    Overlaps,
    Like,
    Similar,
    Between,
    Case,
    Not,
    PlusPrefix,
    MinusPrefix,
    Exists,
    Values,
    ExplicitTable,
    ScalarQuery,
    ProcedureCall,
    NewSpecification,
    Descending,
    IsTrue,
    IsFalse,
    IsUnknown,
    IsNull,
    Preceding,
    Following,
    Row,
    ColumnList,
    Cast,
    Trim,
    JdbcFn,
    MultisetValueConstructor,
    MultisetQueryConstructor,
    Unnest,
    Lateral,
    CollectionTable,
    Cursor,
    LiteralChain,
    Escape,
    Reinterpret,
}

/// Kind of a row expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RexKind {
    Identifier,
    LocalRef,
    Correlation,
    FieldAccess,
    Literal,
    DynamicParam,
    Times,
    Divide,
    Plus,
    Minus,
    MinusPrefix,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equals,
    NotEquals,
    Or,
    And,
    Not,
    IsTrue,
    IsFalse,
    IsNull,
    Values,
    Row,
    Cast,
    Trim,
    Like,
    Similar,
    MultisetQueryConstructor,
    NewSpecification,
    Reinterpret,
    Other,
    // Group kinds.
    Comparison,
    Logical,
    Arithmetic,
}

impl RexKind {
    /// Whether `self` is `kind` or belongs to the group `kind`.
    pub fn is_a(&self, kind: RexKind) -> bool {
        if *self == kind {
            return true;
        }
        match kind {
            RexKind::Comparison => matches!(
                self,
                RexKind::LessThan
                    | RexKind::GreaterThan
                    | RexKind::LessThanOrEqual
                    | RexKind::GreaterThanOrEqual
                    | RexKind::Equals
                    | RexKind::NotEquals
            ),
            RexKind::Logical => matches!(self, RexKind::And | RexKind::Or | RexKind::Not),
            RexKind::Arithmetic => matches!(
                self,
                RexKind::Times
                    | RexKind::Divide
                    | RexKind::Plus
                    | RexKind::Minus
                    | RexKind::MinusPrefix
            ),
            _ => false,
        }
    }
}

/// Map a syntactic kind to its row-expression kind.
///
/// # Panics
///
/// Panics for kinds that can never appear inside a row expression
/// (query constructs such as `SELECT` or `UNION`).
pub fn sql_kind_to_rex_kind(kind: SqlKind) -> RexKind {
    match kind {
        SqlKind::Equals => RexKind::Equals,
        SqlKind::Identifier => RexKind::Identifier,
        SqlKind::Literal => RexKind::Literal,
        SqlKind::DynamicParam => RexKind::DynamicParam,
        SqlKind::Times => RexKind::Times,
        SqlKind::Divide => RexKind::Divide,
        SqlKind::Plus => RexKind::Plus,
        SqlKind::Minus => RexKind::Minus,
        SqlKind::LessThan => RexKind::LessThan,
        SqlKind::GreaterThan => RexKind::GreaterThan,
        SqlKind::LessThanOrEqual => RexKind::LessThanOrEqual,
        SqlKind::GreaterThanOrEqual => RexKind::GreaterThanOrEqual,
        SqlKind::NotEquals => RexKind::NotEquals,
        SqlKind::Or => RexKind::Or,
        SqlKind::And => RexKind::And,
        SqlKind::Not => RexKind::Not,
        SqlKind::IsTrue => RexKind::IsTrue,
        SqlKind::IsFalse => RexKind::IsFalse,
        SqlKind::IsNull => RexKind::IsNull,
        SqlKind::IsUnknown => RexKind::IsNull,
        SqlKind::PlusPrefix => RexKind::Plus,
        SqlKind::MinusPrefix => RexKind::MinusPrefix,
        SqlKind::Values => RexKind::Values,
        SqlKind::Row => RexKind::Row,
        SqlKind::Cast => RexKind::Cast,
        SqlKind::Trim => RexKind::Trim,
        SqlKind::OtherFunction => RexKind::Other,
        SqlKind::Case => RexKind::Other,
        SqlKind::Other => RexKind::Other,
        SqlKind::Like => RexKind::Like,
        SqlKind::Similar => RexKind::Similar,
        SqlKind::MultisetQueryConstructor => RexKind::MultisetQueryConstructor,
        SqlKind::NewSpecification => RexKind::NewSpecification,
        SqlKind::Reinterpret => RexKind::Reinterpret,
        SqlKind::ColumnList => RexKind::Row,
        other => panic!("unknown SQL kind {:?} in row expression", other),
    }
}
