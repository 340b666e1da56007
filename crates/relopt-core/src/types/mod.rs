//! # Row and Scalar Types
//!
//! Every scalar expression and every relational expression carries a
//! [`RelDataType`]. Scalar types are identified by a [`SqlTypeName`] plus
//! optional precision, scale, character set and collation; row types are
//! structs of named fields.
//!
//! ## Identity
//!
//! A type is immutable once built and compares by its *full type string*
//! (`VARCHAR(10) CHARACTER SET "ISO-8859-1" COLLATE "..." NOT NULL`), which is
//! computed once at construction. Two types built independently with the same
//! attributes are therefore equal and hash identically, so callers never need a
//! canonizing pool.
//!
//! ## Families
//!
//! [`SqlTypeFamily`] is the closed set of type families used at the boundary
//! between operand checkers and return-type inference. Some families are
//! "natural" (each type name belongs to exactly one) while others are unions
//! used only for checking (`String`, `ExactNumeric`, `Datetime`, `Any`, ...).

mod factory;

pub use factory::TypeFactory;

use std::fmt;
use std::sync::Arc;

/// Largest precision an exact numeric may declare.
pub const MAX_NUMERIC_PRECISION: u32 = 19;
/// Largest scale an exact numeric may declare.
pub const MAX_NUMERIC_SCALE: u32 = 19;
/// Precision reported for a variable-width type declared without one.
pub const DEFAULT_VARYING_PRECISION: u32 = 65536;

pub const DEFAULT_CHARSET: &str = "ISO-8859-1";
pub const DEFAULT_COLLATION: &str = "ISO-8859-1$en_US$primary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SqlTypeName {
    Boolean,
    Tinyint,
    Smallint,
    Integer,
    Bigint,
    Decimal,
    Float,
    Real,
    Double,
    Date,
    Time,
    Timestamp,
    IntervalYearMonth,
    IntervalDayTime,
    Char,
    Varchar,
    Binary,
    Varbinary,
    Null,
    Any,
    Symbol,
    Multiset,
    Row,
    Cursor,
    ColumnList,
}

impl SqlTypeName {
    pub const ALL: [SqlTypeName; 25] = [
        SqlTypeName::Boolean,
        SqlTypeName::Tinyint,
        SqlTypeName::Smallint,
        SqlTypeName::Integer,
        SqlTypeName::Bigint,
        SqlTypeName::Decimal,
        SqlTypeName::Float,
        SqlTypeName::Real,
        SqlTypeName::Double,
        SqlTypeName::Date,
        SqlTypeName::Time,
        SqlTypeName::Timestamp,
        SqlTypeName::IntervalYearMonth,
        SqlTypeName::IntervalDayTime,
        SqlTypeName::Char,
        SqlTypeName::Varchar,
        SqlTypeName::Binary,
        SqlTypeName::Varbinary,
        SqlTypeName::Null,
        SqlTypeName::Any,
        SqlTypeName::Symbol,
        SqlTypeName::Multiset,
        SqlTypeName::Row,
        SqlTypeName::Cursor,
        SqlTypeName::ColumnList,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SqlTypeName::Boolean => "BOOLEAN",
            SqlTypeName::Tinyint => "TINYINT",
            SqlTypeName::Smallint => "SMALLINT",
            SqlTypeName::Integer => "INTEGER",
            SqlTypeName::Bigint => "BIGINT",
            SqlTypeName::Decimal => "DECIMAL",
            SqlTypeName::Float => "FLOAT",
            SqlTypeName::Real => "REAL",
            SqlTypeName::Double => "DOUBLE",
            SqlTypeName::Date => "DATE",
            SqlTypeName::Time => "TIME",
            SqlTypeName::Timestamp => "TIMESTAMP",
            SqlTypeName::IntervalYearMonth => "INTERVAL_YEAR_MONTH",
            SqlTypeName::IntervalDayTime => "INTERVAL_DAY_TIME",
            SqlTypeName::Char => "CHAR",
            SqlTypeName::Varchar => "VARCHAR",
            SqlTypeName::Binary => "BINARY",
            SqlTypeName::Varbinary => "VARBINARY",
            SqlTypeName::Null => "NULL",
            SqlTypeName::Any => "ANY",
            SqlTypeName::Symbol => "SYMBOL",
            SqlTypeName::Multiset => "MULTISET",
            SqlTypeName::Row => "ROW",
            SqlTypeName::Cursor => "CURSOR",
            SqlTypeName::ColumnList => "COLUMN_LIST",
        }
    }

    /// Look up a type name, case-insensitively. `INT` and `CHARACTER` aliases are accepted.
    pub fn lookup(name: &str) -> Option<SqlTypeName> {
        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "INT" => return Some(SqlTypeName::Integer),
            "CHARACTER" => return Some(SqlTypeName::Char),
            "NUMERIC" => return Some(SqlTypeName::Decimal),
            _ => {}
        }
        Self::ALL.iter().copied().find(|t| t.name() == upper)
    }

    /// Whether the type may declare a precision without a scale.
    pub fn allows_prec_no_scale(&self) -> bool {
        matches!(
            self,
            SqlTypeName::Decimal
                | SqlTypeName::Char
                | SqlTypeName::Varchar
                | SqlTypeName::Binary
                | SqlTypeName::Varbinary
                | SqlTypeName::Time
                | SqlTypeName::Timestamp
        )
    }

    /// Whether the type may declare both precision and scale.
    pub fn allows_scale(&self) -> bool {
        matches!(self, SqlTypeName::Decimal)
    }

    pub fn allows_prec(&self) -> bool {
        self.allows_prec_no_scale() || self.allows_scale()
    }

    /// Precision assumed when none is declared, if the type has one.
    pub fn default_precision(&self) -> Option<u32> {
        match self {
            SqlTypeName::Boolean => Some(1),
            SqlTypeName::Tinyint => Some(3),
            SqlTypeName::Smallint => Some(5),
            SqlTypeName::Integer => Some(10),
            SqlTypeName::Bigint => Some(19),
            SqlTypeName::Decimal => Some(MAX_NUMERIC_PRECISION),
            SqlTypeName::Real => Some(7),
            SqlTypeName::Float | SqlTypeName::Double => Some(15),
            SqlTypeName::Date | SqlTypeName::Time | SqlTypeName::Timestamp => Some(0),
            SqlTypeName::Char | SqlTypeName::Binary => Some(1),
            SqlTypeName::Varchar | SqlTypeName::Varbinary => Some(DEFAULT_VARYING_PRECISION),
            _ => None,
        }
    }

    /// The natural family of this type name. `NULL`, `ANY` and `SYMBOL` have none.
    pub fn family(&self) -> Option<SqlTypeFamily> {
        use SqlTypeName::*;
        Some(match self {
            Char | Varchar => SqlTypeFamily::Character,
            Binary | Varbinary => SqlTypeFamily::Binary,
            Tinyint | Smallint | Integer | Bigint | Decimal | Float | Real | Double => {
                SqlTypeFamily::Numeric
            }
            Date => SqlTypeFamily::Date,
            Time => SqlTypeFamily::Time,
            Timestamp => SqlTypeFamily::Timestamp,
            Boolean => SqlTypeFamily::Boolean,
            IntervalYearMonth => SqlTypeFamily::IntervalYearMonth,
            IntervalDayTime => SqlTypeFamily::IntervalDayTime,
            Multiset => SqlTypeFamily::Multiset,
            Cursor => SqlTypeFamily::Cursor,
            ColumnList => SqlTypeFamily::ColumnList,
            Row => SqlTypeFamily::Row,
            Null | Any | Symbol => return None,
        })
    }

    pub fn is_exact_numeric(&self) -> bool {
        SqlTypeFamily::ExactNumeric.contains(*self)
    }

    pub fn is_approximate_numeric(&self) -> bool {
        SqlTypeFamily::ApproximateNumeric.contains(*self)
    }

    pub fn is_char(&self) -> bool {
        matches!(self, SqlTypeName::Char | SqlTypeName::Varchar)
    }

    pub fn is_datetime(&self) -> bool {
        SqlTypeFamily::Datetime.contains(*self)
    }

    pub fn is_interval(&self) -> bool {
        SqlTypeFamily::DatetimeInterval.contains(*self)
    }

    /// Whether values of this type are varying-width with a declared bound.
    pub fn is_bounded_varying(&self) -> bool {
        matches!(self, SqlTypeName::Varchar | SqlTypeName::Varbinary)
    }
}

impl fmt::Display for SqlTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type families, as seen by operand checkers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlTypeFamily {
    Character,
    Binary,
    Numeric,
    Date,
    Time,
    Timestamp,
    Boolean,
    IntervalYearMonth,
    IntervalDayTime,
    String,
    ApproximateNumeric,
    ExactNumeric,
    Integer,
    Datetime,
    DatetimeInterval,
    Multiset,
    Any,
    Cursor,
    ColumnList,
    Row,
}

impl SqlTypeFamily {
    pub fn contains(&self, name: SqlTypeName) -> bool {
        use SqlTypeName as T;
        match self {
            SqlTypeFamily::Character => matches!(name, T::Char | T::Varchar),
            SqlTypeFamily::Binary => matches!(name, T::Binary | T::Varbinary),
            SqlTypeFamily::Numeric => {
                SqlTypeFamily::ExactNumeric.contains(name)
                    || SqlTypeFamily::ApproximateNumeric.contains(name)
            }
            SqlTypeFamily::Date => name == T::Date,
            SqlTypeFamily::Time => name == T::Time,
            SqlTypeFamily::Timestamp => name == T::Timestamp,
            SqlTypeFamily::Boolean => name == T::Boolean,
            SqlTypeFamily::IntervalYearMonth => name == T::IntervalYearMonth,
            SqlTypeFamily::IntervalDayTime => name == T::IntervalDayTime,
            SqlTypeFamily::String => {
                SqlTypeFamily::Character.contains(name) || SqlTypeFamily::Binary.contains(name)
            }
            SqlTypeFamily::ApproximateNumeric => matches!(name, T::Float | T::Real | T::Double),
            SqlTypeFamily::ExactNumeric => {
                SqlTypeFamily::Integer.contains(name) || name == T::Decimal
            }
            SqlTypeFamily::Integer => {
                matches!(name, T::Tinyint | T::Smallint | T::Integer | T::Bigint)
            }
            SqlTypeFamily::Datetime => matches!(name, T::Date | T::Time | T::Timestamp),
            SqlTypeFamily::DatetimeInterval => {
                matches!(name, T::IntervalYearMonth | T::IntervalDayTime)
            }
            SqlTypeFamily::Multiset => name == T::Multiset,
            SqlTypeFamily::Any => true,
            SqlTypeFamily::Cursor => name == T::Cursor,
            SqlTypeFamily::ColumnList => name == T::ColumnList,
            SqlTypeFamily::Row => name == T::Row,
        }
    }

    /// The upper-case label used inside operator signatures (`<NUMERIC>`).
    pub fn label(&self) -> &'static str {
        match self {
            SqlTypeFamily::Character => "CHARACTER",
            SqlTypeFamily::Binary => "BINARY",
            SqlTypeFamily::Numeric => "NUMERIC",
            SqlTypeFamily::Date => "DATE",
            SqlTypeFamily::Time => "TIME",
            SqlTypeFamily::Timestamp => "TIMESTAMP",
            SqlTypeFamily::Boolean => "BOOLEAN",
            SqlTypeFamily::IntervalYearMonth => "INTERVAL_YEAR_MONTH",
            SqlTypeFamily::IntervalDayTime => "INTERVAL_DAY_TIME",
            SqlTypeFamily::String => "STRING",
            SqlTypeFamily::ApproximateNumeric => "APPROXIMATE_NUMERIC",
            SqlTypeFamily::ExactNumeric => "EXACT_NUMERIC",
            SqlTypeFamily::Integer => "INTEGER",
            SqlTypeFamily::Datetime => "DATETIME",
            SqlTypeFamily::DatetimeInterval => "DATETIME_INTERVAL",
            SqlTypeFamily::Multiset => "MULTISET",
            SqlTypeFamily::Any => "ANY",
            SqlTypeFamily::Cursor => "CURSOR",
            SqlTypeFamily::ColumnList => "COLUMN_LIST",
            SqlTypeFamily::Row => "ROW",
        }
    }
}

/// Which comparisons a type supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparability {
    None,
    /// Equality only.
    Unordered,
    All,
}

/// How strongly a collation is bound to a character value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coercibility {
    /// Declared with an explicit `COLLATE` clause.
    Explicit,
    /// Taken from a column declaration.
    Implicit,
    /// Taken from a literal or the session default.
    Coercible,
    /// Mixed explicit collations cancelled each other out.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlCollation {
    pub name: String,
    pub coercibility: Coercibility,
}

impl SqlCollation {
    pub fn new(name: impl Into<String>, coercibility: Coercibility) -> Self {
        Self {
            name: name.into(),
            coercibility,
        }
    }

    pub fn coercible() -> Self {
        Self::new(DEFAULT_COLLATION, Coercibility::Coercible)
    }

    pub fn implicit() -> Self {
        Self::new(DEFAULT_COLLATION, Coercibility::Implicit)
    }

    fn no_collation() -> Self {
        Self::new(DEFAULT_COLLATION, Coercibility::None)
    }

    /// Collation of the result of a dyadic operator such as `||`.
    ///
    /// Returns `None` when both operands carry explicit, different collations;
    /// callers turn that into a validation error.
    pub fn dyadic(left: &SqlCollation, right: &SqlCollation) -> Option<SqlCollation> {
        use Coercibility::*;
        Some(match (left.coercibility, right.coercibility) {
            (Coercible, Coercible) => SqlCollation::new(right.name.clone(), Coercible),
            (Coercible, _) => right.clone(),
            (Implicit, Coercible) => left.clone(),
            (Implicit, Implicit) => {
                if left.name == right.name {
                    right.clone()
                } else {
                    SqlCollation::no_collation()
                }
            }
            (Implicit, _) => right.clone(),
            (Coercibility::None, Explicit) => right.clone(),
            (Coercibility::None, _) => SqlCollation::no_collation(),
            (Explicit, Explicit) => {
                if left.name == right.name {
                    right.clone()
                } else {
                    return Option::None;
                }
            }
            (Explicit, _) => left.clone(),
        })
    }
}

/// Units of an interval qualifier, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    pub fn name(&self) -> &'static str {
        match self {
            TimeUnit::Year => "YEAR",
            TimeUnit::Month => "MONTH",
            TimeUnit::Day => "DAY",
            TimeUnit::Hour => "HOUR",
            TimeUnit::Minute => "MINUTE",
            TimeUnit::Second => "SECOND",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalQualifier {
    pub start: TimeUnit,
    pub end: Option<TimeUnit>,
}

impl IntervalQualifier {
    pub fn new(start: TimeUnit, end: Option<TimeUnit>) -> Self {
        Self { start, end }
    }

    pub fn type_name(&self) -> SqlTypeName {
        match self.start {
            TimeUnit::Year | TimeUnit::Month => SqlTypeName::IntervalYearMonth,
            _ => SqlTypeName::IntervalDayTime,
        }
    }

    fn last(&self) -> TimeUnit {
        self.end.unwrap_or(self.start)
    }

    /// The narrowest qualifier covering both. Both must be of the same interval class.
    pub fn combine(&self, other: &IntervalQualifier) -> IntervalQualifier {
        assert_eq!(self.type_name(), other.type_name(), "cannot combine year-month and day-time intervals");
        let start = self.start.min(other.start);
        let last = self.last().max(other.last());
        IntervalQualifier {
            start,
            end: if last == start { None } else { Some(last) },
        }
    }
}

impl fmt::Display for IntervalQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{} TO {}", self.start.name(), end.name()),
            None => f.write_str(self.start.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelDataTypeField {
    pub name: String,
    pub index: usize,
    pub ty: RelDataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharsetSpec {
    pub charset: String,
    pub collation: SqlCollation,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Basic {
        name: SqlTypeName,
        precision: Option<u32>,
        scale: Option<u32>,
        charset: Option<CharsetSpec>,
    },
    Interval(IntervalQualifier),
    Multiset(RelDataType),
    Struct(Vec<RelDataTypeField>),
}

#[derive(Debug)]
struct TypeDesc {
    kind: TypeKind,
    nullable: bool,
    full: String,
    short: String,
}

/// An immutable, cheaply clonable type.
#[derive(Clone)]
pub struct RelDataType(Arc<TypeDesc>);

impl RelDataType {
    pub(crate) fn build(kind: TypeKind, nullable: bool) -> Self {
        let nullable = if matches!(kind, TypeKind::Struct(_)) { false } else { nullable };
        let mut full = String::new();
        let mut short = String::new();
        write_type_string(&kind, &mut full, true);
        write_type_string(&kind, &mut short, false);
        if !nullable {
            full.push_str(" NOT NULL");
        }
        Self(Arc::new(TypeDesc {
            kind,
            nullable,
            full,
            short,
        }))
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.0.nullable
    }

    pub fn sql_type_name(&self) -> SqlTypeName {
        match &self.0.kind {
            TypeKind::Basic { name, .. } => *name,
            TypeKind::Interval(q) => q.type_name(),
            TypeKind::Multiset(_) => SqlTypeName::Multiset,
            TypeKind::Struct(_) => SqlTypeName::Row,
        }
    }

    pub fn family(&self) -> Option<SqlTypeFamily> {
        self.sql_type_name().family()
    }

    /// Declared precision, or the type name's default.
    pub fn precision(&self) -> u32 {
        match &self.0.kind {
            TypeKind::Basic {
                name, precision, ..
            } => precision.or_else(|| name.default_precision()).unwrap_or(0),
            _ => 0,
        }
    }

    /// Declared scale; exact numerics without a declared scale report 0.
    pub fn scale(&self) -> Option<u32> {
        match &self.0.kind {
            TypeKind::Basic { name, scale, .. } => {
                scale.or_else(|| name.is_exact_numeric().then_some(0))
            }
            _ => None,
        }
    }

    pub fn scale_or_zero(&self) -> u32 {
        self.scale().unwrap_or(0)
    }

    pub fn charset(&self) -> Option<&str> {
        match &self.0.kind {
            TypeKind::Basic {
                charset: Some(c), ..
            } => Some(&c.charset),
            _ => None,
        }
    }

    pub fn collation(&self) -> Option<&SqlCollation> {
        match &self.0.kind {
            TypeKind::Basic {
                charset: Some(c), ..
            } => Some(&c.collation),
            _ => None,
        }
    }

    pub fn interval_qualifier(&self) -> Option<IntervalQualifier> {
        match &self.0.kind {
            TypeKind::Interval(q) => Some(*q),
            _ => None,
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.0.kind, TypeKind::Struct(_))
    }

    pub fn fields(&self) -> &[RelDataTypeField] {
        match &self.0.kind {
            TypeKind::Struct(fields) => fields,
            _ => &[],
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields().len()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields().iter().map(|f| f.name.clone()).collect()
    }

    pub fn field_types(&self) -> Vec<RelDataType> {
        self.fields().iter().map(|f| f.ty.clone()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&RelDataTypeField> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// The element type of a multiset.
    pub fn component_type(&self) -> Option<&RelDataType> {
        match &self.0.kind {
            TypeKind::Multiset(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_decimal(&self) -> bool {
        self.sql_type_name() == SqlTypeName::Decimal
    }

    pub fn is_exact_numeric(&self) -> bool {
        self.sql_type_name().is_exact_numeric()
    }

    pub fn is_approximate_numeric(&self) -> bool {
        self.sql_type_name().is_approximate_numeric()
    }

    pub fn is_char(&self) -> bool {
        self.sql_type_name().is_char()
    }

    pub fn comparability(&self) -> Comparability {
        match self.sql_type_name() {
            SqlTypeName::Multiset => Comparability::Unordered,
            SqlTypeName::Cursor | SqlTypeName::ColumnList | SqlTypeName::Symbol => {
                Comparability::None
            }
            _ => Comparability::All,
        }
    }

    pub fn in_char_or_binary_families(&self) -> bool {
        SqlTypeFamily::String.contains(self.sql_type_name())
    }

    /// The full type string, including character set, collation and nullability.
    pub fn full_type_string(&self) -> &str {
        &self.0.full
    }

    /// Whether two row types have the same field types, ignoring field names.
    pub fn equal_sans_field_names(&self, other: &RelDataType) -> bool {
        if !self.is_struct() || !other.is_struct() {
            return self == other;
        }
        self.field_count() == other.field_count()
            && self
                .fields()
                .iter()
                .zip(other.fields())
                .all(|(a, b)| a.ty == b.ty)
    }
}

fn write_type_string(kind: &TypeKind, out: &mut String, with_detail: bool) {
    match kind {
        TypeKind::Basic {
            name,
            precision,
            scale,
            charset,
        } => {
            out.push_str(name.name());
            let mut print_precision = precision.is_some();
            let mut print_scale = scale.is_some();
            if with_detail {
                if name.allows_prec_no_scale() && name.default_precision().is_some() {
                    print_precision = true;
                }
                if name.allows_scale() {
                    print_scale = true;
                }
            }
            if print_precision {
                let p = precision.or_else(|| name.default_precision()).unwrap_or(0);
                out.push('(');
                out.push_str(&p.to_string());
                if print_scale {
                    out.push_str(", ");
                    out.push_str(&scale.unwrap_or(0).to_string());
                }
                out.push(')');
            }
            if with_detail {
                if let Some(cs) = charset {
                    out.push_str(" CHARACTER SET \"");
                    out.push_str(&cs.charset);
                    out.push_str("\" COLLATE \"");
                    out.push_str(&cs.collation.name);
                    out.push('"');
                }
            }
        }
        TypeKind::Interval(q) => {
            out.push_str("INTERVAL ");
            out.push_str(&q.to_string());
        }
        TypeKind::Multiset(elem) => {
            if with_detail {
                out.push_str(elem.full_type_string());
            } else {
                out.push_str(&elem.to_string());
            }
            out.push_str(" MULTISET");
        }
        TypeKind::Struct(fields) => {
            out.push_str("RecordType(");
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if with_detail {
                    out.push_str(field.ty.full_type_string());
                } else {
                    out.push_str(&field.ty.to_string());
                }
                out.push(' ');
                out.push_str(&field.name);
            }
            out.push(')');
        }
    }
}

impl PartialEq for RelDataType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.full == other.0.full
    }
}

impl Eq for RelDataType {}

impl std::hash::Hash for RelDataType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.full.hash(state);
    }
}

impl fmt::Display for RelDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.short)
    }
}

impl fmt::Debug for RelDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_membership() {
        assert!(SqlTypeFamily::Numeric.contains(SqlTypeName::Decimal));
        assert!(SqlTypeFamily::Numeric.contains(SqlTypeName::Real));
        assert!(!SqlTypeFamily::ExactNumeric.contains(SqlTypeName::Double));
        assert!(SqlTypeFamily::String.contains(SqlTypeName::Varbinary));
        assert!(!SqlTypeFamily::Character.contains(SqlTypeName::Binary));
        assert!(SqlTypeFamily::Any.contains(SqlTypeName::Symbol));
        assert_eq!(SqlTypeName::Null.family(), None);
    }

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(SqlTypeName::lookup("int"), Some(SqlTypeName::Integer));
        assert_eq!(SqlTypeName::lookup("Varchar"), Some(SqlTypeName::Varchar));
        assert_eq!(SqlTypeName::lookup("blob"), None);
    }

    #[test]
    fn test_dyadic_collation() {
        let coercible = SqlCollation::coercible();
        let implicit = SqlCollation::new("latin1$sv", Coercibility::Implicit);
        let explicit_a = SqlCollation::new("a", Coercibility::Explicit);
        let explicit_b = SqlCollation::new("b", Coercibility::Explicit);

        assert_eq!(SqlCollation::dyadic(&coercible, &implicit), Some(implicit.clone()));
        assert_eq!(SqlCollation::dyadic(&implicit, &coercible), Some(implicit.clone()));
        assert_eq!(SqlCollation::dyadic(&implicit, &explicit_a), Some(explicit_a.clone()));
        assert_eq!(SqlCollation::dyadic(&explicit_a, &explicit_b), None);
        let mixed = SqlCollation::dyadic(&implicit, &SqlCollation::implicit()).unwrap();
        assert_eq!(mixed.coercibility, Coercibility::None);
    }

    #[test]
    fn test_interval_combine() {
        let day = IntervalQualifier::new(TimeUnit::Day, None);
        let hour_second = IntervalQualifier::new(TimeUnit::Hour, Some(TimeUnit::Second));
        let combined = day.combine(&hour_second);
        assert_eq!(combined.to_string(), "DAY TO SECOND");
        assert_eq!(combined.type_name(), SqlTypeName::IntervalDayTime);
    }
}
