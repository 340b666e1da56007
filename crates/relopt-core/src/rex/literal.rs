//! Constant values in row expressions.
//!
//! A literal records both its [`RelDataType`] and a separate *literal type
//! name* which says how the value is represented. Every exact numeric literal
//! is represented as `DECIMAL`, whatever its declared type (an `INTEGER 1`
//! has literal type name `DECIMAL`), and approximate numerics are stored as
//! exact decimals tagged `DOUBLE`. Character literals always carry their
//! character set and collation.

use std::fmt;
use std::hash::{Hash, Hasher};

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::{RelDataType, SqlCollation, SqlTypeName, DEFAULT_CHARSET};

/// A character string with its character set and collation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NlsString {
    pub value: String,
    pub charset: Option<String>,
    pub collation: Option<SqlCollation>,
}

impl NlsString {
    pub fn new(value: impl Into<String>, charset: Option<String>, collation: Option<SqlCollation>) -> Self {
        Self {
            value: value.into(),
            charset,
            collation,
        }
    }

    /// SQL source form, for example `_UTF-16'it''s'`.
    pub fn as_sql(&self, include_charset: bool) -> String {
        let mut out = String::new();
        if include_charset {
            if let Some(cs) = &self.charset {
                out.push('_');
                out.push_str(cs);
            }
        }
        out.push('\'');
        out.push_str(&self.value.replace('\'', "''"));
        out.push('\'');
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    /// Exact and approximate numerics, and interval lengths (months or milliseconds).
    Decimal(BigDecimal),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Char(NlsString),
    Binary(Vec<u8>),
    /// A flag such as a `TRIM` direction.
    Symbol(String),
}

/// Whether `value` is a legal representation for a literal of `type_name`.
///
/// # Panics
///
/// Panics for type names that never tag a literal (`INTEGER`, `VARCHAR`, ...);
/// those values are represented under `DECIMAL` and `CHAR`.
pub fn value_matches_type(value: &LiteralValue, type_name: SqlTypeName) -> bool {
    match type_name {
        // Unlike parse-tree literals, boolean row-expression literals are never null.
        SqlTypeName::Boolean => matches!(value, LiteralValue::Boolean(_)),
        SqlTypeName::Null => matches!(value, LiteralValue::Null),
        SqlTypeName::Decimal | SqlTypeName::Double | SqlTypeName::Bigint => {
            matches!(value, LiteralValue::Decimal(_))
        }
        SqlTypeName::Date => matches!(value, LiteralValue::Date(_)),
        SqlTypeName::Time => matches!(value, LiteralValue::Time(_)),
        SqlTypeName::Timestamp => matches!(value, LiteralValue::Timestamp(_)),
        SqlTypeName::IntervalDayTime | SqlTypeName::IntervalYearMonth => {
            matches!(value, LiteralValue::Decimal(_) | LiteralValue::Null)
        }
        SqlTypeName::Binary => matches!(value, LiteralValue::Binary(_)),
        SqlTypeName::Char => matches!(
            value,
            LiteralValue::Char(NlsString {
                charset: Some(_),
                collation: Some(_),
                ..
            })
        ),
        SqlTypeName::Symbol => matches!(value, LiteralValue::Symbol(_)),
        other => panic!("unexpected literal type name {}", other),
    }
}

/// Format an exact decimal in scientific notation: `1.5E0`, `1E2`, `-2.25E-1`.
pub fn to_scientific_notation(bd: &BigDecimal) -> String {
    const TRUNCATE_AT: usize = 3000;
    let (unscaled, scale) = bd.as_bigint_and_exponent();
    let mut digits = unscaled.to_string();
    let negative = digits.starts_with('-');
    if negative {
        digits.remove(0);
    }
    let len = digits.len() as i64;
    let e = len - scale - 1;
    let mut ret = String::new();
    if negative {
        ret.push('-');
    }
    digits.truncate(TRUNCATE_AT);
    ret.push_str(&digits[..1]);
    if scale == 0 {
        let trimmed = digits.trim_end_matches('0');
        let keep = trimmed.len().max(1);
        digits.truncate(keep);
    }
    if digits.len() > 1 {
        ret.push('.');
        ret.push_str(&digits[1..]);
    }
    ret.push('E');
    ret.push_str(&e.to_string());
    ret
}

fn digest_of(value: &LiteralValue, type_name: SqlTypeName) -> String {
    match value {
        LiteralValue::Null => "null".to_string(),
        LiteralValue::Boolean(b) => b.to_string(),
        LiteralValue::Decimal(d) if type_name == SqlTypeName::Double => to_scientific_notation(d),
        LiteralValue::Decimal(d) => d.to_string(),
        LiteralValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        LiteralValue::Time(t) => t.format("%H:%M:%S").to_string(),
        LiteralValue::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        LiteralValue::Char(s) => {
            let include_charset = s.charset.as_deref().is_some_and(|cs| cs != DEFAULT_CHARSET);
            s.as_sql(include_charset)
        }
        LiteralValue::Binary(bytes) => {
            let mut out = String::from("X'");
            for b in bytes {
                out.push_str(&format!("{:02X}", b));
            }
            out.push('\'');
            out
        }
        LiteralValue::Symbol(sym) => format!("FLAG({})", sym),
    }
}

#[derive(Debug, Clone)]
pub struct RexLiteral {
    value: LiteralValue,
    ty: RelDataType,
    type_name: SqlTypeName,
    digest: String,
}

impl RexLiteral {
    /// # Panics
    ///
    /// Panics if the value does not match `type_name`, or if the value is null
    /// but the type is not nullable (or vice versa).
    pub fn new(value: LiteralValue, ty: RelDataType, type_name: SqlTypeName) -> Self {
        assert!(
            value_matches_type(&value, type_name),
            "literal value {:?} does not match type name {}",
            value,
            type_name
        );
        assert_eq!(
            matches!(value, LiteralValue::Null),
            ty.is_nullable(),
            "literal nullability must match its type: {:?} vs {:?}",
            value,
            ty
        );
        let digest = digest_of(&value, type_name);
        Self {
            value,
            ty,
            type_name,
            digest,
        }
    }

    pub fn value(&self) -> &LiteralValue {
        &self.value
    }

    pub fn ty(&self) -> &RelDataType {
        &self.ty
    }

    /// How the value is represented, which may differ from the declared type.
    pub fn type_name(&self) -> SqlTypeName {
        self.type_name
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, LiteralValue::Null)
    }

    pub fn is_always_true(&self) -> bool {
        matches!(self.value, LiteralValue::Boolean(true))
    }

    pub fn is_always_false(&self) -> bool {
        matches!(self.value, LiteralValue::Boolean(false))
    }

    pub fn boolean_value(&self) -> Option<bool> {
        match self.value {
            LiteralValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn decimal_value(&self) -> Option<&BigDecimal> {
        match &self.value {
            LiteralValue::Decimal(d) => Some(d),
            _ => None,
        }
    }

    /// The value as an integer, if it is an exact numeric with no fractional part.
    pub fn int_value(&self) -> Option<i64> {
        use bigdecimal::ToPrimitive;
        let d = self.decimal_value()?;
        if !d.is_integer() {
            return None;
        }
        d.to_i64()
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.value {
            LiteralValue::Char(s) => Some(&s.value),
            _ => None,
        }
    }
}

impl PartialEq for RexLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for RexLiteral {}

impl Hash for RexLiteral {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.value {
            LiteralValue::Null => state.write_u32(0),
            v => v.hash(state),
        }
    }
}

impl fmt::Display for RexLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeFactory;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(to_scientific_notation(&dec("1.5")), "1.5E0");
        assert_eq!(to_scientific_notation(&dec("100")), "1E2");
        assert_eq!(to_scientific_notation(&dec("-0.25")), "-2.5E-1");
        assert_eq!(to_scientific_notation(&dec("0.001")), "1E-3");
        assert_eq!(to_scientific_notation(&dec("7")), "7E0");
    }

    #[test]
    fn test_digests() {
        let tf = TypeFactory::new();
        let int = tf.create_sql_type(crate::types::SqlTypeName::Integer);
        let lit = RexLiteral::new(LiteralValue::Decimal(dec("42")), int, SqlTypeName::Decimal);
        assert_eq!(lit.to_string(), "42");
        assert_eq!(lit.int_value(), Some(42));

        let char_ty = tf.create_sql_type_with_precision(SqlTypeName::Char, 4);
        let s = NlsString::new("it's", Some("ISO-8859-1".into()), Some(SqlCollation::coercible()));
        let lit = RexLiteral::new(LiteralValue::Char(s), char_ty.clone(), SqlTypeName::Char);
        assert_eq!(lit.to_string(), "'it''s'");

        let s = NlsString::new("x", Some("UTF-16".into()), Some(SqlCollation::coercible()));
        let lit = RexLiteral::new(LiteralValue::Char(s), char_ty, SqlTypeName::Char);
        assert_eq!(lit.to_string(), "_UTF-16'x'");

        let bin = tf.create_sql_type_with_precision(SqlTypeName::Binary, 2);
        let lit = RexLiteral::new(LiteralValue::Binary(vec![0xab, 0x01]), bin, SqlTypeName::Binary);
        assert_eq!(lit.to_string(), "X'AB01'");

        let date = tf.create_sql_type(SqlTypeName::Date);
        let d = NaiveDate::from_ymd_opt(2006, 3, 9).unwrap();
        let lit = RexLiteral::new(LiteralValue::Date(d), date, SqlTypeName::Date);
        assert_eq!(lit.to_string(), "2006-03-09");
    }

    #[test]
    fn test_equality_ignores_type() {
        let tf = TypeFactory::new();
        let a = RexLiteral::new(
            LiteralValue::Decimal(dec("1")),
            tf.create_sql_type(SqlTypeName::Integer),
            SqlTypeName::Decimal,
        );
        let b = RexLiteral::new(
            LiteralValue::Decimal(dec("1")),
            tf.create_sql_type(SqlTypeName::Bigint),
            SqlTypeName::Decimal,
        );
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "does not match type name")]
    fn test_mismatched_value_fails_fast() {
        let tf = TypeFactory::new();
        RexLiteral::new(
            LiteralValue::Boolean(true),
            tf.create_sql_type(SqlTypeName::Integer),
            SqlTypeName::Decimal,
        );
    }

    #[test]
    #[should_panic(expected = "unexpected literal type name")]
    fn test_integer_type_name_is_unexpected() {
        let tf = TypeFactory::new();
        RexLiteral::new(
            LiteralValue::Decimal(dec("1")),
            tf.create_sql_type(SqlTypeName::Integer),
            SqlTypeName::Integer,
        );
    }

    #[test]
    #[should_panic(expected = "nullability")]
    fn test_null_requires_nullable_type() {
        let tf = TypeFactory::new();
        RexLiteral::new(LiteralValue::Null, tf.create_sql_type(SqlTypeName::Null), SqlTypeName::Null);
    }
}
