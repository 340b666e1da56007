//! Construction of row expressions.
//!
//! [`RexBuilder`] is the one place calls get typed. `validate_call` runs the
//! operator's checker and return-type inference and reports a validation
//! error; `make_call` is for callers that build calls they know to be valid
//! (planner rules rewriting existing expressions) and treats a failure as a
//! defect.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::trace;

use crate::error::{RelOptError, RelOptResult};
use crate::typing::CallBinding;
use crate::types::{RelDataType, SqlTypeName, TypeFactory, MAX_NUMERIC_PRECISION};

use super::{
    LiteralValue, NlsString, RexCall, RexCorrelVariable, RexDynamicParam, RexFieldAccess,
    RexLiteral, RexNode, SqlOperator, STD,
};

#[derive(Debug, Clone, Default)]
pub struct RexBuilder {
    type_factory: TypeFactory,
}

impl RexBuilder {
    pub fn new(type_factory: TypeFactory) -> Self {
        Self { type_factory }
    }

    pub fn type_factory(&self) -> &TypeFactory {
        &self.type_factory
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Type-check and build a call.
    ///
    /// Untyped `NULL` operands are first given a type by the operator's
    /// operand-type inference, if it has one.
    pub fn validate_call(&self, op: &Arc<SqlOperator>, operands: Vec<RexNode>) -> RelOptResult<RexNode> {
        let operands = self.infer_unknown_operands(op, operands);
        let binding = CallBinding::new(&self.type_factory, op, &operands);
        let ty = op.derive_type(&binding)?;
        trace!(op = %op.name, ty = %ty, "typed call");
        Ok(RexNode::call(RexCall::new(ty, op.clone(), operands)))
    }

    /// Build a call that is known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if the call does not type-check.
    pub fn make_call(&self, op: &Arc<SqlOperator>, operands: Vec<RexNode>) -> RexNode {
        match self.validate_call(op, operands) {
            Ok(node) => node,
            Err(e) => panic!("invalid call of '{}': {}", op.name, e),
        }
    }

    /// Build a call with a given result type, skipping inference.
    pub fn make_call_with_type(&self, ty: RelDataType, op: &Arc<SqlOperator>, operands: Vec<RexNode>) -> RexNode {
        RexNode::call(RexCall::new(ty, op.clone(), operands))
    }

    fn infer_unknown_operands(&self, op: &SqlOperator, operands: Vec<RexNode>) -> Vec<RexNode> {
        let Some(inference) = op.operand_type_inference else {
            return operands;
        };
        let unknown = |n: &RexNode| n.is_null_literal() && n.ty().sql_type_name() == SqlTypeName::Null;
        if !operands.iter().any(unknown) {
            return operands;
        }
        let mut types: Vec<RelDataType> = operands.iter().map(|o| o.ty().clone()).collect();
        inference.infer(&self.type_factory, None, &mut types);
        operands
            .into_iter()
            .zip(types)
            .map(|(node, ty)| {
                if unknown(&node) && ty.sql_type_name() != SqlTypeName::Null {
                    self.make_null_literal_of(&ty)
                } else {
                    node
                }
            })
            .collect()
    }

    pub fn make_cast(&self, ty: RelDataType, node: RexNode) -> RexNode {
        self.make_call_with_type(ty, &STD.cast, vec![node])
    }

    /// `node` if it already has type `ty`, otherwise a cast to `ty`.
    pub fn ensure_type(&self, ty: &RelDataType, node: RexNode) -> RexNode {
        if node.ty() == ty {
            node
        } else {
            self.make_cast(ty.clone(), node)
        }
    }

    pub fn make_not(&self, node: RexNode) -> RexNode {
        self.make_call(&STD.not, vec![node])
    }

    /// AND of the given conditions, left-deep. Literal `TRUE`s are dropped; `None` if nothing remains.
    pub fn compose_conjunction(&self, conditions: Vec<RexNode>) -> Option<RexNode> {
        conditions
            .into_iter()
            .filter(|c| !c.is_always_true())
            .reduce(|acc, c| self.make_call(&STD.and, vec![acc, c]))
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    pub fn make_input_ref(&self, ty: RelDataType, index: usize) -> RexNode {
        RexNode::input_ref(index, ty)
    }

    /// A reference to field `index` of `row_type`.
    pub fn make_input_ref_for(&self, row_type: &RelDataType, index: usize) -> RexNode {
        RexNode::input_ref(index, row_type.fields()[index].ty.clone())
    }

    /// # Panics
    ///
    /// Panics if `expr` has no field called `field_name`.
    pub fn make_field_access(&self, expr: RexNode, field_name: &str) -> RexNode {
        let field = match expr.ty().field(field_name) {
            Some(f) => f.clone(),
            None => panic!("type {:?} has no field '{}'", expr.ty(), field_name),
        };
        RexNode::FieldAccess(RexFieldAccess {
            expr: Box::new(expr),
            field,
        })
    }

    pub fn make_correl(&self, name: impl Into<String>, ty: RelDataType) -> RexNode {
        RexNode::CorrelVariable(RexCorrelVariable {
            name: name.into(),
            ty,
        })
    }

    pub fn make_dynamic_param(&self, index: usize, ty: RelDataType) -> RexNode {
        RexNode::DynamicParam(RexDynamicParam { index, ty })
    }

    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------

    pub fn make_literal(&self, value: LiteralValue, ty: RelDataType, type_name: SqlTypeName) -> RexNode {
        RexNode::Literal(RexLiteral::new(value, ty, type_name))
    }

    /// An `INTEGER` literal, or `BIGINT` if the value does not fit.
    pub fn make_exact_literal(&self, value: i64) -> RexNode {
        let name = if i32::try_from(value).is_ok() {
            SqlTypeName::Integer
        } else {
            SqlTypeName::Bigint
        };
        let ty = self.type_factory.create_sql_type(name);
        self.make_literal(LiteralValue::Decimal(BigDecimal::from(value)), ty, SqlTypeName::Decimal)
    }

    /// An exact literal typed by its digits: `INTEGER`/`BIGINT` without a fractional part, else `DECIMAL(p, s)`.
    pub fn make_decimal_literal(&self, value: BigDecimal) -> RexNode {
        let (unscaled, scale) = value.as_bigint_and_exponent();
        let ty = if scale <= 0 {
            let fits_int = value >= BigDecimal::from(i32::MIN) && value <= BigDecimal::from(i32::MAX);
            self.type_factory.create_sql_type(if fits_int {
                SqlTypeName::Integer
            } else {
                SqlTypeName::Bigint
            })
        } else {
            let digits = unscaled.to_string().trim_start_matches('-').len() as u32;
            let scale = (scale as u32).min(MAX_NUMERIC_PRECISION);
            let precision = digits.max(scale).clamp(1, MAX_NUMERIC_PRECISION);
            self.type_factory
                .create_sql_type_with_scale(SqlTypeName::Decimal, precision, scale)
        };
        self.make_literal(LiteralValue::Decimal(value), ty, SqlTypeName::Decimal)
    }

    pub fn make_approx_literal(&self, value: BigDecimal) -> RexNode {
        let ty = self.type_factory.create_sql_type(SqlTypeName::Double);
        self.make_literal(LiteralValue::Decimal(value), ty, SqlTypeName::Double)
    }

    pub fn make_bool_literal(&self, value: bool) -> RexNode {
        let ty = self.type_factory.create_sql_type(SqlTypeName::Boolean);
        self.make_literal(LiteralValue::Boolean(value), ty, SqlTypeName::Boolean)
    }

    /// A `CHAR(n)` literal in the session character set.
    pub fn make_char_literal(&self, value: &str) -> RexNode {
        let len = value.chars().count().max(1) as u32;
        let ty = self
            .type_factory
            .create_sql_type_with_precision(SqlTypeName::Char, len);
        let nls = NlsString::new(
            value,
            Some(self.type_factory.default_charset.clone()),
            Some(self.type_factory.default_collation.clone()),
        );
        self.make_literal(LiteralValue::Char(nls), ty, SqlTypeName::Char)
    }

    pub fn make_binary_literal(&self, bytes: Vec<u8>) -> RexNode {
        let len = bytes.len().max(1) as u32;
        let ty = self
            .type_factory
            .create_sql_type_with_precision(SqlTypeName::Binary, len);
        self.make_literal(LiteralValue::Binary(bytes), ty, SqlTypeName::Binary)
    }

    pub fn make_date_literal(&self, date: NaiveDate) -> RexNode {
        let ty = self.type_factory.create_sql_type(SqlTypeName::Date);
        self.make_literal(LiteralValue::Date(date), ty, SqlTypeName::Date)
    }

    pub fn make_time_literal(&self, time: NaiveTime) -> RexNode {
        let ty = self.type_factory.create_sql_type(SqlTypeName::Time);
        self.make_literal(LiteralValue::Time(time), ty, SqlTypeName::Time)
    }

    pub fn make_timestamp_literal(&self, ts: NaiveDateTime) -> RexNode {
        let ty = self.type_factory.create_sql_type(SqlTypeName::Timestamp);
        self.make_literal(LiteralValue::Timestamp(ts), ty, SqlTypeName::Timestamp)
    }

    /// A symbolic flag, such as a `TRIM` direction.
    pub fn make_flag(&self, symbol: impl Into<String>) -> RexNode {
        let ty = self.type_factory.create_sql_type(SqlTypeName::Symbol);
        self.make_literal(LiteralValue::Symbol(symbol.into()), ty, SqlTypeName::Symbol)
    }

    /// A typed `NULL` of the given type name.
    pub fn make_null_literal(&self, name: SqlTypeName) -> RexNode {
        let ty = self.type_factory.create_sql_type(name);
        self.make_null_literal_of(&ty)
    }

    pub fn make_null_literal_of(&self, ty: &RelDataType) -> RexNode {
        let ty = self.type_factory.create_type_with_nullability(ty, true);
        self.make_literal(LiteralValue::Null, ty, SqlTypeName::Null)
    }

    /// Parse `text` as a literal of type `ty`.
    ///
    /// Exact numerics, booleans, dates, times, timestamps (`YYYY-MM-DD HH:MM:SS`),
    /// character strings, and hex-encoded binary strings are understood.
    pub fn make_literal_from_string(&self, text: &str, ty: &RelDataType) -> RelOptResult<RexNode> {
        let bad = || RelOptError::InvalidPlan(format!("cannot parse '{}' as {}", text, ty));
        let name = ty.sql_type_name();
        let not_null = self.type_factory.create_type_with_nullability(ty, false);
        let (value, type_name) = match name {
            SqlTypeName::Boolean => match text.to_ascii_uppercase().as_str() {
                "TRUE" => (LiteralValue::Boolean(true), SqlTypeName::Boolean),
                "FALSE" => (LiteralValue::Boolean(false), SqlTypeName::Boolean),
                _ => return Err(bad()),
            },
            n if n.is_exact_numeric() => (
                LiteralValue::Decimal(BigDecimal::from_str(text.trim()).map_err(|_| bad())?),
                SqlTypeName::Decimal,
            ),
            n if n.is_approximate_numeric() => (
                LiteralValue::Decimal(BigDecimal::from_str(text.trim()).map_err(|_| bad())?),
                SqlTypeName::Double,
            ),
            SqlTypeName::Char | SqlTypeName::Varchar => {
                let nls = NlsString::new(
                    text,
                    Some(ty.charset().unwrap_or(&self.type_factory.default_charset).to_string()),
                    Some(
                        ty.collation()
                            .cloned()
                            .unwrap_or_else(|| self.type_factory.default_collation.clone()),
                    ),
                );
                (LiteralValue::Char(nls), SqlTypeName::Char)
            }
            SqlTypeName::Binary | SqlTypeName::Varbinary => {
                (LiteralValue::Binary(parse_hex(text).ok_or_else(bad)?), SqlTypeName::Binary)
            }
            SqlTypeName::Date => (
                LiteralValue::Date(NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| bad())?),
                SqlTypeName::Date,
            ),
            SqlTypeName::Time => (
                LiteralValue::Time(NaiveTime::parse_from_str(text, "%H:%M:%S").map_err(|_| bad())?),
                SqlTypeName::Time,
            ),
            SqlTypeName::Timestamp => (
                LiteralValue::Timestamp(
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map_err(|_| bad())?,
                ),
                SqlTypeName::Timestamp,
            ),
            _ => return Err(RelOptError::Unsupported(format!("literal of type {}", ty))),
        };
        Ok(self.make_literal(value, not_null, type_name))
    }
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_literal_types() {
        let rex = RexBuilder::default();
        assert_eq!(rex.make_exact_literal(7).ty().full_type_string(), "INTEGER NOT NULL");
        assert_eq!(rex.make_exact_literal(1 << 40).ty().full_type_string(), "BIGINT NOT NULL");
        let d = rex.make_decimal_literal(BigDecimal::from_str("-12.345").unwrap());
        assert_eq!(d.ty().full_type_string(), "DECIMAL(5, 3) NOT NULL");
        assert_eq!(d.to_string(), "-12.345");
    }

    #[test]
    fn test_validate_call_reports_errors() {
        let rex = RexBuilder::default();
        let err = rex
            .validate_call(&STD.plus, vec![rex.make_bool_literal(true), rex.make_exact_literal(1)])
            .unwrap_err();
        assert!(matches!(err, RelOptError::CannotApply { .. }));
        assert!(err.to_string().contains("'<BOOLEAN> + <INTEGER>'"));
    }

    #[test]
    fn test_untyped_null_takes_type_from_sibling() {
        let rex = RexBuilder::default();
        let tf = rex.type_factory();
        let col = rex.make_input_ref(tf.create_sql_type(SqlTypeName::Date), 0);
        let null = rex.make_null_literal(SqlTypeName::Null);
        let eq = rex.validate_call(&STD.equals, vec![col, null]).unwrap();
        let call = eq.as_call().unwrap();
        assert_eq!(call.operands[1].ty().sql_type_name(), SqlTypeName::Date);
        assert!(call.ty.is_nullable());
    }

    #[test]
    fn test_compose_conjunction() {
        let rex = RexBuilder::default();
        let b = rex.type_factory().create_sql_type(SqlTypeName::Boolean);
        let conds = vec![
            rex.make_input_ref(b.clone(), 0),
            rex.make_bool_literal(true),
            rex.make_input_ref(b, 1),
        ];
        let and = rex.compose_conjunction(conds).unwrap();
        assert_eq!(and.to_string(), "AND($0, $1)");
        assert_eq!(rex.compose_conjunction(vec![rex.make_bool_literal(true)]), None);
    }

    #[test]
    fn test_literal_from_string() {
        let rex = RexBuilder::default();
        let tf = rex.type_factory();
        let int = tf.create_sql_type(SqlTypeName::Integer);
        assert_eq!(rex.make_literal_from_string("42", &int).unwrap().to_string(), "42");
        let date = tf.create_sql_type(SqlTypeName::Date);
        assert_eq!(
            rex.make_literal_from_string("2006-03-09", &date).unwrap().to_string(),
            "2006-03-09"
        );
        let bin = tf.create_sql_type_with_precision(SqlTypeName::Binary, 2);
        assert_eq!(rex.make_literal_from_string("AB01", &bin).unwrap().to_string(), "X'AB01'");
        assert!(rex.make_literal_from_string("yes", &tf.create_sql_type(SqlTypeName::Boolean)).is_err());
    }
}
