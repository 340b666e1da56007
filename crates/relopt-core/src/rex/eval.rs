//! A reference evaluator for row expressions.
//!
//! Evaluation follows SQL three-valued logic: `NULL` operands make most
//! operators yield `NULL`, `AND`/`OR` short-circuit on `FALSE`/`TRUE`, and a
//! filter keeps a row only when its condition is `TRUE`. Exact numerics are
//! computed with arbitrary-precision decimals and rounded to the scale of the
//! call's type; integer division truncates.
//!
//! The evaluator exists so that the planner's rewrites can be checked for
//! semantic equivalence on concrete rows. Operators without an evaluation
//! rule report [`RelOptError::Unsupported`].

use std::cmp::Ordering;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive, Zero};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{RelOptError, RelOptResult};
use crate::types::{RelDataType, SqlTypeFamily, SqlTypeName};

use super::{LiteralValue, RexCall, RexKind, RexNode, SqlSyntax, STD};

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Boolean(bool),
    Decimal(BigDecimal),
    Double(OrderedFloat<f64>),
    String(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Datum {
    pub fn int(v: i64) -> Self {
        Datum::Decimal(BigDecimal::from(v))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Datum::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn from_literal(value: &LiteralValue, type_name: SqlTypeName) -> Datum {
        match value {
            LiteralValue::Null => Datum::Null,
            LiteralValue::Boolean(b) => Datum::Boolean(*b),
            LiteralValue::Decimal(d) if type_name == SqlTypeName::Double => {
                Datum::Double(OrderedFloat(d.to_f64().unwrap_or(f64::NAN)))
            }
            LiteralValue::Decimal(d) => Datum::Decimal(d.clone()),
            LiteralValue::Date(d) => Datum::Date(*d),
            LiteralValue::Time(t) => Datum::Time(*t),
            LiteralValue::Timestamp(ts) => Datum::Timestamp(*ts),
            LiteralValue::Char(s) => Datum::String(s.value.clone()),
            LiteralValue::Binary(b) => Datum::Binary(b.clone()),
            LiteralValue::Symbol(s) => Datum::String(s.clone()),
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Decimal(d) => d.to_f64(),
            Datum::Double(f) => Some(f.0),
            _ => None,
        }
    }
}

/// SQL comparison of two non-null values; numerics compare across representations.
pub fn compare(left: &Datum, right: &Datum) -> Option<Ordering> {
    match (left, right) {
        (Datum::Decimal(a), Datum::Decimal(b)) => Some(a.cmp(b)),
        (Datum::Decimal(_), Datum::Double(_)) | (Datum::Double(_), Datum::Decimal(_)) => {
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        (Datum::String(a), Datum::String(b)) => Some(a.trim_end().cmp(b.trim_end())),
        (Datum::Null, _) | (_, Datum::Null) => None,
        (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => Some(a.cmp(b)),
        _ => None,
    }
}

pub fn eval(node: &RexNode, row: &[Datum]) -> RelOptResult<Datum> {
    eval_in(node, row, &[])
}

/// Evaluate with `locals` supplying the values of `$t` references.
pub fn eval_in(node: &RexNode, row: &[Datum], locals: &[Datum]) -> RelOptResult<Datum> {
    match node {
        RexNode::Literal(l) => Ok(Datum::from_literal(l.value(), l.type_name())),
        RexNode::InputRef(r) => row.get(r.index).cloned().ok_or_else(|| {
            RelOptError::InvalidPlan(format!("input ${} is outside a row of {} fields", r.index, row.len()))
        }),
        RexNode::LocalRef(r) => locals.get(r.index).cloned().ok_or_else(|| {
            RelOptError::InvalidPlan(format!("local {} has not been evaluated", r))
        }),
        RexNode::Call(call) => eval_call(call, row, locals),
        other => Err(RelOptError::Unsupported(format!("evaluation of {}", other))),
    }
}

/// Whether a condition holds; `NULL` and `FALSE` both reject.
pub fn eval_condition(node: &RexNode, row: &[Datum]) -> RelOptResult<bool> {
    Ok(eval(node, row)? == Datum::Boolean(true))
}

fn eval_call(call: &RexCall, row: &[Datum], locals: &[Datum]) -> RelOptResult<Datum> {
    let arg = |i: usize| eval_in(&call.operands[i], row, locals);
    let op = &call.op;

    // logical operators evaluate lazily
    match call.kind {
        RexKind::And | RexKind::Or => {
            let stop = call.kind == RexKind::Or;
            let mut saw_null = false;
            for operand in &call.operands {
                match eval_in(operand, row, locals)? {
                    Datum::Boolean(b) if b == stop => return Ok(Datum::Boolean(stop)),
                    Datum::Null => saw_null = true,
                    _ => {}
                }
            }
            return Ok(if saw_null { Datum::Null } else { Datum::Boolean(!stop) });
        }
        RexKind::Other if **op == *STD.case => {
            let n = call.operands.len();
            let mut i = 0;
            while i + 1 < n {
                if arg(i)? == Datum::Boolean(true) {
                    return arg(i + 1);
                }
                i += 2;
            }
            return if n % 2 == 1 { arg(n - 1) } else { Ok(Datum::Null) };
        }
        _ => {}
    }

    let args: Vec<Datum> = (0..call.operands.len()).map(arg).collect::<RelOptResult<_>>()?;

    match call.kind {
        RexKind::Not => Ok(match args[0].as_bool() {
            Some(b) => Datum::Boolean(!b),
            None => Datum::Null,
        }),
        RexKind::IsNull => Ok(Datum::Boolean(args[0].is_null())),
        RexKind::IsTrue => Ok(Datum::Boolean(args[0] == Datum::Boolean(true))),
        RexKind::IsFalse => Ok(Datum::Boolean(args[0] == Datum::Boolean(false))),
        k if k.is_a(RexKind::Comparison) => {
            let Some(ord) = compare(&args[0], &args[1]) else {
                return Ok(Datum::Null);
            };
            Ok(Datum::Boolean(match k {
                RexKind::Equals => ord == Ordering::Equal,
                RexKind::NotEquals => ord != Ordering::Equal,
                RexKind::LessThan => ord == Ordering::Less,
                RexKind::GreaterThan => ord == Ordering::Greater,
                RexKind::LessThanOrEqual => ord != Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        RexKind::Plus if op.syntax == SqlSyntax::Prefix => Ok(args[0].clone()),
        RexKind::MinusPrefix => arithmetic(&call.ty, "-", &Datum::int(0), &args[0]),
        RexKind::Plus => arithmetic(&call.ty, "+", &args[0], &args[1]),
        RexKind::Minus => arithmetic(&call.ty, "-", &args[0], &args[1]),
        RexKind::Times => arithmetic(&call.ty, "*", &args[0], &args[1]),
        RexKind::Divide => arithmetic(&call.ty, "/", &args[0], &args[1]),
        RexKind::Cast => cast(&args[0], &call.ty),
        RexKind::Like => like(&args),
        _ => eval_named(call, &args),
    }
}

fn eval_named(call: &RexCall, args: &[Datum]) -> RelOptResult<Datum> {
    let op = &*call.op;
    if *op == *STD.is_not_null {
        return Ok(Datum::Boolean(!args[0].is_null()));
    }
    if *op == *STD.is_distinct_from || *op == *STD.is_not_distinct_from {
        let same = match (&args[0], &args[1]) {
            (Datum::Null, Datum::Null) => true,
            (Datum::Null, _) | (_, Datum::Null) => false,
            (a, b) => compare(a, b) == Some(Ordering::Equal),
        };
        let distinct = *op == *STD.is_distinct_from;
        return Ok(Datum::Boolean(same != distinct));
    }
    if args.iter().any(Datum::is_null) {
        return Ok(Datum::Null);
    }
    if *op == *STD.concat {
        return match (&args[0], &args[1]) {
            (Datum::String(a), Datum::String(b)) => Ok(Datum::String(format!("{}{}", a, b))),
            (Datum::Binary(a), Datum::Binary(b)) => Ok(Datum::Binary([a.as_slice(), b].concat())),
            _ => Err(RelOptError::Unsupported(format!("{} on {:?}", op, args))),
        };
    }
    if *op == *STD.upper || *op == *STD.lower {
        return match &args[0] {
            Datum::String(s) if *op == *STD.upper => Ok(Datum::String(s.to_uppercase())),
            Datum::String(s) => Ok(Datum::String(s.to_lowercase())),
            other => Err(RelOptError::Unsupported(format!("{} on {:?}", op, other))),
        };
    }
    if *op == *STD.abs {
        return match &args[0] {
            Datum::Decimal(d) => Ok(Datum::Decimal(d.abs())),
            Datum::Double(f) => Ok(Datum::Double(OrderedFloat(f.0.abs()))),
            other => Err(RelOptError::Unsupported(format!("ABS on {:?}", other))),
        };
    }
    if *op == *STD.mod_fn {
        return match (&args[0], &args[1]) {
            (Datum::Decimal(_), Datum::Decimal(b)) if b.is_zero() => {
                Err(RelOptError::Unsupported("MOD by zero".to_string()))
            }
            (Datum::Decimal(a), Datum::Decimal(b)) => Ok(Datum::Decimal(a % b)),
            _ => Err(RelOptError::Unsupported(format!("MOD on {:?}", args))),
        };
    }
    Err(RelOptError::Unsupported(format!("evaluation of operator {}", op)))
}

fn arithmetic(ty: &RelDataType, op: &str, left: &Datum, right: &Datum) -> RelOptResult<Datum> {
    if left.is_null() || right.is_null() {
        return Ok(Datum::Null);
    }
    let unsupported = || RelOptError::Unsupported(format!("{:?} {} {:?}", left, op, right));
    if let (Datum::Decimal(a), Datum::Decimal(b)) = (left, right) {
        if !ty.is_approximate_numeric() {
            let value = match op {
                "+" => a + b,
                "-" => a - b,
                "*" => a * b,
                _ => {
                    if b.is_zero() {
                        return Err(RelOptError::Unsupported("division by zero".to_string()));
                    }
                    a / b
                }
            };
            return Ok(Datum::Decimal(fit_to_type(value, ty)));
        }
    }
    let (a, b) = (left.as_f64().ok_or_else(unsupported)?, right.as_f64().ok_or_else(unsupported)?);
    let value = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        _ => a / b,
    };
    Ok(Datum::Double(OrderedFloat(value)))
}

/// Integer types truncate; decimals round to their declared scale.
fn fit_to_type(value: BigDecimal, ty: &RelDataType) -> BigDecimal {
    if SqlTypeFamily::Integer.contains(ty.sql_type_name()) {
        value.with_scale(0)
    } else if ty.is_decimal() {
        value.round(ty.scale_or_zero() as i64)
    } else {
        value
    }
}

fn cast(value: &Datum, ty: &RelDataType) -> RelOptResult<Datum> {
    if value.is_null() {
        return Ok(Datum::Null);
    }
    let name = ty.sql_type_name();
    let unsupported = || RelOptError::Unsupported(format!("CAST({:?} AS {})", value, ty));
    Ok(match (value, name) {
        (Datum::Decimal(d), n) if n.is_exact_numeric() => Datum::Decimal(fit_to_type(d.clone(), ty)),
        (Datum::Double(f), n) if n.is_exact_numeric() => {
            let d = BigDecimal::from_f64(f.0).ok_or_else(unsupported)?;
            Datum::Decimal(fit_to_type(d, ty))
        }
        (Datum::Decimal(_) | Datum::Double(_), n) if n.is_approximate_numeric() => {
            Datum::Double(OrderedFloat(value.as_f64().ok_or_else(unsupported)?))
        }
        (Datum::String(s), n) if n.is_exact_numeric() => {
            let d = s.trim().parse::<BigDecimal>().map_err(|_| unsupported())?;
            Datum::Decimal(fit_to_type(d, ty))
        }
        (Datum::String(s), n) if n.is_approximate_numeric() => {
            Datum::Double(OrderedFloat(s.trim().parse::<f64>().map_err(|_| unsupported())?))
        }
        (Datum::String(s), SqlTypeName::Date) => Datum::Date(
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| unsupported())?,
        ),
        (Datum::String(s), SqlTypeName::Boolean) => match s.trim().to_ascii_uppercase().as_str() {
            "TRUE" => Datum::Boolean(true),
            "FALSE" => Datum::Boolean(false),
            _ => return Err(unsupported()),
        },
        (v, n) if n.is_char() => {
            let text = match v {
                Datum::String(s) => s.clone(),
                Datum::Boolean(b) => b.to_string().to_uppercase(),
                Datum::Decimal(d) => d.to_string(),
                Datum::Double(f) => f.0.to_string(),
                Datum::Date(d) => d.format("%Y-%m-%d").to_string(),
                Datum::Time(t) => t.format("%H:%M:%S").to_string(),
                Datum::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                Datum::Binary(_) | Datum::Null => return Err(unsupported()),
            };
            let limit = ty.precision() as usize;
            let mut text: String = text.chars().take(limit).collect();
            if n == SqlTypeName::Char {
                while text.chars().count() < limit {
                    text.push(' ');
                }
            }
            Datum::String(text)
        }
        (Datum::Date(d), SqlTypeName::Timestamp) => Datum::Timestamp(d.and_time(NaiveTime::MIN)),
        (v, _) if ty.family() == datum_family(v) => v.clone(),
        _ => return Err(unsupported()),
    })
}

fn datum_family(value: &Datum) -> Option<SqlTypeFamily> {
    Some(match value {
        Datum::Boolean(_) => SqlTypeFamily::Boolean,
        Datum::Decimal(_) | Datum::Double(_) => SqlTypeFamily::Numeric,
        Datum::String(_) => SqlTypeFamily::Character,
        Datum::Binary(_) => SqlTypeFamily::Binary,
        Datum::Date(_) => SqlTypeFamily::Date,
        Datum::Time(_) => SqlTypeFamily::Time,
        Datum::Timestamp(_) => SqlTypeFamily::Timestamp,
        Datum::Null => return None,
    })
}

fn like(args: &[Datum]) -> RelOptResult<Datum> {
    if args.iter().any(Datum::is_null) {
        return Ok(Datum::Null);
    }
    let text = |d: &Datum| match d {
        Datum::String(s) => Some(s.clone()),
        _ => None,
    };
    let unsupported = || RelOptError::Unsupported(format!("LIKE on {:?}", args));
    let value = text(&args[0]).ok_or_else(unsupported)?;
    let pattern = text(&args[1]).ok_or_else(unsupported)?;
    let escape = match args.get(2) {
        Some(e) => text(e).and_then(|s| s.chars().next()),
        None => None,
    };
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    Ok(Datum::Boolean(like_match(&value, &pattern, escape)))
}

fn like_match(value: &[char], pattern: &[char], escape: Option<char>) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some((&c, rest)) if Some(c) == escape => match rest.split_first() {
            Some((&lit, rest)) => {
                value.first() == Some(&lit) && like_match(&value[1..], rest, escape)
            }
            None => false,
        },
        Some(('%', rest)) => (0..=value.len()).any(|i| like_match(&value[i..], rest, escape)),
        Some(('_', rest)) => !value.is_empty() && like_match(&value[1..], rest, escape),
        Some((c, rest)) => value.first() == Some(c) && like_match(&value[1..], rest, escape),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rex::RexBuilder;
    use std::str::FromStr;

    fn dec(s: &str) -> Datum {
        Datum::Decimal(BigDecimal::from_str(s).unwrap())
    }

    #[test]
    fn test_three_valued_logic() {
        let rex = RexBuilder::default();
        let b = rex.type_factory().create_type_with_nullability(
            &rex.type_factory().create_sql_type(SqlTypeName::Boolean),
            true,
        );
        let and = rex.make_call(&STD.and, vec![rex.make_input_ref(b.clone(), 0), rex.make_input_ref(b.clone(), 1)]);
        let or = rex.make_call(&STD.or, vec![rex.make_input_ref(b.clone(), 0), rex.make_input_ref(b, 1)]);
        let row = [Datum::Null, Datum::Boolean(false)];
        assert_eq!(eval(&and, &row).unwrap(), Datum::Boolean(false));
        assert_eq!(eval(&or, &row).unwrap(), Datum::Null);
        let row = [Datum::Null, Datum::Boolean(true)];
        assert_eq!(eval(&or, &row).unwrap(), Datum::Boolean(true));
        assert!(!eval_condition(&and, &row).unwrap());
    }

    #[test]
    fn test_arithmetic_follows_result_type() {
        let rex = RexBuilder::default();
        let int = rex.type_factory().create_sql_type(SqlTypeName::Integer);
        let div = rex.make_call(&STD.divide, vec![rex.make_input_ref(int, 0), rex.make_exact_literal(2)]);
        assert_eq!(eval(&div, &[Datum::int(7)]).unwrap(), Datum::int(3));
        assert_eq!(eval(&div, &[Datum::Null]).unwrap(), Datum::Null);

        let dec_ty = rex
            .type_factory()
            .create_sql_type_with_scale(SqlTypeName::Decimal, 5, 2);
        let sum = rex.make_call(
            &STD.plus,
            vec![rex.make_input_ref(dec_ty, 0), rex.make_exact_literal(1)],
        );
        assert_eq!(eval(&sum, &[dec("1.25")]).unwrap(), dec("2.25"));
    }

    #[test]
    fn test_division_by_zero_is_reported() {
        let rex = RexBuilder::default();
        let div = rex.make_call(&STD.divide, vec![rex.make_exact_literal(1), rex.make_exact_literal(0)]);
        assert!(matches!(eval(&div, &[]), Err(RelOptError::Unsupported(_))));
    }

    #[test]
    fn test_case_and_null_tests() {
        let rex = RexBuilder::default();
        let tf = rex.type_factory();
        let int = tf.create_type_with_nullability(&tf.create_sql_type(SqlTypeName::Integer), true);
        let x = rex.make_input_ref(int, 0);
        let is_null = rex.make_call(&STD.is_null, vec![x.clone()]);
        let case = rex.make_call(&STD.case, vec![is_null, rex.make_exact_literal(0), x.clone()]);
        assert_eq!(eval(&case, &[Datum::Null]).unwrap(), Datum::int(0));
        assert_eq!(eval(&case, &[Datum::int(9)]).unwrap(), Datum::int(9));

        let distinct = rex.make_call(&STD.is_distinct_from, vec![x.clone(), rex.make_null_literal(SqlTypeName::Integer)]);
        assert_eq!(eval(&distinct, &[Datum::Null]).unwrap(), Datum::Boolean(false));
        assert_eq!(eval(&distinct, &[Datum::int(1)]).unwrap(), Datum::Boolean(true));
    }

    #[test]
    fn test_strings() {
        let rex = RexBuilder::default();
        let cat = rex.make_call(&STD.concat, vec![rex.make_char_literal("ab"), rex.make_char_literal("cd")]);
        assert_eq!(eval(&cat, &[]).unwrap(), Datum::string("abcd"));
        let upper = rex.make_call(&STD.upper, vec![cat]);
        assert_eq!(eval(&upper, &[]).unwrap(), Datum::string("ABCD"));
        let like = rex.make_call(&STD.like, vec![rex.make_char_literal("abcd"), rex.make_char_literal("a_c%")]);
        assert_eq!(eval(&like, &[]).unwrap(), Datum::Boolean(true));
        let like = rex.make_call(&STD.like, vec![rex.make_char_literal("abcd"), rex.make_char_literal("b%")]);
        assert_eq!(eval(&like, &[]).unwrap(), Datum::Boolean(false));
    }

    #[test]
    fn test_cast() {
        let rex = RexBuilder::default();
        let tf = rex.type_factory();
        let to_int = rex.make_cast(tf.create_sql_type(SqlTypeName::Integer), rex.make_char_literal(" 42 "));
        assert_eq!(eval(&to_int, &[]).unwrap(), Datum::int(42));
        let to_char = rex.make_cast(tf.create_sql_type_with_precision(SqlTypeName::Varchar, 10), rex.make_exact_literal(7));
        assert_eq!(eval(&to_char, &[]).unwrap(), Datum::string("7"));
    }
}
