//! Return-type and operand-type inference strategies.

use crate::error::{RelOptError, RelOptResult};
use crate::types::{
    RelDataType, SqlCollation, SqlTypeFamily, SqlTypeName, TypeFactory, TypeKind,
    MAX_NUMERIC_PRECISION, MAX_NUMERIC_SCALE,
};

use super::CallBinding;

/// A post-processing step applied to an inferred type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTransform {
    /// Nullable if any operand is nullable.
    ToNullable,
    /// Always nullable.
    ForceNullable,
    /// `CHAR` becomes `VARCHAR` and `BINARY` becomes `VARBINARY`.
    ToVarying,
    /// The element type of a multiset.
    ToMultisetElementType,
    /// The type of the only field of a single-field record (inside a multiset if given one).
    OnlyColumn,
}

impl TypeTransform {
    pub fn transform(&self, binding: &CallBinding<'_>, ty: RelDataType) -> RelDataType {
        let tf = binding.type_factory();
        match self {
            TypeTransform::ToNullable => {
                if binding.operand_types().iter().any(|t| t.is_nullable()) {
                    tf.create_type_with_nullability(&ty, true)
                } else {
                    ty
                }
            }
            TypeTransform::ForceNullable => tf.create_type_with_nullability(&ty, true),
            TypeTransform::ToVarying => to_varying(&ty),
            TypeTransform::ToMultisetElementType => match ty.component_type() {
                Some(elem) => elem.clone(),
                None => panic!("expected a multiset, got {:?}", ty),
            },
            TypeTransform::OnlyColumn => {
                if let Some(elem) = ty.component_type() {
                    if elem.is_struct() && elem.field_count() == 1 {
                        return tf.create_multiset_type(elem.fields()[0].ty.clone());
                    }
                    return ty;
                }
                if ty.is_struct() && ty.field_count() == 1 {
                    return ty.fields()[0].ty.clone();
                }
                ty
            }
        }
    }
}

fn to_varying(ty: &RelDataType) -> RelDataType {
    match ty.kind() {
        TypeKind::Basic {
            name,
            precision,
            scale,
            charset,
        } => {
            let varying = match name {
                SqlTypeName::Char => SqlTypeName::Varchar,
                SqlTypeName::Binary => SqlTypeName::Varbinary,
                _ => return ty.clone(),
            };
            RelDataType::build(
                TypeKind::Basic {
                    name: varying,
                    precision: *precision,
                    scale: *scale,
                    charset: charset.clone(),
                },
                ty.is_nullable(),
            )
        }
        _ => ty.clone(),
    }
}

/// Strategy for computing the result type of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnTypeInference {
    /// A fixed NOT NULL type.
    Explicit {
        name: SqlTypeName,
        precision: Option<u32>,
    },
    /// The type of operand `i`.
    OrdinalArg(usize),
    /// The type of operand `ordinal` if it belongs to `family`.
    MatchArg {
        ordinal: usize,
        family: SqlTypeFamily,
    },
    LeastRestrictive,
    /// Decimal `x` with its scale dropped.
    DecimalNoScale,
    DecimalProduct,
    DecimalQuotient,
    DecimalSum,
    /// Concatenation of two strings: precisions add.
    DyadicStringSumPrecision,
    /// Multiset of the least restrictive element type.
    Multiset,
    MultisetFirstColumnMultiset,
    MultisetRecordMultiset,
    /// Least restrictive type of the `THEN` and `ELSE` branches of `CASE`.
    CaseResult,
    /// A record whose fields are the operand types.
    Row,
    /// Supplied by the caller; `CAST` knows its target type up front.
    Deferred,
    /// The first rule that yields a type.
    Chain(Vec<ReturnTypeInference>),
    /// A rule whose result passes through transforms in order.
    Cascade(Box<ReturnTypeInference>, Vec<TypeTransform>),
}

impl ReturnTypeInference {
    fn explicit(name: SqlTypeName) -> Self {
        ReturnTypeInference::Explicit {
            name,
            precision: None,
        }
    }

    fn cascade(rule: ReturnTypeInference, transforms: &[TypeTransform]) -> Self {
        ReturnTypeInference::Cascade(Box::new(rule), transforms.to_vec())
    }

    pub fn first_arg_type() -> Self {
        ReturnTypeInference::OrdinalArg(0)
    }

    pub fn first_arg_type_force_nullable() -> Self {
        Self::cascade(Self::first_arg_type(), &[TypeTransform::ForceNullable])
    }

    pub fn nullable_first_arg_type() -> Self {
        Self::cascade(Self::first_arg_type(), &[TypeTransform::ToNullable])
    }

    pub fn nullable_varying_first_arg_type() -> Self {
        Self::cascade(
            Self::first_arg_type(),
            &[TypeTransform::ToNullable, TypeTransform::ToVarying],
        )
    }

    pub fn first_interval() -> Self {
        ReturnTypeInference::MatchArg {
            ordinal: 0,
            family: SqlTypeFamily::DatetimeInterval,
        }
    }

    pub fn nullable_first_interval() -> Self {
        Self::cascade(Self::first_interval(), &[TypeTransform::ToNullable])
    }

    pub fn second_arg_type() -> Self {
        ReturnTypeInference::OrdinalArg(1)
    }

    pub fn nullable_second_arg_type() -> Self {
        Self::cascade(Self::second_arg_type(), &[TypeTransform::ToNullable])
    }

    pub fn third_arg_type() -> Self {
        ReturnTypeInference::OrdinalArg(2)
    }

    pub fn boolean() -> Self {
        Self::explicit(SqlTypeName::Boolean)
    }

    pub fn nullable_boolean() -> Self {
        Self::cascade(Self::boolean(), &[TypeTransform::ToNullable])
    }

    pub fn date() -> Self {
        Self::explicit(SqlTypeName::Date)
    }

    pub fn time() -> Self {
        ReturnTypeInference::Explicit {
            name: SqlTypeName::Time,
            precision: Some(0),
        }
    }

    pub fn nullable_time() -> Self {
        Self::cascade(Self::time(), &[TypeTransform::ToNullable])
    }

    pub fn double() -> Self {
        Self::explicit(SqlTypeName::Double)
    }

    pub fn nullable_double() -> Self {
        Self::cascade(Self::double(), &[TypeTransform::ToNullable])
    }

    pub fn integer() -> Self {
        Self::explicit(SqlTypeName::Integer)
    }

    pub fn nullable_integer() -> Self {
        Self::cascade(Self::integer(), &[TypeTransform::ToNullable])
    }

    pub fn bigint() -> Self {
        Self::explicit(SqlTypeName::Bigint)
    }

    pub fn varchar_2000() -> Self {
        ReturnTypeInference::Explicit {
            name: SqlTypeName::Varchar,
            precision: Some(2000),
        }
    }

    pub fn cursor() -> Self {
        Self::explicit(SqlTypeName::Cursor)
    }

    pub fn first_arg_type_or_exact_no_scale() -> Self {
        ReturnTypeInference::Chain(vec![
            ReturnTypeInference::DecimalNoScale,
            Self::first_arg_type(),
        ])
    }

    pub fn nullable_decimal_product() -> Self {
        Self::cascade(ReturnTypeInference::DecimalProduct, &[TypeTransform::ToNullable])
    }

    /// Decimal product, else interval times number, else least restrictive.
    pub fn nullable_product() -> Self {
        ReturnTypeInference::Chain(vec![
            Self::nullable_decimal_product(),
            Self::nullable_first_interval(),
            ReturnTypeInference::LeastRestrictive,
        ])
    }

    pub fn nullable_decimal_quotient() -> Self {
        Self::cascade(ReturnTypeInference::DecimalQuotient, &[TypeTransform::ToNullable])
    }

    pub fn nullable_quotient() -> Self {
        ReturnTypeInference::Chain(vec![
            Self::nullable_decimal_quotient(),
            Self::nullable_first_interval(),
            ReturnTypeInference::LeastRestrictive,
        ])
    }

    pub fn nullable_decimal_sum() -> Self {
        Self::cascade(ReturnTypeInference::DecimalSum, &[TypeTransform::ToNullable])
    }

    pub fn nullable_sum() -> Self {
        ReturnTypeInference::Chain(vec![
            Self::nullable_decimal_sum(),
            ReturnTypeInference::LeastRestrictive,
        ])
    }

    pub fn nullable_dyadic_string_sum_precision() -> Self {
        Self::cascade(
            ReturnTypeInference::DyadicStringSumPrecision,
            &[TypeTransform::ToNullable],
        )
    }

    pub fn nullable_varying_dyadic_string_sum_precision() -> Self {
        Self::cascade(
            ReturnTypeInference::DyadicStringSumPrecision,
            &[TypeTransform::ToNullable, TypeTransform::ToVarying],
        )
    }

    pub fn multiset_only_column() -> Self {
        Self::cascade(ReturnTypeInference::Multiset, &[TypeTransform::OnlyColumn])
    }

    pub fn nullable_multiset() -> Self {
        Self::cascade(ReturnTypeInference::Multiset, &[TypeTransform::ToNullable])
    }

    pub fn nullable_multiset_element_type() -> Self {
        Self::cascade(
            ReturnTypeInference::Multiset,
            &[TypeTransform::ToMultisetElementType, TypeTransform::ToNullable],
        )
    }

    /// Infer the result type, or `None` if this rule does not apply to these operands.
    pub fn infer(&self, binding: &CallBinding<'_>) -> RelOptResult<Option<RelDataType>> {
        let tf = binding.type_factory();
        Ok(match self {
            ReturnTypeInference::Explicit { name, precision } => Some(match precision {
                Some(p) => tf.create_sql_type_with_precision(*name, *p),
                None => tf.create_sql_type(*name),
            }),
            ReturnTypeInference::OrdinalArg(i) => binding.operand_types().get(*i).cloned(),
            ReturnTypeInference::MatchArg { ordinal, family } => binding
                .operand_types()
                .get(*ordinal)
                .filter(|t| family.contains(t.sql_type_name()))
                .cloned(),
            ReturnTypeInference::LeastRestrictive => {
                if binding.operand_count() == 0 {
                    None
                } else {
                    tf.least_restrictive(binding.operand_types())
                }
            }
            ReturnTypeInference::DecimalNoScale => {
                let ty = binding.operand_type(0);
                if !ty.is_decimal() {
                    return Ok(None);
                }
                if ty.scale_or_zero() == 0 {
                    return Ok(Some(ty.clone()));
                }
                let ret = tf.create_sql_type_with_scale(SqlTypeName::Decimal, ty.precision(), 0);
                Some(tf.create_type_with_nullability(&ret, ty.is_nullable()))
            }
            ReturnTypeInference::DecimalProduct => {
                decimal_operands(binding).map(|(t1, t2)| {
                    let scale = (t1.scale_or_zero() + t2.scale_or_zero()).min(MAX_NUMERIC_SCALE);
                    let precision = (t1.precision() + t2.precision()).min(MAX_NUMERIC_PRECISION);
                    tf.create_sql_type_with_scale(SqlTypeName::Decimal, precision, scale)
                })
            }
            ReturnTypeInference::DecimalQuotient => decimal_operands(binding).map(|(t1, t2)| {
                let (p1, s1) = (t1.precision() as i64, t1.scale_or_zero() as i64);
                let (p2, s2) = (t2.precision() as i64, t2.scale_or_zero() as i64);
                let max_p = MAX_NUMERIC_PRECISION as i64;
                let dout = (p1 - s1 + s2).min(max_p);
                let scale = 6i64
                    .max(s1 + p2 + 1)
                    .min(max_p - dout)
                    .min(MAX_NUMERIC_SCALE as i64);
                let precision = dout + scale;
                assert!(precision > 0 && precision <= max_p, "quotient precision {precision}");
                tf.create_sql_type_with_scale(SqlTypeName::Decimal, precision as u32, scale as u32)
            }),
            ReturnTypeInference::DecimalSum => decimal_operands(binding).map(|(t1, t2)| {
                let (p1, s1) = (t1.precision(), t1.scale_or_zero());
                let (p2, s2) = (t2.precision(), t2.scale_or_zero());
                let scale = s1.max(s2);
                assert!(scale <= MAX_NUMERIC_SCALE);
                let precision = ((p1 - s1).max(p2 - s2) + scale + 1).min(MAX_NUMERIC_PRECISION);
                tf.create_sql_type_with_scale(SqlTypeName::Decimal, precision, scale)
            }),
            ReturnTypeInference::DyadicStringSumPrecision => Some(dyadic_string_sum(binding)?),
            ReturnTypeInference::Multiset => {
                let elements: Option<Vec<RelDataType>> = binding
                    .operand_types()
                    .iter()
                    .map(|t| multiset_component(t).cloned())
                    .collect();
                match elements {
                    Some(elements) if !elements.is_empty() => tf
                        .least_restrictive(&elements)
                        .map(|elem| tf.create_multiset_type(elem)),
                    _ => None,
                }
            }
            ReturnTypeInference::MultisetFirstColumnMultiset => {
                ReturnTypeInference::Multiset.infer(binding)?.map(|ms| {
                    let elem = ms.component_type().cloned().unwrap_or(ms);
                    let elem = if elem.is_struct() {
                        elem.fields()[0].ty.clone()
                    } else {
                        elem
                    };
                    tf.create_multiset_type(elem)
                })
            }
            ReturnTypeInference::MultisetRecordMultiset => {
                ReturnTypeInference::Multiset.infer(binding)?.map(|ms| {
                    let elem = ms.component_type().cloned().unwrap_or(ms);
                    tf.create_multiset_type(tf.create_struct_type(vec![("EXPR$0".to_string(), elem)]))
                })
            }
            ReturnTypeInference::CaseResult => {
                let n = binding.operand_count();
                let branches: Vec<RelDataType> = binding
                    .operand_types()
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % 2 == 1 || *i == n - 1)
                    .map(|(_, t)| t.clone())
                    .collect();
                if branches.is_empty() {
                    None
                } else {
                    tf.least_restrictive(&branches)
                }
            }
            ReturnTypeInference::Row => Some(
                tf.create_struct_type(
                    binding
                        .operand_types()
                        .iter()
                        .enumerate()
                        .map(|(i, t)| (format!("EXPR${}", i), t.clone()))
                        .collect(),
                ),
            ),
            ReturnTypeInference::Deferred => None,
            ReturnTypeInference::Chain(rules) => {
                for rule in rules {
                    if let Some(ty) = rule.infer(binding)? {
                        return Ok(Some(ty));
                    }
                }
                None
            }
            ReturnTypeInference::Cascade(rule, transforms) => {
                let Some(mut ty) = rule.infer(binding)? else {
                    return Ok(None);
                };
                for transform in transforms {
                    ty = transform.transform(binding, ty);
                }
                Some(ty)
            }
        })
    }
}

/// The first two operand types, if both are exact numerics and at least one is a decimal.
fn decimal_operands<'b>(binding: &'b CallBinding<'_>) -> Option<(&'b RelDataType, &'b RelDataType)> {
    if binding.operand_count() < 2 {
        return None;
    }
    let (t1, t2) = (binding.operand_type(0), binding.operand_type(1));
    (t1.is_exact_numeric() && t2.is_exact_numeric() && (t1.is_decimal() || t2.is_decimal()))
        .then_some((t1, t2))
}

fn multiset_component(ty: &RelDataType) -> Option<&RelDataType> {
    if let Some(elem) = ty.component_type() {
        return Some(elem);
    }
    if ty.is_struct() && ty.field_count() == 1 {
        return ty.fields()[0].ty.component_type();
    }
    None
}

fn dyadic_string_sum(binding: &CallBinding<'_>) -> RelOptResult<RelDataType> {
    let tf = binding.type_factory();
    let t0 = binding.operand_type(0);
    let t1 = binding.operand_type(1);
    if !(t0.in_char_or_binary_families() && t1.in_char_or_binary_families()) {
        assert_eq!(
            t0.sql_type_name(),
            t1.sql_type_name(),
            "string sum of differently named types"
        );
    }
    let mut picked: Option<SqlCollation> = None;
    if t0.is_char() {
        if !(t1.is_char() && t0.charset() == t1.charset()) {
            return Err(RelOptError::TypeNotComparable(
                t0.full_type_string().to_string(),
                t1.full_type_string().to_string(),
            ));
        }
        let (Some(c0), Some(c1)) = (t0.collation(), t1.collation()) else {
            panic!("character types without collation: {:?}, {:?}", t0, t1);
        };
        picked = Some(SqlCollation::dyadic(c0, c1).ok_or_else(|| {
            RelOptError::DifferentCollations(c0.name.clone(), c1.name.clone())
        })?);
    }

    let type_name = if t1.sql_type_name().is_bounded_varying() {
        t1.sql_type_name()
    } else {
        t0.sql_type_name()
    };
    let ret = tf.create_sql_type_with_precision(type_name, t0.precision() + t1.precision());
    let Some(collation) = picked else {
        return Ok(ret);
    };
    let source = if t1.collation() == Some(&collation) && t0.collation() != Some(&collation) {
        t1
    } else {
        t0
    };
    let charset = source.charset().unwrap_or(&tf.default_charset).to_string();
    Ok(tf.create_type_with_charset_and_collation(&ret, &charset, collation))
}

/// Strategy for typing operands whose type is unknown, such as a bare `NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandTypeInference {
    /// Every operand takes the type of the first operand with a known type.
    FirstKnown,
    /// Operands take the call's return type, field by field for a record.
    ReturnType,
    /// Every operand is `BOOLEAN`.
    Boolean,
}

impl OperandTypeInference {
    /// Fill `operand_types` in place. `return_type` is only consulted by [`OperandTypeInference::ReturnType`].
    pub fn infer(
        &self,
        tf: &TypeFactory,
        return_type: Option<&RelDataType>,
        operand_types: &mut [RelDataType],
    ) {
        match self {
            OperandTypeInference::FirstKnown => {
                let known = operand_types
                    .iter()
                    .find(|t| t.sql_type_name() != SqlTypeName::Null)
                    .cloned();
                if let Some(known) = known {
                    for ty in operand_types.iter_mut() {
                        *ty = known.clone();
                    }
                }
            }
            OperandTypeInference::ReturnType => {
                let Some(ret) = return_type else {
                    return;
                };
                for (i, ty) in operand_types.iter_mut().enumerate() {
                    *ty = if ret.is_struct() {
                        ret.fields()[i].ty.clone()
                    } else {
                        ret.clone()
                    };
                }
            }
            OperandTypeInference::Boolean => {
                let boolean = tf.create_sql_type(SqlTypeName::Boolean);
                for ty in operand_types.iter_mut() {
                    *ty = boolean.clone();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rex::STD;
    use crate::types::{Coercibility, IntervalQualifier, TimeUnit};

    fn infer(rule: &ReturnTypeInference, types: Vec<RelDataType>) -> Option<RelDataType> {
        let tf = TypeFactory::new();
        let binding = CallBinding::with_types(&tf, &STD.plus, types);
        rule.infer(&binding).unwrap()
    }

    fn decimal(p: u32, s: u32) -> RelDataType {
        TypeFactory::new().create_sql_type_with_scale(SqlTypeName::Decimal, p, s)
    }

    fn sql(name: SqlTypeName) -> RelDataType {
        TypeFactory::new().create_sql_type(name)
    }

    #[test]
    fn test_decimal_product() {
        let ty = infer(&ReturnTypeInference::DecimalProduct, vec![decimal(5, 2), decimal(4, 3)]).unwrap();
        assert_eq!(ty.full_type_string(), "DECIMAL(9, 5) NOT NULL");
        // capped at the maximum precision
        let ty = infer(&ReturnTypeInference::DecimalProduct, vec![decimal(15, 2), sql(SqlTypeName::Integer)]).unwrap();
        assert_eq!(ty.full_type_string(), "DECIMAL(19, 2) NOT NULL");
        assert_eq!(
            infer(&ReturnTypeInference::DecimalProduct, vec![sql(SqlTypeName::Integer), sql(SqlTypeName::Integer)]),
            None
        );
    }

    #[test]
    fn test_decimal_quotient() {
        // dout = 5 - 2 + 0 = 3, scale = max(6, 2 + 10 + 1) = 13
        let ty = infer(&ReturnTypeInference::DecimalQuotient, vec![decimal(5, 2), sql(SqlTypeName::Integer)]).unwrap();
        assert_eq!(ty.full_type_string(), "DECIMAL(16, 13) NOT NULL");
    }

    #[test]
    fn test_decimal_sum() {
        let ty = infer(&ReturnTypeInference::DecimalSum, vec![decimal(5, 2), decimal(7, 4)]).unwrap();
        assert_eq!(ty.full_type_string(), "DECIMAL(8, 4) NOT NULL");
        let ty = infer(&ReturnTypeInference::DecimalSum, vec![decimal(19, 2), decimal(7, 4)]).unwrap();
        assert_eq!(ty.precision(), 19);
    }

    #[test]
    fn test_nullable_sum_falls_back_to_least_restrictive() {
        let tf = TypeFactory::new();
        let nullable_int = tf.create_type_with_nullability(&sql(SqlTypeName::Integer), true);
        let ty = infer(&ReturnTypeInference::nullable_sum(), vec![sql(SqlTypeName::Integer), nullable_int]).unwrap();
        assert_eq!(ty.full_type_string(), "INTEGER");

        let nullable_dec = tf.create_type_with_nullability(&decimal(5, 2), true);
        let ty = infer(&ReturnTypeInference::nullable_sum(), vec![nullable_dec, sql(SqlTypeName::Integer)]).unwrap();
        assert_eq!(ty.full_type_string(), "DECIMAL(13, 2)");
    }

    #[test]
    fn test_decimal_no_scale() {
        let ty = infer(&ReturnTypeInference::DecimalNoScale, vec![decimal(7, 3)]).unwrap();
        assert_eq!(ty.full_type_string(), "DECIMAL(7, 0) NOT NULL");
        let ty = infer(&ReturnTypeInference::first_arg_type_or_exact_no_scale(), vec![sql(SqlTypeName::Double)]).unwrap();
        assert_eq!(ty, sql(SqlTypeName::Double));
    }

    #[test]
    fn test_product_of_interval_and_number() {
        let tf = TypeFactory::new();
        let interval = tf.create_interval_type(IntervalQualifier::new(TimeUnit::Day, None));
        let ty = infer(&ReturnTypeInference::nullable_product(), vec![interval.clone(), sql(SqlTypeName::Integer)]).unwrap();
        assert_eq!(ty, interval);
    }

    #[test]
    fn test_dyadic_string_sum() {
        let tf = TypeFactory::new();
        let c3 = tf.create_sql_type_with_precision(SqlTypeName::Char, 3);
        let v5 = tf.create_sql_type_with_precision(SqlTypeName::Varchar, 5);
        let ty = infer(&ReturnTypeInference::DyadicStringSumPrecision, vec![c3.clone(), v5]).unwrap();
        assert_eq!(ty.sql_type_name(), SqlTypeName::Varchar);
        assert_eq!(ty.precision(), 8);

        let ty = infer(&ReturnTypeInference::nullable_varying_dyadic_string_sum_precision(), vec![c3.clone(), c3.clone()]).unwrap();
        assert_eq!(ty.to_string(), "VARCHAR(6)");

        let explicit = tf.create_type_with_charset_and_collation(
            &c3,
            "ISO-8859-1",
            SqlCollation::new("x", Coercibility::Explicit),
        );
        let ty = infer(&ReturnTypeInference::DyadicStringSumPrecision, vec![c3.clone(), explicit]).unwrap();
        assert_eq!(ty.collation().unwrap().name, "x");
    }

    #[test]
    fn test_dyadic_string_sum_rejects_mixed_charsets() {
        let tf = TypeFactory::new();
        let c3 = tf.create_sql_type_with_precision(SqlTypeName::Char, 3);
        let utf = tf.create_type_with_charset_and_collation(&c3, "UTF16", SqlCollation::coercible());
        let binding = CallBinding::with_types(&tf, &STD.concat, vec![c3, utf]);
        assert!(matches!(
            ReturnTypeInference::DyadicStringSumPrecision.infer(&binding),
            Err(RelOptError::TypeNotComparable(_, _))
        ));
    }

    #[test]
    fn test_multiset_inference() {
        let tf = TypeFactory::new();
        let ints = tf.create_multiset_type(sql(SqlTypeName::Integer));
        let ty = infer(&ReturnTypeInference::nullable_multiset_element_type(), vec![ints.clone()]).unwrap();
        assert_eq!(ty, sql(SqlTypeName::Integer));
        let ty = infer(&ReturnTypeInference::MultisetRecordMultiset, vec![ints.clone()]).unwrap();
        assert_eq!(ty.to_string(), "RecordType(INTEGER EXPR$0) MULTISET");
        let ty = infer(&ReturnTypeInference::multiset_only_column(), vec![ty]).unwrap();
        assert_eq!(ty, ints);
    }

    #[test]
    fn test_case_result_uses_branches_only() {
        let tf = TypeFactory::new();
        let when = sql(SqlTypeName::Boolean);
        let then = sql(SqlTypeName::Integer);
        let otherwise = tf.create_type_with_nullability(&sql(SqlTypeName::Bigint), true);
        let ty = infer(&ReturnTypeInference::CaseResult, vec![when, then, otherwise]).unwrap();
        assert_eq!(ty.full_type_string(), "BIGINT");
    }

    #[test]
    fn test_operand_inference() {
        let tf = TypeFactory::new();
        let null = tf.create_type_with_nullability(&tf.create_sql_type(SqlTypeName::Null), true);
        let mut types = vec![null.clone(), sql(SqlTypeName::Date)];
        OperandTypeInference::FirstKnown.infer(&tf, None, &mut types);
        assert_eq!(types, vec![sql(SqlTypeName::Date), sql(SqlTypeName::Date)]);

        let mut types = vec![null];
        OperandTypeInference::Boolean.infer(&tf, None, &mut types);
        assert_eq!(types[0], sql(SqlTypeName::Boolean));
    }
}
