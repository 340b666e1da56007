//! Operand type checkers.
//!
//! A checker answers two questions about a call: does it have an acceptable
//! number of operands ([`OperandTypeChecker::operand_count_range`]), and are
//! the operand types acceptable ([`OperandTypeChecker::check_operand_types`]).
//! With `throw_on_failure` set, a failed check returns the most specific
//! validation error available instead of `Ok(false)`.

use std::collections::BTreeSet;

use bigdecimal::BigDecimal;

use crate::error::{RelOptError, RelOptResult};
use crate::rex::{LiteralValue, SqlOperator};
use crate::types::{Comparability, RelDataType, SqlTypeFamily, SqlTypeName};

use super::{aliased_signature, CallBinding};

/// The operand counts a checker accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandCountRange {
    Variadic,
    /// Sorted, deduplicated list of allowed counts.
    Allowed(Vec<usize>),
}

impl OperandCountRange {
    pub fn fixed(n: usize) -> Self {
        OperandCountRange::Allowed(vec![n])
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, OperandCountRange::Variadic)
    }

    pub fn contains(&self, n: usize) -> bool {
        match self {
            OperandCountRange::Variadic => true,
            OperandCountRange::Allowed(counts) => counts.contains(&n),
        }
    }

    /// Human-readable list of allowed counts, e.g. `2 or 3`.
    pub fn describe(&self) -> String {
        match self {
            OperandCountRange::Variadic => "any number of".to_string(),
            OperandCountRange::Allowed(counts) => counts
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Composition {
    /// Every rule must pass.
    And,
    /// At least one rule must pass.
    Or,
    /// Rule `i` checks operand `i` alone; the operand count must equal the rule count.
    Sequence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandTypeChecker {
    /// Operand `i` must belong to family `i`; the count must match exactly.
    Family(Vec<SqlTypeFamily>),
    /// Any number of operands of any type.
    Variadic,
    /// A single literal operand, possibly wrapped in a cast.
    Literal { allow_null: bool },
    /// A single non-negative integral literal.
    PositiveIntegerLiteral,
    /// `n` operands of mutually comparable types.
    SameOperandTypes(usize),
    /// `n` operands of mutually comparable types that support at least the given comparisons.
    Comparable {
        count: usize,
        comparability: Comparability,
    },
    Composite {
        composition: Composition,
        rules: Vec<OperandTypeChecker>,
    },
    /// A single record operand whose only field is a multiset.
    RecordMultiset,
    /// Two multisets whose element types have a least restrictive type.
    MultisetPair,
}

impl OperandTypeChecker {
    // ------------------------------------------------------------------
    // Constructors for the standard checkers
    // ------------------------------------------------------------------

    pub fn and(rules: Vec<OperandTypeChecker>) -> Self {
        OperandTypeChecker::Composite {
            composition: Composition::And,
            rules,
        }
    }

    pub fn or(rules: Vec<OperandTypeChecker>) -> Self {
        OperandTypeChecker::Composite {
            composition: Composition::Or,
            rules,
        }
    }

    pub fn sequence(rules: Vec<OperandTypeChecker>) -> Self {
        OperandTypeChecker::Composite {
            composition: Composition::Sequence,
            rules,
        }
    }

    pub fn family(families: &[SqlTypeFamily]) -> Self {
        OperandTypeChecker::Family(families.to_vec())
    }

    pub fn niladic() -> Self {
        Self::family(&[])
    }

    pub fn any() -> Self {
        Self::family(&[SqlTypeFamily::Any])
    }

    pub fn any_x2() -> Self {
        Self::family(&[SqlTypeFamily::Any, SqlTypeFamily::Any])
    }

    pub fn boolean() -> Self {
        Self::family(&[SqlTypeFamily::Boolean])
    }

    pub fn boolean_x2() -> Self {
        Self::family(&[SqlTypeFamily::Boolean, SqlTypeFamily::Boolean])
    }

    pub fn numeric() -> Self {
        Self::family(&[SqlTypeFamily::Numeric])
    }

    pub fn numeric_x2() -> Self {
        Self::family(&[SqlTypeFamily::Numeric, SqlTypeFamily::Numeric])
    }

    pub fn exact_numeric() -> Self {
        Self::family(&[SqlTypeFamily::ExactNumeric])
    }

    pub fn exact_numeric_x2() -> Self {
        Self::family(&[SqlTypeFamily::ExactNumeric, SqlTypeFamily::ExactNumeric])
    }

    pub fn integer() -> Self {
        Self::family(&[SqlTypeFamily::Integer])
    }

    pub fn char_string() -> Self {
        Self::family(&[SqlTypeFamily::Character])
    }

    pub fn string() -> Self {
        Self::family(&[SqlTypeFamily::String])
    }

    pub fn interval() -> Self {
        Self::family(&[SqlTypeFamily::DatetimeInterval])
    }

    pub fn multiset() -> Self {
        Self::family(&[SqlTypeFamily::Multiset])
    }

    pub fn same_x2() -> Self {
        OperandTypeChecker::SameOperandTypes(2)
    }

    pub fn same_x3() -> Self {
        OperandTypeChecker::SameOperandTypes(3)
    }

    pub fn comparable_ordered() -> Self {
        OperandTypeChecker::Comparable {
            count: 1,
            comparability: Comparability::All,
        }
    }

    pub fn comparable_ordered_x2() -> Self {
        OperandTypeChecker::Comparable {
            count: 2,
            comparability: Comparability::All,
        }
    }

    pub fn comparable_unordered_x2() -> Self {
        OperandTypeChecker::Comparable {
            count: 2,
            comparability: Comparability::Unordered,
        }
    }

    pub fn string_same_x2() -> Self {
        Self::and(vec![
            Self::family(&[SqlTypeFamily::String, SqlTypeFamily::String]),
            Self::same_x2(),
        ])
    }

    pub fn string_same_x3() -> Self {
        Self::and(vec![
            Self::family(&[SqlTypeFamily::String, SqlTypeFamily::String, SqlTypeFamily::String]),
            Self::same_x3(),
        ])
    }

    pub fn interval_same_x2() -> Self {
        Self::and(vec![
            Self::family(&[SqlTypeFamily::DatetimeInterval, SqlTypeFamily::DatetimeInterval]),
            Self::same_x2(),
        ])
    }

    pub fn datetime_interval() -> Self {
        Self::family(&[SqlTypeFamily::Datetime, SqlTypeFamily::DatetimeInterval])
    }

    pub fn interval_datetime() -> Self {
        Self::family(&[SqlTypeFamily::DatetimeInterval, SqlTypeFamily::Datetime])
    }

    pub fn interval_numeric() -> Self {
        Self::family(&[SqlTypeFamily::DatetimeInterval, SqlTypeFamily::Numeric])
    }

    pub fn numeric_interval() -> Self {
        Self::family(&[SqlTypeFamily::Numeric, SqlTypeFamily::DatetimeInterval])
    }

    pub fn numeric_or_interval() -> Self {
        Self::or(vec![Self::numeric(), Self::interval()])
    }

    pub fn plus_operator() -> Self {
        Self::or(vec![
            Self::numeric_x2(),
            Self::interval_same_x2(),
            Self::datetime_interval(),
            Self::interval_datetime(),
        ])
    }

    pub fn minus_operator() -> Self {
        Self::or(vec![
            Self::numeric_x2(),
            Self::interval_same_x2(),
            Self::datetime_interval(),
        ])
    }

    pub fn multiply_operator() -> Self {
        Self::or(vec![
            Self::numeric_x2(),
            Self::interval_numeric(),
            Self::numeric_interval(),
        ])
    }

    pub fn division_operator() -> Self {
        Self::or(vec![Self::numeric_x2(), Self::interval_numeric()])
    }

    /// `datetime - datetime` yielding an interval of the given qualifier.
    pub fn minus_date_operator() -> Self {
        Self::and(vec![
            Self::family(&[
                SqlTypeFamily::Datetime,
                SqlTypeFamily::Datetime,
                SqlTypeFamily::DatetimeInterval,
            ]),
            Self::same_x2(),
        ])
    }

    pub fn not_null_literal() -> Self {
        OperandTypeChecker::Literal { allow_null: false }
    }

    pub fn nullable_literal() -> Self {
        OperandTypeChecker::Literal { allow_null: true }
    }

    // ------------------------------------------------------------------
    // Checking
    // ------------------------------------------------------------------

    pub fn operand_count_range(&self) -> OperandCountRange {
        match self {
            OperandTypeChecker::Family(families) => OperandCountRange::fixed(families.len()),
            OperandTypeChecker::Variadic => OperandCountRange::Variadic,
            OperandTypeChecker::Literal { .. }
            | OperandTypeChecker::PositiveIntegerLiteral
            | OperandTypeChecker::RecordMultiset => OperandCountRange::fixed(1),
            OperandTypeChecker::SameOperandTypes(n)
            | OperandTypeChecker::Comparable { count: n, .. } => OperandCountRange::fixed(*n),
            OperandTypeChecker::MultisetPair => OperandCountRange::fixed(2),
            OperandTypeChecker::Composite { composition, rules } => {
                if *composition == Composition::Sequence {
                    return OperandCountRange::fixed(rules.len());
                }
                let mut counts = BTreeSet::new();
                for rule in rules {
                    match rule.operand_count_range() {
                        OperandCountRange::Variadic => return OperandCountRange::Variadic,
                        OperandCountRange::Allowed(allowed) => counts.extend(allowed),
                    }
                }
                OperandCountRange::Allowed(counts.into_iter().collect())
            }
        }
    }

    /// Check every operand of the call.
    pub fn check_operand_types(
        &self,
        binding: &CallBinding<'_>,
        throw_on_failure: bool,
    ) -> RelOptResult<bool> {
        match self {
            OperandTypeChecker::Family(families) => {
                if families.len() != binding.operand_count() {
                    // an inapplicable branch of a composite; never an error by itself
                    return Ok(false);
                }
                for i in 0..families.len() {
                    if !self.check_single_operand_type(binding, i, i, throw_on_failure)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            OperandTypeChecker::Variadic => Ok(true),
            OperandTypeChecker::Literal { .. }
            | OperandTypeChecker::PositiveIntegerLiteral
            | OperandTypeChecker::RecordMultiset => {
                self.check_single_operand_type(binding, 0, 0, throw_on_failure)
            }
            OperandTypeChecker::SameOperandTypes(n) => {
                check_same_types(binding, *n, throw_on_failure)
            }
            OperandTypeChecker::Comparable {
                count,
                comparability,
            } => {
                let mut ok = true;
                for i in 0..(*count).min(binding.operand_count()) {
                    if binding.operand_type(i).comparability() < *comparability {
                        if throw_on_failure {
                            return Err(binding.new_validation_signature_error());
                        }
                        ok = false;
                    }
                }
                if ok {
                    ok = check_same_types(binding, *count, false)?;
                }
                if !ok && throw_on_failure {
                    return Err(binding.new_validation_signature_error());
                }
                Ok(ok)
            }
            OperandTypeChecker::MultisetPair => {
                let multiset = OperandTypeChecker::multiset();
                for i in 0..2 {
                    if !multiset.check_single_operand_type(binding, i, 0, throw_on_failure)? {
                        return Ok(false);
                    }
                }
                let elements: Vec<RelDataType> = binding
                    .operand_types()
                    .iter()
                    .filter_map(|t| t.component_type().cloned())
                    .collect();
                if binding.type_factory().least_restrictive_common(&elements).is_none() {
                    if throw_on_failure {
                        return Err(RelOptError::TypeNotComparable(
                            binding.operand_type(0).to_string(),
                            binding.operand_type(1).to_string(),
                        ));
                    }
                    return Ok(false);
                }
                Ok(true)
            }
            OperandTypeChecker::Composite { composition, rules } => {
                let mut type_errors = 0;
                for (i, rule) in rules.iter().enumerate() {
                    let ok = if *composition == Composition::Sequence {
                        if i >= binding.operand_count() {
                            break;
                        }
                        rule.check_single_operand_type(binding, i, 0, false)?
                    } else {
                        rule.check_operand_types(binding, false)?
                    };
                    if !ok {
                        type_errors += 1;
                    }
                }
                let failed = match composition {
                    Composition::And | Composition::Sequence => type_errors > 0,
                    Composition::Or => type_errors == rules.len(),
                };
                if failed {
                    if throw_on_failure {
                        if *composition == Composition::Or {
                            // rerun to surface the first specific error
                            for rule in rules {
                                rule.check_operand_types(binding, true)?;
                            }
                        }
                        return Err(binding.new_validation_signature_error());
                    }
                    return Ok(false);
                }
                Ok(true)
            }
        }
    }

    /// Check operand `node` of the call against formal operand `formal`.
    pub fn check_single_operand_type(
        &self,
        binding: &CallBinding<'_>,
        node: usize,
        formal: usize,
        throw_on_failure: bool,
    ) -> RelOptResult<bool> {
        match self {
            OperandTypeChecker::Family(families) => {
                let family = families[formal];
                if family == SqlTypeFamily::Any {
                    return Ok(true);
                }
                if binding.is_operand_untyped_null(node) {
                    if throw_on_failure {
                        return Err(RelOptError::IllegalNull);
                    }
                    return Ok(false);
                }
                if !family.contains(binding.operand_type(node).sql_type_name()) {
                    if throw_on_failure {
                        return Err(binding.new_validation_signature_error());
                    }
                    return Ok(false);
                }
                Ok(true)
            }
            OperandTypeChecker::Variadic => Ok(true),
            OperandTypeChecker::Literal { allow_null } => {
                let op_name = &binding.operator().name;
                if binding.is_operand_null(node, true) {
                    if *allow_null {
                        return Ok(true);
                    }
                    if throw_on_failure {
                        return Err(RelOptError::ArgumentMustNotBeNull(op_name.clone()));
                    }
                    return Ok(false);
                }
                if !binding.is_operand_literal(node) {
                    if throw_on_failure {
                        return Err(RelOptError::ArgumentMustBeLiteral(op_name.clone()));
                    }
                    return Ok(false);
                }
                Ok(true)
            }
            OperandTypeChecker::PositiveIntegerLiteral => {
                if !OperandTypeChecker::not_null_literal().check_single_operand_type(
                    binding,
                    node,
                    formal,
                    throw_on_failure,
                )? {
                    return Ok(false);
                }
                if !OperandTypeChecker::integer().check_single_operand_type(
                    binding,
                    node,
                    0,
                    throw_on_failure,
                )? {
                    return Ok(false);
                }
                let positive_integral = match binding.operand(node).and_then(|o| o.find_value()) {
                    Some(LiteralValue::Decimal(d)) => d >= BigDecimal::from(0) && d.is_integer(),
                    _ => false,
                };
                if !positive_integral {
                    if throw_on_failure {
                        return Err(RelOptError::ArgumentMustBePositiveInteger(
                            binding.operator().name.clone(),
                        ));
                    }
                    return Ok(false);
                }
                Ok(true)
            }
            // A lone operand is trivially of the same type as itself.
            OperandTypeChecker::SameOperandTypes(_) => Ok(true),
            OperandTypeChecker::Comparable { comparability, .. } => {
                let ok = binding.operand_type(node).comparability() >= *comparability;
                if !ok && throw_on_failure {
                    return Err(binding.new_validation_signature_error());
                }
                Ok(ok)
            }
            OperandTypeChecker::RecordMultiset => {
                let ty = binding.operand_type(node);
                let valid = ty.is_struct()
                    && ty.field_count() == 1
                    && ty.fields()[0].ty.sql_type_name() == SqlTypeName::Multiset;
                if !valid {
                    if throw_on_failure {
                        return Err(binding.new_validation_signature_error());
                    }
                    return Ok(false);
                }
                Ok(true)
            }
            OperandTypeChecker::MultisetPair => OperandTypeChecker::multiset()
                .check_single_operand_type(binding, node, 0, throw_on_failure),
            OperandTypeChecker::Composite { composition, rules } => {
                if *composition == Composition::Sequence {
                    return rules[formal].check_single_operand_type(binding, node, 0, throw_on_failure);
                }
                let throw_on_and_failure = *composition == Composition::And && throw_on_failure;
                let mut type_errors = 0;
                for rule in rules {
                    if !rule.check_single_operand_type(binding, node, formal, throw_on_and_failure)? {
                        type_errors += 1;
                    }
                }
                let ok = match composition {
                    Composition::And => type_errors == 0,
                    _ => type_errors < rules.len(),
                };
                if !ok && throw_on_failure {
                    for rule in rules {
                        rule.check_single_operand_type(binding, node, formal, true)?;
                    }
                    return Err(binding.new_validation_signature_error());
                }
                Ok(ok)
            }
        }
    }

    /// Signatures this checker accepts, one per line.
    pub fn allowed_signatures(&self, op: &SqlOperator, op_name: &str) -> String {
        match self {
            OperandTypeChecker::Family(families) => {
                let labels: Vec<String> = families.iter().map(|f| f.label().to_string()).collect();
                aliased_signature(op, op_name, &labels)
            }
            OperandTypeChecker::Variadic => format!("{}(...)", op_name),
            OperandTypeChecker::Literal { .. } => "<LITERAL>".to_string(),
            OperandTypeChecker::PositiveIntegerLiteral => {
                aliased_signature(op, op_name, &["INTEGER".to_string()])
            }
            OperandTypeChecker::SameOperandTypes(n) => {
                aliased_signature(op, op_name, &vec!["EQUIVALENT_TYPE".to_string(); *n])
            }
            OperandTypeChecker::Comparable { count, .. } => {
                aliased_signature(op, op_name, &vec!["COMPARABLE_TYPE".to_string(); *count])
            }
            OperandTypeChecker::RecordMultiset => "UNNEST(<MULTISET>)".to_string(),
            OperandTypeChecker::MultisetPair => {
                aliased_signature(op, op_name, &vec!["MULTISET".to_string(); 2])
            }
            OperandTypeChecker::Composite { composition, rules } => {
                if *composition == Composition::Sequence {
                    let labels: Vec<String> = rules.iter().map(|r| r.operand_label()).collect();
                    return aliased_signature(op, op_name, &labels);
                }
                let mut ret = String::new();
                for (i, rule) in rules.iter().enumerate() {
                    if i > 0 {
                        ret.push('\n');
                    }
                    ret.push_str(&rule.allowed_signatures(op, op_name));
                    if *composition == Composition::And {
                        break;
                    }
                }
                ret
            }
        }
    }

    /// Label of a single-operand rule inside a `SEQUENCE` signature.
    fn operand_label(&self) -> String {
        match self {
            OperandTypeChecker::Family(families) if families.len() == 1 => {
                families[0].label().to_string()
            }
            OperandTypeChecker::Literal { .. } => "LITERAL".to_string(),
            OperandTypeChecker::PositiveIntegerLiteral => "INTEGER".to_string(),
            _ => "ANY".to_string(),
        }
    }
}

/// Whether values of the two types can be compared with each other.
pub fn types_comparable(left: &RelDataType, right: &RelDataType) -> bool {
    if left.is_struct() != right.is_struct() {
        return false;
    }
    if left.is_struct() {
        return left.field_count() == right.field_count()
            && left
                .fields()
                .iter()
                .zip(right.fields())
                .all(|(l, r)| types_comparable(&l.ty, &r.ty));
    }
    let unknown = |t: &RelDataType| matches!(t.sql_type_name(), SqlTypeName::Null | SqlTypeName::Any);
    if unknown(left) || unknown(right) {
        return true;
    }
    left.family() == right.family()
}

fn check_same_types(binding: &CallBinding<'_>, n: usize, throw_on_failure: bool) -> RelOptResult<bool> {
    let n = n.min(binding.operand_count());
    for i in 0..n {
        if binding.is_operand_untyped_null(i) {
            if throw_on_failure {
                return Err(RelOptError::IllegalNull);
            }
            return Ok(false);
        }
    }
    for i in 1..n {
        if !types_comparable(binding.operand_type(i), binding.operand_type(i - 1)) {
            if throw_on_failure {
                return Err(RelOptError::NeedSameTypeParameter);
            }
            return Ok(false);
        }
    }
    Ok(true)
}
