//! Operators and the standard operator table.
//!
//! An operator is a name, a syntactic form, and three typing strategies. The
//! standard table is a process-wide static; operators are handed out as
//! `Arc<SqlOperator>` so calls can share them without copying strategy trees.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use crate::error::{RelOptError, RelOptResult};
use crate::typing::{CallBinding, OperandTypeChecker, OperandTypeInference, ReturnTypeInference};
use crate::types::RelDataType;

use super::SqlKind;

/// How a call of the operator is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlSyntax {
    /// `NAME(a, b)`
    Function,
    /// `NAME` with no parentheses when it has no operands, such as `CURRENT_USER`.
    FunctionId,
    /// `a NAME b`
    Binary,
    /// `NAME a`
    Prefix,
    /// `a NAME`
    Postfix,
    /// Anything with bespoke syntax: `CASE`, `CAST`, `ROW`, ...
    Special,
}

#[derive(Debug)]
pub struct SqlOperator {
    pub name: String,
    pub kind: SqlKind,
    pub syntax: SqlSyntax,
    pub return_type: ReturnTypeInference,
    pub operand_type_inference: Option<OperandTypeInference>,
    pub operand_checker: OperandTypeChecker,
    pub is_aggregate: bool,
}

impl SqlOperator {
    pub fn new(
        name: impl Into<String>,
        kind: SqlKind,
        syntax: SqlSyntax,
        return_type: ReturnTypeInference,
        operand_checker: OperandTypeChecker,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            syntax,
            return_type,
            operand_type_inference: None,
            operand_checker,
            is_aggregate: false,
        }
    }

    pub fn with_operand_inference(mut self, inference: OperandTypeInference) -> Self {
        self.operand_type_inference = Some(inference);
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.is_aggregate = true;
        self
    }

    /// All accepted signatures, one per line.
    pub fn allowed_signatures(&self) -> String {
        self.operand_checker.allowed_signatures(self, &self.name)
    }

    /// Check operand count then operand types, returning the first validation error.
    pub fn validate_operands(&self, binding: &CallBinding<'_>) -> RelOptResult<()> {
        let range = self.operand_checker.operand_count_range();
        if !range.contains(binding.operand_count()) {
            return Err(RelOptError::WrongNumberOfArgs {
                operator: self.name.clone(),
                expected: range.describe(),
            });
        }
        self.operand_checker.check_operand_types(binding, true)?;
        Ok(())
    }

    /// Validate and infer the result type of a call of this operator.
    pub fn derive_type(&self, binding: &CallBinding<'_>) -> RelOptResult<RelDataType> {
        self.validate_operands(binding)?;
        self.infer_return_type(binding)?
            .ok_or_else(|| binding.new_validation_signature_error())
    }

    pub fn infer_return_type(&self, binding: &CallBinding<'_>) -> RelOptResult<Option<RelDataType>> {
        self.return_type.infer(binding)
    }
}

impl PartialEq for SqlOperator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind == other.kind && self.syntax == other.syntax
    }
}

impl Eq for SqlOperator {}

impl Hash for SqlOperator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.kind.hash(state);
        self.syntax.hash(state);
    }
}

impl fmt::Display for SqlOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The built-in operators.
pub struct StdOperatorTable {
    pub and: Arc<SqlOperator>,
    pub or: Arc<SqlOperator>,
    pub not: Arc<SqlOperator>,
    pub equals: Arc<SqlOperator>,
    pub not_equals: Arc<SqlOperator>,
    pub less_than: Arc<SqlOperator>,
    pub greater_than: Arc<SqlOperator>,
    pub less_than_or_equal: Arc<SqlOperator>,
    pub greater_than_or_equal: Arc<SqlOperator>,
    pub plus: Arc<SqlOperator>,
    pub minus: Arc<SqlOperator>,
    pub multiply: Arc<SqlOperator>,
    pub divide: Arc<SqlOperator>,
    pub unary_minus: Arc<SqlOperator>,
    pub unary_plus: Arc<SqlOperator>,
    pub is_null: Arc<SqlOperator>,
    pub is_not_null: Arc<SqlOperator>,
    pub is_true: Arc<SqlOperator>,
    pub is_false: Arc<SqlOperator>,
    pub is_distinct_from: Arc<SqlOperator>,
    pub is_not_distinct_from: Arc<SqlOperator>,
    pub cast: Arc<SqlOperator>,
    pub case: Arc<SqlOperator>,
    pub like: Arc<SqlOperator>,
    pub concat: Arc<SqlOperator>,
    pub upper: Arc<SqlOperator>,
    pub lower: Arc<SqlOperator>,
    pub abs: Arc<SqlOperator>,
    pub mod_fn: Arc<SqlOperator>,
    pub row: Arc<SqlOperator>,
    pub current_user: Arc<SqlOperator>,
    pub element: Arc<SqlOperator>,
    pub multiset_union: Arc<SqlOperator>,
    pub slice: Arc<SqlOperator>,
    pub count: Arc<SqlOperator>,
    pub sum: Arc<SqlOperator>,
    pub avg: Arc<SqlOperator>,
    pub min: Arc<SqlOperator>,
    pub max: Arc<SqlOperator>,
    by_name: HashMap<String, Vec<Arc<SqlOperator>>>,
}

pub static STD: LazyLock<StdOperatorTable> = LazyLock::new(StdOperatorTable::new);

impl StdOperatorTable {
    fn new() -> Self {
        use OperandTypeChecker as C;
        use ReturnTypeInference as R;
        use SqlKind as K;
        use SqlSyntax as S;

        let op = |name: &str,
                  kind: SqlKind,
                  syntax: SqlSyntax,
                  ret: ReturnTypeInference,
                  checker: OperandTypeChecker| {
            Arc::new(SqlOperator::new(name, kind, syntax, ret, checker))
        };
        let binary = |name: &str, kind: SqlKind, ret: ReturnTypeInference, checker: OperandTypeChecker| {
            op(name, kind, S::Binary, ret, checker)
        };
        let comparison = |name: &str, kind: SqlKind, checker: OperandTypeChecker| {
            Arc::new(
                SqlOperator::new(name, kind, S::Binary, R::nullable_boolean(), checker)
                    .with_operand_inference(OperandTypeInference::FirstKnown),
            )
        };
        let agg = |name: &str, ret: ReturnTypeInference, checker: OperandTypeChecker| {
            Arc::new(SqlOperator::new(name, K::OtherFunction, S::Function, ret, checker).aggregate())
        };

        let mut table = Self {
            and: Arc::new(
                SqlOperator::new("AND", K::And, S::Binary, R::nullable_boolean(), C::boolean_x2())
                    .with_operand_inference(OperandTypeInference::Boolean),
            ),
            or: Arc::new(
                SqlOperator::new("OR", K::Or, S::Binary, R::nullable_boolean(), C::boolean_x2())
                    .with_operand_inference(OperandTypeInference::Boolean),
            ),
            not: Arc::new(
                SqlOperator::new("NOT", K::Not, S::Prefix, R::nullable_boolean(), C::boolean())
                    .with_operand_inference(OperandTypeInference::Boolean),
            ),
            equals: comparison("=", K::Equals, C::comparable_unordered_x2()),
            not_equals: comparison("<>", K::NotEquals, C::comparable_unordered_x2()),
            less_than: comparison("<", K::LessThan, C::comparable_ordered_x2()),
            greater_than: comparison(">", K::GreaterThan, C::comparable_ordered_x2()),
            less_than_or_equal: comparison("<=", K::LessThanOrEqual, C::comparable_ordered_x2()),
            greater_than_or_equal: comparison(">=", K::GreaterThanOrEqual, C::comparable_ordered_x2()),
            plus: binary("+", K::Plus, R::nullable_sum(), C::plus_operator()),
            minus: binary("-", K::Minus, R::nullable_sum(), C::minus_operator()),
            multiply: binary("*", K::Times, R::nullable_product(), C::multiply_operator()),
            divide: binary("/", K::Divide, R::nullable_quotient(), C::division_operator()),
            unary_minus: op("-", K::MinusPrefix, S::Prefix, R::first_arg_type(), C::numeric_or_interval()),
            unary_plus: op("+", K::PlusPrefix, S::Prefix, R::first_arg_type(), C::numeric_or_interval()),
            is_null: op("IS NULL", K::IsNull, S::Postfix, R::boolean(), C::any()),
            is_not_null: op("IS NOT NULL", K::Other, S::Postfix, R::boolean(), C::any()),
            is_true: op("IS TRUE", K::IsTrue, S::Postfix, R::boolean(), C::boolean()),
            is_false: op("IS FALSE", K::IsFalse, S::Postfix, R::boolean(), C::boolean()),
            is_distinct_from: binary(
                "IS DISTINCT FROM",
                K::Other,
                R::boolean(),
                C::comparable_unordered_x2(),
            ),
            is_not_distinct_from: binary(
                "IS NOT DISTINCT FROM",
                K::Other,
                R::boolean(),
                C::comparable_unordered_x2(),
            ),
            cast: op("CAST", K::Cast, S::Special, R::Deferred, C::any()),
            case: op("CASE", K::Case, S::Special, R::CaseResult, C::Variadic),
            like: op(
                "LIKE",
                K::Like,
                S::Special,
                R::nullable_boolean(),
                C::or(vec![C::string_same_x2(), C::string_same_x3()]),
            ),
            concat: binary(
                "||",
                K::Other,
                R::nullable_varying_dyadic_string_sum_precision(),
                C::string_same_x2(),
            ),
            upper: op("UPPER", K::OtherFunction, S::Function, R::nullable_first_arg_type(), C::char_string()),
            lower: op("LOWER", K::OtherFunction, S::Function, R::nullable_first_arg_type(), C::char_string()),
            abs: op("ABS", K::OtherFunction, S::Function, R::first_arg_type(), C::numeric_or_interval()),
            mod_fn: op(
                "MOD",
                K::OtherFunction,
                S::Function,
                R::nullable_second_arg_type(),
                C::exact_numeric_x2(),
            ),
            row: op("ROW", K::Row, S::Special, R::Row, C::Variadic),
            current_user: op(
                "CURRENT_USER",
                K::OtherFunction,
                S::FunctionId,
                R::varchar_2000(),
                C::niladic(),
            ),
            element: op(
                "ELEMENT",
                K::OtherFunction,
                S::Function,
                R::nullable_multiset_element_type(),
                C::multiset(),
            ),
            multiset_union: binary(
                "MULTISET UNION",
                K::Other,
                R::nullable_multiset(),
                C::MultisetPair,
            ),
            slice: op(
                "$SLICE",
                K::Other,
                S::Special,
                R::MultisetFirstColumnMultiset,
                C::RecordMultiset,
            ),
            count: agg("COUNT", R::bigint(), C::or(vec![C::niladic(), C::any()])),
            sum: agg("SUM", R::first_arg_type_force_nullable(), C::numeric()),
            avg: agg("AVG", R::first_arg_type_force_nullable(), C::numeric()),
            min: agg("MIN", R::first_arg_type_force_nullable(), C::comparable_ordered()),
            max: agg("MAX", R::first_arg_type_force_nullable(), C::comparable_ordered()),
            by_name: HashMap::new(),
        };

        let all = [
            &table.and,
            &table.or,
            &table.not,
            &table.equals,
            &table.not_equals,
            &table.less_than,
            &table.greater_than,
            &table.less_than_or_equal,
            &table.greater_than_or_equal,
            &table.plus,
            &table.minus,
            &table.multiply,
            &table.divide,
            &table.unary_minus,
            &table.unary_plus,
            &table.is_null,
            &table.is_not_null,
            &table.is_true,
            &table.is_false,
            &table.is_distinct_from,
            &table.is_not_distinct_from,
            &table.cast,
            &table.case,
            &table.like,
            &table.concat,
            &table.upper,
            &table.lower,
            &table.abs,
            &table.mod_fn,
            &table.row,
            &table.current_user,
            &table.element,
            &table.multiset_union,
            &table.slice,
            &table.count,
            &table.sum,
            &table.avg,
            &table.min,
            &table.max,
        ];
        let mut by_name: HashMap<String, Vec<Arc<SqlOperator>>> = HashMap::new();
        for op in all {
            by_name.entry(op.name.to_uppercase()).or_default().push(op.clone());
        }
        table.by_name = by_name;
        table
    }

    /// Find an operator by name, case-insensitively.
    ///
    /// `+` and `-` name both a binary and a prefix operator; a single operand
    /// selects the prefix form.
    pub fn lookup(&self, name: &str, operand_count: usize) -> RelOptResult<Arc<SqlOperator>> {
        let candidates = self
            .by_name
            .get(&name.to_uppercase())
            .ok_or_else(|| RelOptError::UnknownOperator(name.to_string()))?;
        let unary = |op: &&Arc<SqlOperator>| matches!(op.syntax, SqlSyntax::Prefix | SqlSyntax::Postfix);
        let picked = if operand_count == 1 {
            candidates.iter().find(unary).or_else(|| candidates.first())
        } else {
            candidates
                .iter()
                .find(|op| !unary(op))
                .or_else(|| candidates.first())
        };
        picked
            .cloned()
            .ok_or_else(|| RelOptError::UnknownOperator(name.to_string()))
    }

    pub fn aggregate_functions(&self) -> Vec<Arc<SqlOperator>> {
        vec![
            self.count.clone(),
            self.sum.clone(),
            self.avg.clone(),
            self.min.clone(),
            self.max.clone(),
        ]
    }
}
