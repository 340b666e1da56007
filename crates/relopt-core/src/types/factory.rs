use super::*;
use crate::error::{RelOptError, RelOptResult};

/// Creates types and computes derived types (least restrictive, join rows).
///
/// The factory is stateless apart from the session's default character set
/// and collation, which it attaches to character types it creates.
#[derive(Debug, Clone)]
pub struct TypeFactory {
    pub default_charset: String,
    pub default_collation: SqlCollation,
}

impl Default for TypeFactory {
    fn default() -> Self {
        Self {
            default_charset: DEFAULT_CHARSET.to_string(),
            default_collation: SqlCollation::coercible(),
        }
    }
}

impl TypeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn assert_basic(name: SqlTypeName) {
        assert!(name != SqlTypeName::Multiset, "use create_multiset_type() instead");
        assert!(
            !name.is_interval(),
            "use create_interval_type() instead"
        );
        assert!(name != SqlTypeName::Row, "use create_struct_type() instead");
    }

    fn default_charset_for(&self, name: SqlTypeName) -> Option<CharsetSpec> {
        name.is_char().then(|| CharsetSpec {
            charset: self.default_charset.clone(),
            collation: self.default_collation.clone(),
        })
    }

    /// A NOT NULL type with default precision.
    pub fn create_sql_type(&self, name: SqlTypeName) -> RelDataType {
        Self::assert_basic(name);
        let precision = if name.allows_prec_no_scale() && !name.is_bounded_varying() {
            name.default_precision()
        } else {
            None
        };
        RelDataType::build(
            TypeKind::Basic {
                name,
                precision,
                scale: None,
                charset: self.default_charset_for(name),
            },
            false,
        )
    }

    pub fn create_sql_type_with_precision(&self, name: SqlTypeName, precision: u32) -> RelDataType {
        Self::assert_basic(name);
        if !name.allows_prec_no_scale() {
            return self.create_sql_type(name);
        }
        RelDataType::build(
            TypeKind::Basic {
                name,
                precision: Some(precision),
                scale: None,
                charset: self.default_charset_for(name),
            },
            false,
        )
    }

    pub fn create_sql_type_with_scale(
        &self,
        name: SqlTypeName,
        precision: u32,
        scale: u32,
    ) -> RelDataType {
        Self::assert_basic(name);
        assert!(name.allows_scale(), "{} does not allow a scale", name);
        assert!(precision > 0 && precision <= MAX_NUMERIC_PRECISION, "precision {} out of range", precision);
        assert!(scale <= precision, "scale {} exceeds precision {}", scale, precision);
        RelDataType::build(
            TypeKind::Basic {
                name,
                precision: Some(precision),
                scale: Some(scale),
                charset: None,
            },
            false,
        )
    }

    /// Resolve a type name as written by a user, e.g. `"VARCHAR"` with precision 20.
    pub fn create_type_by_name(
        &self,
        name: &str,
        precision: Option<u32>,
        scale: Option<u32>,
    ) -> RelOptResult<RelDataType> {
        let type_name =
            SqlTypeName::lookup(name).ok_or_else(|| RelOptError::UnknownDatatype(name.to_string()))?;
        match type_name {
            SqlTypeName::Multiset
            | SqlTypeName::Row
            | SqlTypeName::IntervalYearMonth
            | SqlTypeName::IntervalDayTime => {
                return Err(RelOptError::UnknownDatatype(name.to_string()))
            }
            _ => {}
        }
        Ok(match (precision, scale) {
            (Some(p), Some(s)) if type_name.allows_scale() => {
                self.create_sql_type_with_scale(type_name, p, s)
            }
            (Some(p), _) => self.create_sql_type_with_precision(type_name, p),
            _ => self.create_sql_type(type_name),
        })
    }

    /// For a struct, applies `nullable` to every field; the struct itself is
    /// never nullable.
    pub fn create_type_with_nullability(&self, ty: &RelDataType, nullable: bool) -> RelDataType {
        if let TypeKind::Struct(fields) = ty.kind() {
            let fields = fields
                .iter()
                .map(|f| (f.name.clone(), self.create_type_with_nullability(&f.ty, nullable)))
                .collect();
            return self.create_struct_type(fields);
        }
        if ty.is_nullable() == nullable {
            return ty.clone();
        }
        RelDataType::build(ty.kind().clone(), nullable)
    }

    pub fn create_type_with_charset_and_collation(
        &self,
        ty: &RelDataType,
        charset: &str,
        collation: SqlCollation,
    ) -> RelDataType {
        match ty.kind() {
            TypeKind::Basic {
                name,
                precision,
                scale,
                ..
            } if name.is_char() => RelDataType::build(
                TypeKind::Basic {
                    name: *name,
                    precision: *precision,
                    scale: *scale,
                    charset: Some(CharsetSpec {
                        charset: charset.to_string(),
                        collation,
                    }),
                },
                ty.is_nullable(),
            ),
            _ => panic!("charset and collation only apply to character types, not {:?}", ty),
        }
    }

    pub fn create_struct_type(&self, fields: Vec<(String, RelDataType)>) -> RelDataType {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(index, (name, ty))| RelDataTypeField { name, index, ty })
            .collect();
        RelDataType::build(TypeKind::Struct(fields), false)
    }

    pub fn create_multiset_type(&self, element: RelDataType) -> RelDataType {
        RelDataType::build(TypeKind::Multiset(element), false)
    }

    pub fn create_interval_type(&self, qualifier: IntervalQualifier) -> RelDataType {
        RelDataType::build(TypeKind::Interval(qualifier), false)
    }

    /// The row type of a join: system fields, then left fields, then right fields.
    ///
    /// A name that collides with an earlier field gets the smallest numeric suffix
    /// that makes it unique.
    pub fn create_join_type(&self, types: &[&RelDataType]) -> RelDataType {
        let mut names: Vec<String> = Vec::new();
        let mut fields = Vec::new();
        for ty in types {
            for field in ty.fields() {
                let mut name = field.name.clone();
                if names.contains(&name) {
                    let mut j = 0;
                    loop {
                        let candidate = format!("{}{}", field.name, j);
                        if !names.contains(&candidate) {
                            name = candidate;
                            break;
                        }
                        j += 1;
                    }
                }
                names.push(name.clone());
                fields.push((name, field.ty.clone()));
            }
        }
        self.create_struct_type(fields)
    }

    /// The least restrictive type to which every given type can be assigned.
    ///
    /// A datetime next to an interval or integer resolves to the datetime,
    /// which is what `+` and `-` need. Use [`Self::least_restrictive_common`]
    /// where the operands must share a family.
    pub fn least_restrictive(&self, types: &[RelDataType]) -> Option<RelDataType> {
        self.least_restrictive_with(types, true)
    }

    /// Like [`Self::least_restrictive`], but without datetime arithmetic:
    /// `[INTEGER, DATE]` has no common type.
    pub fn least_restrictive_common(&self, types: &[RelDataType]) -> Option<RelDataType> {
        self.least_restrictive_with(types, false)
    }

    fn least_restrictive_with(&self, types: &[RelDataType], arithmetic: bool) -> Option<RelDataType> {
        assert!(!types.is_empty(), "least_restrictive requires at least one type");
        if let Some(ty) = self.least_restrictive_sql_type(types, arithmetic) {
            return Some(ty);
        }
        if types.iter().any(|t| t.is_struct()) {
            return None;
        }
        self.least_restrictive_by_cast(types)
    }

    fn least_restrictive_structured_type(&self, types: &[RelDataType], arithmetic: bool) -> Option<RelDataType> {
        let first = &types[0];
        let field_count = first.field_count();
        if types
            .iter()
            .any(|t| !t.is_struct() || t.field_count() != field_count)
        {
            return None;
        }
        let mut fields = Vec::with_capacity(field_count);
        for j in 0..field_count {
            let column: Vec<RelDataType> = types.iter().map(|t| t.fields()[j].ty.clone()).collect();
            let ty = self.least_restrictive_with(&column, arithmetic)?;
            fields.push((first.fields()[j].name.clone(), ty));
        }
        Some(self.create_struct_type(fields))
    }

    fn least_restrictive_sql_type(&self, types: &[RelDataType], arithmetic: bool) -> Option<RelDataType> {
        let mut result: Option<RelDataType> = None;
        let mut any_nullable = false;

        for (i, ty) in types.iter().enumerate() {
            let type_name = ty.sql_type_name();
            if ty.is_nullable() {
                any_nullable = true;
            }
            if type_name == SqlTypeName::Null {
                any_nullable = true;
                continue;
            }
            let current = match &result {
                None => {
                    if type_name == SqlTypeName::Row {
                        return self.least_restrictive_structured_type(types, arithmetic);
                    }
                    result = Some(ty.clone());
                    ty.clone()
                }
                Some(r) => r.clone(),
            };
            let result_name = current.sql_type_name();
            if ty.family() != current.family() {
                return None;
            }
            let next = if arithmetic { types.get(i + 1) } else { None };

            if ty.in_char_or_binary_families() {
                let precision = current.precision().max(ty.precision());
                let new_name = if result_name.is_bounded_varying() {
                    result_name
                } else {
                    type_name
                };
                let mut created = self.create_sql_type_with_precision(new_name, precision);
                if let (Some(cs), Some(coll)) = (current.charset(), current.collation()) {
                    created = self.create_type_with_charset_and_collation(&created, cs, coll.clone());
                }
                result = Some(created);
            } else if ty.is_exact_numeric() {
                if current.is_exact_numeric() {
                    if let Some(n) = next {
                        if n.sql_type_name().is_datetime() {
                            return Some(n.clone());
                        }
                    }
                    if ty.sql_type_name() != result_name
                        || ty.precision() != current.precision()
                        || ty.scale() != current.scale()
                    {
                        if !type_name.allows_prec() && !result_name.allows_prec() {
                            if ty.precision() > current.precision() {
                                result = Some(self.create_type_with_nullability(ty, false));
                            }
                        } else {
                            let p1 = current.precision() as i64;
                            let p2 = ty.precision() as i64;
                            let s1 = current.scale_or_zero() as i64;
                            let s2 = ty.scale_or_zero() as i64;
                            let max_p = MAX_NUMERIC_PRECISION as i64;

                            let dout = (p1 - s1).max(p2 - s2).min(max_p);
                            let scale = s1
                                .max(s2)
                                .min(max_p - dout)
                                .min(MAX_NUMERIC_SCALE as i64);
                            let precision = dout + scale;
                            assert!(precision > 0 && precision <= max_p);
                            result = Some(self.create_sql_type_with_scale(
                                SqlTypeName::Decimal,
                                precision as u32,
                                scale as u32,
                            ));
                        }
                    }
                } else if current.is_approximate_numeric() {
                    if ty.is_decimal() {
                        result = Some(self.create_sql_type(SqlTypeName::Double));
                    }
                } else {
                    return None;
                }
            } else if ty.is_approximate_numeric() {
                if current.is_approximate_numeric() {
                    if ty.precision() > current.precision() {
                        result = Some(self.create_type_with_nullability(ty, false));
                    }
                } else if current.is_exact_numeric() {
                    result = Some(if current.is_decimal() {
                        self.create_sql_type(SqlTypeName::Double)
                    } else {
                        self.create_type_with_nullability(ty, false)
                    });
                } else {
                    return None;
                }
            } else if type_name.is_interval() {
                if let Some(n) = next {
                    if n.sql_type_name().is_datetime() {
                        return Some(n.clone());
                    }
                }
                let (Some(a), Some(b)) = (current.interval_qualifier(), ty.interval_qualifier()) else {
                    return None;
                };
                if a != b {
                    result = Some(self.create_interval_type(a.combine(&b)));
                }
            } else if type_name.is_datetime() {
                if let Some(n) = next {
                    if n.sql_type_name().is_interval() || SqlTypeFamily::Integer.contains(n.sql_type_name()) {
                        return Some(ty.clone());
                    }
                }
            } else if type_name == SqlTypeName::Boolean {
                // Booleans have no further attributes to reconcile.
            } else if type_name == SqlTypeName::Multiset {
                let elements: Vec<RelDataType> = vec![
                    current.component_type()?.clone(),
                    ty.component_type()?.clone(),
                ];
                let elem = self.least_restrictive_common(&elements)?;
                result = Some(self.create_multiset_type(elem));
            } else {
                return None;
            }
        }

        let result = result?;
        Some(if any_nullable {
            self.create_type_with_nullability(&result, true)
        } else {
            result
        })
    }

    fn least_restrictive_by_cast(&self, types: &[RelDataType]) -> Option<RelDataType> {
        let mut result = types[0].clone();
        let mut any_nullable = result.is_nullable();
        for ty in &types[1..] {
            if ty.sql_type_name() == SqlTypeName::Null {
                any_nullable = true;
                continue;
            }
            if ty.is_nullable() {
                any_nullable = true;
            }
            if can_cast_from(ty, &result) {
                result = ty.clone();
            } else if !can_cast_from(&result, ty) {
                return None;
            }
        }
        Some(if any_nullable {
            self.create_type_with_nullability(&result, true)
        } else {
            result
        })
    }
}

/// Whether a value of type `from` may be implicitly assigned to type `to`.
pub fn can_cast_from(to: &RelDataType, from: &RelDataType) -> bool {
    let to_name = to.sql_type_name();
    let from_name = from.sql_type_name();
    if from_name == SqlTypeName::Null || to_name == SqlTypeName::Any {
        return true;
    }
    if let (Some(to_elem), Some(from_elem)) = (to.component_type(), from.component_type()) {
        return can_cast_from(to_elem, from_elem);
    }
    if to.family() == from.family() && to.family().is_some() {
        return true;
    }
    let numeric = |n: SqlTypeName| SqlTypeFamily::Numeric.contains(n);
    if numeric(to_name) && numeric(from_name) {
        return true;
    }
    // Character values convert to and from every scalar type except multisets and rows.
    let scalar = |n: SqlTypeName| !matches!(n, SqlTypeName::Multiset | SqlTypeName::Row | SqlTypeName::Cursor | SqlTypeName::ColumnList);
    if (to_name.is_char() && scalar(from_name)) || (from_name.is_char() && scalar(to_name)) {
        return true;
    }
    matches!(
        (to_name, from_name),
        (SqlTypeName::Timestamp, SqlTypeName::Date) | (SqlTypeName::Timestamp, SqlTypeName::Time)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_type_strings() {
        let tf = TypeFactory::new();
        assert_eq!(tf.create_sql_type(SqlTypeName::Integer).full_type_string(), "INTEGER NOT NULL");
        assert_eq!(
            tf.create_sql_type_with_scale(SqlTypeName::Decimal, 7, 2).full_type_string(),
            "DECIMAL(7, 2) NOT NULL"
        );
        assert_eq!(tf.create_sql_type(SqlTypeName::Decimal).to_string(), "DECIMAL(19)");
        let varchar = tf.create_sql_type_with_precision(SqlTypeName::Varchar, 10);
        assert_eq!(varchar.to_string(), "VARCHAR(10)");
        assert_eq!(
            varchar.full_type_string(),
            "VARCHAR(10) CHARACTER SET \"ISO-8859-1\" COLLATE \"ISO-8859-1$en_US$primary\" NOT NULL"
        );
        let nullable_time = tf.create_type_with_nullability(&tf.create_sql_type(SqlTypeName::Time), true);
        assert_eq!(nullable_time.full_type_string(), "TIME(0)");
    }

    #[test]
    fn test_struct_type_string() {
        let tf = TypeFactory::new();
        let row = tf.create_struct_type(vec![
            ("EMPNO".into(), tf.create_sql_type(SqlTypeName::Integer)),
            (
                "NAME".into(),
                tf.create_type_with_nullability(&tf.create_sql_type_with_precision(SqlTypeName::Varchar, 20), true),
            ),
        ]);
        assert_eq!(row.to_string(), "RecordType(INTEGER EMPNO, VARCHAR(20) NAME)");
        assert!(!row.is_nullable());
        assert_eq!(row.field("NAME").map(|f| f.index), Some(1));
    }

    #[test]
    fn test_equality_by_value() {
        let tf = TypeFactory::new();
        let a = tf.create_sql_type_with_precision(SqlTypeName::Char, 3);
        let b = tf.create_sql_type_with_precision(SqlTypeName::Char, 3);
        assert_eq!(a, b);
        assert_ne!(a, tf.create_type_with_nullability(&b, true));
        assert_eq!(tf.create_sql_type(SqlTypeName::Decimal), tf.create_sql_type_with_scale(SqlTypeName::Decimal, 19, 0));
    }

    #[test]
    fn test_least_restrictive_decimal() {
        let tf = TypeFactory::new();
        let d72 = tf.create_sql_type_with_scale(SqlTypeName::Decimal, 7, 2);
        let d104 = tf.create_sql_type_with_scale(SqlTypeName::Decimal, 10, 4);
        let lr = tf.least_restrictive(&[d72, d104]).unwrap();
        // whole digits max(5, 6) = 6, scale max(2, 4) = 4
        assert_eq!(lr.full_type_string(), "DECIMAL(10, 4) NOT NULL");
    }

    #[test]
    fn test_least_restrictive_primitives_and_nulls() {
        let tf = TypeFactory::new();
        let int = tf.create_sql_type(SqlTypeName::Integer);
        let bigint = tf.create_sql_type(SqlTypeName::Bigint);
        let null = tf.create_type_with_nullability(&tf.create_sql_type(SqlTypeName::Null), true);
        let lr = tf.least_restrictive(&[int.clone(), null, bigint.clone()]).unwrap();
        assert_eq!(lr, tf.create_type_with_nullability(&bigint, true));

        let dbl = tf.create_sql_type(SqlTypeName::Double);
        let dec = tf.create_sql_type_with_scale(SqlTypeName::Decimal, 5, 1);
        assert_eq!(tf.least_restrictive(&[dec, dbl.clone()]).unwrap(), dbl);
        assert_eq!(tf.least_restrictive(&[int, dbl.clone()]).unwrap(), dbl);
    }

    #[test]
    fn test_least_restrictive_char() {
        let tf = TypeFactory::new();
        let c3 = tf.create_sql_type_with_precision(SqlTypeName::Char, 3);
        let v10 = tf.create_sql_type_with_precision(SqlTypeName::Varchar, 10);
        let lr = tf.least_restrictive(&[v10.clone(), c3.clone()]).unwrap();
        assert_eq!(lr.to_string(), "VARCHAR(10)");
        let lr = tf.least_restrictive(&[c3, v10]).unwrap();
        assert_eq!(lr.to_string(), "VARCHAR(10)");
    }

    #[test]
    fn test_least_restrictive_incompatible() {
        let tf = TypeFactory::new();
        let boolean = tf.create_sql_type(SqlTypeName::Boolean);
        let date = tf.create_sql_type(SqlTypeName::Date);
        assert!(tf.least_restrictive(&[boolean, date]).is_none());
    }

    #[test]
    fn test_least_restrictive_datetime_arithmetic() {
        let tf = TypeFactory::new();
        let int = tf.create_sql_type(SqlTypeName::Integer);
        let date = tf.create_sql_type(SqlTypeName::Date);
        assert_eq!(tf.least_restrictive(&[int.clone(), date.clone()]), Some(date.clone()));
        assert!(tf.least_restrictive_common(&[int.clone(), date.clone()]).is_none());
        assert!(tf.least_restrictive_common(&[date.clone(), int.clone()]).is_none());
        assert_eq!(tf.least_restrictive_common(&[date.clone(), date.clone()]), Some(date.clone()));

        let ints = tf.create_multiset_type(int);
        let dates = tf.create_multiset_type(date);
        assert!(tf.least_restrictive(&[ints, dates]).is_none());
    }

    #[test]
    fn test_join_type_dedups_names() {
        let tf = TypeFactory::new();
        let int = tf.create_sql_type(SqlTypeName::Integer);
        let left = tf.create_struct_type(vec![("DEPTNO".into(), int.clone()), ("NAME".into(), int.clone())]);
        let right = tf.create_struct_type(vec![("DEPTNO".into(), int.clone()), ("DEPTNO0".into(), int)]);
        let joined = tf.create_join_type(&[&left, &right]);
        assert_eq!(joined.field_names(), vec!["DEPTNO", "NAME", "DEPTNO0", "DEPTNO00"]);
    }

    #[test]
    fn test_unknown_type_name() {
        let tf = TypeFactory::new();
        assert_eq!(
            tf.create_type_by_name("BLOB", None, None),
            Err(RelOptError::UnknownDatatype("BLOB".into()))
        );
        assert_eq!(tf.create_type_by_name("varchar", Some(5), None).unwrap().to_string(), "VARCHAR(5)");
    }
}
