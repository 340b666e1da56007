//! # Catalog Interface
//!
//! The planner never resolves names itself: a validator upstream hands it
//! tables that are already bound. The catalog is the seam through which those
//! tables (and the statistics the cost model consults) are obtained.
//!
//! ## Tables
//!
//! A [`RelOptTable`] is a resolved table: its qualified name, its row type, a
//! row count estimate and the column sets known to be unique. It is immutable
//! and embedded by value in the nodes that read or modify it.
//!
//! ## In-Memory Catalog
//!
//! [`InMemoryCatalog`] keys tables by their dotted qualified name
//! (`SALES.EMP`). It is populated programmatically and backs tests and the
//! HTTP service.

use crate::error::{RelOptError, RelOptResult};
use crate::stats::{ColumnStatistics, Statistics};
use crate::types::{RelDataType, SqlTypeName, TypeFactory};
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// A table resolved by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelOptTable {
    pub qualified_name: Vec<String>,
    pub row_type: RelDataType,
    pub row_count: OrderedFloat<f64>,
    /// Column sets whose values are unique across the table.
    pub unique_keys: Vec<BTreeSet<usize>>,
}

impl RelOptTable {
    pub fn new(qualified_name: Vec<String>, row_type: RelDataType, row_count: f64) -> Self {
        Self {
            qualified_name,
            row_type,
            row_count: OrderedFloat(row_count),
            unique_keys: Vec::new(),
        }
    }

    pub fn with_unique_key(mut self, columns: impl IntoIterator<Item = usize>) -> Self {
        self.unique_keys.push(columns.into_iter().collect());
        self
    }

    pub fn row_count(&self) -> f64 {
        self.row_count.into_inner()
    }

    /// Dotted form of the qualified name, the key used by [`InMemoryCatalog`].
    pub fn key(&self) -> String {
        self.qualified_name.join(".")
    }

    /// Whether a row is identified by the given columns.
    pub fn is_key(&self, columns: &BTreeSet<usize>) -> bool {
        self.unique_keys.iter().any(|key| key.is_subset(columns))
    }
}

/// Renders in the bracketed list form used by explain output: `[SALES, EMP]`.
impl fmt::Display for RelOptTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.qualified_name.join(", "))
    }
}

/// Catalog provides resolved tables and their statistics.
pub trait Catalog: Send + Sync {
    fn get_table(&self, qualified_name: &[&str]) -> Option<RelOptTable>;
    fn get_table_stats(&self, qualified_name: &[&str]) -> Option<Statistics>;

    /// Like [`get_table`](Catalog::get_table), but an unknown table is an error.
    fn lookup_table(&self, qualified_name: &[&str]) -> RelOptResult<RelOptTable> {
        self.get_table(qualified_name)
            .ok_or_else(|| RelOptError::TableNotFound(qualified_name.join(".")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    /// Tables keyed by dotted qualified name.
    pub tables: HashMap<String, RelOptTable>,
    /// Table statistics keyed by dotted qualified name.
    pub table_stats: HashMap<String, Statistics>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table. The table's row count is taken from `stats`.
    pub fn add_table(&mut self, mut table: RelOptTable, stats: Statistics) {
        table.row_count = OrderedFloat(stats.row_count);
        let key = table.key();
        self.tables.insert(key.clone(), table);
        self.table_stats.insert(key, stats);
    }

    /// A catalog holding the `SALES` sample schema: `EMP` (14 rows) and
    /// `DEPT` (4 rows).
    pub fn with_sales_schema(type_factory: &TypeFactory) -> Self {
        let int = type_factory.create_sql_type(SqlTypeName::Integer);
        let nullable_int = type_factory.create_type_with_nullability(&int, true);
        let varchar = |n| type_factory.create_sql_type_with_precision(SqlTypeName::Varchar, n);
        let date = type_factory.create_sql_type(SqlTypeName::Date);
        let boolean = type_factory.create_sql_type(SqlTypeName::Boolean);

        let emp_type = type_factory.create_struct_type(vec![
            ("EMPNO".into(), int.clone()),
            ("ENAME".into(), varchar(20)),
            ("JOB".into(), varchar(10)),
            ("MGR".into(), nullable_int.clone()),
            ("HIREDATE".into(), date),
            ("SAL".into(), int.clone()),
            ("COMM".into(), nullable_int),
            ("DEPTNO".into(), int.clone()),
            ("SLACKER".into(), boolean),
        ]);
        let dept_type = type_factory.create_struct_type(vec![
            ("DEPTNO".into(), int),
            ("NAME".into(), varchar(10)),
        ]);

        let mut catalog = Self::new();
        catalog.add_table(
            RelOptTable::new(vec!["SALES".into(), "EMP".into()], emp_type, 14.0).with_unique_key([0]),
            Statistics::new(14.0, 14.0 * 64.0)
                .with_column("EMPNO", ColumnStatistics::new(14.0, 0.0))
                .with_column("JOB", ColumnStatistics::new(5.0, 0.0))
                .with_column("MGR", ColumnStatistics::new(6.0, 0.07))
                .with_column("DEPTNO", ColumnStatistics::new(3.0, 0.0)),
        );
        catalog.add_table(
            RelOptTable::new(vec!["SALES".into(), "DEPT".into()], dept_type, 4.0).with_unique_key([0]),
            Statistics::new(4.0, 4.0 * 16.0).with_column("DEPTNO", ColumnStatistics::new(4.0, 0.0)),
        );
        catalog
    }
}

impl Catalog for InMemoryCatalog {
    fn get_table(&self, qualified_name: &[&str]) -> Option<RelOptTable> {
        self.tables.get(&qualified_name.join(".")).cloned()
    }

    fn get_table_stats(&self, qualified_name: &[&str]) -> Option<Statistics> {
        self.table_stats.get(&qualified_name.join(".")).cloned()
    }
}
