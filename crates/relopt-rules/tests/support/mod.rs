//! A naive executor for logical plans, used to check that rewrites preserve
//! the rows a plan produces.

#![allow(dead_code)]

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use relopt_core::catalog::{Catalog, InMemoryCatalog};
use relopt_core::rel::{AggregateCall, JoinType, RelArena, RelId, RelOp, SetOpKind};
use relopt_core::rex::eval::{compare, eval, eval_condition, Datum};
use relopt_core::traits::Direction;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type Row = Vec<Datum>;

pub struct Sales {
    pub arena: RelArena,
    pub emp: RelId,
    pub dept: RelId,
}

/// An arena holding scans of `SALES.EMP` and `SALES.DEPT`.
pub fn sales() -> Sales {
    let mut arena = RelArena::default();
    let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
    let emp = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
    let dept = arena.table_access(catalog.lookup_table(&["SALES", "DEPT"]).unwrap());
    Sales { arena, emp, dept }
}

fn emp_row(empno: i64, ename: &str, job: &str, mgr: Option<i64>, sal: i64, comm: Option<i64>, deptno: i64) -> Row {
    let hired = NaiveDate::from_ymd_opt(2001, 1, 1 + (empno % 28) as u32).unwrap();
    vec![
        Datum::int(empno),
        Datum::string(ename),
        Datum::string(job),
        mgr.map_or(Datum::Null, Datum::int),
        Datum::Date(hired),
        Datum::int(sal),
        comm.map_or(Datum::Null, Datum::int),
        Datum::int(deptno),
        Datum::Boolean(empno % 3 == 0),
    ]
}

/// Rows for the sample tables. Department 40 has no employees and
/// department 50 has no department row.
pub fn sales_data() -> HashMap<String, Vec<Row>> {
    let emp = vec![
        emp_row(100, "Fred", "Clerk", Some(130), 1000, None, 10),
        emp_row(110, "Eric", "Clerk", Some(130), 1000, Some(50), 20),
        emp_row(120, "Wilma", "Analyst", Some(130), 2500, None, 20),
        emp_row(130, "Alice", "Manager", None, 5000, Some(500), 30),
        emp_row(140, "Bob", "Analyst", Some(130), 2500, None, 30),
        emp_row(150, "Carol", "Clerk", Some(140), 1200, Some(0), 30),
        emp_row(160, "Dave", "Intern", Some(140), 800, None, 50),
    ];
    let dept = vec![
        vec![Datum::int(10), Datum::string("Sales")],
        vec![Datum::int(20), Datum::string("Marketing")],
        vec![Datum::int(30), Datum::string("Engineering")],
        vec![Datum::int(40), Datum::string("Empty")],
    ];
    HashMap::from([("SALES.EMP".to_string(), emp), ("SALES.DEPT".to_string(), dept)])
}

pub struct Executor<'a> {
    arena: &'a RelArena,
    tables: &'a HashMap<String, Vec<Row>>,
}

impl<'a> Executor<'a> {
    pub fn new(arena: &'a RelArena, tables: &'a HashMap<String, Vec<Row>>) -> Self {
        Self { arena, tables }
    }

    pub fn execute(&self, id: RelId) -> Vec<Row> {
        let inputs = self.arena.inputs(id);
        match self.arena.op(id) {
            RelOp::TableAccess { table } => self.tables[&table.key()].clone(),
            RelOp::Values { tuples, .. } => tuples
                .iter()
                .map(|t| t.iter().map(|l| Datum::from_literal(l.value(), l.type_name())).collect())
                .collect(),
            RelOp::Filter { condition } => self
                .execute(inputs[0])
                .into_iter()
                .filter(|row| eval_condition(condition, row).unwrap())
                .collect(),
            RelOp::Project { exprs, .. } => self
                .execute(inputs[0])
                .iter()
                .map(|row| exprs.iter().map(|e| eval(e, row).unwrap()).collect())
                .collect(),
            RelOp::Calc { program } => self
                .execute(inputs[0])
                .iter()
                .filter_map(|row| program.evaluate(row).unwrap())
                .collect(),
            RelOp::Join {
                condition,
                join_type,
                ..
            } => {
                let left = self.execute(inputs[0]);
                let right = self.execute(inputs[1]);
                let left_width = self.arena.row_type(inputs[0]).field_count();
                let right_width = self.arena.row_type(inputs[1]).field_count();
                join(&left, &right, left_width, right_width, |row| {
                    eval_condition(condition, row).unwrap()
                }, *join_type)
            }
            RelOp::Aggregate {
                group_count,
                agg_calls,
            } => aggregate(self.execute(inputs[0]), *group_count, agg_calls),
            RelOp::Distinct => {
                let rows: BTreeSet<Row> = self.execute(inputs[0]).into_iter().collect();
                rows.into_iter().collect()
            }
            RelOp::Sort { collations } => {
                let mut rows = self.execute(inputs[0]);
                rows.sort_by(|a, b| {
                    for c in collations {
                        let ord = a[c.field_index].cmp(&b[c.field_index]);
                        let ord = if c.direction == Direction::Descending { ord.reverse() } else { ord };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                });
                rows
            }
            RelOp::SetOp {
                kind: SetOpKind::Union,
                all,
            } => {
                let rows: Vec<Row> = inputs.iter().flat_map(|&i| self.execute(i)).collect();
                if *all {
                    rows
                } else {
                    rows.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
                }
            }
            other => panic!("cannot execute {:?}", other),
        }
    }
}

fn join(
    left: &[Row],
    right: &[Row],
    left_width: usize,
    right_width: usize,
    matches: impl Fn(&Row) -> bool,
    join_type: JoinType,
) -> Vec<Row> {
    let mut out = Vec::new();
    let mut right_matched = vec![false; right.len()];
    for l in left {
        let mut matched = false;
        for (j, r) in right.iter().enumerate() {
            let row: Row = l.iter().chain(r).cloned().collect();
            if matches(&row) {
                matched = true;
                right_matched[j] = true;
                out.push(row);
            }
        }
        if !matched && matches!(join_type, JoinType::Left | JoinType::Full) {
            out.push(l.iter().cloned().chain(std::iter::repeat(Datum::Null).take(right_width)).collect());
        }
    }
    if join_type == JoinType::Full {
        for (r, matched) in right.iter().zip(right_matched) {
            if !matched {
                out.push(std::iter::repeat(Datum::Null).take(left_width).chain(r.iter().cloned()).collect());
            }
        }
    }
    out
}

fn aggregate(rows: Vec<Row>, group_count: usize, calls: &[AggregateCall]) -> Vec<Row> {
    let mut groups: BTreeMap<Row, Vec<Row>> = BTreeMap::new();
    if group_count == 0 {
        groups.insert(Vec::new(), Vec::new());
    }
    for row in rows {
        groups.entry(row[..group_count].to_vec()).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|(mut key, members)| {
            key.extend(calls.iter().map(|call| apply(call, &members)));
            key
        })
        .collect()
}

fn apply(call: &AggregateCall, rows: &[Row]) -> Datum {
    let mut args: Vec<Row> = rows
        .iter()
        .map(|row| call.args.iter().map(|&a| row[a].clone()).collect::<Row>())
        .filter(|args| args.iter().all(|d| !d.is_null()))
        .collect();
    if call.distinct {
        args = args.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    }
    let values = || args.iter().map(|a| a[0].clone());
    match call.op.name.as_str() {
        "COUNT" => Datum::int(args.len() as i64),
        "SUM" | "AVG" if args.is_empty() => Datum::Null,
        "SUM" => Datum::Decimal(values().map(decimal).sum()),
        "AVG" => {
            let sum: BigDecimal = values().map(decimal).sum();
            Datum::Decimal((sum / BigDecimal::from(args.len() as i64)).with_scale(0))
        }
        "MIN" => values().min_by(|a, b| compare(a, b).unwrap()).unwrap_or(Datum::Null),
        "MAX" => values().max_by(|a, b| compare(a, b).unwrap()).unwrap_or(Datum::Null),
        other => panic!("cannot execute aggregate {}", other),
    }
}

fn decimal(d: Datum) -> BigDecimal {
    match d {
        Datum::Decimal(d) => d,
        other => panic!("not a decimal: {:?}", other),
    }
}

/// The rows of `id`, sorted, for comparing plans as multisets.
pub fn run(arena: &RelArena, id: RelId, tables: &HashMap<String, Vec<Row>>) -> Vec<Row> {
    let mut rows = Executor::new(arena, tables).execute(id);
    rows.sort();
    rows
}
