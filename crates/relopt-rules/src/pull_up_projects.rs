//! # Pulling Projections Above Joins
//!
//! Rewrites `Join(Project(a), Project(b))` as `Project(Join(a, b))`, moving
//! projection expressions above the join so that later rules see the join
//! inputs directly. The join condition is rewritten in terms of `a` and `b`.
//!
//! ## Variants
//!
//! - `both`: a projection on each side.
//! - `left`: a projection on the left, any right input.
//! - `right`: any left input, a projection on the right.
//!
//! A projection on a side the join pads with nulls stays where it is: above
//! the join its expressions would see nulls they never saw before. If that
//! leaves no projection to pull, the rule does nothing.

use crate::util::create_project;
use relopt_core::pattern::Operand;
use relopt_core::program::{RexProgram, RexProgramBuilder};
use relopt_core::rel::{derive_join_row_type, JoinType, RelArena, RelId, RelKind, RelOp};
use relopt_core::rex::{RexInputRef, RexNode, RexShiftInputsShuttle, RexShuttle};
use relopt_core::rule::{Rule, RuleCall};
use relopt_core::types::RelDataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSide {
    Both,
    Left,
    Right,
}

pub struct PullUpProjectsAboveJoinRule {
    side: ProjectSide,
}

impl PullUpProjectsAboveJoinRule {
    pub fn both() -> Self {
        Self {
            side: ProjectSide::Both,
        }
    }

    pub fn left() -> Self {
        Self {
            side: ProjectSide::Left,
        }
    }

    pub fn right() -> Self {
        Self {
            side: ProjectSide::Right,
        }
    }

    pub fn side(&self) -> ProjectSide {
        self.side
    }

    fn pulls_left(&self) -> bool {
        self.side != ProjectSide::Right
    }

    fn pulls_right(&self) -> bool {
        self.side != ProjectSide::Left
    }
}

impl Rule for PullUpProjectsAboveJoinRule {
    fn name(&self) -> &str {
        match self.side {
            ProjectSide::Both => "PullUpProjectsAboveJoin",
            ProjectSide::Left => "PullUpLeftProjectAboveJoin",
            ProjectSide::Right => "PullUpRightProjectAboveJoin",
        }
    }

    fn operand(&self) -> Operand {
        match self.side {
            ProjectSide::Both => Operand::join(Operand::project(), Operand::project()),
            ProjectSide::Left => Operand::join(Operand::project(), Operand::Any),
            ProjectSide::Right => Operand::join(Operand::Any, Operand::project()),
        }
    }

    fn on_match(&self, call: &mut RuleCall<'_>) {
        let join = call.rel(0);
        let arena = call.arena();
        let RelOp::Join {
            condition,
            join_type,
            system_fields,
        } = arena.op(join)
        else {
            panic!("{} matched {}", self.name(), arena.description(join));
        };
        if !system_fields.is_empty() {
            return;
        }
        let join_type = *join_type;
        let (left, right) = (arena.inputs(join)[0], arena.inputs(join)[1]);
        let left_project = (self.pulls_left() && !join_type.generates_nulls_on_left())
            .then_some(left)
            .filter(|&id| arena.node(id).kind() == RelKind::Project);
        let right_project = (self.pulls_right() && !join_type.generates_nulls_on_right())
            .then_some(right)
            .filter(|&id| arena.node(id).kind() == RelKind::Project);
        if left_project.is_none() && right_project.is_none() {
            return;
        }
        let left_child = left_project.map_or(left, |p| arena.inputs(p)[0]);
        let right_child = right_project.map_or(right, |p| arena.inputs(p)[0]);

        let rex = arena.rex_builder().clone();
        let children_row = derive_join_row_type(
            arena.type_factory(),
            arena.row_type(left_child),
            arena.row_type(right_child),
            JoinType::Inner,
            &[],
        );
        let n_left = arena.row_type(left_child).field_count();
        let mut exprs = side_exprs(arena, left_project, left_child, 0);
        exprs.extend(side_exprs(arena, right_project, right_child, n_left));

        // The bottom program computes the pulled-up expressions over the bare
        // join inputs; the top program applies the join condition to them.
        let proj_row = rex.type_factory().create_struct_type(
            arena
                .row_type(join)
                .fields()
                .iter()
                .zip(&exprs)
                .map(|(field, expr)| (field.name.clone(), expr.ty().clone()))
                .collect(),
        );
        let bottom = RexProgram::create(&children_row, &exprs, None, &proj_row, &rex);
        let mut top = RexProgramBuilder::new(proj_row.clone(), rex.clone());
        top.add_identity();
        top.add_condition(condition.accept(&mut RetypeInputs::new(&proj_row)));
        let top = top.get_program(false);
        let merged = RexProgramBuilder::merge_programs(&top, &bottom, rex.clone(), false);

        let mut new_condition = merged
            .expanded_condition()
            .unwrap_or_else(|| rex.make_bool_literal(true));
        let mut projects = merged.expanded_projects();
        if join_type != JoinType::Inner {
            let join_row = derive_join_row_type(
                arena.type_factory(),
                arena.row_type(left_child),
                arena.row_type(right_child),
                join_type,
                &[],
            );
            let mut retype = RetypeInputs::new(&join_row);
            new_condition = new_condition.accept(&mut retype);
            projects = projects.iter().map(|e| e.accept(&mut retype)).collect();
        }
        let names = proj_row.field_names().into_iter().map(Some).collect();
        let variables_stopped = arena.node(join).variables_stopped().clone();
        let arena = call.arena_mut();
        let new_join = arena.join(left_child, right_child, new_condition, join_type, variables_stopped);
        let project = create_project(arena, new_join, projects, names);
        call.transform_to(project);
    }
}

/// The expressions one side contributes to the pulled-up projection,
/// shifted past the `offset` fields to their left.
fn side_exprs(arena: &RelArena, project: Option<RelId>, child: RelId, offset: usize) -> Vec<RexNode> {
    match project.map(|p| arena.op(p)) {
        Some(RelOp::Project { exprs, .. }) if offset == 0 => exprs.clone(),
        Some(RelOp::Project { exprs, .. }) => {
            let mut shift = RexShiftInputsShuttle::new(offset);
            exprs.iter().map(|e| e.accept(&mut shift)).collect()
        }
        _ => arena
            .row_type(child)
            .fields()
            .iter()
            .map(|f| RexNode::input_ref(f.index + offset, f.ty.clone()))
            .collect(),
    }
}

/// Gives input references the types of the fields they read. References
/// into the null-padded side of an outer join become nullable this way, and
/// back again when the padding is not yet applied.
struct RetypeInputs {
    row_type: RelDataType,
}

impl RetypeInputs {
    fn new(row_type: &RelDataType) -> Self {
        Self {
            row_type: row_type.clone(),
        }
    }
}

impl RexShuttle for RetypeInputs {
    fn visit_input_ref(&mut self, input: &RexInputRef) -> RexNode {
        RexNode::input_ref(input.index, self.row_type.fields()[input.index].ty.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::catalog::{Catalog, InMemoryCatalog};
    use relopt_core::rex::STD;
    use std::collections::BTreeSet;

    struct Fixture {
        arena: RelArena,
        emp: RelId,
        dept: RelId,
    }

    fn fixture() -> Fixture {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let emp = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
        let dept = arena.table_access(catalog.lookup_table(&["SALES", "DEPT"]).unwrap());
        Fixture { arena, emp, dept }
    }

    /// `SELECT ENAME, DEPTNO FROM EMP`
    fn emp_names(f: &mut Fixture) -> RelId {
        let row = f.arena.row_type(f.emp).clone();
        let rex = f.arena.rex_builder().clone();
        create_project(
            &mut f.arena,
            f.emp,
            vec![rex.make_input_ref_for(&row, 1), rex.make_input_ref_for(&row, 7)],
            vec![None, None],
        )
    }

    /// Joins on `left.$left_key = right.$right_key`.
    fn equi_join(f: &mut Fixture, left: RelId, right: RelId, left_key: usize, right_key: usize, jt: JoinType) -> RelId {
        let rex = f.arena.rex_builder().clone();
        let joined = derive_join_row_type(
            f.arena.type_factory(),
            f.arena.row_type(left),
            f.arena.row_type(right),
            jt,
            &[],
        );
        let n_left = f.arena.row_type(left).field_count();
        let cond = rex.make_call(
            &STD.equals,
            vec![
                rex.make_input_ref_for(&joined, left_key),
                rex.make_input_ref_for(&joined, n_left + right_key),
            ],
        );
        f.arena.join(left, right, cond, jt, BTreeSet::new())
    }

    fn fire(rule: &PullUpProjectsAboveJoinRule, arena: &mut RelArena, join: RelId) -> Vec<RelId> {
        let rels = rule.operand().bind(arena, join).unwrap();
        let mut call = RuleCall::new(rule.name(), arena, rels);
        rule.on_match(&mut call);
        call.results().to_vec()
    }

    #[test]
    fn test_pulls_both_projections_above_inner_join() {
        let mut f = fixture();
        let left = emp_names(&mut f);
        let dept_row = f.arena.row_type(f.dept).clone();
        let rex = f.arena.rex_builder().clone();
        let right = create_project(
            &mut f.arena,
            f.dept,
            vec![rex.make_input_ref_for(&dept_row, 0)],
            vec![None],
        );
        let join = equi_join(&mut f, left, right, 1, 0, JoinType::Inner);

        let rule = PullUpProjectsAboveJoinRule::both();
        let results = fire(&rule, &mut f.arena, join);
        assert_eq!(results.len(), 1);
        let project = results[0];
        let new_join = f.arena.inputs(project)[0];
        assert_eq!(f.arena.inputs(new_join), &[f.emp, f.dept]);
        let RelOp::Join { condition, .. } = f.arena.op(new_join) else {
            panic!("expected a join");
        };
        assert_eq!(condition.to_string(), "=($7, $9)");
        let RelOp::Project { exprs, names, .. } = f.arena.op(project) else {
            panic!("expected a project");
        };
        let exprs: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
        assert_eq!(exprs, vec!["$1", "$7", "$9"]);
        assert_eq!(names, &vec!["ENAME".to_string(), "DEPTNO".into(), "DEPTNO0".into()]);
    }

    #[test]
    fn test_left_join_pulls_only_the_preserved_side() {
        let mut f = fixture();
        let left = emp_names(&mut f);
        let dept = f.dept;
        let join = equi_join(&mut f, left, dept, 1, 0, JoinType::Left);

        let rule = PullUpProjectsAboveJoinRule::left();
        let results = fire(&rule, &mut f.arena, join);
        assert_eq!(results.len(), 1);
        let project = results[0];
        let new_join = f.arena.inputs(project)[0];
        assert_eq!(f.arena.inputs(new_join), &[f.emp, f.dept]);
        assert!(f.arena.row_type(project).equal_sans_field_names(f.arena.row_type(join)));
        let RelOp::Project { exprs, .. } = f.arena.op(project) else {
            panic!("expected a project");
        };
        assert!(exprs[2].ty().is_nullable());
        assert!(!exprs[0].ty().is_nullable());
    }

    #[test]
    fn test_full_join_declines() {
        let mut f = fixture();
        let left = emp_names(&mut f);
        let dept = f.dept;
        let join = equi_join(&mut f, left, dept, 1, 0, JoinType::Full);
        let rule = PullUpProjectsAboveJoinRule::left();
        assert!(fire(&rule, &mut f.arena, join).is_empty());
    }

    #[test]
    fn test_right_variant_skips_left_projection() {
        let mut f = fixture();
        let left = emp_names(&mut f);
        let dept = f.dept;
        let join = equi_join(&mut f, left, dept, 1, 0, JoinType::Inner);
        let rule = PullUpProjectsAboveJoinRule::right();
        assert!(rule.operand().bind(&f.arena, join).is_none());
    }
}
