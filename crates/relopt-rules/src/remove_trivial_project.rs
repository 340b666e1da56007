//! Removes a projection that returns its input unchanged.
//!
//! A projection is trivial when it is boxed, its expressions are exactly
//! `$0, $1, ..., $n-1` over an input of `n` fields, and each field keeps its
//! input name.

use crate::util::is_identity;
use relopt_core::pattern::Operand;
use relopt_core::rel::RelOp;
use relopt_core::rule::{Rule, RuleCall};

pub struct RemoveTrivialProjectRule;

impl Rule for RemoveTrivialProjectRule {
    fn name(&self) -> &str {
        "RemoveTrivialProject"
    }

    fn operand(&self) -> Operand {
        Operand::project()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) {
        let project = call.rel(0);
        let arena = call.arena();
        let RelOp::Project { exprs, names, boxed } = arena.op(project) else {
            panic!("{} matched {}", self.name(), arena.description(project));
        };
        let child = arena.inputs(project)[0];
        let child_row = arena.row_type(child);
        if !child_row.is_struct() || !*boxed {
            return;
        }
        if !is_identity(exprs, names, child_row) {
            return;
        }
        let traits = arena.node(project).traits().clone();
        let converted = call.convert(child, &traits);
        call.transform_to(converted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::catalog::{Catalog, InMemoryCatalog};
    use relopt_core::rel::{RelArena, RelId};

    fn fire(arena: &mut RelArena, project: RelId) -> Vec<RelId> {
        let rule = RemoveTrivialProjectRule;
        let rels = rule.operand().bind(arena, project).unwrap();
        let mut call = RuleCall::new(rule.name(), arena, rels);
        rule.on_match(&mut call);
        call.results().to_vec()
    }

    fn dept(arena: &mut RelArena) -> RelId {
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        arena.table_access(catalog.lookup_table(&["SALES", "DEPT"]).unwrap())
    }

    #[test]
    fn test_identity_projection_is_removed() {
        let mut arena = RelArena::default();
        let scan = dept(&mut arena);
        let row = arena.row_type(scan).clone();
        let rex = arena.rex_builder().clone();
        let exprs = vec![rex.make_input_ref_for(&row, 0), rex.make_input_ref_for(&row, 1)];
        let names = row.field_names().into_iter().map(Some).collect();
        let project = arena.project(scan, exprs, names);
        assert_eq!(fire(&mut arena, project), vec![scan]);
    }

    #[test]
    fn test_renaming_or_reordering_is_kept() {
        let mut arena = RelArena::default();
        let scan = dept(&mut arena);
        let row = arena.row_type(scan).clone();
        let rex = arena.rex_builder().clone();
        let renamed = arena.project(
            scan,
            vec![rex.make_input_ref_for(&row, 0), rex.make_input_ref_for(&row, 1)],
            vec![Some("DEPTNO".into()), Some("DNAME".into())],
        );
        assert!(fire(&mut arena, renamed).is_empty());
        let swapped = arena.project(
            scan,
            vec![rex.make_input_ref_for(&row, 1), rex.make_input_ref_for(&row, 0)],
            vec![Some("NAME".into()), Some("DEPTNO".into())],
        );
        assert!(fire(&mut arena, swapped).is_empty());
        let unboxed = arena.project_unboxed(scan, rex.make_input_ref_for(&row, 0), "DEPTNO");
        assert!(fire(&mut arena, unboxed).is_empty());
    }
}
