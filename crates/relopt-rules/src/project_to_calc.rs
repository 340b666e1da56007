//! Expresses a projection as a calc without a condition.

use relopt_core::pattern::Operand;
use relopt_core::program::RexProgram;
use relopt_core::rel::RelOp;
use relopt_core::rule::{Rule, RuleCall};

pub struct ProjectToCalcRule;

impl Rule for ProjectToCalcRule {
    fn name(&self) -> &str {
        "ProjectToCalc"
    }

    fn operand(&self) -> Operand {
        Operand::project()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) {
        let project = call.rel(0);
        let arena = call.arena();
        let RelOp::Project { exprs, .. } = arena.op(project) else {
            panic!("{} matched {}", self.name(), arena.description(project));
        };
        let input = arena.inputs(project)[0];
        let program = RexProgram::create(
            arena.row_type(input),
            exprs,
            None,
            arena.row_type(project),
            arena.rex_builder(),
        );
        let calc = call.arena_mut().calc(input, program);
        call.transform_to(calc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::catalog::{Catalog, InMemoryCatalog};
    use relopt_core::rel::RelArena;
    use relopt_core::rex::STD;

    #[test]
    fn test_projection_becomes_calc() {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let scan = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
        let row = arena.row_type(scan).clone();
        let rex = arena.rex_builder().clone();
        let doubled = rex.make_call(
            &STD.multiply,
            vec![rex.make_input_ref_for(&row, 5), rex.make_exact_literal(2)],
        );
        let project = arena.project(
            scan,
            vec![rex.make_input_ref_for(&row, 1), doubled],
            vec![None, Some("DOUBLE_SAL".into())],
        );

        let rule = ProjectToCalcRule;
        let rels = rule.operand().bind(&arena, project).unwrap();
        let mut call = RuleCall::new(rule.name(), &mut arena, rels);
        rule.on_match(&mut call);
        let calc = call.results()[0];
        let RelOp::Calc { program } = arena.op(calc) else {
            panic!("expected a calc");
        };
        assert!(program.condition().is_none());
        let projected: Vec<String> = program.expanded_projects().iter().map(|e| e.to_string()).collect();
        assert_eq!(projected, vec!["$1", "*($5, 2)"]);
        assert_eq!(arena.row_type(calc).field_names(), vec!["$f0", "DOUBLE_SAL"]);
    }
}
