//! Expresses a filter as a calc that projects every input field and keeps
//! the filter's condition.

use relopt_core::pattern::Operand;
use relopt_core::program::RexProgramBuilder;
use relopt_core::rel::RelOp;
use relopt_core::rule::{Rule, RuleCall};

pub struct FilterToCalcRule;

impl Rule for FilterToCalcRule {
    fn name(&self) -> &str {
        "FilterToCalc"
    }

    fn operand(&self) -> Operand {
        Operand::filter()
    }

    fn on_match(&self, call: &mut RuleCall<'_>) {
        let filter = call.rel(0);
        let arena = call.arena();
        let RelOp::Filter { condition } = arena.op(filter) else {
            panic!("{} matched {}", self.name(), arena.description(filter));
        };
        let input = arena.inputs(filter)[0];
        let mut builder =
            RexProgramBuilder::new(arena.row_type(input).clone(), arena.rex_builder().clone());
        builder.add_identity();
        builder.add_condition(condition.clone());
        let program = builder.get_program(true);
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
    fn test_filter_becomes_calc() {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let scan = arena.table_access(catalog.lookup_table(&["SALES", "DEPT"]).unwrap());
        let row = arena.row_type(scan).clone();
        let rex = arena.rex_builder().clone();
        let cond = rex.make_call(
            &STD.equals,
            vec![rex.make_input_ref_for(&row, 0), rex.make_exact_literal(10)],
        );
        let filter = arena.filter(scan, cond);

        let rule = FilterToCalcRule;
        let rels = rule.operand().bind(&arena, filter).unwrap();
        let mut call = RuleCall::new(rule.name(), &mut arena, rels);
        rule.on_match(&mut call);
        let calc = call.results()[0];
        let RelOp::Calc { program } = arena.op(calc) else {
            panic!("expected a calc");
        };
        assert_eq!(program.to_string(), "(expr#0=[$0], expr#1=[$1], expr#2=[10], expr#3=[=($t0, $t2)], DEPTNO=[$t0], NAME=[$t1], $condition=[$t3])");
    }
}
