//! Fuses `Filter(Filter(x))` into one filter over `x` whose condition is the
//! lower condition ANDed with the upper one.

use relopt_core::pattern::Operand;
use relopt_core::rel::{RelKind, RelOp};
use relopt_core::rule::{Rule, RuleCall};

pub struct MergeFilterRule;

impl Rule for MergeFilterRule {
    fn name(&self) -> &str {
        "MergeFilter"
    }

    fn operand(&self) -> Operand {
        Operand::rel(RelKind::Filter, vec![Operand::filter()])
    }

    fn on_match(&self, call: &mut RuleCall<'_>) {
        let (top, bottom) = (call.rel(0), call.rel(1));
        let arena = call.arena();
        let (RelOp::Filter { condition: upper }, RelOp::Filter { condition: lower }) =
            (arena.op(top), arena.op(bottom))
        else {
            panic!("{} matched {}", self.name(), arena.description(top));
        };
        let rex = arena.rex_builder();
        let condition = rex
            .compose_conjunction(vec![lower.clone(), upper.clone()])
            .unwrap_or_else(|| rex.make_bool_literal(true));
        let input = arena.inputs(bottom)[0];
        let merged = call.arena_mut().filter(input, condition);
        call.transform_to(merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::catalog::{Catalog, InMemoryCatalog};
    use relopt_core::rel::RelArena;
    use relopt_core::rex::STD;

    #[test]
    fn test_conditions_are_anded() {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let scan = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
        let row = arena.row_type(scan).clone();
        let rex = arena.rex_builder().clone();
        let rich = rex.make_call(
            &STD.greater_than,
            vec![rex.make_input_ref_for(&row, 5), rex.make_exact_literal(1000)],
        );
        let sales = rex.make_call(
            &STD.equals,
            vec![rex.make_input_ref_for(&row, 7), rex.make_exact_literal(30)],
        );
        let lower = arena.filter(scan, rich);
        let upper = arena.filter(lower, sales);

        let rule = MergeFilterRule;
        let rels = rule.operand().bind(&arena, upper).unwrap();
        let mut call = RuleCall::new(rule.name(), &mut arena, rels);
        rule.on_match(&mut call);
        let merged = call.results()[0];
        assert_eq!(arena.inputs(merged), &[scan]);
        assert_eq!(
            arena.digest(merged),
            "FilterRel.NONE(child=rel#0,condition=AND(>($5, 1000), =($7, 30)))"
        );
    }
}
