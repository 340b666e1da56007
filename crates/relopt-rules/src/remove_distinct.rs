//! Removes a `Distinct` whose input is already distinct; otherwise replaces
//! it with an aggregate grouping on every column.

use relopt_core::pattern::{Operand, RelMatcher};
use relopt_core::rel::RelKind;
use relopt_core::rule::{Rule, RuleCall};

pub struct RemoveDistinctRule;

impl Rule for RemoveDistinctRule {
    fn name(&self) -> &str {
        "RemoveDistinct"
    }

    fn operand(&self) -> Operand {
        Operand::rel(
            RelKind::Distinct,
            vec![Operand::Rel(RelMatcher::AnyRel, vec![])],
        )
    }

    fn on_match(&self, call: &mut RuleCall<'_>) {
        let child = call.rel(1);
        if call.arena().is_distinct(child) {
            call.transform_to(child);
            return;
        }
        let width = call.arena().row_type(child).field_count();
        let aggregate = call.arena_mut().aggregate(child, width, Vec::new());
        call.transform_to(aggregate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::catalog::{Catalog, InMemoryCatalog};
    use relopt_core::rel::{RelArena, RelId, RelOp};
    use relopt_core::rex::STD;

    fn fire(arena: &mut RelArena, distinct: RelId) -> Vec<RelId> {
        let rule = RemoveDistinctRule;
        let rels = rule.operand().bind(arena, distinct).unwrap();
        let mut call = RuleCall::new(rule.name(), arena, rels);
        rule.on_match(&mut call);
        call.results().to_vec()
    }

    #[test]
    fn test_distinct_over_keyed_table_is_dropped() {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let scan = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
        let distinct = arena.distinct(scan);
        assert_eq!(fire(&mut arena, distinct), vec![scan]);
    }

    #[test]
    fn test_distinct_becomes_group_by_all() {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let scan = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
        let row = arena.row_type(scan).clone();
        let rex = arena.rex_builder().clone();
        let deptno = arena.project(scan, vec![rex.make_input_ref_for(&row, 7)], vec![None]);
        let positive = rex.make_call(
            &STD.greater_than,
            vec![
                rex.make_input_ref_for(arena.row_type(deptno), 0),
                rex.make_exact_literal(0),
            ],
        );
        let filtered = arena.filter(deptno, positive);
        let distinct = arena.distinct(filtered);
        let results = fire(&mut arena, distinct);
        assert_eq!(results.len(), 1);
        assert!(matches!(
            arena.op(results[0]),
            RelOp::Aggregate { group_count: 1, agg_calls } if agg_calls.is_empty()
        ));
    }
}
