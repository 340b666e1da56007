//! # Calc Merging
//!
//! Fuses `Calc(Calc(x))` into a single calc over `x`. The merged program
//! has the upper calc's projections, rewritten in terms of the lower calc's
//! inputs, and the conjunction of both conditions.
//!
//! A calc whose program contains aggregate calls is left alone, since
//! merging would move the aggregate below the lower calc's filter.

use relopt_core::pattern::Operand;
use relopt_core::program::RexProgramBuilder;
use relopt_core::rel::{RelKind, RelOp};
use relopt_core::rule::{Rule, RuleCall};
use tracing::trace;

pub struct MergeCalcRule;

impl Rule for MergeCalcRule {
    fn name(&self) -> &str {
        "MergeCalc"
    }

    fn operand(&self) -> Operand {
        Operand::rel(RelKind::Calc, vec![Operand::calc()])
    }

    fn on_match(&self, call: &mut RuleCall<'_>) {
        let (top, bottom) = (call.rel(0), call.rel(1));
        let arena = call.arena();
        let (RelOp::Calc { program: top_program }, RelOp::Calc { program: bottom_program }) =
            (arena.op(top), arena.op(bottom))
        else {
            panic!("{} matched {}", self.name(), arena.description(top));
        };
        if top_program.contains_aggs() {
            return;
        }
        let merged = RexProgramBuilder::merge_programs(
            top_program,
            bottom_program,
            arena.rex_builder().clone(),
            true,
        );
        let bottom_digest = arena.digest(bottom).to_string();
        let traits = arena.node(bottom).traits().clone();
        let input = arena.inputs(bottom)[0];
        let calc = call.arena_mut().calc_with_traits(input, merged, traits);
        if call.arena().digest(calc) == bottom_digest {
            trace!("{} is trivial", call.arena().description(top));
        }
        call.transform_to(calc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relopt_core::catalog::{Catalog, InMemoryCatalog};
    use relopt_core::program::RexProgram;
    use relopt_core::rel::{RelArena, RelId};
    use relopt_core::rex::STD;

    fn fire(arena: &mut RelArena, top: RelId) -> Vec<RelId> {
        let rule = MergeCalcRule;
        let rels = rule.operand().bind(arena, top).unwrap();
        let mut call = RuleCall::new(rule.name(), arena, rels);
        rule.on_match(&mut call);
        call.results().to_vec()
    }

    #[test]
    fn test_merges_projection_onto_filter() {
        let mut arena = RelArena::default();
        let catalog = InMemoryCatalog::with_sales_schema(arena.type_factory());
        let scan = arena.table_access(catalog.lookup_table(&["SALES", "EMP"]).unwrap());
        let row = arena.row_type(scan).clone();
        let rex = arena.rex_builder().clone();

        let mut builder = RexProgramBuilder::new(row.clone(), rex.clone());
        builder.add_identity();
        builder.add_condition(rex.make_call(
            &STD.greater_than,
            vec![rex.make_input_ref_for(&row, 5), rex.make_exact_literal(1000)],
        ));
        let lower = arena.calc(scan, builder.get_program(true));

        let lower_row = arena.row_type(lower).clone();
        let sal_plus_one = rex.make_call(
            &STD.plus,
            vec![rex.make_input_ref_for(&lower_row, 5), rex.make_exact_literal(1)],
        );
        let output = rex
            .type_factory()
            .create_struct_type(vec![("RAISE".into(), sal_plus_one.ty().clone())]);
        let upper_program = RexProgram::create(&lower_row, &[sal_plus_one], None, &output, &rex);
        let upper = arena.calc(lower, upper_program);

        let results = fire(&mut arena, upper);
        assert_eq!(results.len(), 1);
        let merged = results[0];
        assert_eq!(arena.inputs(merged), &[scan]);
        let RelOp::Calc { program } = arena.op(merged) else {
            panic!("expected a calc");
        };
        assert_eq!(
            program.expanded_condition().map(|c| c.to_string()),
            Some(">($5, 1000)".to_string())
        );
        assert_eq!(program.expanded_projects()[0].to_string(), "+($5, 1)");
        assert_eq!(arena.row_type(merged).field_names(), vec!["RAISE"]);
    }
}
