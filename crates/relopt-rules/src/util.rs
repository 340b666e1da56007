//! Plan-building helpers shared by the rules.

use relopt_core::rel::{RelArena, RelId};
use relopt_core::rex::RexNode;
use relopt_core::types::RelDataType;
use std::collections::HashMap;

/// A boxed projection of `exprs` over `child`. An unnamed bare field
/// reference takes the name of the field it reads.
pub fn create_project(
    arena: &mut RelArena,
    child: RelId,
    exprs: Vec<RexNode>,
    names: Vec<Option<String>>,
) -> RelId {
    let fields = arena.row_type(child).fields();
    let names = names
        .into_iter()
        .zip(&exprs)
        .map(|(name, expr)| match (name, expr) {
            (None, RexNode::InputRef(r)) => fields.get(r.index).map(|f| f.name.clone()),
            (name, _) => name,
        })
        .collect();
    arena.project(child, exprs, names)
}

/// A `SELECT DISTINCT` over the first `group_count` fields of `child` plus
/// the fields named by `args`.
///
/// Returns the new node and, for every projected input ordinal, its position
/// in the output. Group fields keep their positions; an argument that is
/// also a group field is not projected twice. No projection is added when it
/// would reproduce `child` unchanged.
pub fn create_select_distinct(
    arena: &mut RelArena,
    child: RelId,
    group_count: usize,
    args: &[usize],
) -> (RelId, HashMap<usize, usize>) {
    let row = arena.row_type(child).clone();
    let rex = arena.rex_builder().clone();
    let mut exprs = Vec::new();
    let mut names = Vec::new();
    let mut source_of = HashMap::new();
    for ordinal in (0..group_count).chain(args.iter().copied()) {
        if source_of.contains_key(&ordinal) {
            continue;
        }
        source_of.insert(ordinal, exprs.len());
        exprs.push(rex.make_input_ref_for(&row, ordinal));
        names.push(row.fields()[ordinal].name.clone());
    }
    let width = exprs.len();
    let input = if is_identity(&exprs, &names, &row) {
        child
    } else {
        create_project(arena, child, exprs, names.into_iter().map(Some).collect())
    };
    (arena.aggregate(input, width, Vec::new()), source_of)
}

/// Whether `exprs` named `names` reproduce a row of `input` field for field.
pub fn is_identity(exprs: &[RexNode], names: &[String], input: &RelDataType) -> bool {
    let fields = input.fields();
    exprs.len() == fields.len()
        && exprs.iter().zip(names).zip(fields).enumerate().all(|(i, ((expr, name), field))| {
            matches!(expr, RexNode::InputRef(r) if r.index == i) && *name == field.name
        })
}
