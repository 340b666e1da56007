//! Writers that receive a node's explain terms.
//!
//! A node describes itself by calling [`RelWriter::explain`] with one term
//! name per input, per child expression and per extra value, in that order.
//! The writer decides how to render them: [`DigestWriter`] produces the
//! single-line digest, [`PlanWriter`] an indented multi-line plan.

use super::{RelArena, RelNode};

pub trait RelWriter {
    fn explain(&mut self, arena: &RelArena, rel: &RelNode, terms: &[String], values: &[String]);
}

/// Renders `<RelTypeName><traits>(term=value,...)`, inputs by id.
#[derive(Debug, Default)]
pub struct DigestWriter {
    out: String,
}

impl DigestWriter {
    pub fn into_digest(self) -> String {
        self.out
    }
}

impl RelWriter for DigestWriter {
    fn explain(&mut self, _arena: &RelArena, rel: &RelNode, terms: &[String], values: &[String]) {
        let child_exps = rel.child_exps();
        assert_eq!(
            terms.len(),
            rel.inputs().len() + child_exps.len() + values.len(),
            "terms.len()={} inputs.len()={} childExps.len()={} values.len()={}",
            terms.len(),
            rel.inputs().len(),
            child_exps.len(),
            values.len()
        );
        self.out.push_str(rel.rel_type_name());
        self.out.push_str(&rel.traits().to_string());
        self.out.push('(');
        let rendered = rel
            .inputs()
            .iter()
            .map(|input| input.to_string())
            .chain(child_exps.iter().map(|e| e.to_string()))
            .chain(values.iter().cloned());
        for (j, (term, value)) in terms.iter().zip(rendered).enumerate() {
            if j > 0 {
                self.out.push(',');
            }
            self.out.push_str(term);
            self.out.push('=');
            self.out.push_str(&value);
        }
        if !rel.variables_stopped().is_empty() {
            let names: Vec<&str> = rel.variables_stopped().iter().map(String::as_str).collect();
            self.out.push_str(",variablesStopped=[");
            self.out.push_str(&names.join(", "));
            self.out.push(']');
        }
        self.out.push(')');
    }
}

/// Renders one line per node, children indented beneath their parent.
///
/// Input terms are omitted from a node's line since its children follow.
#[derive(Debug, Default)]
pub struct PlanWriter {
    out: String,
    level: usize,
}

impl PlanWriter {
    pub fn into_string(self) -> String {
        self.out
    }
}

impl RelWriter for PlanWriter {
    fn explain(&mut self, arena: &RelArena, rel: &RelNode, terms: &[String], values: &[String]) {
        let inputs = rel.inputs();
        let attributes: Vec<String> = terms[inputs.len()..]
            .iter()
            .zip(
                rel.child_exps()
                    .iter()
                    .map(|e| e.to_string())
                    .chain(values.iter().cloned()),
            )
            .map(|(term, value)| format!("{}=[{}]", term, value))
            .collect();
        for _ in 0..self.level {
            self.out.push_str("  ");
        }
        self.out.push_str(rel.rel_type_name());
        if !attributes.is_empty() {
            self.out.push('(');
            self.out.push_str(&attributes.join(", "));
            self.out.push(')');
        }
        self.out.push('\n');
        self.level += 1;
        for input in inputs {
            arena.node(*input).explain(arena, self);
        }
        self.level -= 1;
    }
}
