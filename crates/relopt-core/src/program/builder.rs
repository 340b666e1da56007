//! Incremental construction of [`RexProgram`]s.
//!
//! A [`RexProgramBuilder`] holds a growing list of common expressions. The
//! first entries are always the program's input fields. Every registered
//! expression is flattened so that the operands of each call are local
//! references, and registering an expression that is already present returns
//! the existing reference.
//!
//! ## Registration modes
//!
//! - [`register_input`](RexProgramBuilder::register_input): `$i` means input field `i`.
//! - [`register_output`](RexProgramBuilder::register_output): `$i` means the builder's
//!   `i`-th projection. This is how one program is stacked on another.
//!
//! ## Normalization
//!
//! [`RexProgramBuilder::normalize`] replays a program into a fresh builder, driven
//! by each projection in turn and then by the condition. The result has no
//! duplicate or unused expressions, and its expressions appear in the order in
//! which the projections first need them. Normalizing twice gives the same
//! program as normalizing once.

use std::collections::HashMap;

use crate::rex::{RexBuilder, RexCall, RexFieldAccess, RexInputRef, RexLocalRef, RexNode, RexShuttle, STD};
use crate::rex::{walk_call, RexCorrelVariable, RexDynamicParam, RexLiteral};
use crate::types::RelDataType;

use super::RexProgram;

pub struct RexProgramBuilder {
    rex: RexBuilder,
    input_row_type: RelDataType,
    exprs: Vec<RexNode>,
    expr_map: HashMap<(RelDataType, RexNode), RexLocalRef>,
    local_refs: Vec<RexLocalRef>,
    project_refs: Vec<RexLocalRef>,
    project_names: Vec<Option<String>>,
    condition: Option<RexLocalRef>,
    validating: bool,
}

impl RexProgramBuilder {
    /// A builder whose first expressions are the fields of `input_row_type`.
    pub fn new(input_row_type: RelDataType, rex: RexBuilder) -> Self {
        let mut builder = Self {
            rex,
            input_row_type: input_row_type.clone(),
            exprs: Vec::new(),
            expr_map: HashMap::new(),
            local_refs: Vec::new(),
            project_refs: Vec::new(),
            project_names: Vec::new(),
            condition: None,
            validating: cfg!(debug_assertions),
        };
        for (i, field) in input_row_type.fields().iter().enumerate() {
            builder.register_internal(RexNode::input_ref(i, field.ty.clone()), false);
        }
        builder
    }

    /// Check every newly added expression against the input row type.
    pub fn with_validation(mut self, validating: bool) -> Self {
        self.validating = validating;
        self
    }

    /// Rebuild a builder from the parts of a program. With `normalize`, only
    /// the expressions reachable from the projections and condition survive.
    fn from_parts(
        rex: RexBuilder,
        input_row_type: &RelDataType,
        exprs: &[RexNode],
        project_refs: &[RexLocalRef],
        condition: Option<&RexLocalRef>,
        output_row_type: &RelDataType,
        normalize: bool,
    ) -> Self {
        let mut builder = Self::new(input_row_type.clone(), rex);
        let mut projects = Vec::with_capacity(project_refs.len());
        let condition = {
            let mut shuttle = RegisterShuttle::midput(&mut builder, true, exprs);
            if !normalize {
                for expr in exprs {
                    expr.accept(&mut shuttle);
                }
            }
            for (project, field) in project_refs.iter().zip(output_row_type.fields()) {
                let local = expect_local(exprs[project.index].accept(&mut shuttle));
                projects.push((local.index, field.name.clone()));
            }
            condition.map(|c| expect_local(exprs[c.index].accept(&mut shuttle)))
        };
        for (index, name) in projects {
            builder.add_project_ordinal(index, Some(name.as_str()));
        }
        if let Some(condition) = condition {
            builder.add_condition(condition.into());
        }
        builder
    }

    /// A builder holding the same expressions as `program`.
    ///
    /// # Panics
    ///
    /// Panics if `program` is not valid.
    pub fn for_program(program: &RexProgram, rex: RexBuilder, normalize: bool) -> Self {
        program.is_valid(true);
        Self::from_parts(
            rex,
            program.input_row_type(),
            program.expr_list(),
            program.project_list(),
            program.condition(),
            program.output_row_type(),
            normalize,
        )
    }

    /// A builder over expression lists, passing every expression through
    /// `shuttle` on the way in. With `update_refs`, local references in later
    /// expressions are renumbered to where the earlier ones landed.
    #[allow(clippy::too_many_arguments)]
    pub fn create<S: RexShuttle + ?Sized>(
        rex: RexBuilder,
        input_row_type: &RelDataType,
        exprs: &[RexNode],
        project_refs: &[RexLocalRef],
        condition: Option<&RexLocalRef>,
        output_row_type: &RelDataType,
        shuttle: &mut S,
        update_refs: bool,
    ) -> Self {
        let mut builder = Self::new(input_row_type.clone(), rex);
        let mut new_refs: Vec<RexLocalRef> = Vec::with_capacity(exprs.len());
        for expr in exprs {
            let mut expr = expr.clone();
            if update_refs {
                expr = expr.accept(&mut UpdateRefShuttle { new_refs: &new_refs });
            }
            let expr = expr.accept(shuttle);
            let local = expect_local(expr.accept(&mut RegisterShuttle::input(&mut builder, false)));
            new_refs.push(local);
        }
        let fields = output_row_type.fields();
        for (i, old) in project_refs.iter().enumerate() {
            let mut node = RexNode::LocalRef(old.clone());
            if update_refs {
                node = node.accept(&mut UpdateRefShuttle { new_refs: &new_refs });
            }
            builder.project_refs.push(expect_local(node.accept(shuttle)));
            builder.project_names.push(Some(fields[i].name.clone()));
        }
        if let Some(condition) = condition {
            let mut node = RexNode::LocalRef(condition.clone());
            if update_refs {
                node = node.accept(&mut UpdateRefShuttle { new_refs: &new_refs });
            }
            let node = node.accept(shuttle);
            builder.add_condition(node);
        }
        builder
    }

    /// The canonical form of `program`.
    pub fn normalize(rex: RexBuilder, program: &RexProgram) -> RexProgram {
        Self::for_program(program, rex, true).get_program(false)
    }

    /// A program equivalent to applying `bottom` and then `top`.
    ///
    /// Every input reference of `top` is replaced by the matching projection of
    /// `bottom`, so the result reads `bottom`'s inputs directly. A condition in
    /// either program is kept, ANDed if both have one.
    pub fn merge_programs(top: &RexProgram, bottom: &RexProgram, rex: RexBuilder, normalize: bool) -> RexProgram {
        top.is_valid(true);
        let mut builder = Self::for_program(bottom, rex, false);
        let project_refs = builder.register_projects_and_condition(top);
        builder.clear_projects();
        let fields = top.output_row_type().fields();
        assert_eq!(fields.len(), project_refs.len());
        for (local, field) in project_refs.into_iter().zip(fields) {
            builder.add_project(local.into(), Some(field.name.as_str()));
        }
        let merged = builder.get_program(normalize);
        merged.is_valid(true);
        merged
    }

    fn register_projects_and_condition(&mut self, program: &RexProgram) -> Vec<RexLocalRef> {
        let exprs = program.expr_list();
        let mut project_refs = Vec::with_capacity(program.project_list().len());
        let condition = {
            let mut shuttle = RegisterShuttle::output(self, exprs);
            for project in program.project_list() {
                project_refs.push(expect_local(exprs[project.index].accept(&mut shuttle)));
            }
            program
                .condition()
                .map(|c| expect_local(exprs[c.index].accept(&mut shuttle)))
        };
        if let Some(condition) = condition {
            let local = self.register_input(condition.into());
            self.add_condition(local.into());
        }
        project_refs
    }

    // ------------------------------------------------------------------
    // Projections and condition
    // ------------------------------------------------------------------

    /// Project `expr`, given in terms of the inputs. A missing name is
    /// generated when the program is built.
    pub fn add_project(&mut self, expr: RexNode, name: Option<&str>) -> RexLocalRef {
        let local = self.register_input(expr);
        self.add_project_ordinal(local.index, name)
    }

    /// Project the expression at `ordinal`.
    pub fn add_project_ordinal(&mut self, ordinal: usize, name: Option<&str>) -> RexLocalRef {
        let local = self.local_refs[ordinal].clone();
        self.project_refs.push(local.clone());
        self.project_names.push(name.map(str::to_string));
        local
    }

    /// Insert a projection of `expr` at position `at`.
    pub fn add_project_at(&mut self, at: usize, expr: RexNode, name: Option<&str>) -> RexLocalRef {
        let local = self.register_input(expr);
        self.project_refs.insert(at, local.clone());
        self.project_names.insert(at, name.map(str::to_string));
        local
    }

    pub fn add_project_at_ordinal(&mut self, at: usize, ordinal: usize, name: Option<&str>) -> RexLocalRef {
        let local = self.local_refs[ordinal].clone();
        self.add_project_at(at, local.into(), name)
    }

    /// Add a condition, ANDed with any existing one.
    pub fn add_condition(&mut self, expr: RexNode) {
        let local = self.register_input(expr);
        self.condition = Some(match self.condition.take() {
            None => local,
            Some(previous) => {
                let and = self.rex.make_call(&STD.and, vec![previous.into(), local.into()]);
                self.register_input(and)
            }
        });
    }

    /// Project every input field under its own name.
    ///
    /// # Panics
    ///
    /// Panics if projections have already been added.
    pub fn add_identity(&mut self) {
        assert!(self.project_refs.is_empty(), "identity must be the only projection");
        let fields = self.input_row_type.fields().to_vec();
        for (i, field) in fields.iter().enumerate() {
            self.add_project(RexNode::input_ref(i, field.ty.clone()), Some(field.name.as_str()));
        }
    }

    pub fn clear_projects(&mut self) {
        self.project_refs.clear();
        self.project_names.clear();
    }

    /// A local reference to input field `index`.
    pub fn make_input_ref(&self, index: usize) -> RexLocalRef {
        let fields = self.input_row_type.fields();
        assert!(index < fields.len(), "input {} out of range 0..{}", index, fields.len());
        RexLocalRef::new(index, fields[index].ty.clone())
    }

    pub fn input_row_type(&self) -> &RelDataType {
        &self.input_row_type
    }

    pub fn project_list(&self) -> &[RexLocalRef] {
        &self.project_refs
    }

    pub fn rex_builder(&self) -> &RexBuilder {
        &self.rex
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register `expr`, written in terms of the inputs.
    pub fn register_input(&mut self, expr: RexNode) -> RexLocalRef {
        expect_local(expr.accept(&mut RegisterShuttle::input(self, true)))
    }

    /// Register `expr`, where `$i` stands for the `i`-th projection.
    pub fn register_output(&mut self, expr: RexNode) -> RexLocalRef {
        let exprs = self.exprs.clone();
        expect_local(expr.accept(&mut RegisterShuttle::output(self, &exprs)))
    }

    /// Append `expr` without looking for an existing copy.
    pub fn add_expr(&mut self, expr: RexNode) -> RexLocalRef {
        let local = RexLocalRef::new(self.exprs.len(), expr.ty().clone());
        self.exprs.push(expr);
        self.local_refs.push(local.clone());
        local
    }

    fn register_internal(&mut self, expr: RexNode, force: bool) -> RexLocalRef {
        let key = (expr.ty().clone(), expr.clone());
        let existing = match self.expr_map.get(&key) {
            Some(local) => Some(local.clone()),
            None => expr.as_local_ref().cloned(),
        };
        let mut local = match existing {
            Some(local) => {
                if force {
                    self.add_expr(expr);
                }
                local
            }
            None => {
                if self.validating {
                    self.validate(&expr, self.exprs.len());
                }
                let local = self.add_expr(expr);
                self.expr_map.insert(key, local.clone());
                local
            }
        };
        while let RexNode::LocalRef(next) = &self.exprs[local.index] {
            local = next.clone();
        }
        local
    }

    /// # Panics
    ///
    /// Panics if a reference in `expr` is out of range or disagrees with the
    /// type of what it refers to.
    fn validate(&self, expr: &RexNode, field_ordinal: usize) {
        fn walk(builder: &RexProgramBuilder, root: &RexNode, node: &RexNode, field_ordinal: usize) {
            match node {
                RexNode::InputRef(input) => {
                    let fields = builder.input_row_type.fields();
                    match fields.get(input.index) {
                        Some(field) if field.ty != input.ty => panic!(
                            "in expression {}, field reference ${} has inconsistent type",
                            root, input.index
                        ),
                        Some(_) => {}
                        None => panic!(
                            "in expression {}, field reference ${} is out of bounds",
                            root, input.index
                        ),
                    }
                }
                RexNode::LocalRef(local) => {
                    if local.index >= field_ordinal {
                        panic!("in expression {}, local reference {} is out of bounds", root, local);
                    }
                    if *builder.exprs[local.index].ty() != local.ty {
                        panic!("in expression {}, local reference {} has inconsistent type", root, local);
                    }
                }
                RexNode::Call(call) => {
                    for operand in &call.operands {
                        walk(builder, root, operand, field_ordinal);
                    }
                }
                RexNode::FieldAccess(access) => walk(builder, root, &access.expr, field_ordinal),
                _ => {}
            }
        }
        walk(self, expr, expr, field_ordinal);
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    fn generate_missing_names(&mut self) {
        let mut j = 0;
        for i in 0..self.project_names.len() {
            if self.project_names[i].is_some() {
                continue;
            }
            loop {
                let candidate = format!("${}", j);
                j += 1;
                if !self.project_names.iter().any(|n| n.as_deref() == Some(candidate.as_str())) {
                    self.project_names[i] = Some(candidate);
                    break;
                }
            }
        }
    }

    fn compute_output_row_type(&self) -> RelDataType {
        let fields = self
            .project_refs
            .iter()
            .zip(&self.project_names)
            .map(|(local, name)| (name.clone().unwrap_or_default(), local.ty.clone()))
            .collect();
        self.rex.type_factory().create_struct_type(fields)
    }

    /// Build the program. With `normalize`, the expressions are replayed into
    /// canonical form first.
    pub fn get_program(&mut self, normalize: bool) -> RexProgram {
        assert_eq!(self.project_refs.len(), self.project_names.len());
        self.generate_missing_names();
        let output_row_type = self.compute_output_row_type();
        if normalize {
            return Self::from_parts(
                self.rex.clone(),
                &self.input_row_type,
                &self.exprs,
                &self.project_refs,
                self.condition.as_ref(),
                &output_row_type,
                true,
            )
            .get_program(false);
        }
        RexProgram::new(
            self.input_row_type.clone(),
            self.exprs.clone(),
            self.project_refs.clone(),
            self.condition.clone(),
            output_row_type,
        )
    }
}

fn expect_local(node: RexNode) -> RexLocalRef {
    match node {
        RexNode::LocalRef(local) => local,
        other => panic!("registration produced {} instead of a local reference", other),
    }
}

/// How a registering shuttle reads `$i` and `$ti`.
enum RefMode<'e> {
    /// `$i` is an input; `$ti` is a reference into the builder itself.
    Input { valid: bool },
    /// `$i` is an input; `$ti` indexes `exprs` and is expanded.
    Midput { valid: bool, exprs: &'e [RexNode] },
    /// `$i` is the builder's projection `i`; `$ti` indexes `exprs` and is expanded.
    Output { exprs: &'e [RexNode] },
}

struct RegisterShuttle<'b, 'e> {
    builder: &'b mut RexProgramBuilder,
    mode: RefMode<'e>,
}

impl<'b, 'e> RegisterShuttle<'b, 'e> {
    fn input(builder: &'b mut RexProgramBuilder, valid: bool) -> Self {
        Self { builder, mode: RefMode::Input { valid } }
    }

    fn midput(builder: &'b mut RexProgramBuilder, valid: bool, exprs: &'e [RexNode]) -> Self {
        Self { builder, mode: RefMode::Midput { valid, exprs } }
    }

    fn output(builder: &'b mut RexProgramBuilder, exprs: &'e [RexNode]) -> Self {
        Self { builder, mode: RefMode::Output { exprs } }
    }

    fn register(&mut self, expr: RexNode) -> RexNode {
        self.builder.register_internal(expr, false).into()
    }
}

impl RexShuttle for RegisterShuttle<'_, '_> {
    fn visit_input_ref(&mut self, input: &RexInputRef) -> RexNode {
        match self.mode {
            RefMode::Input { valid } | RefMode::Midput { valid, .. } => {
                let count = self.builder.input_row_type.field_count();
                if valid {
                    assert!(input.index < count, "input ${} out of range 0..{}", input.index, count);
                    let field_ty = &self.builder.input_row_type.fields()[input.index].ty;
                    assert!(
                        input.ty.is_struct() || input.ty == *field_ty,
                        "input ${} has type {} but the input field is {}",
                        input.index,
                        input.ty.full_type_string(),
                        field_ty.full_type_string()
                    );
                }
                self.builder.local_refs[input.index].clone().into()
            }
            RefMode::Output { .. } => {
                let local = self.builder.project_refs[input.index].clone();
                assert!(
                    local.ty == input.ty,
                    "output ${} has type {} but the projection is {}",
                    input.index,
                    input.ty.full_type_string(),
                    local.ty.full_type_string()
                );
                local.into()
            }
        }
    }

    fn visit_local_ref(&mut self, local: &RexLocalRef) -> RexNode {
        match self.mode {
            RefMode::Midput { exprs, .. } | RefMode::Output { exprs } => exprs[local.index].accept(self),
            RefMode::Input { valid } => {
                if valid {
                    let exprs = &self.builder.exprs;
                    assert!(local.index < exprs.len(), "local {} out of range 0..{}", local, exprs.len());
                    assert!(
                        *exprs[local.index].ty() == local.ty,
                        "local {} has type {} but refers to {}",
                        local,
                        local.ty.full_type_string(),
                        exprs[local.index].ty().full_type_string()
                    );
                }
                let mut local = local.clone();
                loop {
                    let index = local.index;
                    match &self.builder.exprs[index] {
                        RexNode::LocalRef(next) => {
                            if next.index >= index {
                                panic!("expr {} references later expr {}", next, next.index);
                            }
                            local = next.clone();
                        }
                        _ => return self.register(local.into()),
                    }
                }
            }
        }
    }

    fn visit_literal(&mut self, literal: &RexLiteral) -> RexNode {
        self.register(RexNode::Literal(literal.clone()))
    }

    fn visit_correl_variable(&mut self, var: &RexCorrelVariable) -> RexNode {
        self.register(RexNode::CorrelVariable(var.clone()))
    }

    fn visit_dynamic_param(&mut self, param: &RexDynamicParam) -> RexNode {
        self.register(RexNode::DynamicParam(param.clone()))
    }

    fn visit_field_access(&mut self, access: &RexFieldAccess) -> RexNode {
        let expr = access.expr.accept(self);
        self.register(RexNode::FieldAccess(RexFieldAccess {
            expr: Box::new(expr),
            field: access.field.clone(),
        }))
    }

    fn visit_call(&mut self, call: &std::sync::Arc<RexCall>) -> RexNode {
        let expr = walk_call(self, call);
        self.register(expr)
    }
}

/// Maps `$ti` to wherever expression `i` landed in the new builder.
struct UpdateRefShuttle<'a> {
    new_refs: &'a [RexLocalRef],
}

impl RexShuttle for UpdateRefShuttle<'_> {
    fn visit_local_ref(&mut self, local: &RexLocalRef) -> RexNode {
        self.new_refs[local.index].clone().into()
    }
}
