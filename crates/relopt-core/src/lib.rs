//! # relopt-core: Relational Optimizer Core
//!
//! This crate holds the data model and engine of a rule-driven relational
//! optimizer: typed row expressions, expression programs, a DAG of relational
//! operators, and a heuristic planner that rewrites the DAG by firing rules.
//! The rules themselves live in `relopt-rules`.
//!
//! ## Module Overview
//!
//! - **`types`**: SQL type names, `RelDataType` and the `TypeFactory`.
//! - **`rex`**: Row expressions (`RexNode`), the operator table, the builder,
//!   shuttles and a reference evaluator.
//! - **`typing`**: Operand type checkers and return type inference strategies.
//! - **`program`**: `RexProgram`, a DAG of shared sub-expressions with
//!   projections and a condition, and its builder (normalize, merge).
//! - **`rel`**: Relational operators stored in a `RelArena`, with digests and
//!   explain output.
//! - **`traits`**: Calling convention and collation traits.
//! - **`catalog`**: Table metadata and an in-memory catalog.
//! - **`stats`**: Row count, selectivity and distinct-value estimates.
//! - **`cost`**: Vector cost and the cost model trait.
//! - **`pattern`**: Operand trees that rules match against.
//! - **`rule`**: The `Rule` trait, rule calls and the rule registry.
//! - **`planner`**: `HepPlanner` and `HepProgram`.
//! - **`config`**: Planner configuration.
//! - **`error`**: Validation errors.

pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod pattern;
pub mod planner;
pub mod program;
pub mod rel;
pub mod rex;
pub mod rule;
pub mod stats;
pub mod traits;
pub mod types;
pub mod typing;
