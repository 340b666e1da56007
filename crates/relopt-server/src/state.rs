//! # Application State
//!
//! Created once at startup and shared with every handler through `Arc`.
//! Rules and the cost model are stateless, so requests share them; each
//! request builds its plan in a fresh arena.

use relopt_core::catalog::{Catalog, InMemoryCatalog};
use relopt_core::config::PlannerConfig;
use relopt_core::cost::{CostModel, DefaultCostModel};
use relopt_core::rule::RuleRegistry;
use relopt_core::types::TypeFactory;
use std::sync::Arc;

pub struct AppState {
    pub rule_registry: Arc<RuleRegistry>,
    pub cost_model: Arc<dyn CostModel>,
    /// Tables plans may scan. Holds the `SALES` sample schema.
    pub catalog: Arc<dyn Catalog>,
    /// Used when a request carries no configuration of its own.
    pub config: PlannerConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            rule_registry: Arc::new(relopt_rules::default_rule_registry()),
            cost_model: Arc::new(DefaultCostModel::default()),
            catalog: Arc::new(InMemoryCatalog::with_sales_schema(&TypeFactory::default())),
            config: PlannerConfig::default(),
        }
    }
}
