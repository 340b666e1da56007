//! Planner configuration.

use serde::{Deserialize, Serialize};

/// Order in which the planner visits vertices when looking for matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HepMatchOrder {
    /// Depth-first from the most recent transformation.
    #[default]
    Arbitrary,
    /// Leaves before parents.
    BottomUp,
    /// Parents before leaves.
    TopDown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub match_order: HepMatchOrder,
    /// Maximum number of rule matches per rule group; `None` is unlimited.
    pub match_limit: Option<usize>,
    /// Named rule set to run in addition to the base rules.
    pub rule_set: Option<String>,
    /// Check `RexProgram` validity on every calc the planner registers.
    pub validate_programs: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            match_order: HepMatchOrder::Arbitrary,
            match_limit: None,
            rule_set: None,
            validate_programs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.match_order, HepMatchOrder::Arbitrary);
        assert_eq!(config.match_limit, None);
        assert!(config.validate_programs);
    }

    #[test]
    fn test_partial_json() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"match_order":"bottom_up","match_limit":3}"#).unwrap();
        assert_eq!(config.match_order, HepMatchOrder::BottomUp);
        assert_eq!(config.match_limit, Some(3));
        assert!(config.validate_programs);
        assert!(config.rule_set.is_none());
    }
}
