//! # HTTP Route Handlers
//!
//! ## Optimization Pipeline
//!
//! `POST /optimize` runs these steps for each request:
//!
//! 1. **Build**: Validate the JSON plan and build it in a fresh arena.
//! 2. **Select rules**: Use the rules the request names, or the base rules
//!    plus the configured rule set.
//! 3. **Optimize**: Run a heuristic planner over the rules to fixpoint.
//! 4. **Report**: Explain the chosen plan with its cost and row estimate.
//!
//! ## Error Handling
//!
//! - 400 Bad Request: validation errors, unknown rules and malformed plans.
//! - 500 Internal Server Error: anything else, such as an unsupported
//!   feature reached during optimization.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use relopt_core::config::PlannerConfig;
use relopt_core::cost::RelOptCost;
use relopt_core::error::{RelOptError, RelOptResult};
use relopt_core::planner::{HepPlanner, HepProgram};
use relopt_core::rel::RelArena;
use relopt_core::stats::row_count;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::plan_json::{PlanBuilder, PlanSpec};
use crate::state::AppState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /rules: every registered rule, base rules first.
pub async fn list_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = &state.rule_registry;
    let mut rules: Vec<RuleInfo> = registry
        .base_rules
        .iter()
        .map(|r| RuleInfo {
            name: r.name().to_string(),
            operand: r.operand().to_string(),
            rule_set: None,
        })
        .collect();
    let mut sets: Vec<_> = registry.rule_sets.values().collect();
    sets.sort_by(|a, b| a.name.cmp(&b.name));
    for set in sets {
        rules.extend(set.rules.iter().map(|r| RuleInfo {
            name: r.name().to_string(),
            operand: r.operand().to_string(),
            rule_set: Some(set.name.clone()),
        }));
    }

    Json(RulesResponse { rules })
}

#[derive(Serialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleInfo>,
}

#[derive(Serialize)]
pub struct RuleInfo {
    pub name: String,
    pub operand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set: Option<String>,
}

#[derive(Deserialize)]
pub struct OptimizeRequest {
    pub plan: PlanSpec,
    /// Rules to run, by name. Overrides the configured rule set.
    pub rules: Option<Vec<String>>,
    pub config: Option<PlannerConfig>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    /// Indented plan, one node per line.
    pub explain: String,
    pub digest: String,
    pub cost: RelOptCost,
    pub rows: f64,
    pub transformations: usize,
}

/// POST /optimize: build a JSON plan, optimize it and explain the result.
pub async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, (StatusCode, String)> {
    run_optimization(&state, req).map(Json).map_err(reject)
}

fn reject(err: RelOptError) -> (StatusCode, String) {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    debug!(%status, error = %err, "rejected optimize request");
    (status, err.to_string())
}

fn run_optimization(state: &AppState, req: OptimizeRequest) -> RelOptResult<OptimizeResponse> {
    let config = req.config.unwrap_or_else(|| state.config.clone());
    let rules = match &req.rules {
        Some(names) => state.rule_registry.resolve(names)?,
        None => state.rule_registry.active_rules(config.rule_set.as_deref())?,
    };

    let mut arena = RelArena::default();
    let root = PlanBuilder::new(&mut arena, state.catalog.as_ref()).build(&req.plan)?;

    let mut planner = HepPlanner::new(HepProgram::of_rules(rules), arena, config)
        .with_cost_model(state.cost_model.clone());
    planner.set_root(root);
    let best = planner.find_best_exp();

    let arena = planner.arena();
    let response = OptimizeResponse {
        explain: arena.explain_plan(best),
        digest: arena.digest(best).to_string(),
        cost: state.cost_model.cumulative_cost(arena, best),
        rows: row_count(arena, best),
        transformations: planner.transformations(),
    };
    info!(
        transformations = response.transformations,
        digest = %response.digest,
        "optimized plan"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let app = crate::router(Arc::new(AppState::new()));
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn post_optimize(body: Value) -> (StatusCode, Vec<u8>) {
        send(
            Request::post("/optimize")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    fn emp() -> Value {
        json!({"scan": {"table": ["SALES", "EMP"]}})
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_list_rules_includes_rule_sets() {
        let (status, body) = send(Request::get("/rules").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        let rules = body["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 10);
        let merge_calc = rules.iter().find(|r| r["name"] == "MergeCalc").unwrap();
        assert_eq!(merge_calc["rule_set"], "calc");
        assert_eq!(merge_calc["operand"], "Calc(Calc(any))");
    }

    #[tokio::test]
    async fn test_optimize_removes_redundant_distinct() {
        let (status, body) = post_optimize(json!({"plan": {"distinct": {"input": emp()}}})).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["digest"], "TableAccessRel.NONE(table=[SALES, EMP])");
        assert_eq!(body["transformations"], 1);
        assert_eq!(body["rows"], 14.0);
    }

    #[tokio::test]
    async fn test_optimize_with_calc_rule_set() {
        let plan = json!({"project": {
            "input": {"filter": {
                "input": emp(),
                "condition": {"call": ">", "operands": [{"input": 5}, {"literal": 1000}]}
            }},
            "exprs": [{"input": 1}]
        }});
        let (status, body) = post_optimize(json!({"plan": plan, "config": {"rule_set": "calc"}})).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["digest"].as_str().unwrap().starts_with("CalcRel"), "{}", body);
        assert!(body["explain"].as_str().unwrap().contains("TableAccessRel"));
    }

    #[tokio::test]
    async fn test_named_rules_only() {
        let plan = json!({"distinct": {"input": emp()}});
        let (status, body) = post_optimize(json!({"plan": plan, "rules": ["MergeFilter"]})).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["transformations"], 0);
        assert!(body["digest"].as_str().unwrap().starts_with("DistinctRel"));
    }

    #[tokio::test]
    async fn test_bad_requests_are_rejected() {
        let (status, body) = post_optimize(json!({"plan": emp(), "rules": ["NoSuchRule"]})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(String::from_utf8(body).unwrap(), "Rule 'NoSuchRule' not found");

        let plan = json!({"join": {"left": emp(), "right": emp(), "join_type": "right"}});
        let (status, _) = post_optimize(json!({"plan": plan})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let plan = json!({"filter": {"input": emp(), "condition": {"call": "+", "operands": [{"input": 0}, {"literal": true}]}}});
        let (status, body) = post_optimize(json!({"plan": plan})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().starts_with("Cannot apply '+'"));
    }
}
