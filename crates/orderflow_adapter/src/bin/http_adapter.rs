#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use orderflow_adapter::{
    AdapterHealthResponse, AppRuntime, FreezeRequest, MarkUnpaidRequest, MarkUnpaidResponse,
    NextTaskRequest, NextTaskResponse, PurgeUsedRequest, PurgeUsedResponse, RechargeRequest,
    RuleCreateRequest, RulePatchRequest, RuleResponse, RulesListResponse, SubmitRequest,
    SubmitResponse, UserCreateRequest, UserResponse, WithdrawGateResponse,
};

type SharedRuntime = Arc<Mutex<AppRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("ORDERFLOW_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime = Arc::new(Mutex::new(AppRuntime::default_from_env()?));
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/task/next", post(next_task))
        .route("/v1/task/mark-unpaid", post(mark_unpaid))
        .route("/v1/task/submit", post(submit))
        .route("/v1/withdraw/eligibility/:user_id", get(withdraw_gate))
        .route("/v1/admin/users", post(create_user))
        .route("/v1/admin/users/:user_id/freeze", post(set_frozen))
        .route("/v1/admin/users/:user_id/recharge", post(recharge))
        .route("/v1/admin/rules", post(create_rule).get(list_rules))
        .route("/v1/admin/rules/purge-used", post(purge_used))
        .route("/v1/admin/rules/:rule_id/confirm", post(confirm_rule))
        .route("/v1/admin/rules/:rule_id", patch(patch_rule).delete(delete_rule))
        .with_state(runtime);

    println!("orderflow_adapter_http listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn lock_runtime(
    runtime: &SharedRuntime,
) -> Result<std::sync::MutexGuard<'_, AppRuntime>, String> {
    runtime
        .lock()
        .map_err(|_| "adapter runtime lock poisoned".to_string())
}

async fn healthz(
    State(runtime): State<SharedRuntime>,
) -> (StatusCode, Json<AdapterHealthResponse>) {
    let report = lock_runtime(&runtime).and_then(|runtime| runtime.health_report());
    match report {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AdapterHealthResponse {
                status: "error".to_string(),
                outcome: "UNHEALTHY".to_string(),
                reason: Some(reason),
                users: 0,
                rules: 0,
            }),
        ),
    }
}

async fn next_task(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<NextTaskRequest>,
) -> (StatusCode, Json<NextTaskResponse>) {
    let outcome = lock_runtime(&runtime).and_then(|mut runtime| runtime.next_task(&request));
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(NextTaskResponse::error_with(reason)),
        ),
    }
}

async fn mark_unpaid(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<MarkUnpaidRequest>,
) -> (StatusCode, Json<MarkUnpaidResponse>) {
    let outcome = lock_runtime(&runtime).and_then(|mut runtime| runtime.mark_unpaid(&request));
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(MarkUnpaidResponse {
                unpaid: None,
                error: Some(reason),
            }),
        ),
    }
}

async fn submit(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<SubmitRequest>,
) -> (StatusCode, Json<SubmitResponse>) {
    let outcome = lock_runtime(&runtime).and_then(|mut runtime| runtime.submit(&request));
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(SubmitResponse::error_with(reason)),
        ),
    }
}

async fn withdraw_gate(
    State(runtime): State<SharedRuntime>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<WithdrawGateResponse>) {
    let outcome = lock_runtime(&runtime).and_then(|runtime| runtime.withdraw_gate(&user_id));
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(WithdrawGateResponse {
                can_withdraw: false,
                completed_today: 0,
                error: Some(reason),
            }),
        ),
    }
}

async fn create_user(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<UserCreateRequest>,
) -> (StatusCode, Json<UserResponse>) {
    let outcome = lock_runtime(&runtime).and_then(|mut runtime| runtime.create_user(&request));
    user_reply(outcome)
}

async fn set_frozen(
    State(runtime): State<SharedRuntime>,
    Path(user_id): Path<String>,
    Json(request): Json<FreezeRequest>,
) -> (StatusCode, Json<UserResponse>) {
    let outcome =
        lock_runtime(&runtime).and_then(|mut runtime| runtime.set_frozen(&user_id, &request));
    user_reply(outcome)
}

async fn recharge(
    State(runtime): State<SharedRuntime>,
    Path(user_id): Path<String>,
    Json(request): Json<RechargeRequest>,
) -> (StatusCode, Json<UserResponse>) {
    let outcome =
        lock_runtime(&runtime).and_then(|mut runtime| runtime.recharge(&user_id, &request));
    user_reply(outcome)
}

fn user_reply(outcome: Result<UserResponse, String>) -> (StatusCode, Json<UserResponse>) {
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(UserResponse {
                error: Some(reason),
                ..UserResponse::default()
            }),
        ),
    }
}

async fn create_rule(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<RuleCreateRequest>,
) -> (StatusCode, Json<RuleResponse>) {
    let outcome = lock_runtime(&runtime).and_then(|mut runtime| runtime.create_rule(&request));
    rule_reply(outcome)
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesListQuery {
    user_id: Option<String>,
}

async fn list_rules(
    State(runtime): State<SharedRuntime>,
    Query(query): Query<RulesListQuery>,
) -> (StatusCode, Json<RulesListResponse>) {
    let outcome =
        lock_runtime(&runtime).and_then(|runtime| runtime.list_rules(query.user_id.as_deref()));
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(RulesListResponse {
                rules: Vec::new(),
                error: Some(reason),
            }),
        ),
    }
}

async fn confirm_rule(
    State(runtime): State<SharedRuntime>,
    Path(rule_id): Path<String>,
) -> (StatusCode, Json<RuleResponse>) {
    let outcome = lock_runtime(&runtime).and_then(|mut runtime| runtime.confirm_rule(&rule_id));
    rule_reply(outcome)
}

async fn patch_rule(
    State(runtime): State<SharedRuntime>,
    Path(rule_id): Path<String>,
    Json(request): Json<RulePatchRequest>,
) -> (StatusCode, Json<RuleResponse>) {
    let outcome =
        lock_runtime(&runtime).and_then(|mut runtime| runtime.patch_rule(&rule_id, &request));
    rule_reply(outcome)
}

async fn delete_rule(
    State(runtime): State<SharedRuntime>,
    Path(rule_id): Path<String>,
) -> (StatusCode, Json<RuleResponse>) {
    let outcome = lock_runtime(&runtime).and_then(|mut runtime| runtime.delete_rule(&rule_id));
    rule_reply(outcome)
}

fn rule_reply(outcome: Result<RuleResponse, String>) -> (StatusCode, Json<RuleResponse>) {
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(RuleResponse {
                rule: None,
                error: Some(reason),
            }),
        ),
    }
}

async fn purge_used(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<PurgeUsedRequest>,
) -> (StatusCode, Json<PurgeUsedResponse>) {
    let outcome =
        lock_runtime(&runtime).and_then(|mut runtime| runtime.purge_used_rules(&request));
    match outcome {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(PurgeUsedResponse {
                removed: 0,
                error: Some(reason),
            }),
        ),
    }
}
