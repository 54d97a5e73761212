#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use orderflow_engines::amount::{AmountConfig, AmountRuntime};
use orderflow_engines::issuance::{IssuanceConfig, IssuanceRuntime};
use orderflow_engines::submission::{SubmissionConfig, SubmissionRuntime};
use orderflow_kernel_contracts::flow::{IssuanceOutcome, StoreTier, SubmissionOutcome};
use orderflow_kernel_contracts::rule::{Rule, RuleId};
use orderflow_kernel_contracts::task::{OrderItem, Task, TaskId, TaskKind, TaskStatus};
use orderflow_kernel_contracts::user::{UserId, UserRecord};
use orderflow_kernel_contracts::{Money, WallClockMs};
use orderflow_os::admin_rules::{AdminRulesWiring, RuleDraftInput, RulePatchInput};
use orderflow_os::admin_users::AdminUsersWiring;
use orderflow_os::task_flow::{MarkUnpaidInput, NextTaskInput, SubmitInput};
use orderflow_os::{LocalClock, TaskFlowWiring, WiringError};
use orderflow_storage::JsonFileStore;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub label: String,
    pub unit_price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub kind: String,
    pub order_amount: f64,
    pub commission: f64,
    pub commission_rate: f64,
    pub items: Vec<OrderItemDto>,
    pub deficit: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTaskRequest {
    pub user_id: String,
    pub store: String,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTaskResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpaid: Option<TaskDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_more: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_eligible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggest_upgrade: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NextTaskResponse {
    pub fn error_with(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkUnpaidRequest {
    pub user_id: String,
    pub task: TaskDto,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkUnpaidResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpaid: Option<TaskDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user_id: String,
    pub task_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need_recharge: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deficit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn error_with(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawGateResponse {
    pub can_withdraw: bool,
    pub completed_today: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDto {
    pub rule_id: String,
    pub user_id: String,
    pub task_no: u32,
    pub amount_spec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    pub status: String,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCreateRequest {
    pub user_id: String,
    pub task_no: u32,
    pub amount_spec: String,
    #[serde(default)]
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatchRequest {
    #[serde(default)]
    pub task_no: Option<u32>,
    #[serde(default)]
    pub amount_spec: Option<String>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub clear_percent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesListResponse {
    pub rules: Vec<RuleDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeUsedRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeUsedResponse {
    pub removed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreezeRequest {
    pub frozen: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RechargeRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub balance: f64,
    pub overall_commission: f64,
    pub completed_today: u32,
    pub total_completed: u64,
    pub is_frozen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub users: usize,
    pub rules: usize,
}

/// Everything behind the HTTP surface: one store, one wiring stack. The
/// binary serializes access behind a single mutex, which is what keeps
/// the per-user load-modify-save units from interleaving.
#[derive(Debug)]
pub struct AppRuntime {
    store: JsonFileStore,
    flow: TaskFlowWiring,
}

impl AppRuntime {
    pub fn default_from_env() -> Result<Self, String> {
        let data_dir = env::var("ORDERFLOW_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("orderflow_data"));
        let utc_offset_minutes = env::var("ORDERFLOW_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0);
        let clock = LocalClock::new(utc_offset_minutes)
            .map_err(|violation| format!("invalid clock offset: {violation:?}"))?;
        Ok(Self::for_store(JsonFileStore::for_dir(data_dir), clock))
    }

    pub fn for_store(store: JsonFileStore, clock: LocalClock) -> Self {
        let flow = TaskFlowWiring::new(
            IssuanceRuntime::new(
                IssuanceConfig::mvp_v1(),
                AmountRuntime::new(AmountConfig::mvp_v1()),
            ),
            SubmissionRuntime::new(SubmissionConfig::mvp_v1()),
            clock,
        );
        Self { store, flow }
    }

    pub fn next_task(&mut self, request: &NextTaskRequest) -> Result<NextTaskResponse, String> {
        let user_id = parse_user_id(&request.user_id)?;
        let store_tier =
            StoreTier::parse(&request.store).map_err(|violation| format!("{violation:?}"))?;
        let input = NextTaskInput {
            user_id,
            store_tier,
            now_ms: now_wall_clock_ms(),
        };
        let mut rng = rand::thread_rng();
        match self.flow.run_next_task(&mut self.store, &mut rng, &input) {
            Ok(outcome) => Ok(issuance_response(outcome)),
            Err(WiringError::UserNotFound) => Ok(NextTaskResponse::error_with("user_not_found")),
            Err(err) => Err(err.to_string()),
        }
    }

    pub fn mark_unpaid(
        &mut self,
        request: &MarkUnpaidRequest,
    ) -> Result<MarkUnpaidResponse, String> {
        let input = MarkUnpaidInput {
            user_id: parse_user_id(&request.user_id)?,
            task: dto_to_task(&request.task)?,
            now_ms: now_wall_clock_ms(),
        };
        match self.flow.run_mark_unpaid(&mut self.store, &input) {
            Ok(task) => Ok(MarkUnpaidResponse {
                unpaid: Some(task_to_dto(&task)),
                error: None,
            }),
            Err(WiringError::UserNotFound) => Ok(MarkUnpaidResponse {
                unpaid: None,
                error: Some("user_not_found".to_string()),
            }),
            Err(err) => Err(err.to_string()),
        }
    }

    pub fn submit(&mut self, request: &SubmitRequest) -> Result<SubmitResponse, String> {
        let input = SubmitInput {
            user_id: parse_user_id(&request.user_id)?,
            task_id: TaskId::new(request.task_id.clone())
                .map_err(|violation| format!("{violation:?}"))?,
            note: request.note.clone(),
            now_ms: now_wall_clock_ms(),
        };
        match self.flow.run_submit(&mut self.store, &input) {
            Ok(SubmissionOutcome::Completed { finished }) => Ok(SubmitResponse {
                ok: true,
                finished: Some(finished),
                ..SubmitResponse::default()
            }),
            Ok(SubmissionOutcome::NeedRecharge { deficit }) => Ok(SubmitResponse {
                ok: false,
                need_recharge: Some(true),
                deficit: Some(deficit.to_f64()),
                ..SubmitResponse::default()
            }),
            Ok(SubmissionOutcome::NoMatchingPending) => {
                Ok(SubmitResponse::error_with("no_matching_pending_task"))
            }
            Err(WiringError::UserNotFound) => Ok(SubmitResponse::error_with("user_not_found")),
            Err(err) => Err(err.to_string()),
        }
    }

    pub fn withdraw_gate(&self, raw_user_id: &str) -> Result<WithdrawGateResponse, String> {
        let user_id = parse_user_id(raw_user_id)?;
        match self
            .flow
            .run_withdraw_gate(&self.store, &user_id, now_wall_clock_ms())
        {
            Ok(gate) => Ok(WithdrawGateResponse {
                can_withdraw: gate.can_withdraw,
                completed_today: gate.completed_today,
                error: None,
            }),
            Err(WiringError::UserNotFound) => Ok(WithdrawGateResponse {
                can_withdraw: false,
                completed_today: 0,
                error: Some("user_not_found".to_string()),
            }),
            Err(err) => Err(err.to_string()),
        }
    }

    pub fn create_rule(&mut self, request: &RuleCreateRequest) -> Result<RuleResponse, String> {
        let input = RuleDraftInput {
            user_id: parse_user_id(&request.user_id)?,
            task_no: request.task_no,
            amount_spec: request.amount_spec.clone(),
            percent: match request.percent {
                Some(raw) => Some(decimal_from_f64("percent", raw)?),
                None => None,
            },
            now_ms: now_wall_clock_ms(),
        };
        map_rule_result(AdminRulesWiring::create_draft(&mut self.store, &input))
    }

    pub fn list_rules(&self, raw_user_id: Option<&str>) -> Result<RulesListResponse, String> {
        let user_id = match raw_user_id {
            Some(raw) => Some(parse_user_id(raw)?),
            None => None,
        };
        let rules = AdminRulesWiring::list(&self.store, user_id.as_ref())
            .map_err(|err| err.to_string())?;
        Ok(RulesListResponse {
            rules: rules.iter().map(rule_to_dto).collect(),
            error: None,
        })
    }

    pub fn confirm_rule(&mut self, raw_rule_id: &str) -> Result<RuleResponse, String> {
        let rule_id = parse_rule_id(raw_rule_id)?;
        map_rule_result(AdminRulesWiring::confirm(&mut self.store, &rule_id))
    }

    pub fn patch_rule(
        &mut self,
        raw_rule_id: &str,
        request: &RulePatchRequest,
    ) -> Result<RuleResponse, String> {
        let rule_id = parse_rule_id(raw_rule_id)?;
        let patch = RulePatchInput {
            task_no: request.task_no,
            amount_spec: request.amount_spec.clone(),
            percent: match request.percent {
                Some(raw) => Some(decimal_from_f64("percent", raw)?),
                None => None,
            },
            clear_percent: request.clear_percent,
        };
        map_rule_result(AdminRulesWiring::patch(&mut self.store, &rule_id, &patch))
    }

    pub fn delete_rule(&mut self, raw_rule_id: &str) -> Result<RuleResponse, String> {
        let rule_id = parse_rule_id(raw_rule_id)?;
        match AdminRulesWiring::delete(&mut self.store, &rule_id) {
            Ok(()) => Ok(RuleResponse::default()),
            Err(WiringError::RuleNotFound) => Ok(RuleResponse {
                rule: None,
                error: Some("rule_not_found".to_string()),
            }),
            Err(err) => Err(err.to_string()),
        }
    }

    pub fn purge_used_rules(
        &mut self,
        request: &PurgeUsedRequest,
    ) -> Result<PurgeUsedResponse, String> {
        let user_id = match &request.user_id {
            Some(raw) => Some(parse_user_id(raw)?),
            None => None,
        };
        let removed = AdminRulesWiring::purge_used(&mut self.store, user_id.as_ref())
            .map_err(|err| err.to_string())?;
        Ok(PurgeUsedResponse {
            removed,
            error: None,
        })
    }

    pub fn create_user(&mut self, request: &UserCreateRequest) -> Result<UserResponse, String> {
        let user_id = parse_user_id(&request.user_id)?;
        map_user_result(AdminUsersWiring::create_user(&mut self.store, &user_id))
    }

    pub fn set_frozen(
        &mut self,
        raw_user_id: &str,
        request: &FreezeRequest,
    ) -> Result<UserResponse, String> {
        let user_id = parse_user_id(raw_user_id)?;
        map_user_result(AdminUsersWiring::set_frozen(
            &mut self.store,
            &user_id,
            request.frozen,
        ))
    }

    pub fn recharge(
        &mut self,
        raw_user_id: &str,
        request: &RechargeRequest,
    ) -> Result<UserResponse, String> {
        let user_id = parse_user_id(raw_user_id)?;
        let delta = Money::round3(decimal_from_f64("amount", request.amount)?);
        map_user_result(AdminUsersWiring::adjust_balance(
            &mut self.store,
            &user_id,
            delta,
        ))
    }

    pub fn health_report(&self) -> Result<AdapterHealthResponse, String> {
        use orderflow_storage::{RuleRepo, UserRepo};
        let users = self.store.list_users().map_err(|err| err.to_string())?;
        let rules = self.store.load_rules().map_err(|err| err.to_string())?;
        Ok(AdapterHealthResponse {
            status: "ok".to_string(),
            outcome: "HEALTHY".to_string(),
            reason: None,
            users: users.len(),
            rules: rules.len(),
        })
    }
}

fn issuance_response(outcome: IssuanceOutcome) -> NextTaskResponse {
    match outcome {
        IssuanceOutcome::Frozen => NextTaskResponse::error_with("account_frozen"),
        IssuanceOutcome::NoMore => NextTaskResponse {
            no_more: Some(true),
            ..NextTaskResponse::default()
        },
        IssuanceOutcome::ExistingPending(task) => NextTaskResponse {
            unpaid: Some(task_to_dto(&task)),
            ..NextTaskResponse::default()
        },
        IssuanceOutcome::NotEligible {
            message,
            suggest_upgrade,
        } => NextTaskResponse {
            not_eligible: Some(true),
            message: Some(message),
            suggest_upgrade: Some(suggest_upgrade),
            ..NextTaskResponse::default()
        },
        IssuanceOutcome::Preview(task) => NextTaskResponse {
            task: Some(task_to_dto(&task)),
            ..NextTaskResponse::default()
        },
        IssuanceOutcome::CommittedPending(task) => NextTaskResponse {
            unpaid: Some(task_to_dto(&task)),
            redirect: Some("record".to_string()),
            ..NextTaskResponse::default()
        },
    }
}

fn map_rule_result(result: Result<Rule, WiringError>) -> Result<RuleResponse, String> {
    match result {
        Ok(rule) => Ok(RuleResponse {
            rule: Some(rule_to_dto(&rule)),
            error: None,
        }),
        Err(WiringError::RuleNotFound) => Ok(RuleResponse {
            rule: None,
            error: Some("rule_not_found".to_string()),
        }),
        Err(WiringError::UserNotFound) => Ok(RuleResponse {
            rule: None,
            error: Some("user_not_found".to_string()),
        }),
        Err(err) => Err(err.to_string()),
    }
}

fn map_user_result(result: Result<UserRecord, WiringError>) -> Result<UserResponse, String> {
    match result {
        Ok(user) => Ok(UserResponse {
            user_id: Some(user.user_id.as_str().to_string()),
            balance: user.balance.to_f64(),
            overall_commission: user.overall_commission.to_f64(),
            completed_today: user.completed_today,
            total_completed: user.total_completed,
            is_frozen: user.is_frozen,
            error: None,
        }),
        Err(WiringError::UserNotFound) => Ok(UserResponse {
            error: Some("user_not_found".to_string()),
            ..UserResponse::default()
        }),
        Err(err) => Err(err.to_string()),
    }
}

pub fn task_to_dto(task: &Task) -> TaskDto {
    TaskDto {
        id: task.task_id.as_str().to_string(),
        kind: task.kind.as_str().to_string(),
        order_amount: task.order_amount.to_f64(),
        commission: task.commission.to_f64(),
        commission_rate: task.commission_rate.to_f64().unwrap_or(0.0),
        items: task
            .items
            .iter()
            .map(|item| OrderItemDto {
                label: item.label.clone(),
                unit_price: item.unit_price.to_f64(),
                quantity: item.quantity,
            })
            .collect(),
        deficit: task.deficit.to_f64(),
        status: match task.status {
            TaskStatus::Preview => "preview".to_string(),
            TaskStatus::Unpaid => "unpaid".to_string(),
        },
        rule_id: task.rule_id.as_ref().map(|r| r.as_str().to_string()),
    }
}

pub fn dto_to_task(dto: &TaskDto) -> Result<Task, String> {
    let task_id = TaskId::new(dto.id.clone()).map_err(|violation| format!("{violation:?}"))?;
    let kind = match dto.kind.as_str() {
        "single" => TaskKind::Single,
        "combine" => TaskKind::Combine,
        other => return Err(format!("unknown task kind: {other}")),
    };
    let status = match dto.status.as_str() {
        "preview" => TaskStatus::Preview,
        "unpaid" => TaskStatus::Unpaid,
        other => return Err(format!("unknown task status: {other}")),
    };
    let rule_id = match &dto.rule_id {
        Some(raw) => {
            Some(RuleId::new(raw.clone()).map_err(|violation| format!("{violation:?}"))?)
        }
        None => None,
    };
    let mut items = Vec::with_capacity(dto.items.len());
    for item in &dto.items {
        items.push(
            OrderItem::v1(
                item.label.clone(),
                money_from_f64("items.unitPrice", item.unit_price)?,
                item.quantity,
            )
            .map_err(|violation| format!("{violation:?}"))?,
        );
    }
    Task::v1(
        task_id,
        kind,
        money_from_f64("orderAmount", dto.order_amount)?,
        money_from_f64("commission", dto.commission)?,
        decimal_from_f64("commissionRate", dto.commission_rate)?,
        items,
        money_from_f64("deficit", dto.deficit)?,
        status,
        rule_id,
    )
    .map_err(|violation| format!("{violation:?}"))
}

fn rule_to_dto(rule: &Rule) -> RuleDto {
    RuleDto {
        rule_id: rule.rule_id.as_str().to_string(),
        user_id: rule.user_id.as_str().to_string(),
        task_no: rule.task_no,
        amount_spec: rule.amount_spec.clone(),
        percent: rule.percent.and_then(|p| p.to_f64()),
        status: rule.status.as_str().to_string(),
        created_at_ms: rule.created_at_ms.0,
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, String> {
    UserId::parse(raw).map_err(|violation| format!("{violation:?}"))
}

fn parse_rule_id(raw: &str) -> Result<RuleId, String> {
    RuleId::new(raw).map_err(|violation| format!("{violation:?}"))
}

fn money_from_f64(field: &'static str, value: f64) -> Result<Money, String> {
    Decimal::from_f64(value)
        .map(Money::round3)
        .ok_or_else(|| format!("{field} is not a finite number"))
}

fn decimal_from_f64(field: &'static str, value: f64) -> Result<Decimal, String> {
    Decimal::from_f64(value).ok_or_else(|| format!("{field} is not a finite number"))
}

pub fn now_wall_clock_ms() -> WallClockMs {
    WallClockMs(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1)
            .max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(1);
        std::env::temp_dir().join(format!("orderflow-adapter-test-{name}-{suffix}"))
    }

    fn runtime(base: &PathBuf) -> AppRuntime {
        AppRuntime::for_store(JsonFileStore::for_dir(base), LocalClock::utc())
    }

    #[test]
    fn at_adapter_01_wire_shapes_match_the_interface_contract() {
        let no_more = NextTaskResponse {
            no_more: Some(true),
            ..NextTaskResponse::default()
        };
        assert_eq!(
            serde_json::to_string(&no_more).unwrap(),
            r#"{"noMore":true}"#
        );

        let refusal = NextTaskResponse {
            not_eligible: Some(true),
            message: Some("m".to_string()),
            suggest_upgrade: Some(true),
            ..NextTaskResponse::default()
        };
        assert_eq!(
            serde_json::to_string(&refusal).unwrap(),
            r#"{"notEligible":true,"message":"m","suggestUpgrade":true}"#
        );

        let recharge = SubmitResponse {
            ok: false,
            need_recharge: Some(true),
            deficit: Some(12.5),
            ..SubmitResponse::default()
        };
        assert_eq!(
            serde_json::to_string(&recharge).unwrap(),
            r#"{"ok":false,"needRecharge":true,"deficit":12.5}"#
        );
    }

    #[test]
    fn at_adapter_02_task_dto_round_trips_through_the_wire() {
        let base = temp_dir("dto-roundtrip");
        let mut rt = runtime(&base);
        rt.create_user(&UserCreateRequest {
            user_id: "u1001".to_string(),
        })
        .unwrap();

        let response = rt
            .next_task(&NextTaskRequest {
                user_id: "u1001".to_string(),
                store: "amazon".to_string(),
            })
            .unwrap();
        let dto = response.task.expect("expected a preview task");
        let task = dto_to_task(&dto).unwrap();
        assert_eq!(task_to_dto(&task), dto);
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn at_adapter_03_full_task_cycle_over_the_file_store() {
        let base = temp_dir("full-cycle");
        let mut rt = runtime(&base);
        rt.create_user(&UserCreateRequest {
            user_id: "u1001".to_string(),
        })
        .unwrap();
        let funded = rt
            .recharge(
                "u1001",
                &RechargeRequest { amount: 600.0 },
            )
            .unwrap();
        assert_eq!(funded.balance, 600.0);

        let preview = rt
            .next_task(&NextTaskRequest {
                user_id: "u1001".to_string(),
                store: "alibaba".to_string(),
            })
            .unwrap()
            .task
            .expect("expected preview");

        let unpaid = rt
            .mark_unpaid(&MarkUnpaidRequest {
                user_id: "u1001".to_string(),
                task: preview.clone(),
            })
            .unwrap()
            .unpaid
            .expect("expected unpaid");
        assert_eq!(unpaid.status, "unpaid");

        let done = rt
            .submit(&SubmitRequest {
                user_id: "u1001".to_string(),
                task_id: preview.id.clone(),
                note: Some("ok".to_string()),
            })
            .unwrap();
        assert!(done.ok);
        assert_eq!(done.finished, Some(false));

        let gate = rt.withdraw_gate("u1001").unwrap();
        assert!(!gate.can_withdraw);
        assert_eq!(gate.completed_today, 1);
        fs::remove_dir_all(base).unwrap();
    }

    #[test]
    fn at_adapter_04_unknown_user_surfaces_in_shape() {
        let base = temp_dir("unknown-user");
        let mut rt = runtime(&base);
        let response = rt
            .next_task(&NextTaskRequest {
                user_id: "u9999".to_string(),
                store: "amazon".to_string(),
            })
            .unwrap();
        assert_eq!(response.error.as_deref(), Some("user_not_found"));
        assert!(response.task.is_none());
        if base.exists() {
            fs::remove_dir_all(base).unwrap();
        }
    }

    #[test]
    fn at_adapter_05_admin_rule_lifecycle_over_http_dtos() {
        let base = temp_dir("admin-rules");
        let mut rt = runtime(&base);
        rt.create_user(&UserCreateRequest {
            user_id: "u1001".to_string(),
        })
        .unwrap();

        let created = rt
            .create_rule(&RuleCreateRequest {
                user_id: "u1001".to_string(),
                task_no: 1,
                amount_spec: "100-200".to_string(),
                percent: Some(10.0),
            })
            .unwrap()
            .rule
            .expect("expected draft");
        assert_eq!(created.status, "draft");

        let confirmed = rt
            .confirm_rule(&created.rule_id)
            .unwrap()
            .rule
            .expect("expected confirmed");
        assert_eq!(confirmed.status, "confirmed");

        let listed = rt.list_rules(Some("u1001")).unwrap();
        assert_eq!(listed.rules.len(), 1);

        // scenario B over the adapter: preview, commit, rule consumed
        rt.recharge("u1001", &RechargeRequest { amount: 600.0 })
            .unwrap();
        let first = rt
            .next_task(&NextTaskRequest {
                user_id: "u1001".to_string(),
                store: "alibaba".to_string(),
            })
            .unwrap();
        let preview = first.task.expect("expected preview");
        assert!(preview.order_amount >= 100.0 && preview.order_amount <= 200.0);
        assert!((preview.commission - preview.order_amount * 0.10).abs() < 1e-9);

        let second = rt
            .next_task(&NextTaskRequest {
                user_id: "u1001".to_string(),
                store: "alibaba".to_string(),
            })
            .unwrap();
        let committed = second.unpaid.expect("expected committed pending");
        assert_eq!(committed.id, preview.id);
        assert_eq!(second.redirect.as_deref(), Some("record"));

        let listed = rt.list_rules(Some("u1001")).unwrap();
        assert_eq!(listed.rules[0].status, "used");

        let purged = rt
            .purge_used_rules(&PurgeUsedRequest { user_id: None })
            .unwrap();
        assert_eq!(purged.removed, 1);
        fs::remove_dir_all(base).unwrap();
    }
}
