#![forbid(unsafe_code)]

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use orderflow_engines::rulebook::RuleLifecycleRuntime;
use orderflow_kernel_contracts::rule::{AmountSpec, Rule, RuleId, RuleStatus};
use orderflow_kernel_contracts::user::UserId;
use orderflow_kernel_contracts::{ContractViolation, Validate, WallClockMs};
use orderflow_storage::{RuleRepo, UserRepo};

use crate::task_flow::WiringError;

#[derive(Debug, Clone)]
pub struct RuleDraftInput {
    pub user_id: UserId,
    pub task_no: u32,
    pub amount_spec: String,
    pub percent: Option<Decimal>,
    pub now_ms: WallClockMs,
}

#[derive(Debug, Clone, Default)]
pub struct RulePatchInput {
    pub task_no: Option<u32>,
    pub amount_spec: Option<String>,
    pub percent: Option<Decimal>,
    pub clear_percent: bool,
}

/// Admin CRUD over the rule collection. Every operation is one
/// load-replace unit over the whole collection; lifecycle edges stay
/// inside the rulebook engine.
#[derive(Debug, Clone, Copy)]
pub struct AdminRulesWiring;

impl AdminRulesWiring {
    /// Creates a draft rule for an existing user. The id derives from the
    /// slot, the creation sequence and the wall clock, so retried creates
    /// produce distinct drafts.
    pub fn create_draft<S>(store: &mut S, input: &RuleDraftInput) -> Result<Rule, WiringError>
    where
        S: UserRepo + RuleRepo,
    {
        AmountSpec::parse(&input.amount_spec)?;
        if store.load_user(&input.user_id)?.is_none() {
            return Err(WiringError::UserNotFound);
        }

        let mut rules = store.load_rules()?;
        let created_seq = rules
            .iter()
            .map(|r| r.created_seq)
            .max()
            .unwrap_or(0)
            .saturating_add(1);

        let rule = Rule::v1(
            derive_rule_id(&input.user_id, input.task_no, created_seq, input.now_ms)?,
            input.user_id.clone(),
            input.task_no,
            input.amount_spec.clone(),
            input.percent,
            RuleStatus::Draft,
            created_seq,
            input.now_ms,
        )?;
        rules.push(rule.clone());
        store.save_rules(rules)?;
        Ok(rule)
    }

    pub fn list<S>(store: &S, user_id: Option<&UserId>) -> Result<Vec<Rule>, WiringError>
    where
        S: RuleRepo,
    {
        let mut rules = store.load_rules()?;
        if let Some(user_id) = user_id {
            rules.retain(|r| r.user_id == *user_id);
        }
        rules.sort_by_key(|r| r.created_seq);
        Ok(rules)
    }

    /// `Draft -> Confirmed`. Confirming an already-confirmed rule is an
    /// idempotent no-op; staged or used rules refuse.
    pub fn confirm<S>(store: &mut S, rule_id: &RuleId) -> Result<Rule, WiringError>
    where
        S: RuleRepo,
    {
        let mut rules = store.load_rules()?;
        let rule = find_mut(&mut rules, rule_id)?;
        match rule.status {
            RuleStatus::Draft => rule.status = RuleStatus::Confirmed,
            RuleStatus::Confirmed => {}
            RuleStatus::Staged | RuleStatus::Used => {
                return Err(WiringError::Contract(ContractViolation::InvalidValue {
                    field: "rule.status",
                    reason: "cannot confirm a staged or consumed rule",
                }));
            }
        }
        let confirmed = rule.clone();
        store.save_rules(rules)?;
        Ok(confirmed)
    }

    /// Field edits are allowed only while the rule is a draft; once it is
    /// confirmed the slot contract is frozen for the issuance path.
    pub fn patch<S>(
        store: &mut S,
        rule_id: &RuleId,
        patch: &RulePatchInput,
    ) -> Result<Rule, WiringError>
    where
        S: RuleRepo,
    {
        let mut rules = store.load_rules()?;
        let rule = find_mut(&mut rules, rule_id)?;
        if rule.status != RuleStatus::Draft {
            return Err(WiringError::Contract(ContractViolation::InvalidValue {
                field: "rule.status",
                reason: "only draft rules accept edits",
            }));
        }
        if let Some(task_no) = patch.task_no {
            rule.task_no = task_no;
        }
        if let Some(amount_spec) = &patch.amount_spec {
            rule.amount_spec = amount_spec.clone();
        }
        if patch.clear_percent {
            rule.percent = None;
        } else if let Some(percent) = patch.percent {
            rule.percent = Some(percent);
        }
        rule.validate()?;
        let patched = rule.clone();
        store.save_rules(rules)?;
        Ok(patched)
    }

    pub fn delete<S>(store: &mut S, rule_id: &RuleId) -> Result<(), WiringError>
    where
        S: RuleRepo,
    {
        let mut rules = store.load_rules()?;
        let rule = find_mut(&mut rules, rule_id)?;
        if matches!(rule.status, RuleStatus::Staged | RuleStatus::Used) {
            return Err(WiringError::Contract(ContractViolation::InvalidValue {
                field: "rule.status",
                reason: "cannot delete a staged or consumed rule",
            }));
        }
        rules.retain(|r| r.rule_id != *rule_id);
        store.save_rules(rules)?;
        Ok(())
    }

    pub fn purge_used<S>(store: &mut S, user_id: Option<&UserId>) -> Result<usize, WiringError>
    where
        S: RuleRepo,
    {
        let mut rules = store.load_rules()?;
        let removed = RuleLifecycleRuntime::purge_used(&mut rules, user_id);
        store.save_rules(rules)?;
        Ok(removed)
    }
}

fn find_mut<'a>(rules: &'a mut [Rule], rule_id: &RuleId) -> Result<&'a mut Rule, WiringError> {
    rules
        .iter_mut()
        .find(|r| r.rule_id == *rule_id)
        .ok_or(WiringError::RuleNotFound)
}

fn derive_rule_id(
    user_id: &UserId,
    task_no: u32,
    created_seq: u64,
    now_ms: WallClockMs,
) -> Result<RuleId, ContractViolation> {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_str().as_bytes());
    hasher.update(task_no.to_be_bytes());
    hasher.update(created_seq.to_be_bytes());
    hasher.update(now_ms.0.to_be_bytes());
    let digest = hasher.finalize();
    let tag: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    RuleId::new(format!("rule_{tag}"))
}
