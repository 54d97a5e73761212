#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};

use orderflow_kernel_contracts::rule::{Rule, RuleId, RuleStatus};
use orderflow_kernel_contracts::task::{OrderItem, Task, TaskId, TaskKind, TaskStatus};
use orderflow_kernel_contracts::user::UserId;
use orderflow_kernel_contracts::{ContractViolation, Money};

use crate::amount::AmountRuntime;
use crate::commission::commission_for;

/// Lifecycle operations over the shared rule collection. The state machine
/// is `Draft -> Confirmed -> Staged -> Used`; `Used` is terminal and a rule
/// never re-enters the matchable set afterwards.
#[derive(Debug, Clone, Copy)]
pub struct RuleLifecycleRuntime;

impl RuleLifecycleRuntime {
    /// The rule owning a `(user, task_no)` slot: first `Confirmed` or
    /// `Staged` rule in creation order. Duplicate slots are a data-integrity
    /// smell, so the earliest wins deterministically.
    pub fn match_slot_index(rules: &[Rule], user_id: &UserId, task_no: u32) -> Option<usize> {
        rules
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.user_id == *user_id && r.task_no == task_no && r.status.is_matchable()
            })
            .min_by_key(|(_, r)| r.created_seq)
            .map(|(idx, _)| idx)
    }

    pub fn stage(rule: &mut Rule) -> Result<(), ContractViolation> {
        if rule.status != RuleStatus::Confirmed {
            return Err(ContractViolation::InvalidValue {
                field: "rule.status",
                reason: "only a confirmed rule can be staged",
            });
        }
        rule.status = RuleStatus::Staged;
        Ok(())
    }

    /// Terminal transition; calling it on an already-used rule is a no-op.
    pub fn mark_used(rule: &mut Rule) {
        rule.status = RuleStatus::Used;
    }

    pub fn mark_used_by_id(rules: &mut [Rule], rule_id: &RuleId) {
        for rule in rules.iter_mut() {
            if rule.rule_id == *rule_id {
                rule.status = RuleStatus::Used;
            }
        }
    }

    pub fn purge_used(rules: &mut Vec<Rule>, user_id: Option<&UserId>) -> usize {
        let before = rules.len();
        rules.retain(|r| {
            r.status != RuleStatus::Used
                || user_id.is_some_and(|u| r.user_id != *u)
        });
        before - rules.len()
    }

    /// Builds the rule's task. Task id and in-range amount both derive from
    /// the rule id, so the confirmed-phase preview and the staged-phase
    /// commit produce the identical task with no stored intermediate.
    pub fn build_task(
        amounts: &AmountRuntime,
        rule: &Rule,
    ) -> Result<Task, ContractViolation> {
        let amount = amounts.amount_from_rule(rule)?;
        let (rate, commission) = commission_for(amount, rule.override_rate());
        let tag = rule_tag(&rule.rule_id);
        let task_id = TaskId::new(format!("t_{tag}"))?;
        let item = OrderItem::v1(format!("sku_{tag}"), amount, 1)?;
        Task::v1(
            task_id,
            TaskKind::Single,
            amount,
            commission,
            rate,
            vec![item],
            Money::ZERO,
            TaskStatus::Preview,
            Some(rule.rule_id.clone()),
        )
    }
}

fn rule_tag(rule_id: &RuleId) -> String {
    let digest = Sha256::digest(rule_id.as_str().as_bytes());
    digest[..6].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{AmountConfig, AmountRuntime};
    use orderflow_kernel_contracts::WallClockMs;
    use rust_decimal::Decimal;

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn rule(id: &str, user: &str, task_no: u32, status: RuleStatus, seq: u64) -> Rule {
        Rule::v1(
            RuleId::new(id).unwrap(),
            uid(user),
            task_no,
            "100-200",
            Some(Decimal::from(10)),
            status,
            seq,
            WallClockMs(seq),
        )
        .unwrap()
    }

    #[test]
    fn at_rulebook_01_slot_match_prefers_earliest_creation() {
        let rules = vec![
            rule("rule_b", "u1001", 1, RuleStatus::Confirmed, 5),
            rule("rule_a", "u1001", 1, RuleStatus::Confirmed, 2),
            rule("rule_c", "u1001", 2, RuleStatus::Confirmed, 1),
        ];
        let idx = RuleLifecycleRuntime::match_slot_index(&rules, &uid("u1001"), 1).unwrap();
        assert_eq!(rules[idx].rule_id.as_str(), "rule_a");
    }

    #[test]
    fn at_rulebook_02_draft_and_used_rules_never_match() {
        let rules = vec![
            rule("rule_a", "u1001", 1, RuleStatus::Draft, 1),
            rule("rule_b", "u1001", 1, RuleStatus::Used, 2),
        ];
        assert!(RuleLifecycleRuntime::match_slot_index(&rules, &uid("u1001"), 1).is_none());
    }

    #[test]
    fn at_rulebook_03_stage_is_only_legal_from_confirmed() {
        let mut draft = rule("rule_a", "u1001", 1, RuleStatus::Draft, 1);
        assert!(RuleLifecycleRuntime::stage(&mut draft).is_err());

        let mut confirmed = rule("rule_b", "u1001", 1, RuleStatus::Confirmed, 2);
        RuleLifecycleRuntime::stage(&mut confirmed).unwrap();
        assert_eq!(confirmed.status, RuleStatus::Staged);
        assert!(RuleLifecycleRuntime::stage(&mut confirmed).is_err());
    }

    #[test]
    fn at_rulebook_04_built_task_is_identical_across_phases() {
        let amounts = AmountRuntime::new(AmountConfig::mvp_v1());
        let r = rule("rule_a", "u1001", 1, RuleStatus::Confirmed, 1);
        let first = RuleLifecycleRuntime::build_task(&amounts, &r).unwrap();
        let second = RuleLifecycleRuntime::build_task(&amounts, &r).unwrap();
        assert_eq!(first, second);
        assert!(first.order_amount >= Money::from_units(100));
        assert!(first.order_amount <= Money::from_units(200));
        // percent 10 overrides the slab
        assert_eq!(first.commission, first.order_amount.mul_rate(Decimal::new(10, 2)));
    }

    #[test]
    fn at_rulebook_05_purge_used_scopes_to_one_user_or_all() {
        let mut rules = vec![
            rule("rule_a", "u1001", 1, RuleStatus::Used, 1),
            rule("rule_b", "u1002", 1, RuleStatus::Used, 2),
            rule("rule_c", "u1001", 2, RuleStatus::Confirmed, 3),
        ];
        let removed = RuleLifecycleRuntime::purge_used(&mut rules, Some(&uid("u1001")));
        assert_eq!(removed, 1);
        assert_eq!(rules.len(), 2);

        let removed = RuleLifecycleRuntime::purge_used(&mut rules, None);
        assert_eq!(removed, 1);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_id.as_str(), "rule_c");
    }
}
