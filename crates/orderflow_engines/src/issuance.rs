#![forbid(unsafe_code)]

use rand::Rng;

use orderflow_kernel_contracts::flow::{IssuanceOutcome, StoreTier, TierEligibility};
use orderflow_kernel_contracts::rule::{Rule, RuleStatus};
use orderflow_kernel_contracts::task::{OrderItem, Task, TaskId, TaskKind, TaskStatus};
use orderflow_kernel_contracts::user::UserRecord;
use orderflow_kernel_contracts::{ContractViolation, DayKey, Money, Validate};

use crate::amount::AmountRuntime;
use crate::commission::{commission_for, tier_eligibility};
use crate::daily::ensure_daily;
use crate::rulebook::RuleLifecycleRuntime;

pub const MAX_TASKS_PER_DAY: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceConfig {
    pub max_tasks_per_day: u32,
}

impl IssuanceConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_tasks_per_day: MAX_TASKS_PER_DAY,
        }
    }
}

/// The per-user issuance state machine: Idle -> (Preview) -> Pending ->
/// Idle, with Unpaid as the parked sub-state of Pending. One pending task
/// at a time is the backpressure the whole flow hangs off.
#[derive(Debug, Clone)]
pub struct IssuanceRuntime {
    config: IssuanceConfig,
    amounts: AmountRuntime,
}

impl IssuanceRuntime {
    pub fn new(config: IssuanceConfig, amounts: AmountRuntime) -> Self {
        Self { config, amounts }
    }

    pub fn next_task<G: Rng>(
        &self,
        user: &mut UserRecord,
        rules: &mut [Rule],
        store: StoreTier,
        day_key: &DayKey,
        rng: &mut G,
    ) -> Result<IssuanceOutcome, ContractViolation> {
        if user.is_frozen {
            return Ok(IssuanceOutcome::Frozen);
        }

        let bucket = ensure_daily(user, day_key);
        if bucket.completed >= self.config.max_tasks_per_day {
            return Ok(IssuanceOutcome::NoMore);
        }

        // Idempotent re-fetch; an in-flight task is never overwritten.
        if let Some(pending) = &user.pending {
            return Ok(IssuanceOutcome::ExistingPending(pending.clone()));
        }

        if let TierEligibility::NotEligible {
            message,
            suggest_upgrade,
        } = tier_eligibility(store, user.balance)
        {
            return Ok(IssuanceOutcome::NotEligible {
                message,
                suggest_upgrade,
            });
        }

        let current_task_no = user.completed_today + 1;
        if let Some(idx) =
            RuleLifecycleRuntime::match_slot_index(rules, &user.user_id, current_task_no)
        {
            let task = RuleLifecycleRuntime::build_task(&self.amounts, &rules[idx])?;
            return if rules[idx].status == RuleStatus::Confirmed {
                RuleLifecycleRuntime::stage(&mut rules[idx])?;
                Ok(IssuanceOutcome::Preview(task))
            } else {
                // second pass over a staged rule: commit and consume
                let mut committed = task;
                committed.status = TaskStatus::Unpaid;
                committed.deficit = committed.order_amount.minus_or_zero(user.balance);
                committed.validate()?;
                user.pending = Some(committed.clone());
                RuleLifecycleRuntime::mark_used(&mut rules[idx]);
                Ok(IssuanceOutcome::CommittedPending(committed))
            };
        }

        let seen_totals = &mut user.daily.entry(day_key.clone()).or_default().seen_totals;
        let generated = self.amounts.random_preview(rng, user.balance, seen_totals);
        let (rate, commission) = commission_for(generated.order_amount, None);
        let kind = if generated.quantity == 1 {
            TaskKind::Single
        } else {
            TaskKind::Combine
        };
        let tag: u64 = rng.gen();
        let task_id = TaskId::new(format!("t_{tag:016x}"))?;
        let item = OrderItem::v1(
            format!("sku_{:06x}", tag & 0xff_ffff),
            generated.unit_price,
            generated.quantity,
        )?;
        let task = Task::v1(
            task_id,
            kind,
            generated.order_amount,
            commission,
            rate,
            vec![item],
            Money::ZERO,
            TaskStatus::Preview,
            None,
        )?;
        Ok(IssuanceOutcome::Preview(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_kernel_contracts::rule::RuleId;
    use orderflow_kernel_contracts::user::UserId;
    use orderflow_kernel_contracts::WallClockMs;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal::Decimal;

    use crate::amount::AmountConfig;

    fn runtime() -> IssuanceRuntime {
        IssuanceRuntime::new(
            IssuanceConfig::mvp_v1(),
            AmountRuntime::new(AmountConfig::mvp_v1()),
        )
    }

    fn user(balance_units: i64) -> UserRecord {
        let mut user = UserRecord::v1(UserId::parse("u1001").unwrap());
        user.balance = Money::from_units(balance_units);
        user
    }

    fn day() -> DayKey {
        DayKey::new("2026-08-05").unwrap()
    }

    fn confirmed_rule(task_no: u32) -> Rule {
        Rule::v1(
            RuleId::new("rule_a1").unwrap(),
            UserId::parse("u1001").unwrap(),
            task_no,
            "100-200",
            Some(Decimal::from(10)),
            RuleStatus::Confirmed,
            1,
            WallClockMs(1),
        )
        .unwrap()
    }

    #[test]
    fn at_issue_01_frozen_account_is_refused_first() {
        let rt = runtime();
        let mut u = user(600);
        u.is_frozen = true;
        let mut rng = StdRng::seed_from_u64(1);
        let out = rt
            .next_task(&mut u, &mut [], StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        assert_eq!(out, IssuanceOutcome::Frozen);
    }

    #[test]
    fn at_issue_02_daily_cap_is_terminal_for_the_day() {
        let rt = runtime();
        let mut u = user(100);
        ensure_daily(&mut u, &day()).completed = MAX_TASKS_PER_DAY;
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..3 {
            let out = rt
                .next_task(&mut u, &mut [], StoreTier::Amazon, &day(), &mut rng)
                .unwrap();
            assert_eq!(out, IssuanceOutcome::NoMore);
        }
        // a new day key reopens issuance
        let next_day = DayKey::new("2026-08-06").unwrap();
        let out = rt
            .next_task(&mut u, &mut [], StoreTier::Amazon, &next_day, &mut rng)
            .unwrap();
        assert!(matches!(out, IssuanceOutcome::Preview(_)));
    }

    #[test]
    fn at_issue_03_pending_task_is_returned_unchanged() {
        let rt = runtime();
        let mut u = user(600);
        let mut rules = vec![confirmed_rule(1)];
        let mut rng = StdRng::seed_from_u64(1);

        // stage, then commit
        rt.next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        let committed = rt
            .next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        let IssuanceOutcome::CommittedPending(task) = committed else {
            panic!("expected committed pending");
        };

        let refetch = rt
            .next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        assert_eq!(refetch, IssuanceOutcome::ExistingPending(task.clone()));
        // even with a different store request the pending wins
        let refetch = rt
            .next_task(&mut u, &mut rules, StoreTier::Amazon, &day(), &mut rng)
            .unwrap();
        assert_eq!(refetch, IssuanceOutcome::ExistingPending(task));
    }

    #[test]
    fn at_issue_04_out_of_band_store_is_refused_with_guidance() {
        let rt = runtime();
        let mut u = user(600);
        let mut rng = StdRng::seed_from_u64(1);
        let out = rt
            .next_task(&mut u, &mut [], StoreTier::Amazon, &day(), &mut rng)
            .unwrap();
        let IssuanceOutcome::NotEligible {
            suggest_upgrade, ..
        } = out
        else {
            panic!("expected refusal");
        };
        assert!(suggest_upgrade);
    }

    #[test]
    fn at_issue_05_rule_path_previews_then_commits_the_same_task() {
        let rt = runtime();
        let mut u = user(600);
        let mut rules = vec![confirmed_rule(1)];
        let mut rng = StdRng::seed_from_u64(1);

        let first = rt
            .next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        let IssuanceOutcome::Preview(preview) = first else {
            panic!("expected preview");
        };
        assert_eq!(rules[0].status, RuleStatus::Staged);
        assert!(u.pending.is_none());
        assert_eq!(
            preview.commission,
            preview.order_amount.mul_rate(Decimal::new(10, 2))
        );

        let second = rt
            .next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        let IssuanceOutcome::CommittedPending(committed) = second else {
            panic!("expected committed pending");
        };
        assert_eq!(committed.task_id, preview.task_id);
        assert_eq!(committed.order_amount, preview.order_amount);
        assert_eq!(committed.commission, preview.commission);
        assert_eq!(committed.status, TaskStatus::Unpaid);
        assert_eq!(rules[0].status, RuleStatus::Used);
        assert_eq!(u.pending.as_ref().unwrap().task_id, committed.task_id);
    }

    #[test]
    fn at_issue_06_used_rule_never_fires_again() {
        let rt = runtime();
        let mut u = user(600);
        let mut rules = vec![confirmed_rule(1)];
        let mut rng = StdRng::seed_from_u64(1);

        rt.next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        rt.next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        u.pending = None; // simulate resolution without advancing the slot

        let out = rt
            .next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        let IssuanceOutcome::Preview(task) = out else {
            panic!("expected random preview");
        };
        assert!(task.rule_id.is_none());
    }

    #[test]
    fn at_issue_07_rule_waits_for_its_slot() {
        let rt = runtime();
        let mut u = user(600);
        let mut rules = vec![confirmed_rule(3)];
        let mut rng = StdRng::seed_from_u64(1);

        // completed_today = 0 -> slot 1; the task_no=3 rule must not fire
        let out = rt
            .next_task(&mut u, &mut rules, StoreTier::Alibaba, &day(), &mut rng)
            .unwrap();
        let IssuanceOutcome::Preview(task) = out else {
            panic!("expected random preview");
        };
        assert!(task.rule_id.is_none());
        assert_eq!(rules[0].status, RuleStatus::Confirmed);
    }

    #[test]
    fn at_issue_08_zero_balance_preview_is_minimal_band() {
        let rt = runtime();
        let mut u = user(0);
        let mut rng = StdRng::seed_from_u64(1);
        let out = rt
            .next_task(&mut u, &mut [], StoreTier::Amazon, &day(), &mut rng)
            .unwrap();
        let IssuanceOutcome::Preview(task) = out else {
            panic!("expected preview");
        };
        assert_eq!(task.order_amount, Money::from_units(1));
        assert_eq!(task.status, TaskStatus::Preview);
        assert!(u.pending.is_none());
    }
}
