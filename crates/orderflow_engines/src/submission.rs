#![forbid(unsafe_code)]

use rust_decimal::Decimal;

use orderflow_kernel_contracts::flow::SubmissionOutcome;
use orderflow_kernel_contracts::rule::Rule;
use orderflow_kernel_contracts::task::{CompletedOrder, Task, TaskId, TaskStatus};
use orderflow_kernel_contracts::user::UserRecord;
use orderflow_kernel_contracts::{ContractViolation, DayKey, Validate, WallClockMs};

use crate::daily::ensure_daily;
use crate::issuance::MAX_TASKS_PER_DAY;
use crate::rulebook::RuleLifecycleRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionConfig {
    pub max_tasks_per_day: u32,
    /// Guards float-ish rounding at the deficit check; anything below this
    /// is treated as fully covered.
    pub deficit_epsilon: Decimal,
}

impl SubmissionConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_tasks_per_day: MAX_TASKS_PER_DAY,
            deficit_epsilon: Decimal::new(5, 4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionRuntime {
    config: SubmissionConfig,
}

impl SubmissionRuntime {
    pub fn new(config: SubmissionConfig) -> Self {
        Self { config }
    }

    /// Resolves the pending task. Success is the only place balance is
    /// credited and counters move; everything else leaves the record
    /// untouched so the client can retry the identical call.
    pub fn submit(
        &self,
        user: &mut UserRecord,
        rules: &mut [Rule],
        task_id: &TaskId,
        note: Option<String>,
        day_key: &DayKey,
        now_ms: WallClockMs,
    ) -> Result<SubmissionOutcome, ContractViolation> {
        ensure_daily(user, day_key);

        let Some(pending) = user.pending.clone() else {
            return Ok(SubmissionOutcome::NoMatchingPending);
        };
        if pending.task_id != *task_id {
            return Ok(SubmissionOutcome::NoMatchingPending);
        }

        let deficit = pending.order_amount.minus_or_zero(user.balance);
        if deficit.as_decimal() > self.config.deficit_epsilon {
            if let Some(parked) = user.pending.as_mut() {
                parked.deficit = deficit;
            }
            return Ok(SubmissionOutcome::NeedRecharge { deficit });
        }

        user.balance = user.balance.plus(pending.commission);
        user.overall_commission = user.overall_commission.plus(pending.commission);

        let bucket = user.daily.entry(day_key.clone()).or_default();
        bucket.completed += 1;
        bucket.commission = bucket.commission.plus(pending.commission);
        let completed_now = bucket.completed;
        user.completed_today = completed_now;
        user.total_completed += 1;

        let snapshot = CompletedOrder::from_task(&pending, note, now_ms, day_key.clone())?;
        user.history.insert(0, snapshot);
        user.pending = None;

        if let Some(rule_id) = &pending.rule_id {
            RuleLifecycleRuntime::mark_used_by_id(rules, rule_id);
        }

        Ok(SubmissionOutcome::Completed {
            finished: completed_now >= self.config.max_tasks_per_day,
        })
    }

    /// Converts a client-held preview into the user's unpaid pending task
    /// and detaches any linked rule from the matchable pool. When a pending
    /// task already exists it is returned unchanged instead of being
    /// overwritten.
    pub fn mark_unpaid(
        &self,
        user: &mut UserRecord,
        rules: &mut [Rule],
        task: Task,
        day_key: &DayKey,
    ) -> Result<Task, ContractViolation> {
        ensure_daily(user, day_key);

        if let Some(existing) = &user.pending {
            return Ok(existing.clone());
        }

        let mut committed = task;
        committed.status = TaskStatus::Unpaid;
        committed.deficit = committed.order_amount.minus_or_zero(user.balance);
        committed.validate()?;

        user.daily
            .entry(day_key.clone())
            .or_default()
            .seen_totals
            .insert(committed.order_amount.to_cents());
        user.pending = Some(committed.clone());

        if let Some(rule_id) = &committed.rule_id {
            RuleLifecycleRuntime::mark_used_by_id(rules, rule_id);
        }

        Ok(committed)
    }

    /// Cash-out gate: a withdrawal is allowed on a fresh day (nothing
    /// started) or once the daily quota is fully satisfied.
    pub fn can_withdraw(&self, user: &UserRecord, day_key: &DayKey) -> bool {
        let completed = user.daily.get(day_key).map(|b| b.completed).unwrap_or(0);
        completed == 0 || completed >= self.config.max_tasks_per_day
    }
}
