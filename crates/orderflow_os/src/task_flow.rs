#![forbid(unsafe_code)]

use rand::Rng;

use orderflow_engines::issuance::IssuanceRuntime;
use orderflow_engines::submission::SubmissionRuntime;
use orderflow_kernel_contracts::flow::{IssuanceOutcome, StoreTier, SubmissionOutcome};
use orderflow_kernel_contracts::task::{Task, TaskId};
use orderflow_kernel_contracts::user::UserId;
use orderflow_kernel_contracts::{ContractViolation, Validate, WallClockMs};
use orderflow_storage::{RuleRepo, StorageError, UserRepo};

use crate::clock::LocalClock;

#[derive(Debug)]
pub enum WiringError {
    UserNotFound,
    RuleNotFound,
    Storage(StorageError),
    Contract(ContractViolation),
}

impl std::fmt::Display for WiringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound => write!(f, "user not found"),
            Self::RuleNotFound => write!(f, "rule not found"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Contract(violation) => write!(f, "contract violation: {violation:?}"),
        }
    }
}

impl std::error::Error for WiringError {}

impl From<StorageError> for WiringError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<ContractViolation> for WiringError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

#[derive(Debug, Clone)]
pub struct NextTaskInput {
    pub user_id: UserId,
    pub store_tier: StoreTier,
    pub now_ms: WallClockMs,
}

#[derive(Debug, Clone)]
pub struct MarkUnpaidInput {
    pub user_id: UserId,
    pub task: Task,
    pub now_ms: WallClockMs,
}

#[derive(Debug, Clone)]
pub struct SubmitInput {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub note: Option<String>,
    pub now_ms: WallClockMs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawGate {
    pub can_withdraw: bool,
    pub completed_today: u32,
}

/// One request, one load-modify-save unit. Rule consumption and pending
/// placement land in the same save, so the single-pending and single-use
/// invariants cannot come apart on disk.
#[derive(Debug, Clone)]
pub struct TaskFlowWiring {
    issuance: IssuanceRuntime,
    submission: SubmissionRuntime,
    clock: LocalClock,
}

impl TaskFlowWiring {
    pub fn new(
        issuance: IssuanceRuntime,
        submission: SubmissionRuntime,
        clock: LocalClock,
    ) -> Self {
        Self {
            issuance,
            submission,
            clock,
        }
    }

    pub fn run_next_task<S, G>(
        &self,
        store: &mut S,
        rng: &mut G,
        input: &NextTaskInput,
    ) -> Result<IssuanceOutcome, WiringError>
    where
        S: UserRepo + RuleRepo,
        G: Rng,
    {
        let day_key = self.clock.day_key(input.now_ms)?;
        let mut user = store
            .load_user(&input.user_id)?
            .ok_or(WiringError::UserNotFound)?;
        let mut rules = store.load_rules()?;

        let outcome =
            self.issuance
                .next_task(&mut user, &mut rules, input.store_tier, &day_key, rng)?;

        store.save_user(user)?;
        store.save_rules(rules)?;
        Ok(outcome)
    }

    pub fn run_mark_unpaid<S>(
        &self,
        store: &mut S,
        input: &MarkUnpaidInput,
    ) -> Result<Task, WiringError>
    where
        S: UserRepo + RuleRepo,
    {
        input.task.validate()?;
        let day_key = self.clock.day_key(input.now_ms)?;
        let mut user = store
            .load_user(&input.user_id)?
            .ok_or(WiringError::UserNotFound)?;
        let mut rules = store.load_rules()?;

        let committed =
            self.submission
                .mark_unpaid(&mut user, &mut rules, input.task.clone(), &day_key)?;

        store.save_user(user)?;
        store.save_rules(rules)?;
        Ok(committed)
    }

    pub fn run_submit<S>(
        &self,
        store: &mut S,
        input: &SubmitInput,
    ) -> Result<SubmissionOutcome, WiringError>
    where
        S: UserRepo + RuleRepo,
    {
        let day_key = self.clock.day_key(input.now_ms)?;
        let mut user = store
            .load_user(&input.user_id)?
            .ok_or(WiringError::UserNotFound)?;
        let mut rules = store.load_rules()?;

        let outcome = self.submission.submit(
            &mut user,
            &mut rules,
            &input.task_id,
            input.note.clone(),
            &day_key,
            input.now_ms,
        )?;

        store.save_user(user)?;
        store.save_rules(rules)?;
        Ok(outcome)
    }

    /// Read-only predicate for the external withdrawal-approval workflow.
    pub fn run_withdraw_gate<S>(
        &self,
        store: &S,
        user_id: &UserId,
        now_ms: WallClockMs,
    ) -> Result<WithdrawGate, WiringError>
    where
        S: UserRepo,
    {
        let day_key = self.clock.day_key(now_ms)?;
        let user = store.load_user(user_id)?.ok_or(WiringError::UserNotFound)?;
        let completed_today = user
            .daily
            .get(&day_key)
            .map(|bucket| bucket.completed)
            .unwrap_or(0);
        Ok(WithdrawGate {
            can_withdraw: self.submission.can_withdraw(&user, &day_key),
            completed_today,
        })
    }
}
