#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::common::{validate_token, ContractViolation, DayKey, Validate};
use crate::money::Money;
use crate::task::{CompletedOrder, Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Boundary parse: trims whitespace and strips the single `#` display
    /// prefix clients sometimes send. Applied once here, never re-done
    /// downstream.
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        let canonical = trimmed.strip_prefix('#').unwrap_or(trimmed);
        validate_token("user_id", canonical, 64)?;
        Ok(Self(canonical.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Per-day counters plus the set of order totals (integer cents) already
/// generated that day. `seen_totals` is what keeps same-day previews from
/// repeating an identical total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub commission: Money,
    #[serde(default)]
    pub seen_totals: BTreeSet<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    #[serde(default)]
    pub balance: Money,
    #[serde(default)]
    pub overall_commission: Money,
    #[serde(default)]
    pub total_completed: u64,
    #[serde(default)]
    pub completed_today: u32,
    #[serde(default)]
    pub is_frozen: bool,
    #[serde(default)]
    pub daily: BTreeMap<DayKey, DailyBucket>,
    #[serde(default)]
    pub pending: Option<Task>,
    #[serde(default)]
    pub history: Vec<CompletedOrder>,
}

impl UserRecord {
    pub fn v1(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: Money::ZERO,
            overall_commission: Money::ZERO,
            total_completed: 0,
            completed_today: 0,
            is_frozen: false,
            daily: BTreeMap::new(),
            pending: None,
            history: Vec::new(),
        }
    }
}

impl Validate for UserRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.balance.is_negative() {
            return Err(ContractViolation::InvalidValue {
                field: "user.balance",
                reason: "must not be negative",
            });
        }
        if self.overall_commission.is_negative() {
            return Err(ContractViolation::InvalidValue {
                field: "user.overall_commission",
                reason: "must not be negative",
            });
        }
        if let Some(pending) = &self.pending {
            pending.validate()?;
            if pending.status != TaskStatus::Unpaid {
                return Err(ContractViolation::InvalidValue {
                    field: "user.pending",
                    reason: "a committed pending task must be unpaid",
                });
            }
        }
        Ok(())
    }
}
