#![forbid(unsafe_code)]

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::{validate_token, ContractViolation, Validate, WallClockMs};
use crate::money::Money;
use crate::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        validate_token("rule_id", &id, 64)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Closed lifecycle. `Used` is terminal; unknown strings coming off disk
/// fail deserialization at the repository boundary instead of leaking into
/// business logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Draft,
    Confirmed,
    Staged,
    Used,
}

impl RuleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleStatus::Draft => "draft",
            RuleStatus::Confirmed => "confirmed",
            RuleStatus::Staged => "staged",
            RuleStatus::Used => "used",
        }
    }

    pub fn is_matchable(self) -> bool {
        matches!(self, RuleStatus::Confirmed | RuleStatus::Staged)
    }
}

/// Parsed form of a rule's amount spec string: a fixed value, or an
/// inclusive `lo-hi` range (operand order does not matter).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmountSpec {
    Fixed(Money),
    Range { lo: Money, hi: Money },
}

impl AmountSpec {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "rule.amount_spec",
                reason: "must be non-empty",
            });
        }
        if let Some((left, right)) = trimmed.split_once('-') {
            let a = Money::parse("rule.amount_spec", left)?;
            let b = Money::parse("rule.amount_spec", right)?;
            if a.to_cents() < 1 || b.to_cents() < 1 {
                return Err(ContractViolation::InvalidValue {
                    field: "rule.amount_spec",
                    reason: "range bounds must be positive",
                });
            }
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            Ok(AmountSpec::Range { lo, hi })
        } else {
            let value = Money::parse("rule.amount_spec", trimmed)?;
            if value.to_cents() < 1 {
                return Err(ContractViolation::InvalidValue {
                    field: "rule.amount_spec",
                    reason: "fixed amount must be positive",
                });
            }
            Ok(AmountSpec::Fixed(value))
        }
    }
}

/// Admin-authored override for one `(user, task_no)` slot of the daily
/// task stream. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: RuleId,
    pub user_id: UserId,
    pub task_no: u32,
    pub amount_spec: String,
    #[serde(default)]
    pub percent: Option<Decimal>,
    pub status: RuleStatus,
    pub created_seq: u64,
    pub created_at_ms: WallClockMs,
}

impl Rule {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        rule_id: RuleId,
        user_id: UserId,
        task_no: u32,
        amount_spec: impl Into<String>,
        percent: Option<Decimal>,
        status: RuleStatus,
        created_seq: u64,
        created_at_ms: WallClockMs,
    ) -> Result<Self, ContractViolation> {
        let rule = Self {
            rule_id,
            user_id,
            task_no,
            amount_spec: amount_spec.into(),
            percent,
            status,
            created_seq,
            created_at_ms,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn amount_spec(&self) -> Result<AmountSpec, ContractViolation> {
        AmountSpec::parse(&self.amount_spec)
    }

    /// Override commission rate as a fraction, when an admin percent is set.
    pub fn override_rate(&self) -> Option<Decimal> {
        self.percent.map(|p| p / Decimal::from(100))
    }
}

impl Validate for Rule {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.task_no == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "rule.task_no",
                reason: "task numbering is 1-based",
            });
        }
        AmountSpec::parse(&self.amount_spec)?;
        if let Some(percent) = self.percent {
            if percent <= Decimal::ZERO || percent > Decimal::from(100) {
                return Err(ContractViolation::InvalidValue {
                    field: "rule.percent",
                    reason: "must be within (0, 100]",
                });
            }
        }
        Ok(())
    }
}
