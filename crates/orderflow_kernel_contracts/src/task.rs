#![forbid(unsafe_code)]

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::{validate_text, validate_token, ContractViolation, DayKey, Validate, WallClockMs};
use crate::money::Money;
use crate::rule::RuleId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        validate_token("task_id", &id, 64)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Single,
    Combine,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Single => "single",
            TaskKind::Combine => "combine",
        }
    }
}

/// A task is a preview until the client (or the staged-rule second pass)
/// commits it; from then on it sits on the user as the unpaid pending task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Preview,
    Unpaid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub label: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderItem {
    pub fn v1(
        label: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Result<Self, ContractViolation> {
        let item = Self {
            label: label.into(),
            unit_price,
            quantity,
        };
        item.validate()?;
        Ok(item)
    }
}

impl Validate for OrderItem {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("order_item.label", &self.label, 96)?;
        if self.unit_price.to_cents() < 1 {
            return Err(ContractViolation::InvalidValue {
                field: "order_item.unit_price",
                reason: "must be at least one cent",
            });
        }
        if self.quantity == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "order_item.quantity",
                reason: "must be >= 1",
            });
        }
        Ok(())
    }
}

/// Output of the balance-bounded generator: a priced line the issuance
/// engine turns into a task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratedOrder {
    pub unit_price: Money,
    pub quantity: u32,
    pub order_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub order_amount: Money,
    pub commission: Money,
    pub commission_rate: Decimal,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub deficit: Money,
    pub status: TaskStatus,
    #[serde(default)]
    pub rule_id: Option<RuleId>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        task_id: TaskId,
        kind: TaskKind,
        order_amount: Money,
        commission: Money,
        commission_rate: Decimal,
        items: Vec<OrderItem>,
        deficit: Money,
        status: TaskStatus,
        rule_id: Option<RuleId>,
    ) -> Result<Self, ContractViolation> {
        let task = Self {
            task_id,
            kind,
            order_amount,
            commission,
            commission_rate,
            items,
            deficit,
            status,
            rule_id,
        };
        task.validate()?;
        Ok(task)
    }

    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

impl Validate for Task {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.order_amount.to_cents() < 1 {
            return Err(ContractViolation::InvalidValue {
                field: "task.order_amount",
                reason: "must be at least one cent",
            });
        }
        if self.commission.is_negative() {
            return Err(ContractViolation::InvalidValue {
                field: "task.commission",
                reason: "must not be negative",
            });
        }
        if self.commission_rate <= Decimal::ZERO || self.commission_rate > Decimal::ONE {
            return Err(ContractViolation::InvalidValue {
                field: "task.commission_rate",
                reason: "must be within (0, 1]",
            });
        }
        if self.items.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "task.items",
                reason: "must contain at least one item",
            });
        }
        for item in &self.items {
            item.validate()?;
        }
        let items_total = self
            .items
            .iter()
            .fold(Money::ZERO, |acc, i| {
                acc.plus(i.unit_price.mul_rate(Decimal::from(i.quantity)))
            });
        if items_total != self.order_amount {
            return Err(ContractViolation::InvalidValue {
                field: "task.items",
                reason: "item totals must equal order_amount",
            });
        }
        match self.kind {
            TaskKind::Single => {
                if self.total_quantity() != 1 {
                    return Err(ContractViolation::InvalidValue {
                        field: "task.kind",
                        reason: "single tasks carry exactly one unit",
                    });
                }
            }
            TaskKind::Combine => {
                if self.total_quantity() < 2 {
                    return Err(ContractViolation::InvalidValue {
                        field: "task.kind",
                        reason: "combine tasks carry at least two units",
                    });
                }
            }
        }
        if self.deficit.is_negative() {
            return Err(ContractViolation::InvalidValue {
                field: "task.deficit",
                reason: "must not be negative",
            });
        }
        Ok(())
    }
}

/// Immutable snapshot appended to the user's history on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedOrder {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub order_amount: Money,
    pub commission: Money,
    pub commission_rate: Decimal,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub note: Option<String>,
    pub completed_at_ms: WallClockMs,
    pub day_key: DayKey,
}

impl CompletedOrder {
    pub fn from_task(
        task: &Task,
        note: Option<String>,
        completed_at_ms: WallClockMs,
        day_key: DayKey,
    ) -> Result<Self, ContractViolation> {
        if let Some(note) = &note {
            validate_text("completed_order.note", note, 256)?;
        }
        Ok(Self {
            task_id: task.task_id.clone(),
            kind: task.kind,
            order_amount: task.order_amount,
            commission: task.commission,
            commission_rate: task.commission_rate,
            items: task.items.clone(),
            note,
            completed_at_ms,
            day_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(unit_cents: i64, quantity: u32) -> OrderItem {
        OrderItem::v1("item_1", Money::from_cents(unit_cents), quantity).unwrap()
    }

    fn amount(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    #[test]
    fn at_task_01_single_task_constructs_and_validates() {
        let task = Task::v1(
            TaskId::new("t_0011aabbccdd").unwrap(),
            TaskKind::Single,
            amount(12_500),
            Money::from_cents(500),
            Decimal::new(4, 2),
            vec![item(12_500, 1)],
            Money::ZERO,
            TaskStatus::Preview,
            None,
        );
        assert!(task.is_ok());
    }

    #[test]
    fn at_task_02_item_totals_must_match_order_amount() {
        let task = Task::v1(
            TaskId::new("t_0011aabbccdd").unwrap(),
            TaskKind::Single,
            amount(12_500),
            Money::from_cents(500),
            Decimal::new(4, 2),
            vec![item(9_900, 1)],
            Money::ZERO,
            TaskStatus::Preview,
            None,
        );
        assert!(task.is_err());
    }

    #[test]
    fn at_task_03_combine_requires_multiple_units() {
        let task = Task::v1(
            TaskId::new("t_0011aabbccdd").unwrap(),
            TaskKind::Combine,
            amount(500),
            Money::from_cents(20),
            Decimal::new(4, 2),
            vec![item(500, 1)],
            Money::ZERO,
            TaskStatus::Preview,
            None,
        );
        assert!(task.is_err());
        let task = Task::v1(
            TaskId::new("t_0011aabbccdd").unwrap(),
            TaskKind::Combine,
            amount(1_500),
            Money::from_cents(60),
            Decimal::new(4, 2),
            vec![item(500, 3)],
            Money::ZERO,
            TaskStatus::Preview,
            None,
        );
        assert!(task.is_ok());
    }

    #[test]
    fn at_task_04_rate_outside_unit_interval_is_rejected() {
        let task = Task::v1(
            TaskId::new("t_0011aabbccdd").unwrap(),
            TaskKind::Single,
            amount(100),
            Money::from_cents(4),
            Decimal::from(2),
            vec![item(100, 1)],
            Money::ZERO,
            TaskStatus::Preview,
            None,
        );
        assert!(task.is_err());
    }
}
