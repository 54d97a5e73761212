#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::ContractViolation;
use crate::money::Money;
use crate::task::Task;

/// Store tiers the client can request a task from. Each tier serves one
/// balance band; eligibility is evaluated per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTier {
    Amazon,
    Alibaba,
    Aliexpress,
}

impl StoreTier {
    pub fn parse(raw: &str) -> Result<Self, ContractViolation> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(StoreTier::Amazon),
            "alibaba" => Ok(StoreTier::Alibaba),
            "aliexpress" => Ok(StoreTier::Aliexpress),
            _ => Err(ContractViolation::InvalidValue {
                field: "store",
                reason: "must be amazon, alibaba or aliexpress",
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoreTier::Amazon => "amazon",
            StoreTier::Alibaba => "alibaba",
            StoreTier::Aliexpress => "aliexpress",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierEligibility {
    Eligible,
    NotEligible {
        message: String,
        suggest_upgrade: bool,
    },
}

/// Everything `next_task` can answer with. Refusals are ordinary outcomes,
/// not errors; the adapter renders each as its own wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum IssuanceOutcome {
    /// Account is frozen; no issuance.
    Frozen,
    /// Daily cap reached; terminal until the day key changes.
    NoMore,
    /// The user already holds a pending task; returned unchanged.
    ExistingPending(Task),
    /// Balance outside the requested store's band.
    NotEligible {
        message: String,
        suggest_upgrade: bool,
    },
    /// First-phase task: shown to the user, not yet committed.
    Preview(Task),
    /// Second-phase rule task: now the user's pending task, payment due.
    CommittedPending(Task),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// No pending task, or the submitted id does not match it.
    NoMatchingPending,
    /// Balance does not cover the order amount; exact shortfall attached.
    NeedRecharge { deficit: Money },
    /// Credited and recorded. `finished` marks the daily quota being met.
    Completed { finished: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_flow_01_store_tier_parse_is_case_insensitive() {
        assert_eq!(StoreTier::parse("Amazon").unwrap(), StoreTier::Amazon);
        assert_eq!(StoreTier::parse(" ALIBABA ").unwrap(), StoreTier::Alibaba);
        assert_eq!(
            StoreTier::parse("aliexpress").unwrap(),
            StoreTier::Aliexpress
        );
        assert!(StoreTier::parse("ebay").is_err());
    }
}
