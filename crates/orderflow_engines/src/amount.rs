#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use rand::Rng;
use sha2::{Digest, Sha256};

use orderflow_kernel_contracts::rule::{AmountSpec, Rule};
use orderflow_kernel_contracts::task::GeneratedOrder;
use orderflow_kernel_contracts::{ContractViolation, Money};

const MIN_TOTAL_CENTS: i64 = 100;
const MIN_UNIT_CENTS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountConfig {
    pub max_random_draws: u32,
    pub max_quantity: u32,
}

impl AmountConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_random_draws: 24,
            max_quantity: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmountRuntime {
    config: AmountConfig,
}

impl AmountRuntime {
    pub fn new(config: AmountConfig) -> Self {
        Self { config }
    }

    /// Amount for a rule-driven task. Fixed specs pass through; range specs
    /// resolve to a whole-unit value derived from the rule id, so the
    /// confirmed-phase preview and the staged-phase commit rebuild the same
    /// amount without any stored intermediate.
    pub fn amount_from_rule(&self, rule: &Rule) -> Result<Money, ContractViolation> {
        match rule.amount_spec()? {
            AmountSpec::Fixed(value) => Ok(value),
            AmountSpec::Range { lo, hi } => {
                let lo_units = lo.units_ceil().max(1);
                let hi_units = hi.units_floor();
                if hi_units < lo_units {
                    // no whole unit inside the range; pin to the low bound
                    return Ok(Money::from_units(lo_units));
                }
                let span = (hi_units - lo_units + 1) as u64;
                let offset = (rule_seed(rule) % span) as i64;
                Ok(Money::from_units(lo_units + offset))
            }
        }
    }

    /// Balance-bounded random order: `order_amount = unit_price × quantity`,
    /// capped at `max(1.00, balance)`, quantity within `[1, max_quantity]`,
    /// unit price at least one cent, and the total (integer cents) unseen so
    /// far today. Bounded random draws, then an exhaustive scan in
    /// increasing order, then the minimal default order when the whole
    /// space is spent. The accepted total is recorded into `seen_totals`
    /// before returning.
    pub fn random_preview<G: Rng>(
        &self,
        rng: &mut G,
        balance: Money,
        seen_totals: &mut BTreeSet<i64>,
    ) -> GeneratedOrder {
        let cap_cents = balance.to_cents().max(MIN_TOTAL_CENTS);

        for _ in 0..self.config.max_random_draws {
            let quantity = rng.gen_range(1..=self.config.max_quantity);
            let q = i64::from(quantity);
            let lo_unit = ((MIN_TOTAL_CENTS + q - 1) / q).max(MIN_UNIT_CENTS);
            let hi_unit = cap_cents / q;
            if hi_unit < lo_unit {
                continue;
            }
            let unit_cents = rng.gen_range(lo_unit..=hi_unit);
            let total = unit_cents * q;
            if seen_totals.insert(total) {
                return generated(unit_cents, quantity, total);
            }
        }

        for quantity in 1..=self.config.max_quantity {
            let q = i64::from(quantity);
            let lo_unit = ((MIN_TOTAL_CENTS + q - 1) / q).max(MIN_UNIT_CENTS);
            let hi_unit = cap_cents / q;
            let mut unit_cents = lo_unit;
            while unit_cents <= hi_unit {
                let total = unit_cents * q;
                if seen_totals.insert(total) {
                    return generated(unit_cents, quantity, total);
                }
                unit_cents += 1;
            }
        }

        seen_totals.insert(MIN_TOTAL_CENTS);
        generated(MIN_TOTAL_CENTS, 1, MIN_TOTAL_CENTS)
    }
}

fn generated(unit_cents: i64, quantity: u32, total_cents: i64) -> GeneratedOrder {
    GeneratedOrder {
        unit_price: Money::from_cents(unit_cents),
        quantity,
        order_amount: Money::from_cents(total_cents),
    }
}

fn rule_seed(rule: &Rule) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(rule.rule_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(rule.amount_spec.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
