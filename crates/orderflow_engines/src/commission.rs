#![forbid(unsafe_code)]

use rust_decimal::Decimal;

use orderflow_kernel_contracts::flow::{StoreTier, TierEligibility};
use orderflow_kernel_contracts::Money;

/// Amount slabs and store-tier balance bands share the same cutovers:
/// 499 and 901. Comparisons are half-open so fractional values cannot
/// fall into a gap.
const MID_CUTOVER: i64 = 499;
const HIGH_CUTOVER: i64 = 901;

/// Slab commission rate for an order amount, when no admin override
/// applies: 12% from 901 up, 8% from 499 up, 4% below (the 20-498 and
/// sub-20 slabs share the 4% rate).
pub fn slab_rate(amount: Money) -> Decimal {
    let a = amount.as_decimal();
    if a >= Decimal::from(HIGH_CUTOVER) {
        Decimal::new(12, 2)
    } else if a >= Decimal::from(MID_CUTOVER) {
        Decimal::new(8, 2)
    } else {
        Decimal::new(4, 2)
    }
}

/// Resolved `(rate, commission)` for an amount, honoring an explicit
/// override rate (a fraction, already divided down from the admin
/// percent) when present.
pub fn commission_for(amount: Money, override_rate: Option<Decimal>) -> (Decimal, Money) {
    let rate = override_rate.unwrap_or_else(|| slab_rate(amount));
    (rate, amount.mul_rate(rate))
}

/// The store tier a balance naturally belongs to.
pub fn tier_for_balance(balance: Money) -> StoreTier {
    let b = balance.as_decimal();
    if b >= Decimal::from(HIGH_CUTOVER) {
        StoreTier::Aliexpress
    } else if b >= Decimal::from(MID_CUTOVER) {
        StoreTier::Alibaba
    } else {
        StoreTier::Amazon
    }
}

/// Balance-band gate for a requested store. Out-of-band is a refusal the
/// client renders, not an error; `suggest_upgrade` is set when the balance
/// sits above the requested band and the user should move up a tier.
pub fn tier_eligibility(store: StoreTier, balance: Money) -> TierEligibility {
    let natural = tier_for_balance(balance);
    if natural == store {
        return TierEligibility::Eligible;
    }
    let suggest_upgrade = band_rank(natural) > band_rank(store);
    let message = if suggest_upgrade {
        format!(
            "balance {} has outgrown the {} store; switch to {} to continue",
            balance,
            store.as_str(),
            natural.as_str()
        )
    } else {
        format!(
            "balance {} does not reach the {} store yet; keep working in {}",
            balance,
            store.as_str(),
            natural.as_str()
        )
    };
    TierEligibility::NotEligible {
        message,
        suggest_upgrade,
    }
}

fn band_rank(store: StoreTier) -> u8 {
    match store {
        StoreTier::Amazon => 0,
        StoreTier::Alibaba => 1,
        StoreTier::Aliexpress => 2,
    }
}
