#![forbid(unsafe_code)]

use orderflow_kernel_contracts::user::{DailyBucket, UserRecord};
use orderflow_kernel_contracts::DayKey;

/// The single gate in front of every daily counter read or write. Creates
/// the day's bucket when absent and re-synchronizes the denormalized
/// `completed_today` mirror, so a day rollover resets the per-day view
/// without touching history or lifetime totals. Idempotent.
pub fn ensure_daily<'a>(user: &'a mut UserRecord, day_key: &DayKey) -> &'a mut DailyBucket {
    let bucket = user.daily.entry(day_key.clone()).or_default();
    user.completed_today = bucket.completed;
    bucket
}
