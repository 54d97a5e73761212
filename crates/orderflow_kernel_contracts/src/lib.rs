#![forbid(unsafe_code)]

pub mod common;
pub mod flow;
pub mod money;
pub mod rule;
pub mod task;
pub mod user;

pub use common::{ContractViolation, DayKey, Validate, WallClockMs};
pub use money::Money;
