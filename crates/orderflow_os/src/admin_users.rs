#![forbid(unsafe_code)]

use orderflow_kernel_contracts::user::{UserId, UserRecord};
use orderflow_kernel_contracts::{ContractViolation, Money};
use orderflow_storage::UserRepo;

use crate::task_flow::WiringError;

/// Minimal account surface: provisioning, freeze toggles, and the balance
/// credit/debit contract the deposit/withdrawal workflow settles against.
#[derive(Debug, Clone, Copy)]
pub struct AdminUsersWiring;

impl AdminUsersWiring {
    /// Creating an id that already exists returns the existing record
    /// unchanged instead of resetting it.
    pub fn create_user<S>(store: &mut S, user_id: &UserId) -> Result<UserRecord, WiringError>
    where
        S: UserRepo,
    {
        if let Some(existing) = store.load_user(user_id)? {
            return Ok(existing);
        }
        let record = UserRecord::v1(user_id.clone());
        store.save_user(record.clone())?;
        Ok(record)
    }

    pub fn set_frozen<S>(
        store: &mut S,
        user_id: &UserId,
        frozen: bool,
    ) -> Result<UserRecord, WiringError>
    where
        S: UserRepo,
    {
        let mut user = store.load_user(user_id)?.ok_or(WiringError::UserNotFound)?;
        user.is_frozen = frozen;
        store.save_user(user.clone())?;
        Ok(user)
    }

    /// Balance movement outside the commission credit: positive for a
    /// recharge, negative for the withdrawal debit. A debit past zero is
    /// refused with nothing written.
    pub fn adjust_balance<S>(
        store: &mut S,
        user_id: &UserId,
        delta: Money,
    ) -> Result<UserRecord, WiringError>
    where
        S: UserRepo,
    {
        let mut user = store.load_user(user_id)?.ok_or(WiringError::UserNotFound)?;
        let next = user.balance.plus(delta);
        if next.is_negative() {
            return Err(WiringError::Contract(ContractViolation::InvalidValue {
                field: "user.balance",
                reason: "debit exceeds the current balance",
            }));
        }
        user.balance = next;
        store.save_user(user.clone())?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_storage::MemStore;

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    #[test]
    fn at_admin_users_01_create_is_idempotent() {
        let mut s = MemStore::new();
        let first = AdminUsersWiring::create_user(&mut s, &uid("u1001")).unwrap();
        assert_eq!(first.balance, Money::ZERO);

        let mut seeded = first.clone();
        seeded.balance = Money::from_units(50);
        s.save_user(seeded).unwrap();

        let again = AdminUsersWiring::create_user(&mut s, &uid("u1001")).unwrap();
        assert_eq!(again.balance, Money::from_units(50));
    }

    #[test]
    fn at_admin_users_02_freeze_toggle_round_trips() {
        let mut s = MemStore::new();
        AdminUsersWiring::create_user(&mut s, &uid("u1001")).unwrap();
        let frozen = AdminUsersWiring::set_frozen(&mut s, &uid("u1001"), true).unwrap();
        assert!(frozen.is_frozen);
        let thawed = AdminUsersWiring::set_frozen(&mut s, &uid("u1001"), false).unwrap();
        assert!(!thawed.is_frozen);
    }

    #[test]
    fn at_admin_users_03_debit_past_zero_is_refused() {
        let mut s = MemStore::new();
        AdminUsersWiring::create_user(&mut s, &uid("u1001")).unwrap();
        AdminUsersWiring::adjust_balance(&mut s, &uid("u1001"), Money::from_units(120)).unwrap();

        let out =
            AdminUsersWiring::adjust_balance(&mut s, &uid("u1001"), Money::from_units(-200));
        assert!(matches!(out, Err(WiringError::Contract(_))));
        let user = s.load_user(&uid("u1001")).unwrap().unwrap();
        assert_eq!(user.balance, Money::from_units(120));

        let drained =
            AdminUsersWiring::adjust_balance(&mut s, &uid("u1001"), Money::from_units(-120))
                .unwrap();
        assert_eq!(drained.balance, Money::ZERO);
    }
}
