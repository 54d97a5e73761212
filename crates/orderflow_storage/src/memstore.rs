#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use orderflow_kernel_contracts::rule::Rule;
use orderflow_kernel_contracts::user::{UserId, UserRecord};

use crate::repo::{RuleRepo, StorageError, UserRepo};

/// In-memory store for tests and wiring exercises. Same whole-document
/// semantics as the file store, minus the disk.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    users: BTreeMap<UserId, UserRecord>,
    rules: Vec<Rule>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepo for MemStore {
    fn load_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.users.get(user_id).cloned())
    }

    fn save_user(&mut self, record: UserRecord) -> Result<(), StorageError> {
        self.users.insert(record.user_id.clone(), record);
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        Ok(self.users.values().cloned().collect())
    }
}

impl RuleRepo for MemStore {
    fn load_rules(&self) -> Result<Vec<Rule>, StorageError> {
        Ok(self.rules.clone())
    }

    fn save_rules(&mut self, rules: Vec<Rule>) -> Result<(), StorageError> {
        self.rules = rules;
        Ok(())
    }
}
