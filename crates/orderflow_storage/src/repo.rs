#![forbid(unsafe_code)]

use orderflow_kernel_contracts::rule::Rule;
use orderflow_kernel_contracts::user::{UserId, UserRecord};
use orderflow_kernel_contracts::ContractViolation;

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Json(serde_json::Error),
    SchemaMismatch { document: &'static str, got: u32 },
    Contract(ContractViolation),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::SchemaMismatch { document, got } => {
                write!(f, "unsupported schema version {got} in {document}")
            }
            Self::Contract(violation) => write!(f, "contract violation: {violation:?}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<ContractViolation> for StorageError {
    fn from(value: ContractViolation) -> Self {
        Self::Contract(value)
    }
}

/// Typed repository interface for user records. Load/save are
/// whole-document: a save replaces the stored record outright, so a
/// request either lands completely or not at all.
pub trait UserRepo {
    fn load_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, StorageError>;
    fn save_user(&mut self, record: UserRecord) -> Result<(), StorageError>;
    fn list_users(&self) -> Result<Vec<UserRecord>, StorageError>;
}

/// Typed repository interface for the admin rule collection, read and
/// replaced as a whole.
pub trait RuleRepo {
    fn load_rules(&self) -> Result<Vec<Rule>, StorageError>;
    fn save_rules(&mut self, rules: Vec<Rule>) -> Result<(), StorageError>;
}
