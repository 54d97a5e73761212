#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use orderflow_kernel_contracts::rule::Rule;
use orderflow_kernel_contracts::user::{UserId, UserRecord};

use crate::repo::{RuleRepo, StorageError, UserRepo};

const STORE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UsersDocument {
    schema_version: u32,
    users: BTreeMap<UserId, UserRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RulesDocument {
    schema_version: u32,
    rules: Vec<Rule>,
}

/// JSON-file store: `users.json` and `rules.json` under one data
/// directory, each a schema-versioned document replaced wholesale through
/// a temp-file-then-rename write. Unknown status strings and malformed
/// records fail deserialization here, before they reach business logic.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    users_path: PathBuf,
    rules_path: PathBuf,
}

impl JsonFileStore {
    pub fn for_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            users_path: data_dir.join("users.json"),
            rules_path: data_dir.join("rules.json"),
        }
    }

    fn read_users(&self) -> Result<UsersDocument, StorageError> {
        read_document(&self.users_path, "users.json")
    }

    fn write_users(&self, doc: &UsersDocument) -> Result<(), StorageError> {
        write_document(&self.users_path, doc)
    }

    fn read_rules(&self) -> Result<RulesDocument, StorageError> {
        read_document(&self.rules_path, "rules.json")
    }

    fn write_rules(&self, doc: &RulesDocument) -> Result<(), StorageError> {
        write_document(&self.rules_path, doc)
    }
}

impl UserRepo for JsonFileStore {
    fn load_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.read_users()?.users.get(user_id).cloned())
    }

    fn save_user(&mut self, record: UserRecord) -> Result<(), StorageError> {
        let mut doc = self.read_users()?;
        doc.schema_version = STORE_SCHEMA_VERSION;
        doc.users.insert(record.user_id.clone(), record);
        self.write_users(&doc)
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        Ok(self.read_users()?.users.into_values().collect())
    }
}

impl RuleRepo for JsonFileStore {
    fn load_rules(&self) -> Result<Vec<Rule>, StorageError> {
        Ok(self.read_rules()?.rules)
    }

    fn save_rules(&mut self, rules: Vec<Rule>) -> Result<(), StorageError> {
        let doc = RulesDocument {
            schema_version: STORE_SCHEMA_VERSION,
            rules,
        };
        self.write_rules(&doc)
    }
}

fn read_document<D>(path: &Path, document: &'static str) -> Result<D, StorageError>
where
    D: Default + for<'de> Deserialize<'de> + SchemaVersioned,
{
    if !path.exists() {
        return Ok(D::default());
    }
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(D::default());
    }
    let doc = serde_json::from_str::<D>(&raw)?;
    let got = doc.schema_version();
    if got != STORE_SCHEMA_VERSION {
        return Err(StorageError::SchemaMismatch { document, got });
    }
    Ok(doc)
}

fn write_document<D: Serialize>(path: &Path, doc: &D) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = serde_json::to_vec_pretty(doc)?;
    let mut tmp = path.to_path_buf();
    tmp.set_extension("tmp");
    fs::write(&tmp, serialized)?;
    fs::rename(tmp, path)?;
    Ok(())
}

trait SchemaVersioned {
    fn schema_version(&self) -> u32;
}

impl SchemaVersioned for UsersDocument {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

impl SchemaVersioned for RulesDocument {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}
