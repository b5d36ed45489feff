//! Sled-backed document store: one tree of schemaless inventory records and
//! one tree of user accounts, both serde_json-encoded and keyed by uuid.
//!
//! Updates are single-document and last-write-wins; there is no cross-record
//! transaction and none is needed here.

use serde_json::Value;
use sled::Db;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Record, UserAccount};
use crate::permissions::RowFilter;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Store(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to the database. Cheap to clone; sled trees share the backing Db.
#[derive(Clone)]
pub struct Storage {
    _db: Db,
    inventory: sled::Tree,
    users: sled::Tree,
}

impl Storage {
    /// Open or create the database at the given path.
    pub fn open(path: &str) -> StoreResult<Self> {
        let db = sled::open(path)?;
        let inventory = db.open_tree("inventory")?;
        let users = db.open_tree("users")?;
        Ok(Self {
            _db: db,
            inventory,
            users,
        })
    }

    // --- Inventory records ---

    /// Insert a record verbatim and return its store-assigned id.
    /// An empty field map is a valid record.
    pub fn insert_record(&self, fields: Record) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let bytes = serde_json::to_vec(&Value::Object(fields))?;
        self.inventory.insert(id.as_bytes(), bytes)?;
        Ok(id)
    }

    pub fn get_record(&self, id: &str) -> StoreResult<Option<Record>> {
        match self.inventory.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Partial update by id: provided fields overwrite or extend the stored
    /// record, untouched fields survive. Returns false if the id is unknown.
    pub fn update_record(&self, id: &str, changes: &Record) -> StoreResult<bool> {
        let Some(bytes) = self.inventory.get(id.as_bytes())? else {
            return Ok(false);
        };
        let mut record = decode_record(&bytes)?;
        for (field, value) in changes {
            record.insert(field.clone(), value.clone());
        }
        let bytes = serde_json::to_vec(&Value::Object(record))?;
        self.inventory.insert(id.as_bytes(), bytes)?;
        Ok(true)
    }

    /// Returns false if the id was not present.
    pub fn delete_record(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inventory.remove(id.as_bytes())?.is_some())
    }

    /// Scan the collection, keeping records the filter accepts.
    pub fn find_records(&self, filter: &RowFilter) -> StoreResult<Vec<(String, Record)>> {
        let mut out = Vec::new();
        for item in self.inventory.iter() {
            let (key, value) = item?;
            let record = decode_record(&value)?;
            if filter.matches(&record) {
                let id = String::from_utf8_lossy(&key).into_owned();
                out.push((id, record));
            }
        }
        Ok(out)
    }

    /// First record in key order, used to sniff the current column set.
    pub fn first_record(&self) -> StoreResult<Option<Record>> {
        match self.inventory.first()? {
            Some((_, bytes)) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Column names of the first record, trimmed, in stored order.
    pub fn column_names(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .first_record()?
            .map(|record| record.keys().map(|k| k.trim().to_string()).collect())
            .unwrap_or_default())
    }

    /// Distinct non-empty values of a field across the collection, sorted.
    pub fn distinct_values(&self, field: &str) -> StoreResult<Vec<String>> {
        let mut values = Vec::new();
        for item in self.inventory.iter() {
            let (_, bytes) = item?;
            let record = decode_record(&bytes)?;
            let text = match record.get(field) {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => continue,
            };
            if !text.is_empty() && !values.contains(&text) {
                values.push(text);
            }
        }
        values.sort();
        Ok(values)
    }

    pub fn record_count(&self) -> usize {
        self.inventory.len()
    }

    // --- User accounts ---

    /// Create a managed account. The id is assigned here; the username must
    /// not already be taken.
    pub fn create_user(&self, mut user: UserAccount) -> StoreResult<String> {
        if self.find_user_by_username(&user.username)?.is_some() {
            return Err(StoreError::Conflict("Username already exists".into()));
        }
        let id = Uuid::new_v4().to_string();
        user.id = id.clone();
        self.users
            .insert(id.as_bytes(), serde_json::to_vec(&user)?)?;
        Ok(id)
    }

    pub fn get_user(&self, id: &str) -> StoreResult<Option<UserAccount>> {
        match self.users.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserAccount>> {
        for item in self.users.iter() {
            let (_, bytes) = item?;
            let user: UserAccount = serde_json::from_slice(&bytes)?;
            if user.username == username {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    pub fn list_users(&self) -> StoreResult<Vec<UserAccount>> {
        let mut users = Vec::new();
        for item in self.users.iter() {
            let (_, bytes) = item?;
            users.push(serde_json::from_slice(&bytes)?);
        }
        Ok(users)
    }

    /// Replace everything but the password. Rejects a username that already
    /// belongs to a different account. Returns false if the id is unknown.
    pub fn update_user(&self, id: &str, updated: UserAccount) -> StoreResult<bool> {
        if let Some(existing) = self.find_user_by_username(&updated.username)? {
            if existing.id != id {
                return Err(StoreError::Conflict("Username already exists".into()));
            }
        }
        let Some(mut user) = self.get_user(id)? else {
            return Ok(false);
        };
        user.username = updated.username;
        user.role = updated.role;
        user.location_permissions = updated.location_permissions;
        user.column_permissions = updated.column_permissions;
        self.users
            .insert(id.as_bytes(), serde_json::to_vec(&user)?)?;
        Ok(true)
    }

    /// Returns false if the id is unknown.
    pub fn set_password(&self, id: &str, password: &str) -> StoreResult<bool> {
        let Some(mut user) = self.get_user(id)? else {
            return Ok(false);
        };
        user.password = password.to_string();
        self.users
            .insert(id.as_bytes(), serde_json::to_vec(&user)?)?;
        Ok(true)
    }

    /// Returns false if the id was not present.
    pub fn delete_user(&self, id: &str) -> StoreResult<bool> {
        Ok(self.users.remove(id.as_bytes())?.is_some())
    }
}

fn decode_record(bytes: &[u8]) -> StoreResult<Record> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        // Anything non-object in the tree is corrupt, surface it as encoding
        _ => Err(StoreError::Encoding(serde::de::Error::custom(
            "inventory value is not a JSON object",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::permissions::{EmptyGrantPolicy, resolve_row_filter};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::fs;

    fn temp_storage(tag: &str) -> (Storage, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("ict_inventory_test_{tag}_{}", Uuid::new_v4()));
        let _ = fs::remove_dir_all(&dir);
        let storage = Storage::open(dir.to_str().unwrap()).expect("open test storage");
        (storage, dir)
    }

    fn record(fields: &[(&str, serde_json::Value)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn insert_get_update_delete_round_trip() {
        let (storage, dir) = temp_storage("crud");

        let id = storage
            .insert_record(record(&[("Asset Tag", json!("X1")), ("Building", json!("A"))]))
            .unwrap();

        let stored = storage.get_record(&id).unwrap().unwrap();
        assert_eq!(stored.get("Building"), Some(&json!("A")));

        let matched = storage
            .update_record(&id, &record(&[("Building", json!("B"))]))
            .unwrap();
        assert!(matched);
        let stored = storage.get_record(&id).unwrap().unwrap();
        assert_eq!(stored.get("Building"), Some(&json!("B")));
        assert_eq!(stored.get("Asset Tag"), Some(&json!("X1")));

        assert!(storage.delete_record(&id).unwrap());
        assert!(storage.get_record(&id).unwrap().is_none());
        assert!(!storage.delete_record(&id).unwrap());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn update_unknown_id_mutates_nothing() {
        let (storage, dir) = temp_storage("noop");
        let id = storage
            .insert_record(record(&[("Asset Tag", json!("X1"))]))
            .unwrap();

        let matched = storage
            .update_record("no-such-id", &record(&[("Asset Tag", json!("Y9"))]))
            .unwrap();
        assert!(!matched);
        let stored = storage.get_record(&id).unwrap().unwrap();
        assert_eq!(stored.get("Asset Tag"), Some(&json!("X1")));
        assert_eq!(storage.record_count(), 1);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn empty_record_inserts_with_fresh_id() {
        let (storage, dir) = temp_storage("empty");
        let first = storage.insert_record(Record::new()).unwrap();
        let second = storage.insert_record(Record::new()).unwrap();
        assert_ne!(first, second);
        assert!(storage.get_record(&second).unwrap().is_some());
        assert_eq!(storage.record_count(), 2);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn find_records_applies_row_filter() {
        let (storage, dir) = temp_storage("filter");
        storage
            .insert_record(record(&[("Tag", json!("1")), ("Building", json!("A"))]))
            .unwrap();
        storage
            .insert_record(record(&[("Tag", json!("2")), ("Building", json!("B"))]))
            .unwrap();

        let mut grants = BTreeMap::new();
        grants.insert("Building".to_string(), vec!["A".to_string()]);
        let filter = resolve_row_filter(Role::User, &grants, EmptyGrantPolicy::MatchAll);

        let rows = storage.find_records(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.get("Building"), Some(&json!("A")));

        let all = storage.find_records(&RowFilter::MatchAll).unwrap();
        assert_eq!(all.len(), 2);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn distinct_values_sorted_and_deduplicated() {
        let (storage, dir) = temp_storage("distinct");
        for building in ["B", "A", "B", "", "A"] {
            storage
                .insert_record(record(&[("Building", json!(building))]))
                .unwrap();
        }
        storage
            .insert_record(record(&[("Room", json!(101))]))
            .unwrap();

        assert_eq!(storage.distinct_values("Building").unwrap(), vec!["A", "B"]);
        assert_eq!(storage.distinct_values("Room").unwrap(), vec!["101"]);
        assert!(storage.distinct_values("Missing").unwrap().is_empty());

        let _ = fs::remove_dir_all(dir);
    }

    fn sample_user(username: &str) -> UserAccount {
        UserAccount {
            id: String::new(),
            username: username.to_string(),
            password: "pw".to_string(),
            role: Role::User,
            location_permissions: BTreeMap::new(),
            column_permissions: vec![],
        }
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let (storage, dir) = temp_storage("users");
        storage.create_user(sample_user("jamal")).unwrap();
        let err = storage.create_user(sample_user("jamal")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn update_user_keeps_password_and_reset_changes_it() {
        let (storage, dir) = temp_storage("update_user");
        let id = storage.create_user(sample_user("maria")).unwrap();

        let mut updated = sample_user("maria");
        updated.role = Role::Admin;
        updated.password = "ignored".to_string();
        assert!(storage.update_user(&id, updated).unwrap());

        let user = storage.get_user(&id).unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.password, "pw");

        assert!(storage.set_password(&id, "fresh").unwrap());
        let user = storage.get_user(&id).unwrap().unwrap();
        assert_eq!(user.password, "fresh");

        assert!(!storage.set_password("missing", "x").unwrap());
        let _ = fs::remove_dir_all(dir);
    }
}
