//! The global user directory: lower-cased username -> user record.

use std::collections::BTreeMap;

use starly_shared::constants::USERS_KEY;
use starly_shared::{User, UserId};

use crate::error::Result;
use crate::kv::{read_json, write_json, SharedStore};

type Directory = BTreeMap<String, User>;

#[derive(Clone)]
pub struct UserDirectory {
    store: SharedStore,
}

impl UserDirectory {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn read(&self) -> Result<Directory> {
        Ok(read_json(self.store.as_ref(), USERS_KEY)?.unwrap_or_default())
    }

    /// Look up a user by username (case-insensitive).
    pub fn find(&self, username: &str) -> Result<Option<User>> {
        Ok(self.read()?.remove(&username.to_lowercase()))
    }

    pub fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.read()?.into_values().find(|u| &u.id == id))
    }

    pub fn contains(&self, username: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(&username.to_lowercase()))
    }

    /// Insert or replace the record stored under the user's username.
    pub fn upsert(&self, user: &User) -> Result<()> {
        let mut directory = self.read()?;
        directory.insert(user.username.to_lowercase(), user.clone());
        write_json(self.store.as_ref(), USERS_KEY, &directory)
    }

    /// Every registered user, ordered by username.
    pub fn all(&self) -> Result<Vec<User>> {
        Ok(self.read()?.into_values().collect())
    }
}
