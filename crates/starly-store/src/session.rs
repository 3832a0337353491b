//! The "current session" pointer: a serialized copy of the logged-in user.

use starly_shared::constants::SESSION_KEY;
use starly_shared::User;

use crate::error::Result;
use crate::kv::{read_json, write_json, KeyValueStore, SharedStore};

#[derive(Clone)]
pub struct SessionStore {
    store: SharedStore,
}

impl SessionStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The logged-in user, if any. A corrupt pointer reads as logged out.
    pub fn current(&self) -> Result<Option<User>> {
        read_json(self.store.as_ref(), SESSION_KEY)
    }

    pub fn set(&self, user: &User) -> Result<()> {
        write_json(self.store.as_ref(), SESSION_KEY, user)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(SESSION_KEY)
    }
}
