//! Storage contracts for entries and credentials.
//!
//! Persistence is local key-value storage namespaced by owner id under a
//! fixed `echoverse_` prefix. No transactionality is assumed beyond
//! last-write-wins per key.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Entry, StoredUser, UserId};

/// Prefix shared by every storage key
pub const KEY_PREFIX: &str = "echoverse_";

/// Key holding the ordered entry list of `owner`
#[must_use]
pub fn entries_key(owner: &UserId) -> String {
    format!("{KEY_PREFIX}entries_{owner}")
}

/// Key holding the last visit timestamp of `owner`
#[must_use]
pub fn last_visit_key(owner: &UserId) -> String {
    format!("{KEY_PREFIX}last_visit_{owner}")
}

/// Key holding every registered user
pub const USERS_KEY: &str = "echoverse_users";
/// Key holding the id of the logged-in user
pub const CURRENT_USER_KEY: &str = "echoverse_current_user";

/// Per-owner entry persistence
pub trait EntryStore {
    /// The owner's entries in insertion order; empty if none were saved
    fn entries(&self, owner: &UserId) -> Result<Vec<Entry>>;

    /// Replace the owner's entries
    fn put_entries(&self, owner: &UserId, entries: &[Entry]) -> Result<()>;

    /// When the owner last started a session, if ever
    fn last_visit(&self, owner: &UserId) -> Result<Option<DateTime<Utc>>>;

    /// Record the start of a session
    fn set_last_visit(&self, owner: &UserId, at: DateTime<Utc>) -> Result<()>;
}

/// Account persistence used by the auth provider
pub trait CredentialStore {
    /// Every registered user
    fn users(&self) -> Result<Vec<StoredUser>>;

    /// Replace the registered users
    fn put_users(&self, users: &[StoredUser]) -> Result<()>;

    /// Id of the logged-in user, if any
    fn current_user_id(&self) -> Result<Option<UserId>>;

    /// Set or clear the logged-in user
    fn set_current_user_id(&self, id: Option<&UserId>) -> Result<()>;
}

impl<S: EntryStore + ?Sized> EntryStore for &S {
    fn entries(&self, owner: &UserId) -> Result<Vec<Entry>> {
        (**self).entries(owner)
    }

    fn put_entries(&self, owner: &UserId, entries: &[Entry]) -> Result<()> {
        (**self).put_entries(owner, entries)
    }

    fn last_visit(&self, owner: &UserId) -> Result<Option<DateTime<Utc>>> {
        (**self).last_visit(owner)
    }

    fn set_last_visit(&self, owner: &UserId, at: DateTime<Utc>) -> Result<()> {
        (**self).set_last_visit(owner, at)
    }
}

impl<S: CredentialStore + ?Sized> CredentialStore for &S {
    fn users(&self) -> Result<Vec<StoredUser>> {
        (**self).users()
    }

    fn put_users(&self, users: &[StoredUser]) -> Result<()> {
        (**self).put_users(users)
    }

    fn current_user_id(&self) -> Result<Option<UserId>> {
        (**self).current_user_id()
    }

    fn set_current_user_id(&self, id: Option<&UserId>) -> Result<()> {
        (**self).set_current_user_id(id)
    }
}

/// Volatile store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<UserId, Vec<Entry>>>,
    last_visits: RefCell<HashMap<UserId, DateTime<Utc>>>,
    users: RefCell<Vec<StoredUser>>,
    current_user: RefCell<Option<UserId>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntryStore for MemoryStore {
    fn entries(&self, owner: &UserId) -> Result<Vec<Entry>> {
        Ok(self.entries.borrow().get(owner).cloned().unwrap_or_default())
    }

    fn put_entries(&self, owner: &UserId, entries: &[Entry]) -> Result<()> {
        self.entries.borrow_mut().insert(owner.clone(), entries.to_vec());
        Ok(())
    }

    fn last_visit(&self, owner: &UserId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.last_visits.borrow().get(owner).copied())
    }

    fn set_last_visit(&self, owner: &UserId, at: DateTime<Utc>) -> Result<()> {
        self.last_visits.borrow_mut().insert(owner.clone(), at);
        Ok(())
    }
}

impl CredentialStore for MemoryStore {
    fn users(&self) -> Result<Vec<StoredUser>> {
        Ok(self.users.borrow().clone())
    }

    fn put_users(&self, users: &[StoredUser]) -> Result<()> {
        *self.users.borrow_mut() = users.to_vec();
        Ok(())
    }

    fn current_user_id(&self) -> Result<Option<UserId>> {
        Ok(self.current_user.borrow().clone())
    }

    fn set_current_user_id(&self, id: Option<&UserId>) -> Result<()> {
        *self.current_user.borrow_mut() = id.cloned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced_by_owner() {
        let owner = UserId::from("user_1");
        assert_eq!(entries_key(&owner), "echoverse_entries_user_1");
        assert_eq!(last_visit_key(&owner), "echoverse_last_visit_user_1");
    }
}
