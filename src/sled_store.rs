use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::logging::OperationTimer;
use crate::models::{Entry, StoredUser, UserId};
use crate::store::{
    entries_key, last_visit_key, CredentialStore, EntryStore, CURRENT_USER_KEY, USERS_KEY,
};

/// Embedded on-disk store; values are bincode-encoded
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        debug!(path = %path.display(), "Opened entry store");
        Ok(Self { db })
    }

    /// Open a store that is deleted when dropped
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let data = bincode::serialize(value)?;
        self.db.insert(key.as_bytes(), data)?;
        self.db.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}

impl EntryStore for SledStore {
    fn entries(&self, owner: &UserId) -> Result<Vec<Entry>> {
        let timer = OperationTimer::new("load_entries");
        let entries = self.get(&entries_key(owner))?.unwrap_or_default();
        timer.finish();
        Ok(entries)
    }

    fn put_entries(&self, owner: &UserId, entries: &[Entry]) -> Result<()> {
        let timer = OperationTimer::new("save_entries");
        self.put(&entries_key(owner), entries)?;
        timer.finish();
        Ok(())
    }

    fn last_visit(&self, owner: &UserId) -> Result<Option<DateTime<Utc>>> {
        self.get(&last_visit_key(owner))
    }

    fn set_last_visit(&self, owner: &UserId, at: DateTime<Utc>) -> Result<()> {
        self.put(&last_visit_key(owner), &at)
    }
}

impl CredentialStore for SledStore {
    fn users(&self) -> Result<Vec<StoredUser>> {
        Ok(self.get(USERS_KEY)?.unwrap_or_default())
    }

    fn put_users(&self, users: &[StoredUser]) -> Result<()> {
        self.put(USERS_KEY, users)
    }

    fn current_user_id(&self) -> Result<Option<UserId>> {
        self.get(CURRENT_USER_KEY)
    }

    fn set_current_user_id(&self, id: Option<&UserId>) -> Result<()> {
        match id {
            Some(id) => self.put(CURRENT_USER_KEY, id),
            None => self.remove(CURRENT_USER_KEY),
        }
    }
}
