use tracing::instrument;

use olmvault_core::ids::DeviceId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

// kv names for the identity scalars. Fixed set; one row each.
const KV_DEVICE_ID: &str = "deviceId";
const KV_PICKLE_KEY: &str = "pickleKey";
const KV_PICKLED_ACCOUNT: &str = "pickledAccount";

/// Identity scalars: the local device id, the pickle (serialization) key,
/// and the pickled account blob. Backed by a generic kv table with
/// last-write-wins semantics.
pub struct AccountRepo {
    db: Database,
}

impl AccountRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a scalar, overwriting any prior value.
    #[instrument(skip(self, value), fields(name))]
    pub fn set(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (name, value) VALUES (?1, ?2)",
                rusqlite::params![name, value],
            )?;
            Ok(())
        })
    }

    /// Get the last-written value for a scalar, or None if never set.
    #[instrument(skip(self), fields(name))]
    pub fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv WHERE name = ?1")?;
            let mut rows = stmt.query([name])?;
            match rows.next()? {
                Some(row) => row_helpers::get_opt(row, 0, "kv", "value"),
                None => Ok(None),
            }
        })
    }

    pub fn device_id(&self) -> Result<Option<DeviceId>, StoreError> {
        Ok(self.get(KV_DEVICE_ID)?.map(DeviceId::from_raw))
    }

    pub fn set_device_id(&self, device_id: &DeviceId) -> Result<(), StoreError> {
        self.set(KV_DEVICE_ID, device_id.as_str())
    }

    pub fn pickle_key(&self) -> Result<Option<String>, StoreError> {
        self.get(KV_PICKLE_KEY)
    }

    pub fn set_pickle_key(&self, pickle_key: &str) -> Result<(), StoreError> {
        self.set(KV_PICKLE_KEY, pickle_key)
    }

    pub fn pickled_account(&self) -> Result<Option<String>, StoreError> {
        self.get(KV_PICKLED_ACCOUNT)
    }

    pub fn set_pickled_account(&self, pickled: &str) -> Result<(), StoreError> {
        self.set(KV_PICKLED_ACCOUNT, pickled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::in_memory().unwrap()
    }

    #[test]
    fn get_never_set_returns_none() {
        let repo = AccountRepo::new(test_db());
        assert_eq!(repo.get("deviceId").unwrap(), None);
        assert_eq!(repo.device_id().unwrap(), None);
    }

    #[test]
    fn last_write_wins() {
        let repo = AccountRepo::new(test_db());
        repo.set("pickleKey", "first").unwrap();
        repo.set("pickleKey", "second").unwrap();
        assert_eq!(repo.get("pickleKey").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn typed_accessors_roundtrip() {
        let repo = AccountRepo::new(test_db());

        repo.set_device_id(&DeviceId::from_raw("ABCDEFGH")).unwrap();
        assert_eq!(repo.device_id().unwrap().unwrap().as_str(), "ABCDEFGH");

        repo.set_pickle_key("key-material").unwrap();
        assert_eq!(repo.pickle_key().unwrap().as_deref(), Some("key-material"));

        repo.set_pickled_account("opaque-pickle").unwrap();
        assert_eq!(
            repo.pickled_account().unwrap().as_deref(),
            Some("opaque-pickle")
        );
    }

    #[test]
    fn scalars_are_independent() {
        let repo = AccountRepo::new(test_db());
        repo.set_device_id(&DeviceId::from_raw("DEV")).unwrap();
        assert_eq!(repo.pickle_key().unwrap(), None);
        assert_eq!(repo.pickled_account().unwrap(), None);
    }
}
