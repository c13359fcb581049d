use serde::{Deserialize, Serialize};
use tracing::instrument;

use olmvault_core::ids::{DeviceId, SessionId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A pairwise Olm session with one remote device. A device may hold many;
/// "current" is derived as the one with the greatest last-decryption
/// timestamp, i.e. the one most recently proven live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OlmSessionRecord {
    pub session_id: SessionId,
    pub last_decryption_ts: i64,
    pub pickled: String,
}

pub struct OlmSessionRepo {
    db: Database,
}

impl OlmSessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upsert a session for (user, device), refreshing its timestamp and
    /// pickle.
    #[instrument(skip(self, session), fields(user_id = %user_id, device_id = %device_id, session_id = %session.session_id))]
    pub fn store(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
        session: &OlmSessionRecord,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO olm_sessions
                     (user_id, device_id, session_id, last_decryption_ts, pickled)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    user_id.as_str(),
                    device_id.as_str(),
                    session.session_id.as_str(),
                    session.last_decryption_ts,
                    session.pickled,
                ],
            )?;
            Ok(())
        })
    }

    /// The most-recently-used session for a device, or None if the device
    /// has no sessions.
    #[instrument(skip(self), fields(user_id = %user_id, device_id = %device_id))]
    pub fn get_current(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<OlmSessionRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, last_decryption_ts, pickled FROM olm_sessions
                 WHERE user_id = ?1 AND device_id = ?2
                 ORDER BY last_decryption_ts DESC LIMIT 1",
            )?;
            let mut rows = stmt.query([user_id.as_str(), device_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
    }

    /// All sessions for a device, most recently used first.
    #[instrument(skip(self), fields(user_id = %user_id, device_id = %device_id))]
    pub fn get_all(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Vec<OlmSessionRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, last_decryption_ts, pickled FROM olm_sessions
                 WHERE user_id = ?1 AND device_id = ?2
                 ORDER BY last_decryption_ts DESC",
            )?;
            let mut rows = stmt.query([user_id.as_str(), device_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_session(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<OlmSessionRecord, StoreError> {
    Ok(OlmSessionRecord {
        session_id: SessionId::from_raw(row_helpers::get::<String>(
            row,
            0,
            "olm_sessions",
            "session_id",
        )?),
        last_decryption_ts: row_helpers::get(row, 1, "olm_sessions", "last_decryption_ts")?,
        pickled: row_helpers::get(row, 2, "olm_sessions", "pickled")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::in_memory().unwrap()
    }

    fn record(id: &str, ts: i64) -> OlmSessionRecord {
        OlmSessionRecord {
            session_id: SessionId::from_raw(id),
            last_decryption_ts: ts,
            pickled: format!("pickle-{id}"),
        }
    }

    #[test]
    fn no_sessions_returns_none() {
        let repo = OlmSessionRepo::new(test_db());
        let current = repo
            .get_current(&UserId::from_raw("@a:x"), &DeviceId::from_raw("A"))
            .unwrap();
        assert!(current.is_none());
    }

    #[test]
    fn current_is_max_timestamp_not_latest_insert() {
        let repo = OlmSessionRepo::new(test_db());
        let user = UserId::from_raw("@alice:example.org");
        let dev = DeviceId::from_raw("A");

        repo.store(&user, &dev, &record("S1", 10)).unwrap();
        repo.store(&user, &dev, &record("S2", 30)).unwrap();
        repo.store(&user, &dev, &record("S3", 20)).unwrap();

        let current = repo.get_current(&user, &dev).unwrap().unwrap();
        assert_eq!(current.session_id.as_str(), "S2");
        assert_eq!(current.last_decryption_ts, 30);
    }

    #[test]
    fn restore_bumps_session_forward() {
        let repo = OlmSessionRepo::new(test_db());
        let user = UserId::from_raw("@alice:example.org");
        let dev = DeviceId::from_raw("A");

        repo.store(&user, &dev, &record("S1", 10)).unwrap();
        repo.store(&user, &dev, &record("S2", 20)).unwrap();
        // S1 decrypts again later; it becomes current again
        repo.store(&user, &dev, &record("S1", 40)).unwrap();

        let all = repo.get_all(&user, &dev).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].session_id.as_str(), "S1");
        assert_eq!(all[0].last_decryption_ts, 40);
        assert_eq!(all[1].session_id.as_str(), "S2");
    }

    #[test]
    fn sessions_scoped_per_device() {
        let repo = OlmSessionRepo::new(test_db());
        let user = UserId::from_raw("@alice:example.org");

        repo.store(&user, &DeviceId::from_raw("A"), &record("S1", 10)).unwrap();
        repo.store(&user, &DeviceId::from_raw("B"), &record("S2", 99)).unwrap();

        let current = repo.get_current(&user, &DeviceId::from_raw("A")).unwrap().unwrap();
        assert_eq!(current.session_id.as_str(), "S1");
    }

    #[test]
    fn upsert_replaces_pickle() {
        let repo = OlmSessionRepo::new(test_db());
        let user = UserId::from_raw("@alice:example.org");
        let dev = DeviceId::from_raw("A");

        repo.store(&user, &dev, &record("S1", 10)).unwrap();
        let updated = OlmSessionRecord {
            session_id: SessionId::from_raw("S1"),
            last_decryption_ts: 11,
            pickled: "ratcheted-pickle".into(),
        };
        repo.store(&user, &dev, &updated).unwrap();

        let all = repo.get_all(&user, &dev).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].pickled, "ratcheted-pickle");
    }
}
