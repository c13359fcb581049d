use tracing::instrument;

use olmvault_core::ids::RoomId;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Per-room encryption configuration. The config is structured JSON at the
/// boundary but the store never interprets its shape; a write replaces the
/// whole object for that room.
pub struct RoomRepo {
    db: Database,
}

impl RoomRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store the encryption config for a room, replacing any prior config.
    #[instrument(skip(self, config), fields(room_id = %room_id))]
    pub fn set_config(
        &self,
        room_id: &RoomId,
        config: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(config)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO rooms (room_id, config) VALUES (?1, ?2)",
                rusqlite::params![room_id.as_str(), raw],
            )?;
            Ok(())
        })
    }

    /// Get the encryption config for a room, or None if never stored.
    #[instrument(skip(self), fields(room_id = %room_id))]
    pub fn get_config(&self, room_id: &RoomId) -> Result<Option<serde_json::Value>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT config FROM rooms WHERE room_id = ?1")?;
            let mut rows = stmt.query([room_id.as_str()])?;
            match rows.next()? {
                Some(row) => {
                    let raw: String = row_helpers::get(row, 0, "rooms", "config")?;
                    Ok(Some(row_helpers::parse_json(&raw, "rooms", "config")?))
                }
                None => Ok(None),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_db() -> Database {
        Database::in_memory().unwrap()
    }

    #[test]
    fn unknown_room_returns_none() {
        let repo = RoomRepo::new(test_db());
        let config = repo.get_config(&RoomId::from_raw("!none:example.org")).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn config_roundtrips_structurally() {
        let repo = RoomRepo::new(test_db());
        let room = RoomId::from_raw("!room:example.org");
        let config = json!({
            "algorithm": "m.megolm.v1.aes-sha2",
            "rotation_period_ms": 604800000,
            "rotation_period_msgs": 100,
        });
        repo.set_config(&room, &config).unwrap();
        assert_eq!(repo.get_config(&room).unwrap(), Some(config));
    }

    #[test]
    fn set_replaces_wholesale() {
        let repo = RoomRepo::new(test_db());
        let room = RoomId::from_raw("!room:example.org");
        repo.set_config(&room, &json!({"a": 1, "b": 2})).unwrap();
        repo.set_config(&room, &json!({"c": 3})).unwrap();

        let config = repo.get_config(&room).unwrap().unwrap();
        assert_eq!(config, json!({"c": 3}));
    }

    #[test]
    fn malformed_config_surfaces_corrupt_row() {
        let db = test_db();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rooms (room_id, config) VALUES ('!bad:example.org', 'not json')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let repo = RoomRepo::new(db);
        let result = repo.get_config(&RoomId::from_raw("!bad:example.org"));
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "rooms", column: "config", .. })
        ));
    }
}
