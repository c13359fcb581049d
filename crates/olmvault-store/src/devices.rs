use serde::{Deserialize, Serialize};
use tracing::instrument;

use olmvault_core::ids::{DeviceId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// One entry in a user's device list: the device id plus its key blob as
/// fetched from the homeserver. The blob is stored verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub keys: serde_json::Value,
}

/// Device directory: which devices each user has, and whether the cached
/// list is stale. A user the store has never seen counts as outdated.
pub struct DeviceRepo {
    db: Database,
}

impl DeviceRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Replace a user's entire device list. Marks the user fresh, drops all
    /// prior device rows, and inserts the new list in one transaction, so
    /// no reader observes a half-replaced list.
    #[instrument(skip(self, devices), fields(user_id = %user_id, count = devices.len()))]
    pub fn replace_devices(
        &self,
        user_id: &UserId,
        devices: &[DeviceRecord],
    ) -> Result<(), StoreError> {
        let rows: Vec<(String, String)> = devices
            .iter()
            .map(|d| {
                serde_json::to_string(&d.keys)
                    .map(|raw| (d.device_id.as_str().to_string(), raw))
                    .map_err(StoreError::from)
            })
            .collect::<Result<_, _>>()?;

        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO users (user_id, outdated) VALUES (?1, 0)
                 ON CONFLICT(user_id) DO UPDATE SET outdated = 0",
                [user_id.as_str()],
            )?;
            tx.execute("DELETE FROM devices WHERE user_id = ?1", [user_id.as_str()])?;
            for (device_id, raw) in &rows {
                tx.execute(
                    "INSERT INTO devices (user_id, device_id, device) VALUES (?1, ?2, ?3)",
                    rusqlite::params![user_id.as_str(), device_id, raw],
                )?;
            }
            Ok(())
        })
    }

    /// Flag a batch of users as needing a device-list refresh.
    #[instrument(skip(self, user_ids), fields(count = user_ids.len()))]
    pub fn mark_outdated(&self, user_ids: &[UserId]) -> Result<(), StoreError> {
        self.db.with_tx(|tx| {
            for user_id in user_ids {
                tx.execute(
                    "INSERT INTO users (user_id, outdated) VALUES (?1, 1)
                     ON CONFLICT(user_id) DO UPDATE SET outdated = 1",
                    [user_id.as_str()],
                )?;
            }
            Ok(())
        })
    }

    /// True when the user is flagged outdated or has never been fetched.
    /// Unknown trust state is treated as needs-refresh.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn is_outdated(&self, user_id: &UserId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT outdated FROM users WHERE user_id = ?1")?;
            let mut rows = stmt.query([user_id.as_str()])?;
            match rows.next()? {
                Some(row) => {
                    let outdated: i64 = row_helpers::get(row, 0, "users", "outdated")?;
                    Ok(outdated != 0)
                }
                None => Ok(true),
            }
        })
    }

    /// All devices currently known for a user.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn get_devices(&self, user_id: &UserId) -> Result<Vec<DeviceRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT device_id, device FROM devices WHERE user_id = ?1 ORDER BY device_id",
            )?;
            let mut rows = stmt.query([user_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_device(row)?);
            }
            Ok(results)
        })
    }

    /// A single device by id, or None if unknown.
    #[instrument(skip(self), fields(user_id = %user_id, device_id = %device_id))]
    pub fn get_device(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT device_id, device FROM devices WHERE user_id = ?1 AND device_id = ?2",
            )?;
            let mut rows = stmt.query([user_id.as_str(), device_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_device(row)?)),
                None => Ok(None),
            }
        })
    }
}

fn row_to_device(row: &rusqlite::Row<'_>) -> Result<DeviceRecord, StoreError> {
    let raw: String = row_helpers::get(row, 1, "devices", "device")?;
    Ok(DeviceRecord {
        device_id: DeviceId::from_raw(row_helpers::get::<String>(row, 0, "devices", "device_id")?),
        keys: row_helpers::parse_json(&raw, "devices", "device")?,
    })
}
