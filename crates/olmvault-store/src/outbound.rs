use serde::{Deserialize, Serialize};
use tracing::instrument;

use olmvault_core::ids::{DeviceId, RoomId, SessionId, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// An outbound group (Megolm) session row. The pickle is opaque; usage
/// limits and expiry are advisory counters the caller checks before
/// encrypting — this layer only records them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundGroupSession {
    pub session_id: SessionId,
    pub room_id: RoomId,
    pub current: bool,
    pub pickled: String,
    pub uses_left: i64,
    pub expires_at_ms: i64,
}

/// The most recent ledger entry for a device in a room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentSession {
    pub session_id: SessionId,
    pub message_index: i64,
}

/// Outbound group sessions plus the per-(session, device) delivery ledger.
pub struct OutboundGroupSessionRepo {
    db: Database,
}

impl OutboundGroupSessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Upsert a session. When the incoming session is current, every other
    /// session in the room is demoted first, in the same transaction —
    /// at most one row per room ever has current set.
    #[instrument(skip(self, session), fields(session_id = %session.session_id, room_id = %session.room_id, current = session.current))]
    pub fn store(&self, session: &OutboundGroupSession) -> Result<(), StoreError> {
        self.db.with_tx(|tx| {
            if session.current {
                tx.execute(
                    "UPDATE outbound_group_sessions SET current = 0 WHERE room_id = ?1",
                    [session.room_id.as_str()],
                )?;
            }
            tx.execute(
                "INSERT OR REPLACE INTO outbound_group_sessions
                     (session_id, room_id, current, pickled, uses_left, expires_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    session.session_id.as_str(),
                    session.room_id.as_str(),
                    session.current,
                    session.pickled,
                    session.uses_left,
                    session.expires_at_ms,
                ],
            )?;
            Ok(())
        })
    }

    /// Exact lookup by (session, room).
    #[instrument(skip(self), fields(session_id = %session_id, room_id = %room_id))]
    pub fn get(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
    ) -> Result<Option<OutboundGroupSession>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, room_id, current, pickled, uses_left, expires_at_ms
                 FROM outbound_group_sessions WHERE session_id = ?1 AND room_id = ?2",
            )?;
            let mut rows = stmt.query([session_id.as_str(), room_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
    }

    /// The session currently used for new encryption in a room, if any.
    #[instrument(skip(self), fields(room_id = %room_id))]
    pub fn get_current(&self, room_id: &RoomId) -> Result<Option<OutboundGroupSession>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, room_id, current, pickled, uses_left, expires_at_ms
                 FROM outbound_group_sessions WHERE room_id = ?1 AND current = 1",
            )?;
            let mut rows = stmt.query([room_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Decrement the session's remaining uses by one. No floor at zero;
    /// the caller decides when to rotate.
    #[instrument(skip(self), fields(session_id = %session_id, room_id = %room_id))]
    pub fn record_usage(&self, session_id: &SessionId, room_id: &RoomId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE outbound_group_sessions SET uses_left = uses_left - 1
                 WHERE session_id = ?1 AND room_id = ?2",
                [session_id.as_str(), room_id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Record that a device has been sent a given ratchet index of a
    /// session. Duplicate recordings are no-ops; an existing row is never
    /// updated.
    #[instrument(skip(self), fields(session_id = %session_id, room_id = %room_id, message_index, user_id = %user_id, device_id = %device_id))]
    pub fn record_sent(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
        message_index: i64,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO sent_outbound_group_sessions
                     (session_id, room_id, message_index, user_id, device_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    session_id.as_str(),
                    room_id.as_str(),
                    message_index,
                    user_id.as_str(),
                    device_id.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    /// The last (session, index) pair sent to a device for a room. "Last"
    /// means the most recently recorded ledger row (insertion order), which
    /// keeps the answer deterministic when a device has received several
    /// sessions for the same room.
    #[instrument(skip(self), fields(user_id = %user_id, device_id = %device_id, room_id = %room_id))]
    pub fn get_last_sent(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
        room_id: &RoomId,
    ) -> Result<Option<SentSession>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, message_index FROM sent_outbound_group_sessions
                 WHERE user_id = ?1 AND device_id = ?2 AND room_id = ?3
                 ORDER BY rowid DESC LIMIT 1",
            )?;
            let mut rows = stmt.query([user_id.as_str(), device_id.as_str(), room_id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(SentSession {
                    session_id: SessionId::from_raw(row_helpers::get::<String>(
                        row,
                        0,
                        "sent_outbound_group_sessions",
                        "session_id",
                    )?),
                    message_index: row_helpers::get(
                        row,
                        1,
                        "sent_outbound_group_sessions",
                        "message_index",
                    )?,
                })),
                None => Ok(None),
            }
        })
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<OutboundGroupSession, StoreError> {
    Ok(OutboundGroupSession {
        session_id: SessionId::from_raw(row_helpers::get::<String>(
            row,
            0,
            "outbound_group_sessions",
            "session_id",
        )?),
        room_id: RoomId::from_raw(row_helpers::get::<String>(
            row,
            1,
            "outbound_group_sessions",
            "room_id",
        )?),
        current: row_helpers::get::<i64>(row, 2, "outbound_group_sessions", "current")? != 0,
        pickled: row_helpers::get(row, 3, "outbound_group_sessions", "pickled")?,
        uses_left: row_helpers::get(row, 4, "outbound_group_sessions", "uses_left")?,
        expires_at_ms: row_helpers::get(row, 5, "outbound_group_sessions", "expires_at_ms")?,
    })
}
