use std::path::Path;

use olmvault_core::ids::{DeviceId, RoomId, SessionId, UserId};

use crate::account::AccountRepo;
use crate::database::Database;
use crate::devices::{DeviceRecord, DeviceRepo};
use crate::error::StoreError;
use crate::olm::{OlmSessionRecord, OlmSessionRepo};
use crate::outbound::{OutboundGroupSession, OutboundGroupSessionRepo, SentSession};
use crate::rooms::RoomRepo;

/// Location string for a non-durable in-memory store.
pub const MEMORY_LOCATION: &str = ":memory:";

/// On-disk location used when the caller passes an empty string.
const DEFAULT_LOCATION: &str = "crypto.db";

/// The crypto session store: an async façade over the SQLite-backed repos.
///
/// Every operation returns a future regardless of the engine underneath;
/// the blocking SQLite work runs on the tokio blocking pool, serialized by
/// the connection mutex. One instance owns the handle — there is no
/// ambient singleton.
pub struct CryptoStore {
    db: Database,
}

impl CryptoStore {
    /// Open a store at the given location. `":memory:"` gives a
    /// non-durable in-memory store; an empty string uses the default
    /// on-disk path.
    pub async fn open(location: &str) -> Result<Self, StoreError> {
        let location = location.to_string();
        let db = tokio::task::spawn_blocking(move || match location.as_str() {
            MEMORY_LOCATION => Database::in_memory(),
            "" => Database::open(Path::new(DEFAULT_LOCATION)),
            path => Database::open(Path::new(path)),
        })
        .await
        .map_err(|e| StoreError::Io(format!("open task failed: {e}")))??;

        Ok(Self { db })
    }

    /// Release the underlying handle. Safe to call once at shutdown;
    /// operations issued afterwards fail with `StoreError::Closed`.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.run(|db| {
            db.close();
            Ok(())
        })
        .await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| StoreError::Io(format!("store task failed: {e}")))?
    }

    // --- identity scalars ---

    pub async fn set_value(&self, name: &str, value: &str) -> Result<(), StoreError> {
        let (name, value) = (name.to_string(), value.to_string());
        self.run(move |db| AccountRepo::new(db).set(&name, &value)).await
    }

    pub async fn get_value(&self, name: &str) -> Result<Option<String>, StoreError> {
        let name = name.to_string();
        self.run(move |db| AccountRepo::new(db).get(&name)).await
    }

    pub async fn device_id(&self) -> Result<Option<DeviceId>, StoreError> {
        self.run(|db| AccountRepo::new(db).device_id()).await
    }

    pub async fn set_device_id(&self, device_id: &DeviceId) -> Result<(), StoreError> {
        let device_id = device_id.clone();
        self.run(move |db| AccountRepo::new(db).set_device_id(&device_id)).await
    }

    pub async fn pickle_key(&self) -> Result<Option<String>, StoreError> {
        self.run(|db| AccountRepo::new(db).pickle_key()).await
    }

    pub async fn set_pickle_key(&self, pickle_key: &str) -> Result<(), StoreError> {
        let pickle_key = pickle_key.to_string();
        self.run(move |db| AccountRepo::new(db).set_pickle_key(&pickle_key)).await
    }

    pub async fn pickled_account(&self) -> Result<Option<String>, StoreError> {
        self.run(|db| AccountRepo::new(db).pickled_account()).await
    }

    pub async fn set_pickled_account(&self, pickled: &str) -> Result<(), StoreError> {
        let pickled = pickled.to_string();
        self.run(move |db| AccountRepo::new(db).set_pickled_account(&pickled)).await
    }

    // --- room config ---

    pub async fn set_room_config(
        &self,
        room_id: &RoomId,
        config: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let (room_id, config) = (room_id.clone(), config.clone());
        self.run(move |db| RoomRepo::new(db).set_config(&room_id, &config)).await
    }

    pub async fn get_room_config(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let room_id = room_id.clone();
        self.run(move |db| RoomRepo::new(db).get_config(&room_id)).await
    }

    // --- device directory ---

    pub async fn replace_devices(
        &self,
        user_id: &UserId,
        devices: Vec<DeviceRecord>,
    ) -> Result<(), StoreError> {
        let user_id = user_id.clone();
        self.run(move |db| DeviceRepo::new(db).replace_devices(&user_id, &devices)).await
    }

    pub async fn mark_outdated(&self, user_ids: Vec<UserId>) -> Result<(), StoreError> {
        self.run(move |db| DeviceRepo::new(db).mark_outdated(&user_ids)).await
    }

    pub async fn is_outdated(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let user_id = user_id.clone();
        self.run(move |db| DeviceRepo::new(db).is_outdated(&user_id)).await
    }

    pub async fn get_devices(&self, user_id: &UserId) -> Result<Vec<DeviceRecord>, StoreError> {
        let user_id = user_id.clone();
        self.run(move |db| DeviceRepo::new(db).get_devices(&user_id)).await
    }

    pub async fn get_device(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        let (user_id, device_id) = (user_id.clone(), device_id.clone());
        self.run(move |db| DeviceRepo::new(db).get_device(&user_id, &device_id)).await
    }

    // --- outbound group sessions ---

    pub async fn store_outbound_group_session(
        &self,
        session: OutboundGroupSession,
    ) -> Result<(), StoreError> {
        self.run(move |db| OutboundGroupSessionRepo::new(db).store(&session)).await
    }

    pub async fn get_outbound_group_session(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
    ) -> Result<Option<OutboundGroupSession>, StoreError> {
        let (session_id, room_id) = (session_id.clone(), room_id.clone());
        self.run(move |db| OutboundGroupSessionRepo::new(db).get(&session_id, &room_id)).await
    }

    pub async fn get_current_outbound_group_session(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<OutboundGroupSession>, StoreError> {
        let room_id = room_id.clone();
        self.run(move |db| OutboundGroupSessionRepo::new(db).get_current(&room_id)).await
    }

    pub async fn record_outbound_group_session_usage(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
    ) -> Result<(), StoreError> {
        let (session_id, room_id) = (session_id.clone(), room_id.clone());
        self.run(move |db| OutboundGroupSessionRepo::new(db).record_usage(&session_id, &room_id))
            .await
    }

    pub async fn record_sent_outbound_group_session(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
        message_index: i64,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<(), StoreError> {
        let (session_id, room_id) = (session_id.clone(), room_id.clone());
        let (user_id, device_id) = (user_id.clone(), device_id.clone());
        self.run(move |db| {
            OutboundGroupSessionRepo::new(db).record_sent(
                &session_id,
                &room_id,
                message_index,
                &user_id,
                &device_id,
            )
        })
        .await
    }

    pub async fn get_last_sent_outbound_group_session(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
        room_id: &RoomId,
    ) -> Result<Option<SentSession>, StoreError> {
        let (user_id, device_id, room_id) = (user_id.clone(), device_id.clone(), room_id.clone());
        self.run(move |db| {
            OutboundGroupSessionRepo::new(db).get_last_sent(&user_id, &device_id, &room_id)
        })
        .await
    }

    // --- olm sessions ---

    pub async fn store_olm_session(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
        session: OlmSessionRecord,
    ) -> Result<(), StoreError> {
        let (user_id, device_id) = (user_id.clone(), device_id.clone());
        self.run(move |db| OlmSessionRepo::new(db).store(&user_id, &device_id, &session)).await
    }

    pub async fn get_current_olm_session(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Option<OlmSessionRecord>, StoreError> {
        let (user_id, device_id) = (user_id.clone(), device_id.clone());
        self.run(move |db| OlmSessionRepo::new(db).get_current(&user_id, &device_id)).await
    }

    pub async fn get_olm_sessions(
        &self,
        user_id: &UserId,
        device_id: &DeviceId,
    ) -> Result<Vec<OlmSessionRecord>, StoreError> {
        let (user_id, device_id) = (user_id.clone(), device_id.clone());
        self.run(move |db| OlmSessionRepo::new(db).get_all(&user_id, &device_id)).await
    }
}
