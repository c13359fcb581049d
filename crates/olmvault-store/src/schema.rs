/// SQL DDL for the crypto store database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    name TEXT PRIMARY KEY NOT NULL,
    value TEXT
);

CREATE TABLE IF NOT EXISTS rooms (
    room_id TEXT PRIMARY KEY NOT NULL,
    config TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY NOT NULL,
    outdated INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS devices (
    user_id TEXT NOT NULL,
    device_id TEXT NOT NULL,
    device TEXT NOT NULL,
    PRIMARY KEY (user_id, device_id)
);

CREATE TABLE IF NOT EXISTS outbound_group_sessions (
    session_id TEXT NOT NULL,
    room_id TEXT NOT NULL,
    current INTEGER NOT NULL DEFAULT 0,
    pickled TEXT NOT NULL,
    uses_left INTEGER NOT NULL,
    expires_at_ms INTEGER NOT NULL,
    PRIMARY KEY (session_id, room_id)
);

CREATE TABLE IF NOT EXISTS sent_outbound_group_sessions (
    session_id TEXT NOT NULL,
    room_id TEXT NOT NULL,
    message_index INTEGER NOT NULL,
    user_id TEXT NOT NULL,
    device_id TEXT NOT NULL,
    PRIMARY KEY (session_id, room_id, message_index, user_id, device_id)
);

CREATE TABLE IF NOT EXISTS olm_sessions (
    user_id TEXT NOT NULL,
    device_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    last_decryption_ts INTEGER NOT NULL,
    pickled TEXT NOT NULL,
    PRIMARY KEY (user_id, device_id, session_id)
);

CREATE INDEX IF NOT EXISTS idx_devices_user ON devices(user_id);
CREATE INDEX IF NOT EXISTS idx_outbound_room ON outbound_group_sessions(room_id);
CREATE INDEX IF NOT EXISTS idx_outbound_room_current ON outbound_group_sessions(room_id, current);
CREATE INDEX IF NOT EXISTS idx_sent_device ON sent_outbound_group_sessions(user_id, device_id, room_id);
CREATE INDEX IF NOT EXISTS idx_olm_device ON olm_sessions(user_id, device_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
