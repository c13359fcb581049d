pub mod account;
pub mod database;
pub mod devices;
pub mod error;
pub mod olm;
pub mod outbound;
pub mod rooms;
pub mod row_helpers;
pub mod schema;
pub mod store;

pub use database::Database;
pub use devices::DeviceRecord;
pub use error::StoreError;
pub use olm::OlmSessionRecord;
pub use outbound::{OutboundGroupSession, SentSession};
pub use store::{CryptoStore, MEMORY_LOCATION};
