pub mod ids;

pub use ids::{DeviceId, RoomId, SessionId, UserId};
