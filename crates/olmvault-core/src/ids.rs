use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier newtypes for the crypto store.
///
/// Unlike locally-generated ids these all originate on the wire (homeserver
/// or remote device), so there is no constructor that mints fresh values —
/// only `from_raw` for whatever the caller hands us.
macro_rules! wire_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

wire_id!(UserId);
wire_id!(DeviceId);
wire_id!(RoomId);
wire_id!(SessionId);
