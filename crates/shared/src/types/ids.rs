use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines an opaque, provider-assigned string identifier.
///
/// Unlike the locally-minted UUIDs a transactional system usually hands out,
/// these come from the calendar provider and must round-trip byte-for-byte,
/// so the newtype wraps a `String` rather than a `Uuid`.
macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
        #[sqlx(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(CalendarId, "Identifier of a mirrored calendar, assigned by the provider");
define_id!(EventId, "Identifier of an event or a recurring-event instance");
define_id!(ResourceId, "Provider-side handle for a watch channel, needed to stop it");
define_id!(ChannelId, "Locally-derived identifier correlating webhook deliveries with a channel");
