//! Branded ID newtypes.
//!
//! IDs are UUID v7 (time-ordered) generated via [`uuid::Uuid::now_v7`], so
//! connection ids sort by connect time in logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Parse a client-supplied ID, accepting only well-formed UUIDs.
            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map(|u| Self(u.to_string()))
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id! {
    /// Unique identifier for one physical WebSocket session.
    ///
    /// Clients may present a previously issued id on reconnect, in which case
    /// the hub replaces the old registration instead of adding a second one.
    ConnectionId
}
