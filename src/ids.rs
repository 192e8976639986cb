//! Opaque short-string identifiers shared across the protocol, event, and
//! order-domain layers.
//!
//! Plain `String` works everywhere these are used, but the domain treats an
//! `OrderId` and a `ClientId` as distinct concepts that must never be
//! swapped by argument order — the newtypes exist to make that a compile
//! error instead of a 3am incident.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
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
    };
}

string_id!(OrderId);
string_id!(ClientId);
string_id!(InstrumentId);
string_id!(SubscriptionId);
string_id!(EventId);

impl OrderId {
    /// Generate a fresh, unique order id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl EventId {
    /// Generate a fresh, unique event id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
