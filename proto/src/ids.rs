//! UUID newtypes shared across the notification subsystem.
//!
//! Runtime-created identities use v4; identities that must be stable across
//! processes for the same logical object use v5, per spec.md §6 (see
//! `notify_core::collector::derive_entity_id`).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self { Self(Uuid::new_v4()) }

            pub fn from_uuid(id: Uuid) -> Self { Self(id) }

            pub fn as_uuid(&self) -> Uuid { self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self { Self(id) }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self { id.0 }
        }
    };
}

uuid_newtype!(DataSourceId);
uuid_newtype!(EntityId);
uuid_newtype!(SubscriptionId);
uuid_newtype!(ChangeLogEntryId);
uuid_newtype!(NotificationId);
