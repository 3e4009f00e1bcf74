//! Wire and DTO types shared by every crate in the notification subsystem.
//!
//! This crate is intentionally inert: no I/O, no async, no business logic —
//! just the shapes that cross a boundary (ledger rows, subscriber payloads,
//! collector events) plus the identity newtypes they're keyed by.

pub mod change;
pub mod event;
pub mod ids;
pub mod notification;

pub use change::{ChangeLogEntry, ObjectType};
pub use event::{AsyncChangeEvent, CollectorEventKind, ParentRef};
pub use ids::{ChangeLogEntryId, DataSourceId, EntityId, NotificationId, SubscriptionId};
pub use notification::{NotificationEventType, NotificationPayload};
