//! The change-driven notification subsystem's domain logic: everything
//! that is not wire format (`notify-proto`), filter grammar
//! (`notify-filter`), or a concrete storage/HTTP adapter
//! (`notify-storage-postgres`, `notify-server`).

pub mod alerts;
pub mod change_log_writer;
pub mod clock;
pub mod collector;
pub mod datasource;
pub mod error;
pub mod model;
pub mod notifier;
pub mod ports;
pub mod projection;
pub mod reachability;
pub mod shutdown;
pub mod subscriptions;
pub mod worker;

pub use clock::{Clock, SystemClock};
pub use datasource::{DataSourceRegistry, PollCycleGuard};
pub use notifier::{Notifier, SubscriptionEvent, WorkerSpawner};
pub use projection::json_eq;
pub use shutdown::{shutdown_channel, Shutdown, ShutdownHandle};
pub use subscriptions::SubscriptionService;
pub use worker::{Completion, SubscriptionWorker, WorkItem};
