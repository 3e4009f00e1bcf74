//! The narrow contracts this subsystem is built against (spec.md §1, §6).
//!
//! Everything in this module is a trait: concrete storage lives in
//! `notify-storage-postgres`, concrete HTTP delivery and OAuth token
//! handling live in `notify-server`. This mirrors the
//! `StorageEngine`/`StorageBucket` split between `core` and the storage
//! adapter crates in the reference material — one crate owns the port,
//! another owns the adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use notify_proto::{ChangeLogEntry, DataSourceId, EntityId, NotificationPayload, ObjectType, SubscriptionId};

use crate::error::RepositoryError;
use crate::model::{DataSource, EntityRecord, NewSubscription, Subscription};

#[async_trait]
pub trait DataSourceRepository: Send + Sync {
    /// Get-or-create-with-generation-0 by name (spec.md §4.1).
    async fn get_or_create(&self, name: &str) -> Result<DataSource, RepositoryError>;

    /// Persist a new generation id. Only called after a poll cycle
    /// completes successfully (spec.md §4.1).
    async fn update_generation(&self, id: DataSourceId, generation_id: i64) -> Result<(), RepositoryError>;
}

/// The outcome of writing one row within a [`Transaction`], reported back
/// to `change_log_writer` so it knows whether to compute a diff at all.
pub enum RowWrite {
    Inserted,
    Updated { previous: EntityRecord },
    /// No persisted column the writer cares about changed; the repository
    /// did not touch the row (spec.md §4.3 step 4, "no-op").
    Unchanged,
}

/// One atomic unit of work spanning an entity-table mutation and its
/// change-log append (spec.md §4.3 "I1: every ChangeLogEntry is written in
/// the same transaction as its entity mutation").
#[async_trait]
pub trait Transaction: Send {
    async fn get_entity(&mut self, kind: &ObjectType, id: EntityId) -> Result<Option<EntityRecord>, RepositoryError>;

    /// Insert the row if absent; otherwise update only the columns that
    /// differ from the stored row among `external_id`, `parent_id`, `body`
    /// (spec.md §4.3 step 4's "every persisted column except explicitly
    /// excluded audit columns" — `generation_id`/`data_source_id`/
    /// `created_at` are this schema's audit columns).
    async fn upsert_entity(&mut self, record: &EntityRecord) -> Result<RowWrite, RepositoryError>;

    /// Delete the row if present, returning what was deleted.
    async fn delete_entity(&mut self, kind: &ObjectType, id: EntityId) -> Result<Option<EntityRecord>, RepositoryError>;

    /// Append a ledger row in the same transaction (I1). The returned entry
    /// carries the `sequence_id` the database assigned.
    async fn append_change_log(&mut self, entry: NewChangeLogEntry) -> Result<ChangeLogEntry, RepositoryError>;

    /// Rows of `kind` under `data_source_id` with `generation_id <
    /// min_generation`, read within this transaction. Used by the Alert
    /// Ingest Path's snapshot-resolve sweep (spec.md §4.8), which must see
    /// its own batch's upserts before deciding what is stale.
    async fn list_stale(&mut self, kind: &ObjectType, data_source_id: DataSourceId, min_generation: i64) -> Result<Vec<EntityRecord>, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct NewChangeLogEntry {
    pub object_type: ObjectType,
    pub object_id: EntityId,
    pub parent_id: Option<EntityId>,
    pub data_source_id: DataSourceId,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, RepositoryError>;

    /// All external ids currently known for `kind` under `data_source_id`,
    /// used by `SyncComplete` set-subtraction (spec.md §4.2, §9) and by the
    /// stale-generation sweep's candidate list.
    async fn list_keys(&self, kind: &ObjectType, data_source_id: DataSourceId) -> Result<Vec<(EntityId, String)>, RepositoryError>;

    /// Rows whose `generation_id` is strictly less than `current_generation`
    /// (spec.md §4.1, §4.2 step (d), I6). Read-only; the caller deletes each
    /// one through its own transaction so every deletion gets its own
    /// ledger entry (spec.md §4.2 "Tie-breaks": "in separate transactions,
    /// one change-log entry per child").
    async fn list_stale(&self, kind: &ObjectType, data_source_id: DataSourceId, current_generation: i64) -> Result<Vec<EntityRecord>, RepositoryError>;

    async fn find_by_external_id(&self, kind: &ObjectType, data_source_id: DataSourceId, external_id: &str) -> Result<Option<EntityRecord>, RepositoryError>;

    /// Children of `parent_id` across all kinds (spec.md §4.2 "Deletion of
    /// a parent fans out to deletion of all dependent children").
    async fn list_children(&self, parent_id: EntityId) -> Result<Vec<EntityRecord>, RepositoryError>;
}

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// All entries with `sequence_id > after`, ascending (spec.md §4.6
    /// startup catch-up).
    async fn load_since(&self, after: i64) -> Result<Vec<ChangeLogEntry>, RepositoryError>;

    /// The current tail sequence id (0 if the ledger is empty). A new
    /// subscription's cursor is initialized here so it never receives
    /// history (spec.md §4.6 "On subscription add").
    async fn tail_sequence_id(&self) -> Result<i64, RepositoryError>;

    /// Delete the entry iff `min_cursor >= sequence_id` (I4). Returns
    /// whether it was actually deleted.
    async fn delete_if_safe(&self, sequence_id: i64, min_cursor: i64) -> Result<bool, RepositoryError>;
}

/// A notification that the ledger has new rows past `last_known`, or that
/// the catch-up timer fired (spec.md §4.4). The concrete Postgres adapter
/// backs this with `LISTEN`/`NOTIFY`; tests can drive it with a plain
/// channel.
#[async_trait]
pub trait LedgerSignal: Send {
    /// Waits for either a push notification or the catch-up timer,
    /// whichever comes first. Returns `None` once the signal source is
    /// closed (e.g. shutdown).
    async fn recv(&mut self) -> Option<()>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// `initial_cursor` seeds `event_cursor` so a new subscription starts at
    /// the ledger tail rather than at zero (spec.md §4.6 "On subscription
    /// add"). A unique-callback violation surfaces as
    /// [`RepositoryError::Conflict`].
    async fn create(&self, new_sub: NewSubscription, initial_cursor: i64) -> Result<Subscription, RepositoryError>;

    async fn get(&self, id: SubscriptionId) -> Result<Option<Subscription>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Subscription>, RepositoryError>;

    async fn delete(&self, id: SubscriptionId) -> Result<(), RepositoryError>;

    async fn update_cursor(&self, id: SubscriptionId, cursor: i64) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, Copy)]
pub struct DeliveryResponse {
    pub status: u16,
}

impl DeliveryResponse {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

/// The "pre-built HTTP client factory" of spec.md §6 — this subsystem does
/// not construct an OAuth client (spec.md §1 non-goal); it is handed one
/// through this trait plus [`BearerTokenProvider`].
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn post(&self, url: &str, payload: &NotificationPayload, bearer_token: Option<&str>) -> Result<DeliveryResponse, anyhow::Error>;

    /// Reachability probe for subscription creation (spec.md §4.5): GET,
    /// expecting 2xx/3xx/204.
    async fn probe(&self, url: &str) -> Result<bool, anyhow::Error>;
}

#[async_trait]
pub trait BearerTokenProvider: Send + Sync {
    async fn token(&self) -> Result<Option<String>, anyhow::Error>;
}
