//! Subscription Registry orchestration (spec.md §4.5): filter syntax
//! validation, a reachability probe, and cursor initialization sit in
//! front of the bare [`SubscriptionRepository`] so creation can reject bad
//! input before ever touching the database.

use std::sync::Arc;

use crate::error::{RepositoryError, SubscriptionError};
use crate::model::{NewSubscription, Subscription};
use crate::ports::LedgerRepository;
use crate::ports::{DeliveryClient, SubscriptionRepository};
use crate::reachability;

pub struct SubscriptionService {
    repo: Arc<dyn SubscriptionRepository>,
    ledger_repo: Arc<dyn LedgerRepository>,
    delivery: Arc<dyn DeliveryClient>,
}

impl SubscriptionService {
    pub fn new(repo: Arc<dyn SubscriptionRepository>, ledger_repo: Arc<dyn LedgerRepository>, delivery: Arc<dyn DeliveryClient>) -> Self {
        Self { repo, ledger_repo, delivery }
    }

    /// Validate the filter, probe the callback, then create — in that
    /// order, so a malformed filter never produces a wasted HTTP request
    /// (spec.md §4.5, §6).
    pub async fn create(&self, callback: String, filter_text: String, consumer_id: Option<uuid::Uuid>) -> Result<Subscription, SubscriptionError> {
        notify_filter::parse(&filter_text).map_err(|err| SubscriptionError::Validation(err.to_string()))?;

        if !reachability::probe(self.delivery.as_ref(), &callback).await {
            return Err(SubscriptionError::Unreachable(callback));
        }

        let tail = self.ledger_repo.tail_sequence_id().await.map_err(SubscriptionError::Repository)?;

        let new_sub = NewSubscription { consumer_id, callback, filter: filter_text };
        self.repo.create(new_sub, tail).await.map_err(|err| match err {
            RepositoryError::Conflict(_) => SubscriptionError::DuplicateCallback,
            other => SubscriptionError::Repository(other),
        })
    }

    pub async fn delete(&self, id: notify_proto::SubscriptionId) -> Result<(), SubscriptionError> { Ok(self.repo.delete(id).await?) }

    pub async fn list(&self) -> Result<Vec<Subscription>, SubscriptionError> { Ok(self.repo.list().await?) }
}
