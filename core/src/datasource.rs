//! Data Source Registry and generation counter (spec.md §4.1).
//!
//! A poll cycle claims the next generation id up front, so every entity
//! touched during the cycle can be tagged with it; the id is only
//! persisted once the cycle finishes without error (I6).

use std::sync::Arc;

use notify_proto::DataSourceId;

use crate::error::RepositoryError;
use crate::model::DataSource;
use crate::ports::DataSourceRepository;

/// A claimed-but-not-yet-committed generation for one poll cycle.
pub struct PollCycleGuard {
    repo: Arc<dyn DataSourceRepository>,
    data_source_id: DataSourceId,
    generation_id: i64,
    committed: bool,
}

impl PollCycleGuard {
    pub fn generation_id(&self) -> i64 { self.generation_id }

    pub fn data_source_id(&self) -> DataSourceId { self.data_source_id }

    /// Persist the new generation id. Collectors call this only after every
    /// entity in the cycle has been durably written (spec.md §4.1, I6): a
    /// crash before `commit` leaves the prior generation in place, so the
    /// next cycle's stale-generation sweep cannot misfire against rows this
    /// cycle never finished writing.
    pub async fn commit(mut self) -> Result<(), RepositoryError> {
        self.repo.update_generation(self.data_source_id, self.generation_id).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PollCycleGuard {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!(
                data_source_id = %self.data_source_id,
                generation_id = self.generation_id,
                "poll cycle guard dropped without commit; generation not advanced"
            );
        }
    }
}

pub struct DataSourceRegistry {
    repo: Arc<dyn DataSourceRepository>,
}

impl DataSourceRegistry {
    pub fn new(repo: Arc<dyn DataSourceRepository>) -> Self { Self { repo } }

    pub async fn resolve(&self, name: &str) -> Result<DataSource, RepositoryError> {
        self.repo.get_or_create(name).await
    }

    /// Begin a poll cycle: claims `current_generation + 1` without
    /// persisting it yet (spec.md §4.1).
    pub async fn begin_poll_cycle(&self, name: &str) -> Result<PollCycleGuard, RepositoryError> {
        let source = self.repo.get_or_create(name).await?;
        Ok(PollCycleGuard {
            repo: self.repo.clone(),
            data_source_id: source.id,
            generation_id: source.generation_id + 1,
            committed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Mutex;

    use super::*;

    struct FakeRepo {
        sources: Mutex<Vec<DataSource>>,
    }

    #[async_trait]
    impl DataSourceRepository for FakeRepo {
        async fn get_or_create(&self, name: &str) -> Result<DataSource, RepositoryError> {
            let mut sources = self.sources.lock().unwrap();
            if let Some(existing) = sources.iter().find(|s| s.name == name) {
                return Ok(existing.clone());
            }
            let created = DataSource { id: DataSourceId::new(), name: name.to_string(), generation_id: 0 };
            sources.push(created.clone());
            Ok(created)
        }

        async fn update_generation(&self, id: DataSourceId, generation_id: i64) -> Result<(), RepositoryError> {
            let mut sources = self.sources.lock().unwrap();
            let source = sources.iter_mut().find(|s| s.id == id).expect("source exists");
            source.generation_id = generation_id;
            Ok(())
        }
    }

    #[tokio::test]
    async fn commit_advances_generation() {
        let repo = Arc::new(FakeRepo { sources: Mutex::new(Vec::new()) });
        let registry = DataSourceRegistry::new(repo.clone());

        let guard = registry.begin_poll_cycle("widgets").await.unwrap();
        assert_eq!(guard.generation_id(), 1);
        guard.commit().await.unwrap();

        let source = registry.resolve("widgets").await.unwrap();
        assert_eq!(source.generation_id, 1);
    }

    #[tokio::test]
    async fn dropped_guard_does_not_advance_generation() {
        let repo = Arc::new(FakeRepo { sources: Mutex::new(Vec::new()) });
        let registry = DataSourceRegistry::new(repo.clone());

        {
            let _guard = registry.begin_poll_cycle("widgets").await.unwrap();
        }

        let source = registry.resolve("widgets").await.unwrap();
        assert_eq!(source.generation_id, 0);
    }
}
