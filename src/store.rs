use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::filter::RecordFilter;
use crate::models::{Category, ScanRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read-only access to persisted scans and their categories.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Scans matching `filter`, oldest first. Simultaneous scans are ordered by id.
    async fn fetch_scans(&self, filter: &RecordFilter) -> StoreResult<Vec<ScanRecord>>;

    /// The owner's newest scans regardless of time window or category, newest
    /// first with ties broken by descending id.
    async fn fetch_recent(&self, owner_id: Uuid, limit: usize) -> StoreResult<Vec<ScanRecord>>;

    /// Category documents owned by `owner_id` among `ids`. Missing ids are not an error.
    async fn fetch_categories(&self, owner_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<Category>>;
}

/// In-process store over a fixed snapshot, used for offline CSV dashboards.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    scans: Vec<ScanRecord>,
    categories: Vec<Category>,
}

impl MemoryStore {
    pub fn new(mut scans: Vec<ScanRecord>, categories: Vec<Category>) -> Self {
        scans.sort_by_key(|scan| (scan.diagnosed_at, scan.id));
        Self { scans, categories }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_scans(&self, filter: &RecordFilter) -> StoreResult<Vec<ScanRecord>> {
        Ok(self
            .scans
            .iter()
            .filter(|scan| filter.matches(scan))
            .cloned()
            .collect())
    }

    async fn fetch_recent(&self, owner_id: Uuid, limit: usize) -> StoreResult<Vec<ScanRecord>> {
        Ok(self
            .scans
            .iter()
            .rev()
            .filter(|scan| scan.owner_id == owner_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_categories(&self, owner_id: Uuid, ids: &[Uuid]) -> StoreResult<Vec<Category>> {
        Ok(self
            .categories
            .iter()
            .filter(|category| category.owner_id == owner_id && ids.contains(&category.id))
            .cloned()
            .collect())
    }
}
