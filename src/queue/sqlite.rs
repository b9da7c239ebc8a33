use std::path::Path;

use async_trait::async_trait;
use reelforge_common::{Error, ItemId, ItemStatus, ItemUpdate, QueueItem, Result};
use reelforge_db::pool::{get_conn, init_memory_pool, init_pool, DbPool};
use reelforge_db::queries::queue_items;
use rusqlite::Connection;

use super::QueueStore;

/// Queue in a local SQLite database.
#[derive(Clone)]
pub struct SqliteQueue {
    pool: DbPool,
}

impl SqliteQueue {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = init_pool(&path.to_string_lossy())?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            pool: init_memory_pool()?,
        })
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = get_conn(&pool)?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::internal(format!("queue task failed: {}", e)))?
    }
}

#[async_trait]
impl QueueStore for SqliteQueue {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch(&self, statuses: &[ItemStatus], limit: Option<usize>) -> Result<Vec<QueueItem>> {
        let statuses = statuses.to_vec();
        self.with_conn(move |conn| queue_items::list_by_status(conn, &statuses, limit))
            .await
    }

    async fn get(&self, id: &ItemId) -> Result<QueueItem> {
        let id = id.clone();
        self.with_conn(move |conn| queue_items::get_item(conn, &id)).await
    }

    async fn transition(
        &self,
        id: &ItemId,
        expected: ItemStatus,
        next: ItemStatus,
        update: ItemUpdate,
    ) -> Result<QueueItem> {
        let id = id.clone();
        self.with_conn(move |conn| queue_items::transition(conn, &id, expected, next, &update))
            .await
    }

    async fn append(&self, items: Vec<QueueItem>) -> Result<Vec<QueueItem>> {
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction().map_err(|e| Error::database(e.to_string()))?;
            let inserted = items
                .iter()
                .map(|item| queue_items::insert_item(&tx, item))
                .collect::<Result<Vec<_>>>()?;
            tx.commit().map_err(|e| Error::database(e.to_string()))?;
            Ok(inserted)
        })
        .await
    }

    async fn counts(&self) -> Result<Vec<(ItemStatus, usize)>> {
        self.with_conn(queue_items::count_by_status).await
    }

    async fn max_numeric_id(&self) -> Result<Option<u64>> {
        self.with_conn(queue_items::max_numeric_id).await
    }

    async fn reset_stale(&self) -> Result<Vec<ItemId>> {
        self.with_conn(queue_items::reset_stale).await
    }
}
