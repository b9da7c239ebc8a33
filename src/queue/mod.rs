//! Content queue backends.
//!
//! The pipeline only talks to the queue through [`QueueStore`]. Every status
//! change is a status-checked write: it is applied only if the stored status
//! still equals the caller's expected status, otherwise it fails with
//! [`Error::Conflict`](reelforge_common::Error::Conflict).

mod sheets;
mod sqlite;

pub use sheets::{Column, SheetsQueue};
pub use sqlite::SqliteQueue;

use std::sync::Arc;

use async_trait::async_trait;
use reelforge_common::{ItemId, ItemStatus, ItemUpdate, QueueItem, Result};

use crate::config::{Config, QueueBackend};
use crate::credentials::Credentials;
use crate::error::RunError;
use crate::google::auth::{ServiceAccountTokenSource, SHEETS_SCOPE};
use crate::google::SheetsClient;
use crate::http::build_client;

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Items in any of `statuses`, in insertion order, at most `limit`.
    async fn fetch(&self, statuses: &[ItemStatus], limit: Option<usize>) -> Result<Vec<QueueItem>>;

    async fn get(&self, id: &ItemId) -> Result<QueueItem>;

    /// Status-checked write of `next` plus the fields set in `update`.
    async fn transition(
        &self,
        id: &ItemId,
        expected: ItemStatus,
        next: ItemStatus,
        update: ItemUpdate,
    ) -> Result<QueueItem>;

    /// Add new items at the end of the queue.
    async fn append(&self, items: Vec<QueueItem>) -> Result<Vec<QueueItem>>;

    /// Number of items per status; statuses without items are omitted.
    async fn counts(&self) -> Result<Vec<(ItemStatus, usize)>>;

    async fn max_numeric_id(&self) -> Result<Option<u64>>;

    /// Move items stuck in `in-progress` back to `pending`.
    async fn reset_stale(&self) -> Result<Vec<ItemId>> {
        let stale = self.fetch(&[ItemStatus::InProgress], None).await?;
        let mut reset = Vec::with_capacity(stale.len());
        for item in stale {
            match self
                .transition(
                    &item.id,
                    ItemStatus::InProgress,
                    ItemStatus::Pending,
                    ItemUpdate::default(),
                )
                .await
            {
                Ok(_) => reset.push(item.id),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(item_id = %item.id, "Item moved before reset, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reset)
    }
}

/// Open the configured backend.
pub fn open(config: &Config, credentials: &Credentials) -> std::result::Result<Arc<dyn QueueStore>, RunError> {
    match config.queue.backend {
        QueueBackend::Sqlite => {
            let path = &config.queue.db_path;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RunError::queue(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
            let queue = SqliteQueue::open(path).map_err(|e| RunError::queue(e.to_string()))?;
            tracing::info!("Using SQLite queue at {}", path.display());
            Ok(Arc::new(queue))
        }
        QueueBackend::Sheets => {
            let (spreadsheet_id, key) = credentials.sheets()?;
            let client = build_client(std::time::Duration::from_secs(
                config.http.request_timeout_secs,
            ));
            let tokens = Arc::new(ServiceAccountTokenSource::new(
                client.clone(),
                key.clone(),
                SHEETS_SCOPE,
            ));
            let sheets = SheetsClient::new(client, &config.queue.sheets_base_url, spreadsheet_id, tokens);
            tracing::info!("Using Google Sheets queue, sheet '{}'", config.queue.sheet_name);
            Ok(Arc::new(SheetsQueue::new(sheets, &config.queue.sheet_name)))
        }
    }
}
