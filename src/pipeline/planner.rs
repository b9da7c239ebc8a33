//! Selecting which queue items a run works on.

use reelforge_common::{ItemStatus, QueueItem};

use super::RunOptions;
use crate::error::RunError;
use crate::queue::QueueStore;

/// Statuses eligible for this run, in selection order.
pub fn eligible_statuses(options: &RunOptions) -> Vec<ItemStatus> {
    let mut statuses = vec![ItemStatus::Pending];
    if options.retry_failed {
        statuses.push(ItemStatus::Failed);
    }
    statuses
}

/// Maximum number of items to select; `None` means no limit.
pub fn selection_limit(options: &RunOptions) -> Option<usize> {
    if options.all {
        None
    } else {
        Some(options.limit.unwrap_or(options.batch_size))
    }
}

/// Read the eligible items in queue order.
pub async fn plan(queue: &dyn QueueStore, options: &RunOptions) -> Result<Vec<QueueItem>, RunError> {
    let statuses = eligible_statuses(options);
    let limit = selection_limit(options);
    let items = queue
        .fetch(&statuses, limit)
        .await
        .map_err(|e| RunError::queue(e.to_string()))?;

    tracing::info!(
        backend = queue.name(),
        selected = items.len(),
        limit = ?limit,
        "Planned run"
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SqliteQueue;
    use reelforge_common::{ItemId, ItemUpdate};

    fn options() -> RunOptions {
        RunOptions {
            batch_size: 2,
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_limits() {
        assert_eq!(selection_limit(&options()), Some(2));
        assert_eq!(
            selection_limit(&RunOptions {
                limit: Some(5),
                ..options()
            }),
            Some(5)
        );
        assert_eq!(
            selection_limit(&RunOptions {
                all: true,
                limit: Some(5),
                ..options()
            }),
            None
        );
    }

    #[tokio::test]
    async fn test_plan_selects_pending_then_failed_on_retry() {
        let queue = SqliteQueue::in_memory().unwrap();
        let items = (1..=4)
            .map(|n| QueueItem::new_pending(ItemId::new(n.to_string()), format!("POV: idea {}", n)))
            .collect();
        queue.append(items).await.unwrap();

        let id = ItemId::new("1");
        queue
            .transition(&id, ItemStatus::Pending, ItemStatus::InProgress, ItemUpdate::default())
            .await
            .unwrap();
        queue
            .transition(&id, ItemStatus::InProgress, ItemStatus::Failed, ItemUpdate::failed("x"))
            .await
            .unwrap();

        let planned = plan(&queue, &options()).await.unwrap();
        let ids: Vec<_> = planned.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);

        let retry = RunOptions {
            retry_failed: true,
            all: true,
            ..options()
        };
        let planned = plan(&queue, &retry).await.unwrap();
        assert_eq!(planned.len(), 4);
        assert_eq!(planned[0].id.as_str(), "1");
        assert_eq!(planned[0].status, ItemStatus::Failed);
    }
}
