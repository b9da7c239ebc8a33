//! Queue item query operations.
//!
//! Status changes go through [`transition`], which only writes when the
//! stored status still equals the caller's expected status.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use reelforge_common::{Error, ItemId, ItemStatus, ItemUpdate, QueueItem, Result};

const COLUMNS: &str = "rowid_order, id, topic, hashtags, caption, environment, status, script,
                       audio_path, video_path, video_id, error, updated_at";

fn map_item(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        row: row.get::<_, i64>(0)? as usize,
        id: ItemId::from(row.get::<_, String>(1)?),
        topic: row.get(2)?,
        hashtags: row.get(3)?,
        caption: row.get(4)?,
        environment: row.get(5)?,
        status: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or(ItemStatus::Pending),
        script: row.get(7)?,
        audio_path: row.get(8)?,
        video_path: row.get(9)?,
        video_id: row.get(10)?,
        error: row.get(11)?,
        updated_at: row
            .get::<_, Option<String>>(12)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

/// Insert a new item. The returned item carries its assigned row order.
pub fn insert_item(conn: &Connection, item: &QueueItem) -> Result<QueueItem> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO queue_items (id, topic, hashtags, caption, environment, status, script,
                                  audio_path, video_path, video_id, error, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            item.id.as_str(),
            &item.topic,
            &item.hashtags,
            &item.caption,
            &item.environment,
            item.status.as_str(),
            &item.script,
            &item.audio_path,
            &item.video_path,
            &item.video_id,
            &item.error,
            now.to_rfc3339(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::invalid_input(format!("Duplicate queue item id: {}", item.id))
        }
        _ => Error::database(e.to_string()),
    })?;

    let mut inserted = item.clone();
    inserted.row = conn.last_insert_rowid() as usize;
    inserted.updated_at = Some(now);
    Ok(inserted)
}

/// Get an item by ID.
pub fn get_item(conn: &Connection, id: &ItemId) -> Result<QueueItem> {
    conn.query_row(
        &format!("SELECT {} FROM queue_items WHERE id = ?", COLUMNS),
        [id.as_str()],
        map_item,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found(id.to_string()),
        _ => Error::database(e.to_string()),
    })
}

/// List items in any of `statuses`, oldest first.
///
/// `limit` of `None` returns every match.
pub fn list_by_status(
    conn: &Connection,
    statuses: &[ItemStatus],
    limit: Option<usize>,
) -> Result<Vec<QueueItem>> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM queue_items WHERE status IN ({}) ORDER BY rowid_order ASC LIMIT {}",
        COLUMNS,
        placeholders,
        limit.map(|l| l as i64).unwrap_or(-1)
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::database(e.to_string()))?;

    let items = stmt
        .query_map(params_from_iter(statuses.iter().map(|s| s.as_str())), map_item)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(items)
}

/// Count items per status. Statuses with no items are omitted.
pub fn count_by_status(conn: &Connection) -> Result<Vec<(ItemStatus, usize)>> {
    let mut stmt = conn
        .prepare("SELECT status, COUNT(*) FROM queue_items GROUP BY status")
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(rows
        .into_iter()
        .filter_map(|(status, count)| status.parse().ok().map(|s| (s, count)))
        .collect())
}

/// Move an item from `expected` to `next`, writing `update` alongside.
///
/// The write is a single `UPDATE ... WHERE id = ? AND status = ?`. When no
/// row matches, the item is re-read to report either `NotFound` or a
/// `Conflict` carrying the status actually stored.
pub fn transition(
    conn: &Connection,
    id: &ItemId,
    expected: ItemStatus,
    next: ItemStatus,
    update: &ItemUpdate,
) -> Result<QueueItem> {
    if !expected.can_transition_to(next) {
        return Err(Error::InvalidTransition {
            id: id.to_string(),
            from: expected,
            to: next,
        });
    }

    let changed = conn
        .execute(
            "UPDATE queue_items SET
                status = ?1,
                script = COALESCE(?2, script),
                audio_path = COALESCE(?3, audio_path),
                video_path = COALESCE(?4, video_path),
                video_id = COALESCE(?5, video_id),
                error = CASE WHEN ?6 IS NOT NULL THEN ?6 WHEN ?7 THEN NULL ELSE error END,
                updated_at = ?8
             WHERE id = ?9 AND status = ?10",
            params![
                next.as_str(),
                &update.script,
                &update.audio_path,
                &update.video_path,
                &update.video_id,
                &update.error,
                update.clear_error,
                Utc::now().to_rfc3339(),
                id.as_str(),
                expected.as_str(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if changed == 0 {
        let actual: Option<String> = conn
            .query_row(
                "SELECT status FROM queue_items WHERE id = ?",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::database(e.to_string()))?;

        return match actual {
            None => Err(Error::not_found(id.to_string())),
            Some(status) => Err(Error::conflict(
                id.to_string(),
                expected,
                status.parse().unwrap_or(ItemStatus::Pending),
            )),
        };
    }

    get_item(conn, id)
}

/// Move every `in-progress` item back to `pending`.
pub fn reset_stale(conn: &Connection) -> Result<Vec<ItemId>> {
    let stale = list_by_status(conn, &[ItemStatus::InProgress], None)?;
    let mut reset = Vec::with_capacity(stale.len());
    for item in stale {
        match transition(
            conn,
            &item.id,
            ItemStatus::InProgress,
            ItemStatus::Pending,
            &ItemUpdate::default(),
        ) {
            Ok(_) => reset.push(item.id),
            Err(e) if e.is_conflict() => {
                tracing::debug!(item_id = %item.id, "Item moved before reset, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(reset)
}

/// Largest numeric item id in the queue, if any id is numeric.
pub fn max_numeric_id(conn: &Connection) -> Result<Option<u64>> {
    let mut stmt = conn
        .prepare("SELECT id FROM queue_items")
        .map_err(|e| Error::database(e.to_string()))?;

    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(ids
        .iter()
        .filter_map(|id| ItemId::from(id.as_str()).as_number())
        .max())
}
