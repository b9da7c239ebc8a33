use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelforge_common::{Error, ItemId, ItemStatus, ItemUpdate, QueueItem, Result};
use tokio::sync::Mutex;

use super::QueueStore;
use crate::error::ProviderError;
use crate::google::sheets::{a1_range, column_letter};
use crate::google::SheetsClient;

/// Widest range read from the sheet.
const READ_RANGE: &str = "A1:ZZ";

/// Queue columns, located by header name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Idea,
    Hashtag,
    Caption,
    Environment,
    Status,
    Script,
    Audio,
    Video,
    VideoId,
    Error,
    UpdatedAt,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::Id,
        Column::Idea,
        Column::Hashtag,
        Column::Caption,
        Column::Environment,
        Column::Status,
        Column::Script,
        Column::Audio,
        Column::Video,
        Column::VideoId,
        Column::Error,
        Column::UpdatedAt,
    ];

    /// Header text written when the column has to be created.
    pub fn header(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Idea => "Idea",
            Self::Hashtag => "Hashtag",
            Self::Caption => "Caption",
            Self::Environment => "Environment_Prompt",
            Self::Status => "Status",
            Self::Script => "Script",
            Self::Audio => "Audio",
            Self::Video => "Video",
            Self::VideoId => "Video_ID",
            Self::Error => "Error",
            Self::UpdatedAt => "Updated_At",
        }
    }

    /// Normalised header names accepted for this column.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Id => &["id"],
            Self::Idea => &["idea", "topic"],
            Self::Hashtag => &["hashtag", "hashtags"],
            Self::Caption => &["caption"],
            Self::Environment => &["environmentprompt", "environment"],
            Self::Status => &["status", "publishing"],
            Self::Script => &["script"],
            Self::Audio => &["audio", "audiopath"],
            Self::Video => &["video", "videopath"],
            Self::VideoId => &["videoid"],
            Self::Error => &["error"],
            Self::UpdatedAt => &["updatedat"],
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        let key = normalize(header);
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.aliases().contains(&key.as_str()))
    }
}

fn normalize(header: &str) -> String {
    header
        .chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Column positions of the header row.
#[derive(Debug, Clone, Default)]
struct Layout {
    positions: HashMap<Column, usize>,
    width: usize,
}

impl Layout {
    fn parse(header: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (index, name) in header.iter().enumerate() {
            if let Some(column) = Column::from_header(name) {
                positions.entry(column).or_insert(index);
            }
        }
        Self {
            positions,
            width: header.len(),
        }
    }

    fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    fn cell<'a>(&self, cells: &'a [String], column: Column) -> Option<&'a str> {
        self.position(column)
            .and_then(|i| cells.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Parse one data row. `None` for rows that are not usable queue items.
    fn item(&self, cells: &[String], row: usize) -> Option<QueueItem> {
        let id = self.cell(cells, Column::Id)?;
        let owned = |c| self.cell(cells, c).map(str::to_string);

        let status = match self.cell(cells, Column::Status).unwrap_or("").parse::<ItemStatus>() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(item_id = id, row, "Skipping row: {}", e);
                return None;
            }
        };

        let topic = match owned(Column::Idea) {
            Some(topic) => topic,
            None => {
                tracing::warn!(item_id = id, row, "Skipping row without idea text");
                return None;
            }
        };

        Some(QueueItem {
            id: ItemId::new(id),
            topic,
            hashtags: owned(Column::Hashtag),
            caption: owned(Column::Caption),
            environment: owned(Column::Environment),
            status,
            script: owned(Column::Script),
            audio_path: owned(Column::Audio),
            video_path: owned(Column::Video),
            video_id: owned(Column::VideoId),
            error: owned(Column::Error),
            updated_at: self
                .cell(cells, Column::UpdatedAt)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            row,
        })
    }
}

/// Everything read from the sheet in one request.
struct Snapshot {
    layout: Layout,
    items: Vec<QueueItem>,
    ids: HashSet<ItemId>,
    last_row: usize,
}

fn unavailable(err: ProviderError) -> Error {
    Error::unavailable(format!("sheets: {}", err))
}

/// Queue stored in a worksheet whose first row is the header.
///
/// Status-checked writes re-read the sheet and compare the stored status
/// before writing. Writes from this process are serialised; writes from
/// other hosts can still interleave between the read and the write.
pub struct SheetsQueue {
    client: SheetsClient,
    sheet: String,
    writes: Mutex<()>,
}

impl SheetsQueue {
    pub fn new(client: SheetsClient, sheet: &str) -> Self {
        Self {
            client,
            sheet: sheet.to_string(),
            writes: Mutex::new(()),
        }
    }

    fn range(&self, range: &str) -> String {
        a1_range(&self.sheet, range)
    }

    async fn load(&self) -> Result<Snapshot> {
        let rows = self
            .client
            .get_values(&self.range(READ_RANGE))
            .await
            .map_err(unavailable)?;

        let mut rows = rows.into_iter();
        let header = rows.next().unwrap_or_default();
        let layout = Layout::parse(&header);
        let mut last_row = usize::from(!header.is_empty());
        let mut items = Vec::new();
        let mut ids = HashSet::new();

        for (offset, cells) in rows.enumerate() {
            let row = offset + 2;
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            last_row = row;
            if let Some(id) = layout.cell(&cells, Column::Id) {
                ids.insert(ItemId::new(id));
            }
            if let Some(item) = layout.item(&cells, row) {
                items.push(item);
            }
        }

        if last_row > 1 && layout.position(Column::Id).is_none() {
            return Err(Error::invalid_input(format!(
                "sheet '{}' has no ID column",
                self.sheet
            )));
        }

        Ok(Snapshot {
            layout,
            items,
            ids,
            last_row,
        })
    }

    /// Append header cells for any of `columns` the sheet lacks.
    async fn ensure_columns(&self, mut layout: Layout, columns: &[Column]) -> Result<Layout> {
        let missing: Vec<Column> = columns
            .iter()
            .copied()
            .filter(|c| layout.position(*c).is_none())
            .collect();
        if missing.is_empty() {
            return Ok(layout);
        }

        let mut data = Vec::with_capacity(missing.len());
        for column in &missing {
            let index = layout.width;
            data.push((
                self.range(&format!("{}1", column_letter(index))),
                vec![vec![column.header().to_string()]],
            ));
            layout.positions.insert(*column, index);
            layout.width += 1;
        }

        tracing::info!(
            sheet = %self.sheet,
            columns = ?missing.iter().map(|c| c.header()).collect::<Vec<_>>(),
            "Adding missing columns to sheet header"
        );
        self.client.batch_update(&data).await.map_err(unavailable)?;
        Ok(layout)
    }
}

#[async_trait]
impl QueueStore for SheetsQueue {
    fn name(&self) -> &'static str {
        "sheets"
    }

    async fn fetch(&self, statuses: &[ItemStatus], limit: Option<usize>) -> Result<Vec<QueueItem>> {
        let snapshot = self.load().await?;
        Ok(snapshot
            .items
            .into_iter()
            .filter(|item| statuses.contains(&item.status))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn get(&self, id: &ItemId) -> Result<QueueItem> {
        self.load()
            .await?
            .items
            .into_iter()
            .find(|item| &item.id == id)
            .ok_or_else(|| Error::not_found(id.to_string()))
    }

    async fn transition(
        &self,
        id: &ItemId,
        expected: ItemStatus,
        next: ItemStatus,
        update: ItemUpdate,
    ) -> Result<QueueItem> {
        if !expected.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                id: id.to_string(),
                from: expected,
                to: next,
            });
        }

        let _guard = self.writes.lock().await;
        let snapshot = self.load().await?;
        let mut item = snapshot
            .items
            .into_iter()
            .find(|item| &item.id == id)
            .ok_or_else(|| Error::not_found(id.to_string()))?;
        if item.status != expected {
            return Err(Error::conflict(id.to_string(), expected, item.status));
        }

        let now = Utc::now();
        let mut cells = vec![
            (Column::Status, next.as_str().to_string()),
            (Column::UpdatedAt, now.to_rfc3339()),
        ];
        let fields = [
            (Column::Script, &update.script, &mut item.script),
            (Column::Audio, &update.audio_path, &mut item.audio_path),
            (Column::Video, &update.video_path, &mut item.video_path),
            (Column::VideoId, &update.video_id, &mut item.video_id),
        ];
        for (column, value, slot) in fields {
            if let Some(value) = value {
                cells.push((column, value.clone()));
                *slot = Some(value.clone());
            }
        }
        if let Some(error) = &update.error {
            cells.push((Column::Error, error.clone()));
            item.error = Some(error.clone());
        } else if update.clear_error && item.error.is_some() {
            cells.push((Column::Error, String::new()));
            item.error = None;
        }

        let columns: Vec<Column> = cells.iter().map(|(c, _)| *c).collect();
        let layout = self.ensure_columns(snapshot.layout, &columns).await?;

        let mut data = Vec::with_capacity(cells.len());
        for (column, value) in cells {
            let index = layout
                .position(column)
                .ok_or_else(|| Error::internal(format!("column {} missing", column.header())))?;
            data.push((
                self.range(&format!("{}{}", column_letter(index), item.row)),
                vec![vec![value]],
            ));
        }
        self.client.batch_update(&data).await.map_err(unavailable)?;

        item.status = next;
        item.updated_at = Some(now);
        Ok(item)
    }

    async fn append(&self, items: Vec<QueueItem>) -> Result<Vec<QueueItem>> {
        if items.is_empty() {
            return Ok(items);
        }

        let _guard = self.writes.lock().await;
        let snapshot = self.load().await?;
        if let Some(dup) = items.iter().find(|item| snapshot.ids.contains(&item.id)) {
            return Err(Error::invalid_input(format!(
                "Duplicate queue item id: {}",
                dup.id
            )));
        }

        let layout = self
            .ensure_columns(
                snapshot.layout,
                &[
                    Column::Id,
                    Column::Idea,
                    Column::Hashtag,
                    Column::Caption,
                    Column::Environment,
                    Column::Status,
                ],
            )
            .await?;

        let rows: Vec<Vec<String>> = items
            .iter()
            .map(|item| {
                let mut row = vec![String::new(); layout.width];
                let mut set = |column: Column, value: &str| {
                    if let Some(i) = layout.position(column) {
                        row[i] = value.to_string();
                    }
                };
                set(Column::Id, item.id.as_str());
                set(Column::Idea, &item.topic);
                set(Column::Hashtag, item.hashtags.as_deref().unwrap_or(""));
                set(Column::Caption, item.caption.as_deref().unwrap_or(""));
                set(Column::Environment, item.environment.as_deref().unwrap_or(""));
                set(Column::Status, item.status.as_str());
                row
            })
            .collect();

        self.client
            .append(&self.range("A1"), &rows)
            .await
            .map_err(unavailable)?;

        Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, mut item)| {
                item.row = snapshot.last_row.max(1) + i + 1;
                item
            })
            .collect())
    }

    async fn counts(&self) -> Result<Vec<(ItemStatus, usize)>> {
        let snapshot = self.load().await?;
        Ok(ItemStatus::ALL
            .into_iter()
            .map(|status| {
                let n = snapshot.items.iter().filter(|i| i.status == status).count();
                (status, n)
            })
            .filter(|(_, n)| *n > 0)
            .collect())
    }

    async fn max_numeric_id(&self) -> Result<Option<u64>> {
        let snapshot = self.load().await?;
        Ok(snapshot.ids.iter().filter_map(ItemId::as_number).max())
    }
}
