//! Queue item model and status lifecycle.
//!
//! Statuses serialize in kebab-case (`in-progress`) to match what operators
//! type into the queue spreadsheet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::ItemId;

/// Lifecycle state of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    /// Waiting to be picked up by a run.
    Pending,
    /// Claimed by a run.
    InProgress,
    /// Published; terminal.
    Done,
    /// Gave up after a per-item error; terminal unless retried.
    Failed,
}

impl ItemStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Pending,
        ItemStatus::InProgress,
        ItemStatus::Done,
        ItemStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether the item lifecycle permits moving from `self` to `next`.
    ///
    /// `InProgress -> Pending` is only used to reclaim items left behind by a
    /// killed run.
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Failed, Self::InProgress)
                | (Self::InProgress, Self::Done)
                | (Self::InProgress, Self::Failed)
                | (Self::InProgress, Self::Pending)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "pending" => Ok(Self::Pending),
            "in-progress" | "in_progress" | "inprogress" | "in progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(format!("Unknown item status: {}", other)),
        }
    }
}

/// One row of the content queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    /// Idea text the video is about.
    pub topic: String,
    pub hashtags: Option<String>,
    pub caption: Option<String>,
    /// Setting description used when prompting for imagery.
    pub environment: Option<String>,
    pub status: ItemStatus,
    /// Full narration text.
    pub script: Option<String>,
    pub audio_path: Option<String>,
    pub video_path: Option<String>,
    /// Hosting platform id of the published video.
    pub video_id: Option<String>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Insertion order within the queue (1-based spreadsheet row or rowid).
    pub row: usize,
}

impl QueueItem {
    /// A fresh pending item with only the idea fields set.
    pub fn new_pending(id: ItemId, topic: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
            hashtags: None,
            caption: None,
            environment: None,
            status: ItemStatus::Pending,
            script: None,
            audio_path: None,
            video_path: None,
            video_id: None,
            error: None,
            updated_at: None,
            row: 0,
        }
    }
}

/// Fields written alongside a status change.
///
/// `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemUpdate {
    pub script: Option<String>,
    pub audio_path: Option<String>,
    pub video_path: Option<String>,
    pub video_id: Option<String>,
    pub error: Option<String>,
    /// Clear a previously recorded error (used when an item is retried).
    pub clear_error: bool,
}

impl ItemUpdate {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn published(video_id: impl Into<String>) -> Self {
        Self {
            video_id: Some(video_id.into()),
            clear_error: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_aliases() {
        assert_eq!("".parse::<ItemStatus>().unwrap(), ItemStatus::Pending);
        assert_eq!("Pending".parse::<ItemStatus>().unwrap(), ItemStatus::Pending);
        assert_eq!(
            "in_progress".parse::<ItemStatus>().unwrap(),
            ItemStatus::InProgress
        );
        assert_eq!(
            "In-Progress".parse::<ItemStatus>().unwrap(),
            ItemStatus::InProgress
        );
        assert_eq!("DONE".parse::<ItemStatus>().unwrap(), ItemStatus::Done);
        assert!("published".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn test_status_display_roundtrip() {
        for status in [
            ItemStatus::Pending,
            ItemStatus::InProgress,
            ItemStatus::Done,
            ItemStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<ItemStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_transitions() {
        assert!(ItemStatus::Pending.can_transition_to(ItemStatus::InProgress));
        assert!(ItemStatus::Failed.can_transition_to(ItemStatus::InProgress));
        assert!(ItemStatus::InProgress.can_transition_to(ItemStatus::Done));
        assert!(ItemStatus::InProgress.can_transition_to(ItemStatus::Failed));
        assert!(!ItemStatus::Done.can_transition_to(ItemStatus::InProgress));
        assert!(!ItemStatus::Pending.can_transition_to(ItemStatus::Done));
        assert!(!ItemStatus::Done.can_transition_to(ItemStatus::Pending));
    }

    #[test]
    fn test_status_serde_kebab() {
        let json = serde_json::to_string(&ItemStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }
}
