//! Turning model-generated idea rows into new pending queue items.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use reelforge_common::{ItemId, ItemStatus, QueueItem};

use crate::config::IdeasConfig;
use crate::providers::gemini::strip_code_fences;
use crate::providers::IdeaGenerator;
use crate::queue::QueueStore;
use crate::retry::{with_backoff, RetryPolicy};

/// One parsed idea line before it is given an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdeaDraft {
    pub topic: String,
    pub hashtags: Option<String>,
    pub caption: Option<String>,
    pub environment: Option<String>,
}

fn field(fields: &[&str], index: usize) -> Option<String> {
    fields
        .get(index)
        .map(|f| f.trim().trim_matches('"').trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
}

/// Parse tab-separated rows of
/// `Id, Idea, Hashtag, Caption, Production, Environment_Prompt, Publishing`.
///
/// Header lines and lines without an idea are skipped. A row whose first
/// field is not numeric is read as if the `Id` column were left out.
pub fn parse_idea_rows(text: &str) -> Vec<IdeaDraft> {
    let mut drafts = Vec::new();
    for line in strip_code_fences(text).lines() {
        let line = line.trim();
        if line.is_empty() || !line.contains('\t') {
            continue;
        }
        let mut fields: Vec<&str> = line.split('\t').collect();
        let first = fields[0].trim();
        if !first.is_empty() && first.parse::<u64>().is_err() {
            if first.eq_ignore_ascii_case("id") || first.eq_ignore_ascii_case("idea") {
                continue;
            }
            fields.insert(0, "");
        }

        let Some(topic) = field(&fields, 1) else {
            tracing::debug!("Skipping idea line without an idea: {}", line);
            continue;
        };
        drafts.push(IdeaDraft {
            topic,
            hashtags: field(&fields, 2),
            caption: field(&fields, 3),
            environment: field(&fields, 5),
        });
    }
    drafts
}

/// Apply the `POV:` prefix and fill blank fields from the defaults.
pub fn normalize(draft: IdeaDraft, defaults: &IdeasConfig) -> IdeaDraft {
    let topic = draft.topic.trim();
    let topic = match topic.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("pov:") => {
            format!("POV: {}", topic[4..].trim_start())
        }
        _ => format!("POV: {}", topic),
    };
    let or_default = |value: Option<String>, default: &str| {
        value.or_else(|| Some(default.to_string()).filter(|d| !d.is_empty()))
    };
    IdeaDraft {
        topic,
        hashtags: or_default(draft.hashtags, &defaults.default_hashtags),
        caption: or_default(draft.caption, &defaults.default_caption),
        environment: or_default(draft.environment, &defaults.default_environment),
    }
}

/// Number drafts consecutively from `first_id` as new pending items.
pub fn into_items(drafts: Vec<IdeaDraft>, first_id: u64) -> Vec<QueueItem> {
    drafts
        .into_iter()
        .zip(first_id..)
        .map(|(draft, n)| {
            let mut item = QueueItem::new_pending(ItemId::new(n.to_string()), draft.topic);
            item.hashtags = draft.hashtags;
            item.caption = draft.caption;
            item.environment = draft.environment;
            item
        })
        .collect()
}

/// Comparison key for topics: case-insensitive, `POV:` prefix ignored.
fn topic_key(topic: &str) -> String {
    let topic = topic.trim();
    let topic = match topic.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("pov:") => &topic[4..],
        _ => topic,
    };
    topic.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Ask the generator for `count` ideas and append the ones whose topic is
/// not already queued.
pub async fn generate_ideas(
    generator: &dyn IdeaGenerator,
    queue: &dyn QueueStore,
    count: usize,
    defaults: &IdeasConfig,
    retry: &RetryPolicy,
) -> Result<Vec<QueueItem>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let raw = with_backoff(retry, "ideas", || generator.generate_ideas(count))
        .await
        .context("GenerationError: idea generation failed")?;

    let mut seen: HashSet<String> = queue
        .fetch(&ItemStatus::ALL, None)
        .await
        .context("QueueUnavailable: cannot read existing topics")?
        .iter()
        .map(|item| topic_key(&item.topic))
        .collect();
    let drafts: Vec<IdeaDraft> = parse_idea_rows(&raw)
        .into_iter()
        .map(|d| normalize(d, defaults))
        .filter(|d| {
            let fresh = seen.insert(topic_key(&d.topic));
            if !fresh {
                tracing::debug!("Skipping duplicate idea: {}", d.topic);
            }
            fresh
        })
        .take(count)
        .collect();
    if drafts.is_empty() {
        bail!("GenerationError: the model returned no new idea rows");
    }
    if drafts.len() < count {
        tracing::warn!("Asked for {} ideas, got {}", count, drafts.len());
    }

    let next_id = queue
        .max_numeric_id()
        .await
        .context("QueueUnavailable: cannot read existing ids")?
        .unwrap_or(0)
        + 1;
    let items = queue
        .append(into_items(drafts, next_id))
        .await
        .context("QueueUnavailable: cannot append ideas")?;

    for item in &items {
        tracing::info!(item_id = %item.id, "Queued idea: {}", item.topic);
    }
    Ok(items)
}

/// Top the queue up when fewer than `threshold` items are pending.
///
/// Returns how many items were added.
pub async fn replenish(
    generator: &dyn IdeaGenerator,
    queue: &dyn QueueStore,
    threshold: usize,
    count: usize,
    defaults: &IdeasConfig,
    retry: &RetryPolicy,
) -> Result<usize> {
    let pending = queue
        .counts()
        .await
        .context("QueueUnavailable: cannot count pending items")?
        .into_iter()
        .find(|(status, _)| *status == ItemStatus::Pending)
        .map(|(_, n)| n)
        .unwrap_or(0);
    if pending >= threshold {
        tracing::debug!(pending, threshold, "Queue has enough pending items");
        return Ok(0);
    }

    tracing::info!(pending, threshold, "Replenishing queue with {} ideas", count);
    let added = generate_ideas(generator, queue, count, defaults, retry).await?;
    Ok(added.len())
}
