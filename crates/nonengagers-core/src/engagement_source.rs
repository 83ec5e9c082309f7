//! Fetch-source contract and the fetch-then-compute analysis entry point.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    engagement_analyzer::{compute_non_engagers, EngagementReport},
    errors::{AnalyzeError, ApiError},
    identity::UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Channel and timestamp naming the analysed message.
pub struct MessageRef {
    pub channel_id: String,
    pub ts: String,
}

impl MessageRef {
    pub fn new(channel_id: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            ts: ts.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Users who replied in a message thread and the message author.
pub struct ThreadReplies {
    pub repliers: HashSet<UserId>,
    pub author: UserId,
}

#[async_trait]
/// Trait contract for complete, already-paginated engagement input lists.
pub trait EngagementSource: Send + Sync {
    async fn fetch_channel_members(&self, channel_id: &str) -> Result<Vec<UserId>, ApiError>;

    async fn fetch_reactions(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<HashSet<UserId>, ApiError>;

    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<ThreadReplies, ApiError>;
}

/// Fetches all three input lists and only then computes the report.
///
/// The first fetch failure is returned unchanged and nothing is computed.
pub async fn analyze_message<S>(
    source: &S,
    message: &MessageRef,
) -> Result<EngagementReport, AnalyzeError>
where
    S: EngagementSource + ?Sized,
{
    let members = source.fetch_channel_members(&message.channel_id).await?;
    let reactors = source
        .fetch_reactions(&message.channel_id, &message.ts)
        .await?;
    let thread = source
        .fetch_thread_replies(&message.channel_id, &message.ts)
        .await?;

    Ok(compute_non_engagers(
        &members,
        &reactors,
        &thread.repliers,
        &thread.author,
    )?)
}
