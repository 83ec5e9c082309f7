//! `EngagementSource` backed by the Slack Web API and a per-invocation user directory.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use nonengagers_core::{ApiError, EngagementSource, ThreadReplies, UserId};

use super::slack_api_client::{SlackApiClient, SlackUser};

const SLACKBOT_USER_ID: &str = "USLACKBOT";

/// Workspace users keyed by id, fetched fresh for each invocation.
pub(super) struct SlackUserDirectory {
    users: HashMap<String, SlackUser>,
}

impl SlackUserDirectory {
    pub(super) fn from_users(users: Vec<SlackUser>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.id.clone(), user))
                .collect(),
        }
    }

    pub(super) fn get(&self, user_id: &str) -> Option<&SlackUser> {
        self.users.get(user_id)
    }

    /// Humans only: unknown, bot, Slackbot, and deactivated accounts are skipped.
    pub(super) fn is_countable_member(&self, user_id: &str) -> bool {
        match self.users.get(user_id) {
            Some(user) => !user.is_bot && !user.deleted && user.id != SLACKBOT_USER_ID,
            None => false,
        }
    }
}

pub(super) struct SlackEngagementSource<'a> {
    client: &'a SlackApiClient,
    directory: &'a SlackUserDirectory,
}

impl<'a> SlackEngagementSource<'a> {
    pub(super) fn new(client: &'a SlackApiClient, directory: &'a SlackUserDirectory) -> Self {
        Self { client, directory }
    }
}

fn api_error(operation: &'static str) -> impl FnOnce(anyhow::Error) -> ApiError {
    move |error| ApiError::new(operation, format!("{error:#}"))
}

fn parse_identity(operation: &'static str, raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).map_err(|error| {
        ApiError::new(
            operation,
            format!("slack returned a malformed user id: {error}"),
        )
    })
}

#[async_trait]
impl EngagementSource for SlackEngagementSource<'_> {
    async fn fetch_channel_members(&self, channel_id: &str) -> Result<Vec<UserId>, ApiError> {
        let raw_ids = self
            .client
            .list_channel_member_ids(channel_id)
            .await
            .map_err(api_error("conversations.members"))?;

        let mut seen = HashSet::with_capacity(raw_ids.len());
        let mut members = Vec::with_capacity(raw_ids.len());
        for raw_id in raw_ids {
            if !self.directory.is_countable_member(&raw_id) || !seen.insert(raw_id.clone()) {
                continue;
            }
            members.push(parse_identity("conversations.members", &raw_id)?);
        }
        Ok(members)
    }

    async fn fetch_reactions(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<HashSet<UserId>, ApiError> {
        let message = self
            .client
            .fetch_reactions(channel_id, message_ts)
            .await
            .map_err(api_error("reactions.get"))?;
        message
            .reactor_ids()
            .map(|raw_id| parse_identity("reactions.get", raw_id))
            .collect()
    }

    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<ThreadReplies, ApiError> {
        let messages = self
            .client
            .list_thread_messages(channel_id, message_ts)
            .await
            .map_err(api_error("conversations.replies"))?;

        let mut author = None;
        let mut repliers = HashSet::new();
        for message in &messages {
            if message.ts.as_deref() == Some(message_ts) {
                if let Some(author_id) = message.author_id() {
                    author = Some(parse_identity("conversations.replies", author_id)?);
                }
                continue;
            }
            if message.subtype.is_some() {
                continue;
            }
            if let Some(user) = message.user.as_deref().filter(|value| !value.is_empty()) {
                repliers.insert(parse_identity("conversations.replies", user)?);
            }
        }

        let author = match author {
            Some(author) => author,
            None => {
                let parent = self
                    .client
                    .fetch_message(channel_id, message_ts)
                    .await
                    .map_err(api_error("conversations.history"))?;
                let author_id = parent.author_id().ok_or_else(|| {
                    ApiError::new(
                        "conversations.history",
                        format!("message {message_ts} has no author"),
                    )
                })?;
                parse_identity("conversations.history", author_id)?
            }
        };

        Ok(ThreadReplies { repliers, author })
    }
}
