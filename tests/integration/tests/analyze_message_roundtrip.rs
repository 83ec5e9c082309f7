use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use nonengagers_core::{
    analyze_message, AnalyzeError, ApiError, EngagementSource, InvalidInputError, MessageRef,
    ThreadReplies, UserId,
};
use tokio::sync::Mutex as AsyncMutex;

fn ids(raw: &[&str]) -> Vec<UserId> {
    raw.iter()
        .map(|value| UserId::parse(*value).expect("valid identity"))
        .collect()
}

fn id_set(raw: &[&str]) -> HashSet<UserId> {
    ids(raw).into_iter().collect()
}

#[derive(Clone)]
struct ScriptedMessage {
    reactors: Vec<&'static str>,
    repliers: Vec<&'static str>,
    author: &'static str,
}

/// In-memory workspace: channel membership plus per-message engagement.
struct ScriptedSource {
    channels: HashMap<&'static str, Vec<&'static str>>,
    messages: HashMap<(&'static str, &'static str), ScriptedMessage>,
    failing_operation: Option<&'static str>,
    calls: AsyncMutex<Vec<String>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self {
            channels: HashMap::new(),
            messages: HashMap::new(),
            failing_operation: None,
            calls: AsyncMutex::new(Vec::new()),
        }
    }

    fn with_channel(mut self, channel: &'static str, members: &[&'static str]) -> Self {
        self.channels.insert(channel, members.to_vec());
        self
    }

    fn with_message(
        mut self,
        channel: &'static str,
        ts: &'static str,
        message: ScriptedMessage,
    ) -> Self {
        self.messages.insert((channel, ts), message);
        self
    }

    fn failing(mut self, operation: &'static str) -> Self {
        self.failing_operation = Some(operation);
        self
    }

    async fn record(&self, operation: &'static str) -> Result<(), ApiError> {
        self.calls.lock().await.push(operation.to_string());
        if self.failing_operation == Some(operation) {
            return Err(ApiError::new(operation, "scripted outage"));
        }
        Ok(())
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    fn message(&self, channel_id: &str, message_ts: &str) -> Result<&ScriptedMessage, ApiError> {
        self.messages
            .iter()
            .find(|((channel, ts), _)| *channel == channel_id && *ts == message_ts)
            .map(|(_, message)| message)
            .ok_or_else(|| ApiError::new("message", format!("no message {message_ts}")))
    }
}

#[async_trait]
impl EngagementSource for ScriptedSource {
    async fn fetch_channel_members(&self, channel_id: &str) -> Result<Vec<UserId>, ApiError> {
        self.record("members").await?;
        let members = self
            .channels
            .get(channel_id)
            .ok_or_else(|| ApiError::new("members", "channel_not_found"))?;
        Ok(ids(members))
    }

    async fn fetch_reactions(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<HashSet<UserId>, ApiError> {
        self.record("reactions").await?;
        Ok(id_set(&self.message(channel_id, message_ts)?.reactors))
    }

    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        message_ts: &str,
    ) -> Result<ThreadReplies, ApiError> {
        self.record("replies").await?;
        let message = self.message(channel_id, message_ts)?;
        Ok(ThreadReplies {
            repliers: id_set(&message.repliers),
            author: UserId::parse(message.author).map_err(|error| {
                ApiError::new("replies", format!("malformed author: {error}"))
            })?,
        })
    }
}

fn announcement_workspace() -> ScriptedSource {
    ScriptedSource::new()
        .with_channel("C1", &["A", "B", "C", "D"])
        .with_message(
            "C1",
            "100.000001",
            ScriptedMessage {
                reactors: vec!["B"],
                repliers: vec![],
                author: "A",
            },
        )
        .with_message(
            "C1",
            "200.000002",
            ScriptedMessage {
                reactors: vec!["B", "GONE"],
                repliers: vec!["C", "D"],
                author: "A",
            },
        )
}

#[tokio::test]
async fn integration_analyze_message_reports_unengaged_members_in_channel_order() {
    let source = announcement_workspace();
    let report = analyze_message(&source, &MessageRef::new("C1", "100.000001"))
        .await
        .expect("report");

    assert_eq!(report.non_engaged(), ids(&["C", "D"]).as_slice());
    assert_eq!(report.engaged_count(), 2);
    assert_eq!(report.total_members(), 4);
    assert_eq!(source.calls().await, vec!["members", "reactions", "replies"]);
}

#[tokio::test]
async fn integration_departed_reactors_do_not_inflate_engagement() {
    let source = announcement_workspace();
    let report = analyze_message(&source, &MessageRef::new("C1", "200.000002"))
        .await
        .expect("report");

    assert!(report.is_fully_engaged());
    assert_eq!(report.engaged_count(), 4);
    assert_eq!(report.total_members(), 4);
}

#[tokio::test]
async fn integration_analyses_through_trait_objects_stay_independent() {
    let source = announcement_workspace();
    let dyn_source: &dyn EngagementSource = &source;
    let first_ref = MessageRef::new("C1", "100.000001");
    let second_ref = MessageRef::new("C1", "200.000002");

    let (first, second) = tokio::join!(
        analyze_message(dyn_source, &first_ref),
        analyze_message(dyn_source, &second_ref),
    );

    assert_eq!(first.expect("first").non_engaged_count(), 2);
    assert_eq!(second.expect("second").non_engaged_count(), 0);
}

#[tokio::test]
async fn regression_failed_fetch_returns_api_error_without_later_fetches() {
    let source = announcement_workspace().failing("reactions");
    let error = analyze_message(&source, &MessageRef::new("C1", "100.000001"))
        .await
        .expect_err("reactions outage must fail");

    assert_eq!(
        error,
        AnalyzeError::Api(ApiError::new("reactions", "scripted outage"))
    );
    assert_eq!(source.calls().await, vec!["members", "reactions"]);
}

#[tokio::test]
async fn regression_duplicate_members_surface_invalid_input() {
    let source = ScriptedSource::new()
        .with_channel("C2", &["A", "B", "A"])
        .with_message(
            "C2",
            "1.000001",
            ScriptedMessage {
                reactors: vec![],
                repliers: vec![],
                author: "B",
            },
        );
    let error = analyze_message(&source, &MessageRef::new("C2", "1.000001"))
        .await
        .expect_err("duplicate member must fail");

    assert_eq!(
        error,
        AnalyzeError::InvalidInput(InvalidInputError::DuplicateMember {
            member: "A".to_string()
        })
    );
}

#[tokio::test]
async fn regression_empty_channel_reports_nothing() {
    let source = ScriptedSource::new().with_channel("C3", &[]).with_message(
        "C3",
        "5.000005",
        ScriptedMessage {
            reactors: vec!["X"],
            repliers: vec!["Y"],
            author: "Z",
        },
    );
    let report = analyze_message(&source, &MessageRef::new("C3", "5.000005"))
        .await
        .expect("report");

    assert!(report.non_engaged().is_empty());
    assert_eq!(report.engaged_count(), 0);
    assert_eq!(report.total_members(), 0);
}
