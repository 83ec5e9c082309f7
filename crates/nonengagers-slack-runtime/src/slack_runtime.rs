//! Slack Socket Mode runtime that turns shortcuts and slash commands into engagement reports.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use nonengagers_core::{analyze_message, EngagementReport, MessageRef};
use serde_json::json;
use tokio::task::JoinSet;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

mod slack_api_client;
mod slack_engagement_source;
mod slack_envelope_cache;
mod slack_invocation;
mod slack_render_helpers;

use slack_api_client::SlackApiClient;
use slack_engagement_source::{SlackEngagementSource, SlackUserDirectory};
use slack_envelope_cache::ProcessedEnvelopeCache;
use slack_invocation::parse_socket_envelope;
pub use slack_invocation::{
    parse_message_permalink, parse_socket_envelope_text, SlackInvocation, SlackSocketEnvelope,
};
use slack_render_helpers::{
    non_engager_names, render_failure_message, render_fully_engaged_response,
    render_non_engager_csv, render_report_summary, render_slash_usage, CSV_FILENAME, CSV_TITLE,
    DM_NOTICE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Where the CSV export of non-engagers is uploaded.
pub enum CsvUploadTarget {
    #[default]
    Thread,
    DirectMessage,
}

#[derive(Clone)]
/// Runtime configuration for the Slack Socket Mode loop.
pub struct SlackRuntimeConfig {
    pub api_base: String,
    pub app_token: String,
    pub bot_token: String,
    pub shortcut_callback_id: String,
    pub slash_command: String,
    pub csv_upload_target: CsvUploadTarget,
    pub summary_limit: usize,
    pub request_timeout_ms: u64,
    pub reconnect_delay: Duration,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub processed_envelope_cap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvocationStatus {
    Reported,
    FullyEngaged,
    UsageReported,
    Failed,
}

impl InvocationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Reported => "reported",
            Self::FullyEngaged => "fully_engaged",
            Self::UsageReported => "usage_reported",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug)]
struct InvocationOutcome {
    kind: &'static str,
    user_id: String,
    status: InvocationStatus,
    non_engaged: usize,
    duration_ms: u64,
    error: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct SocketCycleReport {
    pub discovered_envelopes: usize,
    pub dispatched_invocations: usize,
    pub completed_invocations: usize,
    pub failed_invocations: usize,
    pub skipped_duplicate_envelopes: usize,
    pub ignored_envelopes: usize,
}

impl SocketCycleReport {
    fn is_empty(&self) -> bool {
        self.discovered_envelopes == 0
            && self.dispatched_invocations == 0
            && self.completed_invocations == 0
            && self.failed_invocations == 0
    }
}

/// Runs the Slack Socket Mode loop until Ctrl-C.
pub async fn run_slack_runtime(config: SlackRuntimeConfig) -> Result<()> {
    let mut runtime = SlackRuntime::new(config)?;
    runtime.run().await
}

struct SlackRuntime {
    config: SlackRuntimeConfig,
    slack_client: SlackApiClient,
    envelope_cache: ProcessedEnvelopeCache,
    in_flight: JoinSet<InvocationOutcome>,
}

impl SlackRuntime {
    fn new(config: SlackRuntimeConfig) -> Result<Self> {
        let slack_client = SlackApiClient::new(
            config.api_base.clone(),
            config.app_token.clone(),
            config.bot_token.clone(),
            config.request_timeout_ms,
            config.retry_max_attempts,
            config.retry_base_delay_ms,
        )?;
        let envelope_cache = ProcessedEnvelopeCache::new(config.processed_envelope_cap);
        Ok(Self {
            config,
            slack_client,
            envelope_cache,
            in_flight: JoinSet::new(),
        })
    }

    async fn run(&mut self) -> Result<()> {
        let bot_user_id = self
            .slack_client
            .resolve_bot_user_id()
            .await
            .context("slack bot token check failed")?;
        info!(bot_user_id = %bot_user_id, "slack runtime authenticated");

        let mut failure_streak = 0_usize;
        loop {
            match self.slack_client.open_socket_connection().await {
                Ok(socket_url) => {
                    info!("slack socket connected");
                    match self.run_socket_session(&socket_url).await {
                        Ok(SessionEnd::Shutdown) => {
                            info!("slack runtime shutdown requested");
                            return Ok(());
                        }
                        Ok(SessionEnd::Reconnect) => {
                            failure_streak = 0;
                        }
                        Err(error) => {
                            failure_streak = failure_streak.saturating_add(1);
                            warn!(failure_streak, error = %error, "slack socket session error");
                        }
                    }
                }
                Err(error) => {
                    failure_streak = failure_streak.saturating_add(1);
                    warn!(failure_streak, error = %error, "failed to open slack socket connection");
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("slack runtime shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }
    }

    async fn run_socket_session(&mut self, socket_url: &str) -> Result<SessionEnd> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .context("failed to connect slack socket mode websocket")?;
        let (mut sink, mut source) = stream.split();

        loop {
            let mut report = SocketCycleReport::default();
            self.drain_finished_invocations(&mut report);

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(SessionEnd::Shutdown);
                }
                maybe_message = source.next() => {
                    let Some(message_result) = maybe_message else {
                        return Ok(SessionEnd::Reconnect);
                    };
                    let message = message_result.context("failed reading slack websocket message")?;
                    if let Some(envelope) = parse_socket_envelope(message)? {
                        if let Some(envelope_id) = envelope.envelope_id.as_deref() {
                            ack_envelope(&mut sink, envelope_id).await?;
                        }
                        if envelope.is_disconnect() {
                            info!("slack requested socket refresh");
                            return Ok(SessionEnd::Reconnect);
                        }
                        self.handle_envelope(envelope, &mut report);
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }

            if !report.is_empty() {
                debug!(
                    discovered = report.discovered_envelopes,
                    dispatched = report.dispatched_invocations,
                    completed = report.completed_invocations,
                    failed = report.failed_invocations,
                    duplicate_skips = report.skipped_duplicate_envelopes,
                    ignored = report.ignored_envelopes,
                    in_flight = self.in_flight.len(),
                    remembered_envelopes = self.envelope_cache.len(),
                    "slack runtime cycle"
                );
            }
        }
    }

    fn handle_envelope(&mut self, envelope: SlackSocketEnvelope, report: &mut SocketCycleReport) {
        report.discovered_envelopes = report.discovered_envelopes.saturating_add(1);

        if let Some(envelope_id) = envelope.envelope_id.as_deref() {
            if self.envelope_cache.contains(envelope_id) {
                report.skipped_duplicate_envelopes =
                    report.skipped_duplicate_envelopes.saturating_add(1);
                return;
            }
            self.envelope_cache.mark_processed(envelope_id);
        }

        let invocation = match SlackInvocation::from_envelope(
            &envelope,
            &self.config.shortcut_callback_id,
            &self.config.slash_command,
        ) {
            Ok(Some(invocation)) => invocation,
            Ok(None) => {
                report.ignored_envelopes = report.ignored_envelopes.saturating_add(1);
                return;
            }
            Err(error) => {
                warn!(
                    envelope_type = %envelope.envelope_type,
                    error = %error,
                    "ignoring undecodable slack envelope"
                );
                report.ignored_envelopes = report.ignored_envelopes.saturating_add(1);
                return;
            }
        };

        info!(
            kind = invocation.kind(),
            user_id = invocation.user_id(),
            channel_id = invocation.channel_id().unwrap_or("unknown"),
            "dispatching non-engager invocation"
        );
        let slack_client = self.slack_client.clone();
        let config = self.config.clone();
        self.in_flight
            .spawn(async move { execute_invocation(&slack_client, &config, invocation).await });
        report.dispatched_invocations = report.dispatched_invocations.saturating_add(1);
    }

    fn drain_finished_invocations(&mut self, report: &mut SocketCycleReport) {
        while let Some(joined) = self.in_flight.try_join_next() {
            match joined {
                Ok(outcome) => {
                    if outcome.status == InvocationStatus::Failed {
                        report.failed_invocations = report.failed_invocations.saturating_add(1);
                        warn!(
                            kind = outcome.kind,
                            user_id = %outcome.user_id,
                            duration_ms = outcome.duration_ms,
                            error = outcome.error.as_deref().unwrap_or("unknown"),
                            "non-engager invocation failed"
                        );
                    } else {
                        report.completed_invocations =
                            report.completed_invocations.saturating_add(1);
                        info!(
                            kind = outcome.kind,
                            user_id = %outcome.user_id,
                            status = outcome.status.as_str(),
                            non_engaged = outcome.non_engaged,
                            duration_ms = outcome.duration_ms,
                            "non-engager invocation completed"
                        );
                    }
                }
                Err(join_error) => {
                    report.failed_invocations = report.failed_invocations.saturating_add(1);
                    error!(error = %join_error, "non-engager invocation task join error");
                }
            }
        }
    }
}

enum SessionEnd {
    Shutdown,
    Reconnect,
}

async fn ack_envelope<S>(sink: &mut S, envelope_id: &str) -> Result<()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let ack = json!({ "envelope_id": envelope_id }).to_string();
    sink.send(WsMessage::Text(ack.into()))
        .await
        .context("failed to send slack socket ack")
}

struct ComputedReport {
    report: EngagementReport,
    names: Vec<String>,
}

/// Fetches a fresh user directory and all engagement inputs, then computes the report.
async fn compute_report(
    slack_client: &SlackApiClient,
    message: &MessageRef,
) -> Result<ComputedReport> {
    let directory = SlackUserDirectory::from_users(
        slack_client
            .list_users()
            .await
            .context("failed to load slack user directory")?,
    );
    let source = SlackEngagementSource::new(slack_client, &directory);
    let report = analyze_message(&source, message).await?;
    let names = non_engager_names(&report, &directory);
    Ok(ComputedReport { report, names })
}

async fn upload_csv_export(
    slack_client: &SlackApiClient,
    config: &SlackRuntimeConfig,
    message: &MessageRef,
    dm_channel: &str,
    computed: &ComputedReport,
) -> Result<()> {
    let csv_bytes = render_non_engager_csv(&computed.report, &computed.names)?;
    let (channel, thread_ts) = match config.csv_upload_target {
        CsvUploadTarget::Thread => (message.channel_id.as_str(), Some(message.ts.as_str())),
        CsvUploadTarget::DirectMessage => (dm_channel, None),
    };
    let uploaded = slack_client
        .upload_file_v2(channel, thread_ts, CSV_FILENAME, CSV_TITLE, &csv_bytes)
        .await?;
    debug!(file_id = %uploaded.file_id, channel, "uploaded non-engager csv");
    Ok(())
}

/// DMs the summary to the invoker and uploads the CSV when anyone is non-engaged.
async fn deliver_report(
    slack_client: &SlackApiClient,
    config: &SlackRuntimeConfig,
    user_id: &str,
    team_id: Option<&str>,
    message: &MessageRef,
    computed: &ComputedReport,
) -> Result<()> {
    let dm_channel = slack_client.open_direct_message(user_id).await?;
    let summary = render_report_summary(
        team_id,
        message,
        &computed.report,
        &computed.names,
        config.summary_limit,
    );
    let posted = slack_client.post_message(&dm_channel, &summary).await?;
    debug!(channel = %posted.channel, ts = %posted.ts, "posted non-engager summary");

    if !computed.report.is_fully_engaged() {
        upload_csv_export(slack_client, config, message, &dm_channel, computed).await?;
    }
    Ok(())
}

async fn run_shortcut(
    slack_client: &SlackApiClient,
    config: &SlackRuntimeConfig,
    user_id: &str,
    team_id: Option<&str>,
    message: &MessageRef,
) -> Result<(InvocationStatus, usize)> {
    let computed = compute_report(slack_client, message).await?;
    deliver_report(slack_client, config, user_id, team_id, message, &computed).await?;
    Ok(completed_status(&computed.report))
}

async fn run_slash_command(
    slack_client: &SlackApiClient,
    config: &SlackRuntimeConfig,
    user_id: &str,
    team_id: Option<&str>,
    text: &str,
    response_url: &str,
) -> Result<(InvocationStatus, usize)> {
    let Some(message) = parse_message_permalink(text) else {
        slack_client
            .respond(response_url, &render_slash_usage(&config.slash_command))
            .await?;
        return Ok((InvocationStatus::UsageReported, 0));
    };

    let computed = compute_report(slack_client, &message).await?;
    if computed.report.is_fully_engaged() {
        slack_client
            .respond(
                response_url,
                &render_fully_engaged_response(&computed.report),
            )
            .await?;
    } else {
        slack_client.respond(response_url, DM_NOTICE).await?;
        deliver_report(slack_client, config, user_id, team_id, &message, &computed).await?;
    }
    Ok(completed_status(&computed.report))
}

fn completed_status(report: &EngagementReport) -> (InvocationStatus, usize) {
    if report.is_fully_engaged() {
        (InvocationStatus::FullyEngaged, 0)
    } else {
        (InvocationStatus::Reported, report.non_engaged_count())
    }
}

/// Runs one invocation end to end, reporting failures back to the invoker.
async fn execute_invocation(
    slack_client: &SlackApiClient,
    config: &SlackRuntimeConfig,
    invocation: SlackInvocation,
) -> InvocationOutcome {
    let started = Instant::now();
    let result = match &invocation {
        SlackInvocation::Shortcut {
            user_id,
            team_id,
            message,
        } => run_shortcut(slack_client, config, user_id, team_id.as_deref(), message).await,
        SlackInvocation::SlashCommand {
            user_id,
            team_id,
            text,
            response_url,
            ..
        } => {
            run_slash_command(
                slack_client,
                config,
                user_id,
                team_id.as_deref(),
                text,
                response_url,
            )
            .await
        }
    };

    let (status, non_engaged, error) = match result {
        Ok((status, non_engaged)) => (status, non_engaged, None),
        Err(run_error) => {
            report_failure(slack_client, &invocation, &run_error).await;
            (InvocationStatus::Failed, 0, Some(format!("{run_error:#}")))
        }
    };

    InvocationOutcome {
        kind: invocation.kind(),
        user_id: invocation.user_id().to_string(),
        status,
        non_engaged,
        duration_ms: started.elapsed().as_millis() as u64,
        error,
    }
}

async fn report_failure(
    slack_client: &SlackApiClient,
    invocation: &SlackInvocation,
    run_error: &anyhow::Error,
) {
    let text = render_failure_message(run_error);
    let delivered = match invocation {
        SlackInvocation::Shortcut {
            user_id, message, ..
        } => {
            slack_client
                .post_ephemeral(&message.channel_id, user_id, &text)
                .await
        }
        SlackInvocation::SlashCommand { response_url, .. } => {
            slack_client.respond(response_url, &text).await
        }
    };
    if let Err(delivery_error) = delivered {
        warn!(
            kind = invocation.kind(),
            user_id = invocation.user_id(),
            channel_id = invocation.channel_id().unwrap_or("unknown"),
            error = %delivery_error,
            "failed to deliver error notice to invoker"
        );
    }
}
