//! Summary text and CSV export rendering for engagement reports.

use anyhow::{Context, Result};
use nonengagers_core::{EngagementReport, MessageRef};

use super::slack_api_client::SlackUser;
use super::slack_engagement_source::SlackUserDirectory;
use crate::slack_helpers::truncate_chars;

pub(super) const FULLY_ENGAGED_LINE: &str = "🎉 Everyone engaged (reacted or replied)!";
pub(super) const DM_NOTICE: &str = "I’ve DMed you the results (CSV + summary).";
pub(super) const CSV_FILENAME: &str = "non_engagers.csv";
pub(super) const CSV_TITLE: &str = "Non-engagers";

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// `display (real)` when both names exist and differ, else the best single name.
pub(super) fn format_display_name(user: Option<&SlackUser>, user_id: &str) -> String {
    let Some(user) = user else {
        return if user_id.trim().is_empty() {
            "unknown".to_string()
        } else {
            user_id.to_string()
        };
    };
    let profile = &user.profile;
    let display = non_empty(profile.display_name_normalized.as_deref())
        .or_else(|| non_empty(profile.display_name.as_deref()));
    let real = non_empty(profile.real_name_normalized.as_deref())
        .or_else(|| non_empty(profile.real_name.as_deref()));

    match (display, real) {
        (Some(display), Some(real)) if display != real => format!("{display} ({real})"),
        (Some(display), _) => display.to_string(),
        (None, Some(real)) => real.to_string(),
        (None, None) => non_empty(user.name.as_deref())
            .or_else(|| non_empty(Some(user.id.as_str())))
            .unwrap_or("unknown")
            .to_string(),
    }
}

pub(super) fn non_engager_names(
    report: &EngagementReport,
    directory: &SlackUserDirectory,
) -> Vec<String> {
    report
        .non_engaged()
        .iter()
        .map(|user_id| format_display_name(directory.get(user_id.as_str()), user_id.as_str()))
        .collect()
}

pub(super) fn summarize_names(names: &[String], limit: usize) -> String {
    let shown = names.iter().take(limit).collect::<Vec<_>>();
    let mut body = shown
        .iter()
        .map(|name| format!("• {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    let extra = names.len().saturating_sub(shown.len());
    if extra > 0 {
        body.push_str(&format!("\n…and {extra} more"));
    }
    body
}

/// Deep link to the analysed message's thread in the Slack web client.
pub(super) fn render_thread_link(team_id: &str, message: &MessageRef) -> String {
    format!(
        "https://app.slack.com/client/{team}/{channel}/thread/{channel}-{ts}",
        team = team_id,
        channel = message.channel_id,
        ts = message.ts.replace('.', ""),
    )
}

pub(super) fn render_counts_line(report: &EngagementReport) -> String {
    format!(
        "*Members considered:* {}  ·  *Engaged:* {}  ·  *Non-engagers:* {}",
        report.total_members(),
        report.engaged_count(),
        report.non_engaged_count()
    )
}

pub(super) fn render_report_summary(
    team_id: Option<&str>,
    message: &MessageRef,
    report: &EngagementReport,
    names: &[String],
    summary_limit: usize,
) -> String {
    let header = match team_id.map(str::trim).filter(|value| !value.is_empty()) {
        Some(team_id) => format!(
            "*Non-engagers for <{}|this message>*",
            render_thread_link(team_id, message)
        ),
        None => "*Non-engagers for this message*".to_string(),
    };
    let body = if report.is_fully_engaged() {
        FULLY_ENGAGED_LINE.to_string()
    } else {
        summarize_names(names, summary_limit.max(1))
    };
    format!("{header}\n{}\n\n{body}", render_counts_line(report))
}

pub(super) fn render_fully_engaged_response(report: &EngagementReport) -> String {
    format!("{}\n\n{FULLY_ENGAGED_LINE}", render_counts_line(report))
}

pub(super) fn render_failure_message(error: &anyhow::Error) -> String {
    format!(
        "Sorry, I couldn’t compute that: `{}`",
        truncate_chars(&format!("{error:#}"), 1_500)
    )
}

pub(super) fn render_slash_usage(command: &str) -> String {
    format!(
        "Usage: `{command} <message link>`\nTip: Long-press a message → *Copy link* and paste here."
    )
}

/// `user_id,name` rows in report order.
pub(super) fn render_non_engager_csv(
    report: &EngagementReport,
    names: &[String],
) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["user_id", "name"])
        .context("failed to write csv header")?;
    for (user_id, name) in report.non_engaged().iter().zip(names) {
        writer
            .write_record([user_id.as_str(), name.as_str()])
            .with_context(|| format!("failed to write csv row for {user_id}"))?;
    }
    writer
        .into_inner()
        .map_err(|error| anyhow::anyhow!("failed to flush csv export: {}", error.error()))
}
