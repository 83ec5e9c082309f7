//! Socket Mode envelope decoding into shortcut and slash-command invocations.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use nonengagers_core::MessageRef;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const PERMALINK_PATTERN: &str =
    r"https?://[^/\s>|]+/archives/(?P<channel>[A-Z0-9]+)/p(?P<pts>[0-9]{16,})";
const PERMALINK_MICROS_DIGITS: usize = 6;

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Raw Socket Mode frame. `hello` and `disconnect` frames carry no envelope id.
pub struct SlackSocketEnvelope {
    #[serde(default)]
    pub envelope_id: Option<String>,
    #[serde(rename = "type")]
    pub envelope_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl SlackSocketEnvelope {
    pub fn is_disconnect(&self) -> bool {
        self.envelope_type == "disconnect"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enumerates the two ways a user asks for a non-engager report.
pub enum SlackInvocation {
    Shortcut {
        user_id: String,
        team_id: Option<String>,
        message: MessageRef,
    },
    SlashCommand {
        user_id: String,
        team_id: Option<String>,
        channel_id: Option<String>,
        text: String,
        response_url: String,
    },
}

#[derive(Debug, Deserialize)]
struct SlackIdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SlackActionMessage {
    ts: String,
}

#[derive(Debug, Deserialize)]
struct SlackMessageActionPayload {
    #[serde(default)]
    callback_id: Option<String>,
    user: SlackIdRef,
    #[serde(default)]
    team: Option<SlackIdRef>,
    channel: SlackIdRef,
    message: SlackActionMessage,
}

#[derive(Debug, Deserialize)]
struct SlackSlashCommandPayload {
    command: String,
    #[serde(default)]
    text: String,
    user_id: String,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
    response_url: String,
}

impl SlackInvocation {
    /// Returns `None` for envelopes that are not one of the configured invocations.
    pub fn from_envelope(
        envelope: &SlackSocketEnvelope,
        shortcut_callback_id: &str,
        slash_command: &str,
    ) -> Result<Option<Self>> {
        match envelope.envelope_type.as_str() {
            "interactive" => {
                if envelope.payload.get("type").and_then(Value::as_str) != Some("message_action") {
                    return Ok(None);
                }
                let payload =
                    serde_json::from_value::<SlackMessageActionPayload>(envelope.payload.clone())
                        .context("failed to decode slack message action payload")?;
                if payload.callback_id.as_deref() != Some(shortcut_callback_id) {
                    return Ok(None);
                }
                Ok(Some(Self::Shortcut {
                    user_id: payload.user.id,
                    team_id: payload.team.map(|team| team.id),
                    message: MessageRef::new(payload.channel.id, payload.message.ts),
                }))
            }
            "slash_commands" => {
                let payload =
                    serde_json::from_value::<SlackSlashCommandPayload>(envelope.payload.clone())
                        .context("failed to decode slack slash command payload")?;
                if payload.command.trim() != slash_command {
                    return Ok(None);
                }
                Ok(Some(Self::SlashCommand {
                    user_id: payload.user_id,
                    team_id: payload.team_id,
                    channel_id: payload.channel_id,
                    text: payload.text,
                    response_url: payload.response_url,
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Shortcut { .. } => "shortcut",
            Self::SlashCommand { .. } => "slash_command",
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Shortcut { user_id, .. } | Self::SlashCommand { user_id, .. } => user_id,
        }
    }

    /// Channel the invocation came from, when Slack reported one.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Self::Shortcut { message, .. } => Some(message.channel_id.as_str()),
            Self::SlashCommand { channel_id, .. } => channel_id.as_deref(),
        }
    }
}

fn permalink_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(PERMALINK_PATTERN).expect("permalink pattern compiles"))
}

/// Extracts the message referenced by the first Slack permalink in `text`.
///
/// Permalinks encode the ts without its dot; the last six ASCII digits are the
/// microsecond part.
pub fn parse_message_permalink(text: &str) -> Option<MessageRef> {
    let captures = permalink_pattern().captures(text)?;
    let channel = captures.name("channel")?.as_str();
    let pts = captures.name("pts")?.as_str();
    let split_at = pts.len().checked_sub(PERMALINK_MICROS_DIGITS)?;
    let (seconds, micros) = pts.split_at(split_at);
    Some(MessageRef::new(channel, format!("{seconds}.{micros}")))
}

pub fn parse_socket_envelope_text(text: &str) -> Result<SlackSocketEnvelope> {
    serde_json::from_str::<SlackSocketEnvelope>(text).context("failed to parse slack socket envelope")
}

pub(super) fn parse_socket_envelope(message: WsMessage) -> Result<Option<SlackSocketEnvelope>> {
    match message {
        WsMessage::Text(text) => parse_socket_envelope_text(&text).map(Some),
        WsMessage::Binary(bytes) => {
            let text =
                String::from_utf8(bytes.to_vec()).context("invalid utf-8 slack socket payload")?;
            parse_socket_envelope_text(&text).map(Some)
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(None),
        WsMessage::Close(_) => Ok(None),
        WsMessage::Frame(_) => Ok(None),
    }
}
