//! Slack Socket Mode runtime for nonengagers.
//!
//! Receives message shortcuts and slash commands, fetches channel members,
//! reactions, and thread replies through the Slack Web API, and delivers the
//! resulting engagement report privately to the invoker.

mod slack_helpers;
pub mod slack_runtime;

pub use slack_runtime::{
    parse_message_permalink, parse_socket_envelope_text, run_slack_runtime, CsvUploadTarget,
    SlackInvocation, SlackRuntimeConfig, SlackSocketEnvelope,
};
