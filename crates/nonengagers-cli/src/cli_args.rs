use clap::Parser;

use crate::cli_types::CliCsvUploadTarget;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "nonengagers",
    about = "Slack app that reports channel members who neither reacted to nor replied to a message",
    version
)]
pub struct Cli {
    #[arg(
        long = "slack-bot-token",
        env = "SLACK_BOT_TOKEN",
        hide_env_values = true,
        help = "Slack bot token for Web API (xoxb-...)"
    )]
    pub slack_bot_token: Option<String>,

    #[arg(
        long = "slack-app-token",
        env = "SLACK_APP_TOKEN",
        hide_env_values = true,
        help = "Slack Socket Mode app token (xapp-...)"
    )]
    pub slack_app_token: Option<String>,

    #[arg(
        long = "slack-api-base",
        env = "NONENGAGERS_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub slack_api_base: String,

    #[arg(
        long = "shortcut-callback-id",
        env = "NONENGAGERS_SHORTCUT_CALLBACK_ID",
        default_value = "find_non_engagers",
        help = "Callback id of the message shortcut that triggers a report"
    )]
    pub shortcut_callback_id: String,

    #[arg(
        long = "slash-command",
        env = "NONENGAGERS_SLASH_COMMAND",
        default_value = "/nonengagers",
        help = "Slash command that accepts a message link and triggers a report"
    )]
    pub slash_command: String,

    #[arg(
        long = "csv-upload-target",
        env = "NONENGAGERS_CSV_UPLOAD_TARGET",
        value_enum,
        default_value_t = CliCsvUploadTarget::Thread,
        help = "Where the non-engager CSV export is uploaded: the message thread or the invoker's DM"
    )]
    pub csv_upload_target: CliCsvUploadTarget,

    #[arg(
        long = "summary-limit",
        env = "NONENGAGERS_SUMMARY_LIMIT",
        default_value_t = 20,
        value_parser = parse_positive_usize,
        help = "Maximum non-engager names listed in the DM summary"
    )]
    pub summary_limit: usize,

    #[arg(
        long = "request-timeout-ms",
        env = "NONENGAGERS_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each Slack Web API request in milliseconds"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "reconnect-delay-ms",
        env = "NONENGAGERS_RECONNECT_DELAY_MS",
        default_value_t = 1_000,
        value_parser = parse_positive_u64,
        help = "Delay before reopening the Socket Mode connection in milliseconds"
    )]
    pub reconnect_delay_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "NONENGAGERS_RETRY_MAX_ATTEMPTS",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Maximum attempts for retryable Slack API failures (429/5xx/transport)"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "NONENGAGERS_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base backoff delay in milliseconds for Slack API retries"
    )]
    pub retry_base_delay_ms: u64,

    #[arg(
        long = "processed-envelope-cap",
        env = "NONENGAGERS_PROCESSED_ENVELOPE_CAP",
        default_value_t = 10_000,
        value_parser = parse_positive_usize,
        help = "Maximum Socket Mode envelope ids remembered for duplicate suppression"
    )]
    pub processed_envelope_cap: usize,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{parse_positive_u64, parse_positive_usize, Cli};
    use crate::cli_types::CliCsvUploadTarget;

    #[test]
    fn unit_positive_parsers_reject_zero_and_garbage() {
        assert_eq!(parse_positive_usize("3"), Ok(3));
        assert!(parse_positive_usize("0").is_err());
        assert!(parse_positive_usize("-1").is_err());
        assert_eq!(parse_positive_u64("250"), Ok(250));
        assert!(parse_positive_u64("0").is_err());
        assert!(parse_positive_u64("soon").is_err());
    }

    #[test]
    fn unit_cli_defaults_are_stable() {
        let cli = Cli::parse_from(["nonengagers"]);
        assert_eq!(cli.slack_api_base, "https://slack.com/api");
        assert_eq!(cli.shortcut_callback_id, "find_non_engagers");
        assert_eq!(cli.slash_command, "/nonengagers");
        assert_eq!(cli.csv_upload_target, CliCsvUploadTarget::Thread);
        assert_eq!(cli.summary_limit, 20);
        assert_eq!(cli.request_timeout_ms, 30_000);
        assert_eq!(cli.reconnect_delay_ms, 1_000);
        assert_eq!(cli.retry_max_attempts, 4);
        assert_eq!(cli.retry_base_delay_ms, 500);
        assert_eq!(cli.processed_envelope_cap, 10_000);
    }

    #[test]
    fn functional_cli_accepts_overrides() {
        let cli = Cli::parse_from([
            "nonengagers",
            "--slack-bot-token",
            "xoxb-1",
            "--slack-app-token",
            "xapp-1",
            "--csv-upload-target",
            "direct-message",
            "--summary-limit",
            "5",
            "--slash-command",
            "/quiet",
        ]);
        assert_eq!(cli.slack_bot_token.as_deref(), Some("xoxb-1"));
        assert_eq!(cli.slack_app_token.as_deref(), Some("xapp-1"));
        assert_eq!(cli.csv_upload_target, CliCsvUploadTarget::DirectMessage);
        assert_eq!(cli.summary_limit, 5);
        assert_eq!(cli.slash_command, "/quiet");
    }

    #[test]
    fn regression_cli_rejects_zero_limits() {
        let error = Cli::try_parse_from(["nonengagers", "--summary-limit", "0"])
            .expect_err("zero summary limit should fail");
        assert!(error.to_string().contains("value must be greater than 0"));

        let error = Cli::try_parse_from(["nonengagers", "--retry-max-attempts", "0"])
            .expect_err("zero retry attempts should fail");
        assert!(error.to_string().contains("value must be greater than 0"));
    }
}
