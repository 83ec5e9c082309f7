use std::time::Duration;

use anyhow::{anyhow, Result};
use nonengagers_slack_runtime::SlackRuntimeConfig;

use crate::cli_args::Cli;

fn resolve_non_empty_cli_value(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn build_slack_runtime_config(cli: &Cli) -> Result<SlackRuntimeConfig> {
    let bot_token = resolve_non_empty_cli_value(cli.slack_bot_token.as_deref())
        .ok_or_else(|| anyhow!("--slack-bot-token (or SLACK_BOT_TOKEN) is required"))?;
    let app_token = resolve_non_empty_cli_value(cli.slack_app_token.as_deref())
        .ok_or_else(|| anyhow!("--slack-app-token (or SLACK_APP_TOKEN) is required"))?;

    Ok(SlackRuntimeConfig {
        api_base: cli.slack_api_base.trim_end_matches('/').to_string(),
        app_token,
        bot_token,
        shortcut_callback_id: cli.shortcut_callback_id.trim().to_string(),
        slash_command: cli.slash_command.trim().to_string(),
        csv_upload_target: cli.csv_upload_target.into(),
        summary_limit: cli.summary_limit,
        request_timeout_ms: cli.request_timeout_ms,
        reconnect_delay: Duration::from_millis(cli.reconnect_delay_ms),
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
        processed_envelope_cap: cli.processed_envelope_cap,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use nonengagers_slack_runtime::CsvUploadTarget;

    use super::build_slack_runtime_config;
    use crate::cli_args::Cli;

    #[test]
    fn functional_build_slack_runtime_config_maps_cli_values() {
        let cli = Cli::parse_from([
            "nonengagers",
            "--slack-bot-token",
            " xoxb-1 ",
            "--slack-app-token",
            "xapp-1",
            "--slack-api-base",
            "http://127.0.0.1:9000/api/",
            "--csv-upload-target",
            "direct-message",
            "--reconnect-delay-ms",
            "250",
        ]);
        let config = build_slack_runtime_config(&cli).expect("config");
        assert_eq!(config.bot_token, "xoxb-1");
        assert_eq!(config.app_token, "xapp-1");
        assert_eq!(config.api_base, "http://127.0.0.1:9000/api");
        assert_eq!(config.csv_upload_target, CsvUploadTarget::DirectMessage);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn regression_build_slack_runtime_config_requires_tokens() {
        let cli = Cli::parse_from([
            "nonengagers",
            "--slack-bot-token",
            "   ",
            "--slack-app-token",
            "xapp-1",
        ]);
        let error = build_slack_runtime_config(&cli).err().expect("blank bot token must fail");
        assert!(error.to_string().contains("--slack-bot-token"));

        let cli = Cli::parse_from([
            "nonengagers",
            "--slack-bot-token",
            "xoxb-1",
            "--slack-app-token",
            "",
        ]);
        let error = build_slack_runtime_config(&cli).err().expect("blank app token must fail");
        assert!(error.to_string().contains("--slack-app-token"));
    }
}
