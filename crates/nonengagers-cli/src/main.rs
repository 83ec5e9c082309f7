mod bootstrap_helpers;
mod cli_args;
mod cli_types;
mod startup;

use anyhow::Result;
use clap::Parser;
use nonengagers_slack_runtime::run_slack_runtime;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;
use crate::startup::build_slack_runtime_config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_slack_runtime_config(&cli)?;
    tracing::info!(
        api_base = %config.api_base,
        slash_command = %config.slash_command,
        shortcut_callback_id = %config.shortcut_callback_id,
        "starting nonengagers slack runtime"
    );
    run_slack_runtime(config).await
}
