use clap::Parser;

use cli::cli::Cli;
use cli::commands;
use cli::config::AppConfig;
use common::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let cfg = AppConfig::load(&args.config)?;

    let level = if args.debug {
        "debug"
    } else {
        cfg.advanced.log_level.as_str()
    };
    init_logger("tickerwatch", level, args.json_logs);

    tracing::debug!(config = %args.config.display(), "configuration loaded");

    commands::execute(args.command, cfg).await
}
