use std::path::PathBuf;

use clap::{Parser, Subcommand};
use engine::RuleKind;
use market::SymbolKind;

#[derive(Debug, Parser)]
#[clap(name = "tickerwatch", version, about = "Stock alert monitor")]
pub struct Cli {
    /// TOML config file; defaults apply when it does not exist
    #[clap(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(long, global = true)]
    pub debug: bool,

    /// Structured JSON log lines
    #[clap(long, global = true)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the monitor loop
    Run {
        /// Run a single check cycle and exit
        #[clap(long)]
        once: bool,

        /// Evaluate and log alerts without sending or recording them
        #[clap(long)]
        dry_run: bool,
    },

    #[clap(subcommand)]
    User(UserCommand),

    #[clap(subcommand)]
    Watchlist(WatchlistCommand),

    #[clap(subcommand)]
    Symbols(SymbolsCommand),

    #[clap(subcommand)]
    Rules(RulesCommand),

    /// Recent alerts for a user, newest first
    History {
        #[clap(long)]
        user: i64,

        #[clap(long, default_value_t = 20)]
        limit: u32,
    },

    /// Post a status summary to the operator Discord webhook
    Healthcheck,

    #[clap(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    Add {
        #[clap(long)]
        email: Option<String>,

        /// Discord webhook URL for this user's alerts
        #[clap(long)]
        discord: Option<String>,
    },
    List,
}

#[derive(Debug, Subcommand)]
pub enum WatchlistCommand {
    Add {
        #[clap(long)]
        user: i64,

        /// Comma-separated tickers
        #[clap(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
    Show {
        #[clap(long)]
        user: i64,
    },
    Remove {
        #[clap(long)]
        user: i64,

        #[clap(long, value_delimiter = ',', required = true)]
        symbols: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum SymbolsCommand {
    /// Download the NASDAQ and other-listed directories
    Sync,
    List {
        /// Substring of ticker or name
        #[clap(long)]
        search: Option<String>,

        /// stock or etf
        #[clap(long = "type")]
        kind: Option<SymbolKind>,

        #[clap(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    Add {
        #[clap(long)]
        user: i64,

        /// monthly_high_drop, monthly_low_rise, daily_change, volume_spike or custom
        #[clap(long = "type")]
        kind: RuleKind,

        /// JSON object of rule parameters
        #[clap(long, default_value = "{}")]
        params: String,

        /// Limit the rule to one watchlisted ticker
        #[clap(long)]
        symbol: Option<String>,
    },
    List {
        #[clap(long)]
        user: i64,
    },
    Enable {
        id: i64,
    },
    Disable {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Create any missing tables
    Migrate,
}
