use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use engine::{RuleConfig, RuleEngine, RuleKind};
use market::yahoo::YahooClient;
use market::{SymbolKind, symbols::SymbolSync};
use notifier::DiscordNotifier;
use scheduler::{HealthReport, Monitor};
use serde_json::Value;
use store::{Db, NewUser, Repositories, Symbol, User};
use tracing::{error, info, warn};

use crate::cli::{Command, DbCommand, RulesCommand, SymbolsCommand, UserCommand, WatchlistCommand};
use crate::config::AppConfig;

/// Opens the database, applies the schema and runs one command.
pub async fn execute(command: Command, cfg: AppConfig) -> anyhow::Result<()> {
    ensure_parent_dir(&cfg.database.url)?;
    let db = Db::connect(&cfg.database.url).await?;
    db.migrate().await?;
    let repos = Repositories::sqlx(db.pool.clone());

    match command {
        Command::Run { once, dry_run } => run(&cfg, repos, once, dry_run).await,
        Command::User(cmd) => user(&repos, cmd).await,
        Command::Watchlist(cmd) => watchlist(&repos, cmd).await,
        Command::Symbols(cmd) => symbols(&repos, cmd).await,
        Command::Rules(cmd) => rules(&repos, cmd).await,
        Command::History { user, limit } => history(&repos, user, limit).await,
        Command::Healthcheck => healthcheck(&cfg, &repos).await,
        Command::Db(DbCommand::Migrate) => {
            println!("Migrations applied to {}", cfg.database.url);
            Ok(())
        }
    }
}

async fn run(cfg: &AppConfig, repos: Repositories, once: bool, dry_run: bool) -> anyhow::Result<()> {
    let provider = Arc::new(YahooClient::new(
        cfg.data_source.base_url.clone(),
        cfg.request_timeout(),
    )?);
    let monitor = Monitor::new(
        repos,
        provider,
        Arc::new(cfg.channels()),
        cfg.monitor_settings(dry_run),
    );

    if once {
        let report = monitor.run_cycle().await?;
        println!("{report}");
        return Ok(());
    }

    monitor
        .run_forever(cfg.check_interval(), shutdown_signal())
        .await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn user(repos: &Repositories, cmd: UserCommand) -> anyhow::Result<()> {
    match cmd {
        UserCommand::Add { email, discord } => {
            let user = repos
                .users
                .create(&NewUser {
                    email,
                    discord_webhook_url: discord,
                })
                .await?;
            println!("Created user with ID: {}", user.id);
        }
        UserCommand::List => {
            for u in repos.users.list_all().await? {
                println!(
                    "ID: {}, Email: {}, Discord: {}",
                    u.id,
                    u.email.as_deref().unwrap_or("-"),
                    if u.discord_webhook_url.is_some() { "yes" } else { "no" }
                );
            }
        }
    }
    Ok(())
}

/// Outcome of a bulk watchlist edit, by upper-cased ticker.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct WatchlistChange {
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
    pub not_found: Vec<String>,
}

pub async fn add_to_watchlist(
    repos: &Repositories,
    user_id: i64,
    tickers: &[String],
) -> anyhow::Result<WatchlistChange> {
    require_user(repos, user_id).await?;
    let mut out = WatchlistChange::default();

    for ticker in tickers.iter().map(|t| t.trim().to_uppercase()).filter(|t| !t.is_empty()) {
        match repos.symbols.by_ticker(&ticker).await? {
            Some(symbol) => {
                if repos.watchlist.add(user_id, symbol.id).await? {
                    out.changed.push(ticker);
                } else {
                    out.unchanged.push(ticker);
                }
            }
            None => out.not_found.push(ticker),
        }
    }

    Ok(out)
}

pub async fn remove_from_watchlist(
    repos: &Repositories,
    user_id: i64,
    tickers: &[String],
) -> anyhow::Result<WatchlistChange> {
    let mut out = WatchlistChange::default();

    for ticker in tickers.iter().map(|t| t.trim().to_uppercase()).filter(|t| !t.is_empty()) {
        match repos.symbols.by_ticker(&ticker).await? {
            Some(symbol) => {
                if repos.watchlist.remove(user_id, symbol.id).await? {
                    out.changed.push(ticker);
                } else {
                    out.unchanged.push(ticker);
                }
            }
            None => out.not_found.push(ticker),
        }
    }

    Ok(out)
}

async fn watchlist(repos: &Repositories, cmd: WatchlistCommand) -> anyhow::Result<()> {
    match cmd {
        WatchlistCommand::Add { user, symbols } => {
            let res = add_to_watchlist(repos, user, &symbols).await?;
            println!("Added: {:?}", res.changed);
            if !res.unchanged.is_empty() {
                println!("Already watched: {:?}", res.unchanged);
            }
            if !res.not_found.is_empty() {
                println!("Not found: {:?} (try `symbols sync`)", res.not_found);
            }
        }
        WatchlistCommand::Show { user } => {
            for s in repos.watchlist.list_for_user(user).await? {
                println!("{}: {}", s.ticker, s.name);
            }
        }
        WatchlistCommand::Remove { user, symbols } => {
            let res = remove_from_watchlist(repos, user, &symbols).await?;
            println!("Removed: {:?}", res.changed);
            if !res.not_found.is_empty() {
                println!("Not found: {:?}", res.not_found);
            }
        }
    }
    Ok(())
}

pub async fn list_symbols(
    repos: &Repositories,
    search: Option<&str>,
    kind: Option<SymbolKind>,
) -> anyhow::Result<Vec<Symbol>> {
    match (search, kind) {
        (Some(q), _) => repos.symbols.search(q).await,
        (None, Some(k)) => repos.symbols.list_by_kind(k).await,
        (None, None) => repos.symbols.list_all().await,
    }
}

async fn symbols(repos: &Repositories, cmd: SymbolsCommand) -> anyhow::Result<()> {
    match cmd {
        SymbolsCommand::Sync => {
            let listed = SymbolSync::new()?.fetch_all().await;
            if listed.is_empty() {
                warn!("symbol sync returned nothing; keeping existing directory");
            }
            let written = repos.symbols.bulk_upsert(&listed).await?;
            println!("Synced {written} symbols");
        }
        SymbolsCommand::List {
            search,
            kind,
            limit,
        } => {
            let all = list_symbols(repos, search.as_deref(), kind).await?;
            for s in all.iter().take(limit) {
                println!("{}: {} ({}, {})", s.ticker, s.name, s.kind, s.exchange);
            }
            if all.len() > limit {
                println!("... and {} more", all.len() - limit);
            }
        }
    }
    Ok(())
}

/// Validates and stores a rule, optionally scoped to one ticker.
pub async fn add_rule(
    repos: &Repositories,
    user_id: i64,
    kind: RuleKind,
    params: &str,
    ticker: Option<&str>,
) -> anyhow::Result<RuleConfig> {
    require_user(repos, user_id).await?;

    let parameters: Value =
        serde_json::from_str(params).context("--params must be a JSON object")?;
    let mut rule = RuleConfig::new(user_id, kind, parameters);

    if let Some(ticker) = ticker {
        let ticker = ticker.trim().to_uppercase();
        let symbol = repos
            .symbols
            .by_ticker(&ticker)
            .await?
            .ok_or_else(|| anyhow!("unknown ticker {ticker}"))?;
        rule = rule.scoped_to(symbol.id);
    }

    RuleEngine::new().create(&rule)?;
    repos.rules.create(&rule).await
}

async fn rules(repos: &Repositories, cmd: RulesCommand) -> anyhow::Result<()> {
    match cmd {
        RulesCommand::Add {
            user,
            kind,
            params,
            symbol,
        } => {
            let created = add_rule(repos, user, kind, &params, symbol.as_deref()).await?;
            println!("Created rule with ID: {}", created.id.unwrap_or_default());
        }
        RulesCommand::List { user } => {
            let engine = RuleEngine::new();
            for r in repos.rules.list_for_user(user).await? {
                let summary = match engine.create(&r) {
                    Ok(rule) => rule.summary(),
                    Err(e) => format!("{} (invalid: {e})", r.rule_type),
                };
                let scope = match r.symbol_id {
                    Some(id) => repos
                        .symbols
                        .by_id(id)
                        .await?
                        .map(|s| s.ticker)
                        .unwrap_or_else(|| format!("symbol {id}")),
                    None => "all".into(),
                };
                println!(
                    "[{}] {} {summary} (scope: {scope})",
                    r.id.unwrap_or_default(),
                    if r.enabled { "on " } else { "off" },
                );
            }
        }
        RulesCommand::Enable { id } => set_enabled(repos, id, true).await?,
        RulesCommand::Disable { id } => set_enabled(repos, id, false).await?,
        RulesCommand::Delete { id } => {
            if !repos.rules.delete(id).await? {
                bail!("no rule with ID {id}");
            }
            println!("Deleted rule {id}");
        }
    }
    Ok(())
}

async fn set_enabled(repos: &Repositories, id: i64, enabled: bool) -> anyhow::Result<()> {
    if !repos.rules.set_enabled(id, enabled).await? {
        bail!("no rule with ID {id}");
    }
    println!("Rule {id} {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

async fn history(repos: &Repositories, user_id: i64, limit: u32) -> anyhow::Result<()> {
    require_user(repos, user_id).await?;

    for a in repos.alerts.history_for_user(user_id, limit).await? {
        let ticker = repos
            .symbols
            .by_id(a.symbol_id)
            .await?
            .map(|s| s.ticker)
            .unwrap_or_default();
        println!(
            "{} {:<6} {:<18} {} [{}]",
            a.triggered_at.format("%Y-%m-%d %H:%M"),
            ticker,
            a.rule_type,
            a.message,
            if a.notified_at.is_some() { "sent" } else { "pending" }
        );
    }
    Ok(())
}

async fn healthcheck(cfg: &AppConfig, repos: &Repositories) -> anyhow::Result<()> {
    let url = cfg
        .notifications
        .discord
        .webhook_url
        .clone()
        .ok_or_else(|| anyhow!("notifications.discord.webhook_url is not set"))?;

    let report = HealthReport::collect(repos).await?;
    report.post(&DiscordNotifier::new(url)?).await?;

    println!(
        "Health check posted: {} users, {} tickers, {} rules",
        report.users,
        report.tickers.len(),
        report.rules.len()
    );
    Ok(())
}

async fn require_user(repos: &Repositories, user_id: i64) -> anyhow::Result<User> {
    repos
        .users
        .by_id(user_id)
        .await?
        .ok_or_else(|| anyhow!("no user with ID {user_id}"))
}

/// Creates the directory holding a file-backed SQLite database.
fn ensure_parent_dir(url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_file_path(url) else {
        return Ok(());
    };
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn sqlite_file_path(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();

    if path.is_empty() || path == ":memory:" || path.starts_with("file:") || url.contains("mode=memory") {
        return None;
    }
    Some(path)
}
