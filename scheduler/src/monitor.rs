use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{TraceId, cycle_span, warn_if_slow};
use engine::{AlertEvent, RuleConfig, RuleEngine};
use futures::stream::{self, StreamExt};
use market::MarketDataProvider;
use notifier::Notifier;
use store::{NewAlert, Repositories, Symbol, User};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::channels::ChannelBuilder;
use crate::market_hours::is_market_open;
use crate::report::CycleReport;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Minimum gap between two alerts for the same (user, symbol, rule type).
    pub cooldown: Duration,
    /// Window passed to the historical snapshot fetch.
    pub history_days: u32,
    /// Users checked concurrently.
    pub max_concurrent_checks: usize,
    pub market_hours_only: bool,
    /// Evaluate and log only: nothing is reserved or sent.
    pub dry_run: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(24 * 3600),
            history_days: 30,
            max_concurrent_checks: 5,
            market_hours_only: false,
            dry_run: false,
        }
    }
}

pub struct Monitor {
    repos: Repositories,
    provider: Arc<dyn MarketDataProvider>,
    channels: Arc<dyn ChannelBuilder>,
    engine: RuleEngine,
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(
        repos: Repositories,
        provider: Arc<dyn MarketDataProvider>,
        channels: Arc<dyn ChannelBuilder>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            repos,
            provider,
            channels,
            engine: RuleEngine::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Checks every user once.
    ///
    /// Only the initial user listing can fail; per-user and per-symbol errors
    /// are logged and counted.
    pub async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        let trace_id = TraceId::default();
        let span = cycle_span("check", &trace_id);

        let report = async {
            let users = self.repos.users.list_all().await?;
            debug!(users = users.len(), "starting check cycle");

            let reports: Vec<CycleReport> = stream::iter(users)
                .map(|user| self.check_user(user))
                .buffer_unordered(self.settings.max_concurrent_checks.max(1))
                .collect()
                .await;

            let mut total = CycleReport::default();
            for r in reports {
                total += r;
            }
            anyhow::Ok(total)
        }
        .instrument(span.clone())
        .await?;

        span.record("users", report.users_checked as u64);
        span.record("alerts_sent", report.alerts_sent as u64);
        span.in_scope(|| info!(%report, dry_run = self.settings.dry_run, "check cycle complete"));

        Ok(report)
    }

    /// Runs cycles every `every` until `shutdown` resolves. A cycle in flight
    /// is finished before the loop exits; cycles never overlap.
    pub async fn run_forever<F>(&self, every: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            every_ms = every.as_millis() as u64,
            market_hours_only = self.settings.market_hours_only,
            "monitor started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, monitor stopping");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if self.settings.market_hours_only && !is_market_open(Utc::now()) {
                debug!("outside market hours, skipping cycle");
                continue;
            }

            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "check cycle failed");
            }
        }
    }

    #[instrument(skip_all, fields(user_id = user.id))]
    async fn check_user(&self, user: User) -> CycleReport {
        let mut report = CycleReport::default();

        match self.load_user_work(&user).await {
            Ok(Some((watchlist, rules, notifiers))) => {
                report.users_checked = 1;
                for symbol in &watchlist {
                    self.check_symbol(&user, symbol, &rules, &notifiers, &mut report)
                        .await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(error = %e, "failed to load user");
            }
        }

        report
    }

    async fn load_user_work(
        &self,
        user: &User,
    ) -> anyhow::Result<Option<(Vec<Symbol>, Vec<RuleConfig>, Vec<Arc<dyn Notifier>>)>> {
        let watchlist = self.repos.watchlist.list_for_user(user.id).await?;
        if watchlist.is_empty() {
            debug!("empty watchlist, skipping user");
            return Ok(None);
        }

        let rules = self.repos.rules.enabled_for_user(user.id).await?;
        if rules.is_empty() {
            debug!("no enabled rules, skipping user");
            return Ok(None);
        }

        let notifiers = self.channels.for_user(user);
        if notifiers.is_empty() && !self.settings.dry_run {
            debug!("no delivery channels, skipping user");
            return Ok(None);
        }

        Ok(Some((watchlist, rules, notifiers)))
    }

    #[instrument(skip_all, fields(ticker = %symbol.ticker))]
    async fn check_symbol(
        &self,
        user: &User,
        symbol: &Symbol,
        rules: &[RuleConfig],
        notifiers: &[Arc<dyn Notifier>],
        report: &mut CycleReport,
    ) {
        let scoped: Vec<RuleConfig> = rules
            .iter()
            .filter(|r| r.applies_to(symbol.id))
            .cloned()
            .collect();
        if scoped.is_empty() {
            return;
        }

        report.symbols_checked += 1;

        let fetched = warn_if_slow("fetch_snapshots", Duration::from_secs(5), async {
            tokio::join!(
                self.provider.current(&symbol.ticker),
                self.provider
                    .historical(&symbol.ticker, self.settings.history_days)
            )
        })
        .await;

        let (current, historical) = match fetched {
            (Ok(c), Ok(h)) => (c, h),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "market data unavailable, skipping symbol");
                report.symbols_failed += 1;
                return;
            }
        };

        let mut events = self.engine.evaluate_rules(&scoped, &current, Some(&historical));
        // Most severe first, so it claims the cooldown slot for its rule type.
        events.sort_by(|a, b| b.severity.cmp(&a.severity));
        report.alerts_triggered += events.len();

        for event in &events {
            if self.settings.dry_run {
                info!(
                    rule_type = %event.rule_type,
                    severity = %event.severity,
                    message = %event.message,
                    "dry run: alert not sent"
                );
                continue;
            }

            self.dispatch(user, symbol, event, notifiers, report).await;
        }
    }

    async fn dispatch(
        &self,
        user: &User,
        symbol: &Symbol,
        event: &AlertEvent,
        notifiers: &[Arc<dyn Notifier>],
        report: &mut CycleReport,
    ) {
        let alert = NewAlert {
            user_id: user.id,
            symbol_id: symbol.id,
            rule_type: event.rule_type.as_str().to_string(),
            message: event.message.clone(),
            triggered_at: Utc::now(),
        };

        let id = match self.repos.alerts.reserve(&alert, self.settings.cooldown).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(rule_type = %event.rule_type, "suppressed by cooldown");
                report.alerts_suppressed += 1;
                return;
            }
            Err(e) => {
                error!(error = %e, rule_type = %event.rule_type, "failed to reserve alert");
                return;
            }
        };

        let results = futures::future::join_all(notifiers.iter().map(|n| n.send(event))).await;

        for r in results.iter().filter(|r| !r.success) {
            warn!(
                channel = r.channel,
                error = r.error.as_deref().unwrap_or("unknown"),
                "notification failed"
            );
        }

        if results.iter().any(|r| r.success) {
            if let Err(e) = self.repos.alerts.mark_notified(id, Utc::now()).await {
                error!(error = %e, alert_id = id, "failed to mark alert notified");
            }
            report.alerts_sent += 1;
            info!(
                rule_type = %event.rule_type,
                severity = %event.severity,
                "alert sent"
            );
        } else if let Err(e) = self.repos.alerts.release(id).await {
            error!(error = %e, alert_id = id, "failed to release undelivered alert");
        }
    }
}
