use std::fmt;
use std::ops::AddAssign;

/// Counters for one check cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Users that had a watchlist, rules and at least one channel.
    pub users_checked: usize,
    pub symbols_checked: usize,
    /// Symbols whose market data could not be fetched.
    pub symbols_failed: usize,
    pub alerts_triggered: usize,
    /// Events dropped by the cooldown gate.
    pub alerts_suppressed: usize,
    pub alerts_sent: usize,
}

impl AddAssign for CycleReport {
    fn add_assign(&mut self, o: Self) {
        self.users_checked += o.users_checked;
        self.symbols_checked += o.symbols_checked;
        self.symbols_failed += o.symbols_failed;
        self.alerts_triggered += o.alerts_triggered;
        self.alerts_suppressed += o.alerts_suppressed;
        self.alerts_sent += o.alerts_sent;
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users={} symbols={} failed={} triggered={} suppressed={} sent={}",
            self.users_checked,
            self.symbols_checked,
            self.symbols_failed,
            self.alerts_triggered,
            self.alerts_suppressed,
            self.alerts_sent
        )
    }
}
