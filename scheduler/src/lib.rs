//! The dispatch loop.
//!
//! For each check cycle it:
//!   1. Loads every user with their watchlist, enabled rules and channels.
//!   2. Fetches current and historical snapshots per watched symbol.
//!   3. Runs the rule engine and ranks the resulting events by severity.
//!   4. Passes each event through the cooldown gate and delivers survivors.

pub mod channels;
pub mod health;
pub mod market_hours;
pub mod monitor;
pub mod report;

pub use channels::{ChannelBuilder, ConfiguredChannels, DiscordOptions};
pub use health::HealthReport;
pub use market_hours::is_market_open;
pub use monitor::{Monitor, MonitorSettings};
pub use report::CycleReport;
