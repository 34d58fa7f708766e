//! Market data: point-in-time and windowed snapshots for one ticker, the
//! provider seam the dispatch loop fetches them through, and the exchange
//! symbol directory.

pub mod provider;
pub mod snapshot;
pub mod symbols;
pub mod yahoo;

pub use provider::{MarketDataError, MarketDataProvider};
pub use snapshot::{CurrentSnapshot, HistoricalSnapshot};
pub use symbols::{ListedSymbol, SymbolKind};
