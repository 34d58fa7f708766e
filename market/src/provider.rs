use async_trait::async_trait;
use thiserror::Error;

use crate::snapshot::{CurrentSnapshot, HistoricalSnapshot};

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("invalid symbol or no data available: {0}")]
    NoData(String),

    #[error("no historical data available: {0}")]
    NoHistory(String),

    #[error("history for {ticker} has {prices} prices but {volumes} volumes")]
    MismatchedSeries {
        ticker: String,
        prices: usize,
        volumes: usize,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("invalid provider url {0}")]
    InvalidUrl(String),
}

/// Source of snapshots for the dispatch loop.
///
/// Implementations own their transport concerns (timeouts, retries); callers
/// treat any error as "this symbol is unavailable for this cycle".
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn current(&self, ticker: &str) -> Result<CurrentSnapshot, MarketDataError>;

    async fn historical(
        &self,
        ticker: &str,
        days: u32,
    ) -> Result<HistoricalSnapshot, MarketDataError>;
}
