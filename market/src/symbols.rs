//! Exchange symbol directory.
//!
//! Both listings are pipe-delimited text files with a header row and a
//! trailing `File Creation Time` line.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use common::warn_if_slow;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::provider::MarketDataError;

pub const NASDAQ_LISTED_URL: &str = "https://www.nasdaqtrader.com/dynamic/symdir/nasdaqlisted.txt";
pub const OTHER_LISTED_URL: &str = "https://www.nasdaqtrader.com/dynamic/symdir/otherlisted.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Stock,
    Etf,
    Index,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Stock => "stock",
            SymbolKind::Etf => "etf",
            SymbolKind::Index => "index",
        };
        f.write_str(s)
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock" => Ok(SymbolKind::Stock),
            "etf" => Ok(SymbolKind::Etf),
            "index" => Ok(SymbolKind::Index),
            other => Err(format!("invalid symbol kind: {other}")),
        }
    }
}

/// One row of an exchange listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedSymbol {
    pub ticker: String,
    pub name: String,
    pub kind: SymbolKind,
    pub exchange: String,
}

fn data_lines(text: &str) -> impl Iterator<Item = &str> {
    text.trim()
        .lines()
        .skip(1)
        .filter(|l| !l.starts_with("File Creation Time"))
}

fn flag(parts: &[&str], idx: usize) -> bool {
    parts.get(idx).is_some_and(|p| p.trim() == "Y")
}

/// Parses `nasdaqlisted.txt`.
///
/// Columns: Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares
pub fn parse_nasdaq_listed(text: &str) -> Vec<ListedSymbol> {
    data_lines(text)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() < 2 {
                return None;
            }

            let ticker = parts[0].trim();
            if ticker.is_empty() || flag(&parts, 3) {
                return None;
            }

            Some(ListedSymbol {
                ticker: ticker.to_string(),
                name: parts[1].trim().to_string(),
                kind: if flag(&parts, 6) {
                    SymbolKind::Etf
                } else {
                    SymbolKind::Stock
                },
                exchange: "NASDAQ".to_string(),
            })
        })
        .collect()
}

/// Parses `otherlisted.txt` (NYSE, NYSE American, Arca, ...).
///
/// Columns: ACT Symbol|Security Name|Exchange|CQS Symbol|ETF|Round Lot Size|Test Issue|NASDAQ Symbol
pub fn parse_other_listed(text: &str) -> Vec<ListedSymbol> {
    data_lines(text)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() < 3 {
                return None;
            }

            let ticker = parts[0].trim();
            if ticker.is_empty() {
                return None;
            }

            let exchange = parts[2].trim();

            Some(ListedSymbol {
                ticker: ticker.to_string(),
                name: parts[1].trim().to_string(),
                kind: if flag(&parts, 4) {
                    SymbolKind::Etf
                } else {
                    SymbolKind::Stock
                },
                exchange: if exchange.is_empty() {
                    "NYSE".to_string()
                } else {
                    exchange.to_string()
                },
            })
        })
        .collect()
}

/// Downloads both listings.
#[derive(Clone)]
pub struct SymbolSync {
    http: Client,
    nasdaq_url: String,
    other_url: String,
}

impl SymbolSync {
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_urls(NASDAQ_LISTED_URL, OTHER_LISTED_URL)
    }

    pub fn with_urls(
        nasdaq_url: impl Into<String>,
        other_url: impl Into<String>,
    ) -> Result<Self, MarketDataError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            nasdaq_url: nasdaq_url.into(),
            other_url: other_url.into(),
        })
    }

    async fn download(&self, url: &str) -> Result<String, MarketDataError> {
        let text = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }

    /// Fetches every listing. A source that fails to download contributes
    /// nothing; the other source is still returned.
    pub async fn fetch_all(&self) -> Vec<ListedSymbol> {
        let (nasdaq, other) = warn_if_slow("symbol_download", Duration::from_secs(20), async {
            tokio::join!(self.download(&self.nasdaq_url), self.download(&self.other_url))
        })
        .await;

        let mut out = Vec::new();

        match nasdaq {
            Ok(text) => out.extend(parse_nasdaq_listed(&text)),
            Err(e) => warn!(error = %e, url = %self.nasdaq_url, "nasdaq listing download failed"),
        }

        match other {
            Ok(text) => out.extend(parse_other_listed(&text)),
            Err(e) => warn!(error = %e, url = %self.other_url, "other listing download failed"),
        }

        info!(count = out.len(), "symbol directory fetched");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NASDAQ: &str = "\
Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares
AAPL|Apple Inc. - Common Stock|Q|N|N|100|N|N
QQQ|Invesco QQQ Trust, Series 1|G|N|N|100|Y|N
ZXZZT|NASDAQ TEST STOCK|G|Y|N|100|N|N
|Blank ticker|Q|N|N|100|N|N
File Creation Time: 0101202512:00|||||||
";

    const OTHER: &str = "\
ACT Symbol|Security Name|Exchange|CQS Symbol|ETF|Round Lot Size|Test Issue|NASDAQ Symbol
IBM|International Business Machines|N|IBM|N|100|N|IBM
SPY|SPDR S&P 500 ETF Trust|P|SPY|Y|100|N|SPY
XYZ|No Exchange Corp||XYZ|N|100|N|XYZ
File Creation Time: 0101202512:00|||||||
";

    #[test]
    fn nasdaq_listing_skips_test_issues_and_footer() {
        let symbols = parse_nasdaq_listed(NASDAQ);
        let tickers: Vec<_> = symbols.iter().map(|s| s.ticker.as_str()).collect();

        assert_eq!(tickers, vec!["AAPL", "QQQ"]);
        assert_eq!(symbols[0].kind, SymbolKind::Stock);
        assert_eq!(symbols[1].kind, SymbolKind::Etf);
        assert!(symbols.iter().all(|s| s.exchange == "NASDAQ"));
    }

    #[test]
    fn other_listing_keeps_exchange_code() {
        let symbols = parse_other_listed(OTHER);

        assert_eq!(symbols.len(), 3);
        assert_eq!(symbols[0].exchange, "N");
        assert_eq!(symbols[1].kind, SymbolKind::Etf);
        assert_eq!(symbols[2].exchange, "NYSE");
    }

    #[test]
    fn empty_listing_yields_nothing() {
        assert!(parse_nasdaq_listed("").is_empty());
        assert!(parse_other_listed("header only").is_empty());
    }

    #[test]
    fn symbol_kind_round_trips_through_text() {
        for kind in [SymbolKind::Stock, SymbolKind::Etf, SymbolKind::Index] {
            assert_eq!(kind.to_string().parse::<SymbolKind>().unwrap(), kind);
        }
        assert!("bond".parse::<SymbolKind>().is_err());
    }
}
