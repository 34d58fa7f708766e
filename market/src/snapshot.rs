use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::MarketDataError;

/// Number of trailing sessions that feed the average volume.
pub const AVG_VOLUME_WINDOW: usize = 20;

/// Relative change from `base` to `value` in percent.
///
/// A zero base yields 0 rather than an infinity or NaN.
pub fn percent_change(base: f64, value: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    (value - base) / base * 100.0
}

/// Latest quote for one ticker, produced once per check cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentSnapshot {
    pub ticker: String,
    pub price: f64,
    pub previous_close: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    pub observed_at: DateTime<Utc>,
}

impl CurrentSnapshot {
    /// Change of the current price against the previous close, in percent.
    pub fn daily_change_pct(&self) -> f64 {
        percent_change(self.previous_close, self.price)
    }
}

/// Windowed history for one ticker (typically the last 30 sessions).
///
/// `prices` and `volumes` are daily closes and volumes, oldest first, and
/// always have the same length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSnapshot {
    pub ticker: String,
    pub monthly_high: f64,
    pub monthly_low: f64,
    pub avg_volume_20d: f64,
    pub prices: Vec<f64>,
    pub volumes: Vec<u64>,
}

impl HistoricalSnapshot {
    /// Derives the window extremes and the trailing average volume from raw
    /// daily series.
    pub fn from_series(
        ticker: impl Into<String>,
        prices: Vec<f64>,
        volumes: Vec<u64>,
    ) -> Result<Self, MarketDataError> {
        let ticker = ticker.into();

        if prices.len() != volumes.len() {
            return Err(MarketDataError::MismatchedSeries {
                ticker,
                prices: prices.len(),
                volumes: volumes.len(),
            });
        }

        let (monthly_high, monthly_low) = if prices.is_empty() {
            (0.0, 0.0)
        } else {
            prices
                .iter()
                .fold((f64::MIN, f64::MAX), |(hi, lo), p| (hi.max(*p), lo.min(*p)))
        };

        let tail = &volumes[volumes.len().saturating_sub(AVG_VOLUME_WINDOW)..];
        let avg_volume_20d = if tail.is_empty() {
            0.0
        } else {
            tail.iter().map(|v| *v as f64).sum::<f64>() / tail.len() as f64
        };

        Ok(Self {
            ticker,
            monthly_high,
            monthly_low,
            avg_volume_20d,
            prices,
            volumes,
        })
    }

    /// Distance of `price` below the window high, in percent (negative when below).
    pub fn drop_from_high(&self, price: f64) -> f64 {
        percent_change(self.monthly_high, price)
    }

    /// Distance of `price` above the window low, in percent (positive when above).
    pub fn rise_from_low(&self, price: f64) -> f64 {
        percent_change(self.monthly_low, price)
    }

    /// Current volume as a multiple of the trailing average.
    pub fn volume_ratio(&self, volume: u64) -> f64 {
        if self.avg_volume_20d == 0.0 {
            return 0.0;
        }
        volume as f64 / self.avg_volume_20d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn current(price: f64, previous_close: f64) -> CurrentSnapshot {
        CurrentSnapshot {
            ticker: "AAPL".into(),
            price,
            previous_close,
            open: price,
            high: price,
            low: price,
            volume: 50_000_000,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn daily_change_is_relative_to_previous_close() {
        let snap = current(260.0, 240.0);
        assert!((snap.daily_change_pct() - 8.333_333).abs() < 1e-4);
    }

    #[test]
    fn zero_previous_close_yields_zero_change() {
        assert_eq!(current(100.0, 0.0).daily_change_pct(), 0.0);
    }

    #[test]
    fn empty_series_defaults_to_zero() {
        let hist = HistoricalSnapshot::from_series("AAPL", vec![], vec![]).unwrap();

        assert_eq!(hist.monthly_high, 0.0);
        assert_eq!(hist.monthly_low, 0.0);
        assert_eq!(hist.avg_volume_20d, 0.0);
        assert_eq!(hist.drop_from_high(150.0), 0.0);
        assert_eq!(hist.rise_from_low(150.0), 0.0);
        assert_eq!(hist.volume_ratio(1_000), 0.0);
    }

    #[test]
    fn average_volume_uses_trailing_twenty_sessions() {
        // 10 early sessions at 1_000, then 20 sessions at 3_000.
        let mut volumes = vec![1_000u64; 10];
        volumes.extend(vec![3_000u64; 20]);
        let prices = vec![10.0; 30];

        let hist = HistoricalSnapshot::from_series("MSFT", prices, volumes).unwrap();
        assert_eq!(hist.avg_volume_20d, 3_000.0);
    }

    #[test]
    fn short_history_averages_everything() {
        let hist =
            HistoricalSnapshot::from_series("MSFT", vec![1.0, 2.0, 3.0], vec![10, 20, 30]).unwrap();

        assert_eq!(hist.avg_volume_20d, 20.0);
        assert_eq!(hist.monthly_high, 3.0);
        assert_eq!(hist.monthly_low, 1.0);
    }

    #[test]
    fn mismatched_series_are_rejected() {
        let err = HistoricalSnapshot::from_series("MSFT", vec![1.0, 2.0], vec![10]).unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::MismatchedSeries {
                prices: 2,
                volumes: 1,
                ..
            }
        ));
    }

    #[test]
    fn drop_from_high_matches_reference_values() {
        let hist =
            HistoricalSnapshot::from_series("AAPL", vec![185.0, 170.0], vec![1, 1]).unwrap();
        assert!((hist.drop_from_high(165.0) + 10.8108).abs() < 1e-3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn extremes_bound_every_price(
            series in proptest::collection::vec((0.01f64..10_000.0, 0u64..1_000_000_000), 1..60)
        ) {
            let (prices, volumes): (Vec<f64>, Vec<u64>) = series.into_iter().unzip();
            let hist = HistoricalSnapshot::from_series("X", prices.clone(), volumes).unwrap();

            for p in prices {
                prop_assert!(hist.monthly_high >= p);
                prop_assert!(hist.monthly_low <= p);
            }
        }

        #[test]
        fn zero_denominators_never_propagate(price in -1e6f64..1e6) {
            prop_assert_eq!(percent_change(0.0, price), 0.0);
        }
    }
}
