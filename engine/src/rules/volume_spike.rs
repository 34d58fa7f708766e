use market::{CurrentSnapshot, HistoricalSnapshot};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{Evaluate, decode_params, invalid};
use crate::alert::{AlertEvent, Severity};
use crate::config::RuleKind;
use crate::error::EngineError;

/// Ratio, relative to the configured multiplier, at which a spike escalates
/// from INFO to WARNING.
const WARNING_FACTOR: f64 = 1.5;

#[derive(Deserialize)]
struct VolumeSpikeParams {
    #[serde(default = "default_multiplier")]
    multiplier: f64,
    #[serde(default = "default_average_days")]
    average_days: u32,
}

fn default_multiplier() -> f64 {
    3.0
}

fn default_average_days() -> u32 {
    20
}

/// Current volume against the trailing average volume.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSpikeRule {
    multiplier: f64,
    average_days: u32,
}

impl VolumeSpikeRule {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            average_days: default_average_days(),
        }
    }

    pub fn from_params(parameters: &Value) -> Result<Self, EngineError> {
        let p: VolumeSpikeParams = decode_params(RuleKind::VolumeSpike, parameters)?;

        if !p.multiplier.is_finite() || p.multiplier <= 0.0 {
            return Err(invalid(
                RuleKind::VolumeSpike,
                "multiplier must be a positive number",
            ));
        }

        Ok(Self {
            multiplier: p.multiplier,
            average_days: p.average_days,
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "Volume Spike: {}x the {}-day average",
            self.multiplier, self.average_days
        )
    }
}

impl Evaluate for VolumeSpikeRule {
    fn evaluate(
        &self,
        current: &CurrentSnapshot,
        historical: Option<&HistoricalSnapshot>,
    ) -> Vec<AlertEvent> {
        let Some(hist) = historical else {
            return Vec::new();
        };

        let ratio = hist.volume_ratio(current.volume);
        if ratio < self.multiplier {
            return Vec::new();
        }

        let severity = if ratio >= self.multiplier * WARNING_FACTOR {
            Severity::Warning
        } else {
            Severity::Info
        };

        let mut metadata = Map::new();
        metadata.insert("multiplier".into(), json!(self.multiplier));
        metadata.insert("ratio".into(), json!(ratio));
        metadata.insert("average_volume".into(), json!(hist.avg_volume_20d));
        metadata.insert("average_days".into(), json!(self.average_days));

        vec![AlertEvent {
            ticker: current.ticker.clone(),
            rule_type: RuleKind::VolumeSpike,
            message: format!(
                "{} volume spike: {:.1}x the average ({} vs {:.0})",
                current.ticker, ratio, current.volume, hist.avg_volume_20d
            ),
            severity,
            current_price: current.price,
            triggered_at: current.observed_at,
            metadata,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::{current, history};

    fn hist() -> HistoricalSnapshot {
        history("TSLA", 260.0, 200.0, 40_000_000.0)
    }

    #[test]
    fn ratio_above_multiplier_fires_once() {
        let events = VolumeSpikeRule::new(3.0)
            .evaluate(&current("TSLA", 250.0, 245.0, 150_000_000), Some(&hist()));

        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("volume"));
        assert!(events[0].message.contains("3.8x"));
        assert_eq!(events[0].severity, Severity::Info);
        assert_eq!(events[0].metadata_f64("ratio"), Some(3.75));
    }

    #[test]
    fn ratio_below_multiplier_fires_nothing() {
        let events = VolumeSpikeRule::new(3.0)
            .evaluate(&current("TSLA", 250.0, 245.0, 100_000_000), Some(&hist()));
        assert!(events.is_empty());
    }

    #[test]
    fn markedly_large_ratio_is_a_warning() {
        let events = VolumeSpikeRule::new(3.0)
            .evaluate(&current("TSLA", 250.0, 245.0, 200_000_000), Some(&hist()));
        assert_eq!(events[0].severity, Severity::Warning);
    }

    #[test]
    fn zero_average_never_fires() {
        let events = VolumeSpikeRule::new(3.0).evaluate(
            &current("TSLA", 250.0, 245.0, 200_000_000),
            Some(&history("TSLA", 1.0, 1.0, 0.0)),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn multiplier_must_be_positive() {
        assert!(VolumeSpikeRule::from_params(&json!({ "multiplier": 0 })).is_err());
        assert!(VolumeSpikeRule::from_params(&json!({ "multiplier": "lots" })).is_err());

        let rule = VolumeSpikeRule::from_params(&json!({ "average_days": 10 })).unwrap();
        assert_eq!(rule.summary(), "Volume Spike: 3x the 10-day average");
    }
}
