use market::{CurrentSnapshot, HistoricalSnapshot};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{Evaluate, decode_params, invalid};
use crate::alert::{AlertEvent, Severity};
use crate::config::RuleKind;
use crate::error::EngineError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Both,
}

#[derive(Deserialize)]
struct DailyChangeParams {
    #[serde(default = "default_threshold")]
    threshold: f64,
    #[serde(default)]
    direction: Direction,
}

fn default_threshold() -> f64 {
    5.0
}

/// Move of the current price against the previous close.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyChangeRule {
    threshold: f64,
    direction: Direction,
}

impl DailyChangeRule {
    pub fn new(threshold: f64, direction: Direction) -> Self {
        Self {
            threshold,
            direction,
        }
    }

    pub fn from_params(parameters: &Value) -> Result<Self, EngineError> {
        let p: DailyChangeParams = decode_params(RuleKind::DailyChange, parameters)?;

        if !p.threshold.is_finite() || p.threshold < 0.0 {
            return Err(invalid(
                RuleKind::DailyChange,
                "threshold must be a non-negative number",
            ));
        }

        Ok(Self::new(p.threshold, p.direction))
    }

    pub fn summary(&self) -> String {
        let dir = match self.direction {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Both => "either way",
        };
        format!("Daily Change: {}% {}", self.threshold, dir)
    }

    fn triggered(&self, change: f64) -> bool {
        match self.direction {
            Direction::Both => change.abs() >= self.threshold,
            Direction::Up => change >= self.threshold,
            Direction::Down => change <= -self.threshold,
        }
    }
}

impl Evaluate for DailyChangeRule {
    fn evaluate(
        &self,
        current: &CurrentSnapshot,
        _historical: Option<&HistoricalSnapshot>,
    ) -> Vec<AlertEvent> {
        let change = current.daily_change_pct();
        if !self.triggered(change) {
            return Vec::new();
        }

        let kind = if change >= 0.0 { "surge" } else { "drop" };
        let severity = if change.abs() >= 2.0 * self.threshold {
            Severity::Warning
        } else {
            Severity::Info
        };

        let mut metadata = Map::new();
        metadata.insert("threshold".into(), json!(self.threshold));
        metadata.insert("change_pct".into(), json!(change));
        metadata.insert("previous_close".into(), json!(current.previous_close));

        vec![AlertEvent {
            ticker: current.ticker.clone(),
            rule_type: RuleKind::DailyChange,
            message: format!(
                "{} daily {}: {:+.2}% (${:.2} -> ${:.2})",
                current.ticker, kind, change, current.previous_close, current.price
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
    use crate::rules::fixtures::current;

    #[test]
    fn surge_above_threshold_fires_once() {
        let rule = DailyChangeRule::new(5.0, Direction::Both);
        let events = rule.evaluate(&current("MSFT", 260.0, 240.0, 1), None);

        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert!(e.message.contains("surge"));
        assert!(e.message.contains("+8.33%"));
        assert_eq!(e.severity, Severity::Info);
        assert_eq!(e.rule_type, RuleKind::DailyChange);
    }

    #[test]
    fn small_move_fires_nothing() {
        let rule = DailyChangeRule::new(5.0, Direction::Both);
        assert!(rule.evaluate(&current("AAPL", 172.0, 170.0, 1), None).is_empty());
    }

    #[test]
    fn direction_filters_the_sign() {
        let drop = current("NVDA", 90.0, 100.0, 1);
        let surge = current("NVDA", 110.0, 100.0, 1);

        let up = DailyChangeRule::new(5.0, Direction::Up);
        assert!(up.evaluate(&drop, None).is_empty());
        assert_eq!(up.evaluate(&surge, None).len(), 1);

        let down = DailyChangeRule::new(5.0, Direction::Down);
        let events = down.evaluate(&drop, None);
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("drop"));
        assert!(events[0].message.contains("-10.00%"));
        assert!(down.evaluate(&surge, None).is_empty());
    }

    #[test]
    fn double_threshold_escalates_to_warning() {
        let rule = DailyChangeRule::new(5.0, Direction::Both);
        let events = rule.evaluate(&current("AMD", 88.0, 100.0, 1), None);
        assert_eq!(events[0].severity, Severity::Warning);
    }

    #[test]
    fn zero_previous_close_never_fires() {
        let rule = DailyChangeRule::new(5.0, Direction::Both);
        assert!(rule.evaluate(&current("NEW", 12.0, 0.0, 1), None).is_empty());
    }

    #[test]
    fn parameters_fill_defaults_and_reject_garbage() {
        let rule = DailyChangeRule::from_params(&json!({ "direction": "down" })).unwrap();
        assert_eq!(rule, DailyChangeRule::new(5.0, Direction::Down));

        assert!(DailyChangeRule::from_params(&json!({ "direction": "sideways" })).is_err());
        assert!(DailyChangeRule::from_params(&json!({ "threshold": -1.0 })).is_err());
    }
}
