use market::{CurrentSnapshot, HistoricalSnapshot};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{Evaluate, decode_params, invalid};
use crate::alert::{AlertEvent, Severity};
use crate::config::RuleKind;
use crate::error::EngineError;

/// Reference point the ladder measures against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LadderAnchor {
    /// Fires as the price falls through negative thresholds below the high.
    MonthlyHigh,
    /// Fires as the price climbs through positive thresholds above the low.
    MonthlyLow,
}

#[derive(Deserialize)]
struct LadderParams {
    thresholds: Option<Vec<f64>>,
}

/// Severity of a crossed rung, by its magnitude.
///
/// |t| < 10 is INFO, 10 <= |t| < 20 is WARNING, |t| >= 20 is CRITICAL.
pub fn rung_severity(threshold: f64) -> Severity {
    let magnitude = threshold.abs();
    if magnitude >= 20.0 {
        Severity::Critical
    } else if magnitude >= 10.0 {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Percentage ladder against the monthly high (drop) or low (rise).
///
/// Every rung the price has crossed fires its own event, so a deep move
/// reports all the intermediate levels in one evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdLadderRule {
    anchor: LadderAnchor,
    thresholds: Vec<f64>,
}

impl ThresholdLadderRule {
    pub const DEFAULT_DROP: [f64; 4] = [-5.0, -10.0, -15.0, -20.0];
    pub const DEFAULT_RISE: [f64; 4] = [5.0, 10.0, 15.0, 20.0];

    pub fn new(anchor: LadderAnchor, thresholds: Vec<f64>) -> Self {
        Self { anchor, thresholds }
    }

    pub fn from_params(anchor: LadderAnchor, parameters: &Value) -> Result<Self, EngineError> {
        let kind = match anchor {
            LadderAnchor::MonthlyHigh => RuleKind::MonthlyHighDrop,
            LadderAnchor::MonthlyLow => RuleKind::MonthlyLowRise,
        };

        let p: LadderParams = decode_params(kind, parameters)?;
        let thresholds = p.thresholds.unwrap_or_else(|| match anchor {
            LadderAnchor::MonthlyHigh => Self::DEFAULT_DROP.to_vec(),
            LadderAnchor::MonthlyLow => Self::DEFAULT_RISE.to_vec(),
        });

        if thresholds.iter().any(|t| !t.is_finite()) {
            return Err(invalid(kind, "thresholds must be finite numbers"));
        }

        Ok(Self::new(anchor, thresholds))
    }

    pub fn kind(&self) -> RuleKind {
        match self.anchor {
            LadderAnchor::MonthlyHigh => RuleKind::MonthlyHighDrop,
            LadderAnchor::MonthlyLow => RuleKind::MonthlyLowRise,
        }
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn summary(&self) -> String {
        let rungs = self
            .thresholds
            .iter()
            .map(|t| format!("{t:+}%"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}: {}", self.kind().title(), rungs)
    }

    fn crossed(&self, move_pct: f64, threshold: f64) -> bool {
        match self.anchor {
            LadderAnchor::MonthlyHigh => move_pct <= threshold,
            LadderAnchor::MonthlyLow => move_pct >= threshold,
        }
    }
}

impl Evaluate for ThresholdLadderRule {
    fn evaluate(
        &self,
        current: &CurrentSnapshot,
        historical: Option<&HistoricalSnapshot>,
    ) -> Vec<AlertEvent> {
        let Some(hist) = historical else {
            return Vec::new();
        };

        let (reference, move_pct, label, verb) = match self.anchor {
            LadderAnchor::MonthlyHigh => (
                hist.monthly_high,
                hist.drop_from_high(current.price),
                "monthly high",
                "down",
            ),
            LadderAnchor::MonthlyLow => (
                hist.monthly_low,
                hist.rise_from_low(current.price),
                "monthly low",
                "up",
            ),
        };

        self.thresholds
            .iter()
            .copied()
            .filter(|t| self.crossed(move_pct, *t))
            .map(|t| {
                let mut metadata = Map::new();
                metadata.insert("threshold".into(), json!(t));
                metadata.insert("change_pct".into(), json!(move_pct));
                metadata.insert("reference_price".into(), json!(reference));

                AlertEvent {
                    ticker: current.ticker.clone(),
                    rule_type: self.kind(),
                    message: format!(
                        "{} is {} {:.1}% from its {} of ${:.2} (now ${:.2}, crossed {}%)",
                        current.ticker,
                        verb,
                        move_pct.abs(),
                        label,
                        reference,
                        current.price,
                        t
                    ),
                    severity: rung_severity(t),
                    current_price: current.price,
                    triggered_at: current.observed_at,
                    metadata,
                }
            })
            .collect()
    }
}
