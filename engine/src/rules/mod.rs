//! Rule evaluators.
//!
//! A rule:
//! - is built once from validated parameters
//! - holds no mutable state
//! - turns a snapshot pair into zero or more alert events

pub mod custom;
pub mod daily_change;
pub mod ladder;
pub mod volume_spike;

pub use custom::CustomRule;
pub use daily_change::{DailyChangeRule, Direction};
pub use ladder::{LadderAnchor, ThresholdLadderRule};
pub use volume_spike::VolumeSpikeRule;

use market::{CurrentSnapshot, HistoricalSnapshot};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::alert::AlertEvent;
use crate::config::RuleKind;
use crate::error::EngineError;

/// The one capability every rule provides.
pub trait Evaluate {
    fn evaluate(
        &self,
        current: &CurrentSnapshot,
        historical: Option<&HistoricalSnapshot>,
    ) -> Vec<AlertEvent>;
}

/// Closed set of concrete evaluators.
#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    ThresholdLadder(ThresholdLadderRule),
    DailyChange(DailyChangeRule),
    VolumeSpike(VolumeSpikeRule),
    Custom(CustomRule),
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::ThresholdLadder(r) => r.kind(),
            Rule::DailyChange(_) => RuleKind::DailyChange,
            Rule::VolumeSpike(_) => RuleKind::VolumeSpike,
            Rule::Custom(_) => RuleKind::Custom,
        }
    }

    /// One-line description used in status reports.
    pub fn summary(&self) -> String {
        match self {
            Rule::ThresholdLadder(r) => r.summary(),
            Rule::DailyChange(r) => r.summary(),
            Rule::VolumeSpike(r) => r.summary(),
            Rule::Custom(r) => r.summary(),
        }
    }
}

impl Evaluate for Rule {
    fn evaluate(
        &self,
        current: &CurrentSnapshot,
        historical: Option<&HistoricalSnapshot>,
    ) -> Vec<AlertEvent> {
        match self {
            Rule::ThresholdLadder(r) => r.evaluate(current, historical),
            Rule::DailyChange(r) => r.evaluate(current, historical),
            Rule::VolumeSpike(r) => r.evaluate(current, historical),
            Rule::Custom(r) => r.evaluate(current, historical),
        }
    }
}

/// Decodes a rule's parameter mapping; `null` is read as an empty mapping so
/// every key falls back to its default.
pub(crate) fn decode_params<T: DeserializeOwned>(
    kind: RuleKind,
    parameters: &Value,
) -> Result<T, EngineError> {
    let value = match parameters {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };

    serde_json::from_value(value).map_err(|e| EngineError::InvalidParameters {
        rule_type: kind.as_str(),
        reason: e.to_string(),
    })
}

pub(crate) fn invalid(kind: RuleKind, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidParameters {
        rule_type: kind.as_str(),
        reason: reason.into(),
    }
}
