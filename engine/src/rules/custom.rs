use market::{CurrentSnapshot, HistoricalSnapshot};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{Evaluate, decode_params};
use crate::alert::{AlertEvent, Severity};
use crate::config::RuleKind;
use crate::error::EngineError;
use crate::expr::{Bindings, Condition};

#[derive(Deserialize)]
struct CustomParams {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_condition")]
    condition: String,
}

fn default_name() -> String {
    "Custom Rule".to_string()
}

fn default_condition() -> String {
    "False".to_string()
}

/// User-written condition, parsed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomRule {
    name: String,
    condition: Condition,
}

impl CustomRule {
    pub fn new(name: impl Into<String>, condition: &str) -> Result<Self, EngineError> {
        let condition =
            Condition::parse(condition).map_err(|source| EngineError::InvalidCondition {
                condition: condition.to_string(),
                source,
            })?;

        Ok(Self {
            name: name.into(),
            condition,
        })
    }

    pub fn from_params(parameters: &Value) -> Result<Self, EngineError> {
        let p: CustomParams = decode_params(RuleKind::Custom, parameters)?;
        Self::new(p.name, &p.condition)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> String {
        format!("{}: {}", self.name, self.condition.source())
    }
}

impl Evaluate for CustomRule {
    fn evaluate(
        &self,
        current: &CurrentSnapshot,
        historical: Option<&HistoricalSnapshot>,
    ) -> Vec<AlertEvent> {
        let bindings = Bindings::from_snapshots(current, historical);
        if !self.condition.eval(&bindings) {
            return Vec::new();
        }

        let mut metadata = Map::new();
        metadata.insert("name".into(), json!(self.name));
        metadata.insert("condition".into(), json!(self.condition.source()));

        vec![AlertEvent {
            ticker: current.ticker.clone(),
            rule_type: RuleKind::Custom,
            message: format!(
                "{}: {} matched `{}` at ${:.2}",
                self.name,
                current.ticker,
                self.condition.source(),
                current.price
            ),
            severity: Severity::Info,
            current_price: current.price,
            triggered_at: current.observed_at,
            metadata,
        }]
    }
}
