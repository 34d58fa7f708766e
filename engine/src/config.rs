use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Closed set of rule-type tags understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    MonthlyHighDrop,
    MonthlyLowRise,
    DailyChange,
    VolumeSpike,
    Custom,
}

impl RuleKind {
    pub const ALL: [RuleKind; 5] = [
        RuleKind::MonthlyHighDrop,
        RuleKind::MonthlyLowRise,
        RuleKind::DailyChange,
        RuleKind::VolumeSpike,
        RuleKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::MonthlyHighDrop => "monthly_high_drop",
            RuleKind::MonthlyLowRise => "monthly_low_rise",
            RuleKind::DailyChange => "daily_change",
            RuleKind::VolumeSpike => "volume_spike",
            RuleKind::Custom => "custom",
        }
    }

    /// Human-readable label, e.g. `Monthly High Drop`.
    pub fn title(&self) -> String {
        self.as_str()
            .split('_')
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| EngineError::UnknownRuleType(s.to_string()))
    }
}

/// A user's stored rule, read-only to the engine.
///
/// `rule_type` stays a free-form tag so that rows written by other tools
/// (or older versions) still load; the engine rejects unknown tags when it
/// builds the evaluator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub id: Option<i64>,
    pub user_id: i64,
    pub rule_type: String,
    /// Keys are interpreted per rule type.
    pub parameters: Value,
    pub enabled: bool,
    /// `None` applies the rule to every watchlisted symbol.
    pub symbol_id: Option<i64>,
}

impl RuleConfig {
    pub fn new(user_id: i64, kind: RuleKind, parameters: Value) -> Self {
        Self {
            id: None,
            user_id,
            rule_type: kind.as_str().to_string(),
            parameters,
            enabled: true,
            symbol_id: None,
        }
    }

    pub fn scoped_to(mut self, symbol_id: i64) -> Self {
        self.symbol_id = Some(symbol_id);
        self
    }

    pub fn applies_to(&self, symbol_id: i64) -> bool {
        self.symbol_id.is_none_or(|s| s == symbol_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tags_round_trip() {
        for kind in RuleKind::ALL {
            assert_eq!(kind.as_str().parse::<RuleKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let err = "unknown_rule".parse::<RuleKind>().unwrap_err();
        assert!(err.to_string().contains("Unknown rule type"));
    }

    #[test]
    fn titles_are_human_readable() {
        assert_eq!(RuleKind::MonthlyHighDrop.title(), "Monthly High Drop");
        assert_eq!(RuleKind::Custom.title(), "Custom");
    }

    #[test]
    fn symbol_scope_filters_rules() {
        let global = RuleConfig::new(1, RuleKind::DailyChange, json!({}));
        let scoped = global.clone().scoped_to(7);

        assert!(global.applies_to(7));
        assert!(global.applies_to(8));
        assert!(scoped.applies_to(7));
        assert!(!scoped.applies_to(8));
    }
}
