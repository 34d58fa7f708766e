use market::{CurrentSnapshot, HistoricalSnapshot};
use tracing::{debug, warn};

use crate::alert::AlertEvent;
use crate::config::{RuleConfig, RuleKind};
use crate::error::EngineError;
use crate::rules::{
    CustomRule, DailyChangeRule, Evaluate, LadderAnchor, Rule, ThresholdLadderRule,
    VolumeSpikeRule,
};

/// Builds evaluators from stored configurations and runs them in batches.
///
/// Stateless: a single instance can be shared across tasks.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Builds the evaluator for one configuration.
    ///
    /// Fails for an unrecognised tag, malformed parameters, or a custom
    /// condition that does not parse. The `enabled` flag is not consulted.
    pub fn create(&self, config: &RuleConfig) -> Result<Rule, EngineError> {
        let kind: RuleKind = config.rule_type.parse()?;
        let params = &config.parameters;

        let rule = match kind {
            RuleKind::MonthlyHighDrop => Rule::ThresholdLadder(ThresholdLadderRule::from_params(
                LadderAnchor::MonthlyHigh,
                params,
            )?),
            RuleKind::MonthlyLowRise => Rule::ThresholdLadder(ThresholdLadderRule::from_params(
                LadderAnchor::MonthlyLow,
                params,
            )?),
            RuleKind::DailyChange => Rule::DailyChange(DailyChangeRule::from_params(params)?),
            RuleKind::VolumeSpike => Rule::VolumeSpike(VolumeSpikeRule::from_params(params)?),
            RuleKind::Custom => Rule::Custom(CustomRule::from_params(params)?),
        };

        Ok(rule)
    }

    /// Runs every enabled rule against one symbol's snapshots.
    ///
    /// A rule that fails to build is logged and skipped; the rest still run.
    /// Events are concatenated in rule input order.
    pub fn evaluate_rules(
        &self,
        rules: &[RuleConfig],
        current: &CurrentSnapshot,
        historical: Option<&HistoricalSnapshot>,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for config in rules.iter().filter(|r| r.enabled) {
            let rule = match self.create(config) {
                Ok(rule) => rule,
                Err(e) => {
                    warn!(
                        rule_id = ?config.id,
                        rule_type = %config.rule_type,
                        ticker = %current.ticker,
                        error = %e,
                        "Skipping rule that failed to build"
                    );
                    continue;
                }
            };

            let fired = rule.evaluate(current, historical);
            if !fired.is_empty() {
                debug!(
                    rule_type = %config.rule_type,
                    ticker = %current.ticker,
                    count = fired.len(),
                    "Rule triggered"
                );
            }
            events.extend(fired);
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Severity;
    use crate::rules::fixtures::{current, history};
    use proptest::prelude::*;
    use serde_json::json;
    use tracing_test::traced_test;

    fn engine() -> RuleEngine {
        RuleEngine::new()
    }

    #[test]
    fn create_dispatches_every_known_tag() {
        for kind in RuleKind::ALL {
            let rule = engine()
                .create(&RuleConfig::new(1, kind, json!({})))
                .unwrap();
            assert_eq!(rule.kind(), kind);
        }
    }

    #[test]
    fn create_surfaces_unknown_rule_type() {
        let mut config = RuleConfig::new(1, RuleKind::Custom, json!({}));
        config.rule_type = "moon_phase".into();

        let err = engine().create(&config).unwrap_err();
        assert!(matches!(err, EngineError::UnknownRuleType(ref t) if t == "moon_phase"));
    }

    #[test]
    fn create_surfaces_bad_condition() {
        let config = RuleConfig::new(1, RuleKind::Custom, json!({ "condition": "price >" }));
        assert!(matches!(
            engine().create(&config),
            Err(EngineError::InvalidCondition { .. })
        ));
    }

    #[traced_test]
    #[test]
    fn batch_skips_broken_rules_and_keeps_the_rest() {
        let mut unknown = RuleConfig::new(1, RuleKind::Custom, json!({}));
        unknown.rule_type = "unknown_type".into();
        let valid = RuleConfig::new(1, RuleKind::DailyChange, json!({ "threshold": 5.0 }));

        let events = engine().evaluate_rules(
            &[unknown, valid],
            &current("MSFT", 260.0, 240.0, 1),
            None,
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rule_type, RuleKind::DailyChange);
        assert!(logs_contain("Skipping rule that failed to build"));
    }

    #[test]
    fn overly_nested_condition_is_skipped_without_blocking_others() {
        let condition = format!("{}price > 1{}", "(".repeat(20_000), ")".repeat(20_000));
        let deep = RuleConfig::new(1, RuleKind::Custom, json!({ "condition": condition }));
        let chained = RuleConfig::new(
            1,
            RuleKind::Custom,
            json!({ "condition": vec!["price > 1"; 200_000].join(" and ") }),
        );
        let valid = RuleConfig::new(1, RuleKind::DailyChange, json!({ "threshold": 5.0 }));

        assert!(engine().create(&deep).is_err());
        let events = engine().evaluate_rules(
            &[deep, chained, valid],
            &current("MSFT", 260.0, 240.0, 1),
            None,
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rule_type, RuleKind::DailyChange);
    }

    #[test]
    fn disabled_rules_contribute_nothing() {
        let mut disabled = RuleConfig::new(1, RuleKind::DailyChange, json!({ "threshold": 1.0 }));
        disabled.enabled = false;

        let events =
            engine().evaluate_rules(&[disabled], &current("MSFT", 260.0, 240.0, 1), None);
        assert!(events.is_empty());
    }

    #[test]
    fn events_follow_rule_input_order() {
        let rules = [
            RuleConfig::new(1, RuleKind::VolumeSpike, json!({ "multiplier": 3.0 })),
            RuleConfig::new(1, RuleKind::MonthlyHighDrop, json!({})),
            RuleConfig::new(1, RuleKind::DailyChange, json!({})),
        ];

        let events = engine().evaluate_rules(
            &rules,
            &current("AAPL", 140.0, 170.0, 200_000_000),
            Some(&history("AAPL", 185.0, 130.0, 40_000_000.0)),
        );

        let kinds: Vec<_> = events.iter().map(|e| e.rule_type).collect();
        assert_eq!(
            kinds,
            vec![
                RuleKind::VolumeSpike,
                RuleKind::MonthlyHighDrop,
                RuleKind::MonthlyHighDrop,
                RuleKind::MonthlyHighDrop,
                RuleKind::MonthlyHighDrop,
                RuleKind::DailyChange,
            ]
        );
        assert_eq!(events[4].severity, Severity::Critical);
    }

    #[test]
    fn ladder_needs_history() {
        let rules = [RuleConfig::new(1, RuleKind::MonthlyHighDrop, json!({}))];
        let events = engine().evaluate_rules(&rules, &current("AAPL", 1.0, 170.0, 1), None);
        assert!(events.is_empty());
    }

    fn all_rules() -> Vec<RuleConfig> {
        vec![
            RuleConfig::new(1, RuleKind::MonthlyHighDrop, json!({})),
            RuleConfig::new(1, RuleKind::MonthlyLowRise, json!({})),
            RuleConfig::new(1, RuleKind::DailyChange, json!({ "threshold": 2.0 })),
            RuleConfig::new(1, RuleKind::VolumeSpike, json!({ "multiplier": 1.5 })),
            RuleConfig::new(
                1,
                RuleKind::Custom,
                json!({ "name": "Wide", "condition": "price > monthly_low or volume > 1e6" }),
            ),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn evaluation_is_idempotent(
            price in 0.0f64..1_000.0,
            previous_close in 0.0f64..1_000.0,
            volume in 0u64..500_000_000,
            high in 0.0f64..1_000.0,
            low in 0.0f64..1_000.0,
            avg in 0.0f64..100_000_000.0,
            with_history in any::<bool>(),
        ) {
            let rules = all_rules();
            let cur = current("PROP", price, previous_close, volume);
            let hist = history("PROP", high, low, avg);
            let hist = with_history.then_some(&hist);

            let first = engine().evaluate_rules(&rules, &cur, hist);
            let second = engine().evaluate_rules(&rules, &cur, hist);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn ladder_events_never_exceed_rungs(
            price in 0.0f64..1_000.0,
            high in 0.0f64..1_000.0,
        ) {
            let rules = [RuleConfig::new(1, RuleKind::MonthlyHighDrop, json!({}))];
            let events = engine().evaluate_rules(
                &rules,
                &current("PROP", price, price, 0),
                Some(&history("PROP", high, 0.0, 0.0)),
            );
            prop_assert!(events.len() <= ThresholdLadderRule::DEFAULT_DROP.len());
            if high == 0.0 {
                prop_assert!(events.is_empty());
            }
        }
    }
}
