use thiserror::Error;

use crate::expr::ExprError;

/// Rule construction failures. Evaluation itself never fails.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown rule type: {0}")]
    UnknownRuleType(String),

    #[error("invalid parameters for {rule_type}: {reason}")]
    InvalidParameters {
        rule_type: &'static str,
        reason: String,
    },

    #[error("invalid condition `{condition}`: {source}")]
    InvalidCondition {
        condition: String,
        #[source]
        source: ExprError,
    },
}
